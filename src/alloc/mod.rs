//! Typed allocation entry points.
//!
//! Every function here allocates from the system allocator, constructs the
//! values in place, records the block in the heap table and hands back a
//! checked pointer. Running out of memory is fatal: the request is passed to
//! [`std::alloc::handle_alloc_error`] and never reported as a null pointer.
//! A request whose byte size overflows traps with
//! [`Violation::AllocationFailure`].
//!
//! All allocations are released with the pointer's `free` method.

pub(crate) mod heap;
mod trace;

pub use trace::{mark_from, MarkSet, Marker, Trace};

use crate::array::{Matrix, Tailed};
use crate::error::{trap, Violation};
use crate::ptr::{ArrayPtr, Ptr};
use core::alloc::Layout;
use core::any::TypeId;
use core::fmt;
use core::mem;
use core::ptr::{self, NonNull};
use heap::{Block, TraceFn};
use serde::Serialize;
use std::alloc::handle_alloc_error;
use zerocopy::FromZeroes;

/// Byte written over freed payloads in debug builds.
pub const POISON_BYTE: u8 = 0xDD;

/// The system allocator returned no memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocError;

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("memory allocation failed")
    }
}

impl std::error::Error for AllocError {}

/// Counters over the heap table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HeapStats {
    /// Blocks allocated and not yet freed.
    pub live_blocks: usize,
    /// Payload bytes held by live blocks.
    pub live_bytes: usize,
    /// Blocks ever allocated.
    pub total_allocations: u64,
    /// Blocks ever freed.
    pub total_frees: u64,
}

impl HeapStats {
    /// Renders the counters as a JSON object.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Current heap counters. Process-wide, so concurrent threads affect them.
pub fn heap_stats() -> HeapStats {
    heap::stats()
}

/// Returns `true` if `address` is the payload of a live allocation.
pub fn is_live(address: usize) -> bool {
    heap::is_block(address)
}

/// Allocates `layout`, applying the out-of-memory policy.
fn obtain(layout: Layout, zeroed: bool) -> (NonNull<u8>, Layout) {
    match heap::allocate(layout, zeroed) {
        Ok(block) => block,
        Err(AllocError) => handle_alloc_error(layout),
    }
}

#[cold]
#[track_caller]
fn overflow<T>(count: usize) -> ! {
    trap(Violation::AllocationFailure {
        size: count.saturating_mul(mem::size_of::<T>()),
        align: mem::align_of::<T>(),
    })
}

/// Reserves room for `count` values of `T` whose first element is aligned
/// to `align` (a power of two). Returns the block base, its layout and the
/// payload address.
#[track_caller]
fn reserve<T>(count: usize, align: usize, zeroed: bool) -> (NonNull<u8>, Layout, *mut T) {
    let natural = mem::align_of::<T>();
    let padding = if align > natural { align - 1 } else { 0 };
    let layout = count
        .checked_mul(mem::size_of::<T>())
        .and_then(|bytes| bytes.checked_add(padding))
        .and_then(|bytes| Layout::from_size_align(bytes, natural).ok())
        .unwrap_or_else(|| overflow::<T>(count));
    let (base, layout) = obtain(layout, zeroed);
    let carve = if padding == 0 {
        0
    } else {
        let address = base.as_ptr() as usize;
        ((address + align - 1) & !(align - 1)) - address
    };
    let payload = base.as_ptr().wrapping_add(carve).cast::<T>();
    (base, layout, payload)
}

#[track_caller]
fn build_array<T: 'static>(
    count: usize,
    align: usize,
    mut init: impl FnMut(usize) -> T,
    trace_fn: Option<TraceFn>,
) -> ArrayPtr<T> {
    let (base, layout, payload) = reserve::<T>(count, align, false);
    for i in 0..count {
        // SAFETY: `payload` has room for `count` values.
        unsafe { payload.add(i).write(init(i)) };
    }
    let mut block = Block::elements(base, layout, payload, count);
    if let Some(trace_fn) = trace_fn {
        block = block.with_trace(trace_fn);
    }
    heap::register(block);
    // SAFETY: `count` initialised values at `payload`, recorded in the heap table.
    unsafe { ArrayPtr::from_raw_parts(payload, count) }
}

fn build_object<T: 'static>(value: T, trace_fn: Option<TraceFn>) -> Ptr<T> {
    let (base, layout) = obtain(Layout::new::<T>(), false);
    let payload = base.as_ptr().cast::<T>();
    // SAFETY: the block is sized and aligned for `T`.
    unsafe { payload.write(value) };
    let mut block = Block::elements(base, layout, payload, 1);
    if let Some(trace_fn) = trace_fn {
        block = block.with_trace(trace_fn);
    }
    heap::register(block);
    // SAFETY: live heap object recorded in the table.
    unsafe { Ptr::from_raw(payload) }
}

/// Moves `value` to the heap.
pub fn new_object<T: 'static>(value: T) -> Ptr<T> {
    build_object(value, None)
}

/// Moves `value` to the heap and records its trace routine for marking.
pub fn new_traced_object<T: Trace + 'static>(value: T) -> Ptr<T> {
    build_object(value, Some(trace::trace_elements::<T>))
}

/// Allocates `count` default values.
#[track_caller]
pub fn new_array<T: Default + 'static>(count: usize) -> ArrayPtr<T> {
    build_array(count, mem::align_of::<T>(), |_| T::default(), None)
}

/// Allocates `count` values produced by `init(index)`.
#[track_caller]
pub fn new_array_with<T: 'static, F: FnMut(usize) -> T>(count: usize, init: F) -> ArrayPtr<T> {
    build_array(count, mem::align_of::<T>(), init, None)
}

/// Allocates `count` clones of `value`.
#[track_caller]
pub fn new_array_filled<T: Clone + 'static>(count: usize, value: T) -> ArrayPtr<T> {
    build_array(count, mem::align_of::<T>(), |_| value.clone(), None)
}

/// Allocates `count` default values and records their trace routine.
#[track_caller]
pub fn new_traced_array<T: Trace + Default + 'static>(count: usize) -> ArrayPtr<T> {
    build_array(
        count,
        mem::align_of::<T>(),
        |_| T::default(),
        Some(trace::trace_elements::<T>),
    )
}

/// Allocates one value whose bytes are all zero.
pub fn new_zeroed_object<T: FromZeroes + 'static>() -> Ptr<T> {
    let (base, layout) = obtain(Layout::new::<T>(), true);
    let payload = base.as_ptr().cast::<T>();
    heap::register(Block::elements(base, layout, payload, 1));
    // SAFETY: all-zero bytes are a valid `T`, recorded in the heap table.
    unsafe { Ptr::from_raw(payload) }
}

/// Allocates `count` values whose bytes are all zero.
#[track_caller]
pub fn new_zeroed_array<T: FromZeroes + 'static>(count: usize) -> ArrayPtr<T> {
    let (base, layout, payload) = reserve::<T>(count, mem::align_of::<T>(), true);
    heap::register(Block::elements(base, layout, payload, count));
    // SAFETY: all-zero bytes are a valid `T`.
    unsafe { ArrayPtr::from_raw_parts(payload, count) }
}

/// Allocates `count` default values starting at an `align`-byte boundary.
///
/// The block is over-allocated and the aligned array carved out of it; the
/// returned pointer's base is the carved start and is what `free` expects.
///
/// # Panics
/// Traps with [`Violation::InvalidAlignment`] unless `align` is a power of two.
#[track_caller]
pub fn new_aligned_array<T: Default + 'static>(count: usize, align: usize) -> ArrayPtr<T> {
    if !align.is_power_of_two() {
        trap(Violation::InvalidAlignment { align });
    }
    build_array(count, align, |_| T::default(), None)
}

/// Allocates an `x_extent` by `y_extent` row-major matrix of default values.
///
/// # Panics
/// Panics if either extent is zero.
#[track_caller]
pub fn new_matrix<T: Default + 'static>(x_extent: usize, y_extent: usize) -> Matrix<T> {
    assert!(
        x_extent > 0 && y_extent > 0,
        "matrix extents must be non-zero, got {x_extent}x{y_extent}"
    );
    let count = x_extent
        .checked_mul(y_extent)
        .unwrap_or_else(|| overflow::<T>(usize::MAX));
    let cells = new_array::<T>(count);
    // SAFETY: `cells` holds exactly `x_extent * y_extent` values.
    unsafe { Matrix::from_raw_parts(cells.base(), x_extent, y_extent) }
}

/// Allocates a header followed by `tail_len` default tail elements.
///
/// # Panics
/// Panics if `tail_len` is zero.
#[track_caller]
pub fn new_variable_tail<H: 'static, T: Default + 'static>(
    tail_len: usize,
    head: H,
) -> Ptr<Tailed<H, T>> {
    assert!(tail_len > 0, "variable tail must have at least one element");
    let layout = Tailed::<H, T>::layout(tail_len).unwrap_or_else(|| overflow::<T>(tail_len));
    let (base, layout) = obtain(layout, false);
    let payload = base.as_ptr().cast::<Tailed<H, T>>();
    // SAFETY: the block is sized and aligned for the header and `tail_len` elements.
    unsafe { Tailed::init(payload, head, tail_len) };
    let block = Block::elements(base, layout, payload, tail_len)
        .with_bytes(layout.size())
        .with_drop(Tailed::<H, T>::drop_raw);
    heap::register(block);
    // SAFETY: live heap object recorded in the table.
    unsafe { Ptr::from_raw(payload) }
}

/// Moves the contents of `array` into a new allocation of `count` elements
/// and frees the old one. Elements past the old size are defaulted; elements
/// past the new size are dropped. A null `array` behaves like [`new_array`].
///
/// # Safety
/// No copy of `array` may be used afterwards.
///
/// # Panics
/// Traps with [`Violation::InvalidFree`] unless `array`'s base is a live
/// allocation of `T`s.
#[track_caller]
pub unsafe fn resize_array<T: Default + 'static>(array: ArrayPtr<T>, count: usize) -> ArrayPtr<T> {
    if array.is_null() {
        return new_array(count);
    }
    let old = array.base();
    let valid = heap::lookup(old as usize)
        .is_some_and(|b| b.payload == old as usize && b.type_id == TypeId::of::<T>());
    let Some(block) = valid.then(|| heap::take(old as usize)).flatten() else {
        trap(Violation::InvalidFree {
            address: old as usize,
        });
    };

    let old_count = block.count();
    let trace_fn = block.trace_fn();
    let keep = old_count.min(count);
    let (base, layout, payload) = reserve::<T>(count, mem::align_of::<T>(), false);
    ptr::copy_nonoverlapping(old, payload, keep);
    for i in keep..count {
        payload.add(i).write(T::default());
    }
    ptr::drop_in_place(ptr::slice_from_raw_parts_mut(old.add(keep), old_count - keep));
    block.deallocate();

    let mut resized = Block::elements(base, layout, payload, count);
    if let Some(trace_fn) = trace_fn {
        resized = resized.with_trace(trace_fn);
    }
    heap::register(resized);
    ArrayPtr::from_raw_parts(payload, count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_array_sizing() {
        let mut a = new_array::<u32>(5);
        assert_eq!(a.size(), 5);
        assert!(a.iter().all(|&v| v == 0));
        for i in 0..5 {
            a[i] = i as u32 * 10;
        }
        assert_eq!(a.as_slice(), &[0, 10, 20, 30, 40]);
        assert!(is_live(a.base() as usize));
        unsafe { a.free() };
        assert!(a.is_null());
    }

    #[test]
    fn test_aligned_array_is_aligned() {
        let a = new_aligned_array::<u8>(10, 64);
        assert_eq!(a.base() as usize % 64, 0);
        assert_eq!(a.size(), 10);
        let mut a = a;
        unsafe { a.free() };
    }

    #[test]
    #[should_panic(expected = "invalid alignment")]
    fn test_aligned_array_rejects_bad_alignment() {
        let _ = new_aligned_array::<u8>(4, 24);
    }

    #[test]
    #[should_panic(expected = "allocation failure")]
    fn test_overflowing_request_traps() {
        let _ = new_array::<u64>(usize::MAX / 4);
    }

    #[test]
    fn test_resize_keeps_prefix() {
        let a = new_array_with(3, |i| i as u16 + 1);
        let grown = unsafe { resize_array(a, 5) };
        assert_eq!(grown.as_slice(), &[1, 2, 3, 0, 0]);
        let shrunk = unsafe { resize_array(grown, 2) };
        assert_eq!(shrunk.as_slice(), &[1, 2]);
    }

    #[test]
    fn test_zeroed_array() {
        let a = new_zeroed_array::<u64>(8);
        assert!(a.iter().all(|&v| v == 0));
    }

    #[test]
    fn test_heap_stats_json() {
        let json = heap_stats().to_json().unwrap();
        assert!(json.contains("\"live_blocks\""));
    }
}
