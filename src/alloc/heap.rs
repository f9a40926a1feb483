//! The process-wide table of tagged allocations.
//!
//! Every block handed out by [`crate::alloc`] is recorded here under its
//! payload address, together with the layout it was allocated with, its
//! element type and count, and type-erased drop and trace routines. `free`
//! goes through the table, so releasing anything that is not the payload of a
//! live block (a double free, a stack array, an interior pointer) traps
//! instead of corrupting the allocator.
//!
//! The table lock is never held while user code runs: drop and trace routines
//! are called after the lookup has released it.

use super::trace::Marker;
use super::{AllocError, HeapStats, POISON_BYTE};
use crate::error::{trap, Violation};
use core::alloc::Layout;
use core::any::TypeId;
use core::ptr::{self, NonNull};
use std::alloc::{alloc, alloc_zeroed, dealloc};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Drops `count` values starting at the payload.
pub(crate) type DropFn = unsafe fn(*mut u8, usize);
/// Reports the references held by `count` values starting at the payload.
pub(crate) type TraceFn = unsafe fn(*const u8, usize, &mut Marker);

static HEAP: Mutex<HeapTable> = Mutex::new(HeapTable::new());

struct HeapTable {
    blocks: BTreeMap<usize, Block>,
    live_bytes: usize,
    total_allocations: u64,
    total_frees: u64,
}

impl HeapTable {
    const fn new() -> Self {
        Self {
            blocks: BTreeMap::new(),
            live_bytes: 0,
            total_allocations: 0,
            total_frees: 0,
        }
    }

    /// The block whose payload contains `address`.
    fn containing(&self, address: usize) -> Option<&Block> {
        let (_, block) = self.blocks.range(..=address).next_back()?;
        let end = block.payload + block.bytes;
        (address < end || address == block.payload).then_some(block)
    }
}

fn table() -> MutexGuard<'static, HeapTable> {
    HEAP.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A recorded allocation.
pub(crate) struct Block {
    base: usize,
    layout: Layout,
    payload: usize,
    bytes: usize,
    count: usize,
    type_id: TypeId,
    type_name: &'static str,
    drop_fn: DropFn,
    trace_fn: Option<TraceFn>,
}

/// A copy of the public facts about a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BlockInfo {
    pub(crate) payload: usize,
    pub(crate) bytes: usize,
    pub(crate) count: usize,
    pub(crate) type_id: TypeId,
    pub(crate) type_name: &'static str,
}

impl Block {
    /// Describes `count` values of `T` at `payload`, carved from `base`.
    pub(crate) fn elements<T: 'static>(
        base: NonNull<u8>,
        layout: Layout,
        payload: *mut T,
        count: usize,
    ) -> Self {
        Self {
            base: base.as_ptr() as usize,
            layout,
            payload: payload as usize,
            bytes: count * core::mem::size_of::<T>(),
            count,
            type_id: TypeId::of::<T>(),
            type_name: core::any::type_name::<T>(),
            drop_fn: drop_elements::<T>,
            trace_fn: None,
        }
    }

    pub(crate) fn with_bytes(mut self, bytes: usize) -> Self {
        self.bytes = bytes;
        self
    }

    pub(crate) fn with_drop(mut self, drop_fn: DropFn) -> Self {
        self.drop_fn = drop_fn;
        self
    }

    pub(crate) fn with_trace(mut self, trace_fn: TraceFn) -> Self {
        self.trace_fn = Some(trace_fn);
        self
    }

    fn info(&self) -> BlockInfo {
        BlockInfo {
            payload: self.payload,
            bytes: self.bytes,
            count: self.count,
            type_id: self.type_id,
            type_name: self.type_name,
        }
    }

    /// Number of values recorded in the block.
    pub(crate) fn count(&self) -> usize {
        self.count
    }

    pub(crate) fn trace_fn(&self) -> Option<TraceFn> {
        self.trace_fn
    }

    /// Runs the drop routine over the payload.
    ///
    /// # Safety
    /// The payload must hold `count` initialised values, dropped at most once.
    pub(crate) unsafe fn drop_payload(&self) {
        (self.drop_fn)(self.payload as *mut u8, self.count);
    }

    /// Returns the memory to the system allocator without dropping anything.
    ///
    /// # Safety
    /// The block must no longer be referenced by anything that will read it.
    pub(crate) unsafe fn deallocate(self) {
        if cfg!(debug_assertions) {
            ptr::write_bytes(self.payload as *mut u8, POISON_BYTE, self.bytes);
        }
        dealloc(self.base as *mut u8, self.layout);
    }
}

unsafe fn drop_elements<T>(payload: *mut u8, count: usize) {
    ptr::drop_in_place(ptr::slice_from_raw_parts_mut(payload.cast::<T>(), count));
}

/// Allocates raw memory for `layout`. Zero-size requests get one byte.
pub(crate) fn allocate(layout: Layout, zeroed: bool) -> Result<(NonNull<u8>, Layout), AllocError> {
    let layout = if layout.size() == 0 {
        Layout::from_size_align(1, layout.align()).map_err(|_| AllocError)?
    } else {
        layout
    };
    // SAFETY: `layout` has non-zero size.
    let raw = unsafe {
        if zeroed {
            alloc_zeroed(layout)
        } else {
            alloc(layout)
        }
    };
    NonNull::new(raw).map(|p| (p, layout)).ok_or(AllocError)
}

/// Records a fully initialised block.
pub(crate) fn register(block: Block) {
    #[cfg(feature = "tracing")]
    tracing::trace!(
        address = format_args!("{:#x}", block.payload),
        bytes = block.bytes,
        count = block.count,
        ty = block.type_name,
        "allocated"
    );

    let mut heap = table();
    heap.live_bytes += block.bytes;
    heap.total_allocations += 1;
    heap.blocks.insert(block.payload, block);
}

/// Removes the block whose payload starts at `payload` without dropping or
/// deallocating it.
pub(crate) fn take(payload: usize) -> Option<Block> {
    let mut heap = table();
    let block = heap.blocks.remove(&payload)?;
    heap.live_bytes -= block.bytes;
    heap.total_frees += 1;
    Some(block)
}

/// Drops and deallocates the block whose payload starts at `payload`.
///
/// # Panics
/// Traps with [`Violation::InvalidFree`] if there is no such live block.
#[track_caller]
pub(crate) fn release(payload: usize) {
    let Some(block) = take(payload) else {
        trap(Violation::InvalidFree { address: payload });
    };

    #[cfg(feature = "tracing")]
    tracing::trace!(
        address = format_args!("{payload:#x}"),
        bytes = block.bytes,
        ty = block.type_name,
        "freed"
    );

    // SAFETY: the block was live and is now unreachable through the table;
    // its payload holds `count` initialised values.
    unsafe {
        block.drop_payload();
        block.deallocate();
    }
}

/// Facts about the block containing `address`, interior addresses included.
pub(crate) fn lookup(address: usize) -> Option<BlockInfo> {
    table().containing(address).map(Block::info)
}

/// Returns `true` if `payload` is the start of a live block.
pub(crate) fn is_block(payload: usize) -> bool {
    table().blocks.contains_key(&payload)
}

/// All live blocks, in address order.
pub(crate) fn live_blocks() -> Vec<BlockInfo> {
    table().blocks.values().map(Block::info).collect()
}

/// Runs the trace routine of the block at `payload`, if it has one.
pub(crate) fn trace_block(payload: usize, marker: &mut Marker) {
    let routine = {
        let heap = table();
        heap.blocks
            .get(&payload)
            .and_then(|b| b.trace_fn.map(|f| (f, b.count)))
    };
    if let Some((trace_fn, count)) = routine {
        // SAFETY: the routine was registered for this block's element type
        // and count.
        unsafe { trace_fn(payload as *const u8, count, marker) };
    }
}

pub(crate) fn stats() -> HeapStats {
    let heap = table();
    HeapStats {
        live_blocks: heap.blocks.len(),
        live_bytes: heap.live_bytes,
        total_allocations: heap.total_allocations,
        total_frees: heap.total_frees,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_block(count: usize) -> (usize, Block) {
        let layout = Layout::array::<u64>(count).unwrap();
        let (base, layout) = allocate(layout, true).unwrap();
        let payload = base.as_ptr().cast::<u64>();
        (payload as usize, Block::elements(base, layout, payload, count))
    }

    #[test]
    fn test_register_and_release() {
        let (payload, block) = raw_block(4);
        register(block);
        assert!(is_block(payload));
        let info = lookup(payload + 8).unwrap();
        assert_eq!(info.payload, payload);
        assert_eq!(info.count, 4);
        assert_eq!(info.bytes, 32);
        release(payload);
        assert!(!is_block(payload));
    }

    #[test]
    fn test_lookup_past_end_misses() {
        let (payload, block) = raw_block(2);
        register(block);
        assert!(lookup(payload + 16).map_or(true, |b| b.payload != payload));
        release(payload);
    }

    #[test]
    #[should_panic(expected = "invalid free")]
    fn test_double_release_traps() {
        let (payload, block) = raw_block(1);
        register(block);
        release(payload);
        release(payload);
    }

    #[test]
    fn test_zero_size_request_gets_memory() {
        let (base, layout) = allocate(Layout::new::<()>(), false).unwrap();
        assert_eq!(layout.size(), 1);
        unsafe { dealloc(base.as_ptr(), layout) };
    }
}
