//! Conversions between pointer element types.
//!
//! There are two kinds. A *downcast* recovers a concrete type from a pointer
//! whose static type was erased: it consults the element type recorded in
//! the heap table and yields null on mismatch. A *reinterpretation* views the
//! same bytes as another plain-data type; the `zerocopy` bounds make any byte
//! pattern valid, so the only runtime check left is alignment.

use crate::alloc::heap;
use crate::error::{trap, Violation};
use crate::ptr::{ArrayPtr, Ptr, StackArrayPtr};
use core::any::TypeId;
use core::ffi::c_void;
use core::mem;
use zerocopy::{AsBytes, FromBytes};

#[track_caller]
fn require_aligned<U>(address: usize) {
    let align = mem::align_of::<U>();
    if address % align != 0 {
        trap(Violation::Misaligned { address, align });
    }
}

impl<T> Ptr<T> {
    /// Forgets the element type.
    pub fn erase(&self) -> Ptr<c_void> {
        // SAFETY: same address, same liveness.
        unsafe { Ptr::from_raw(self.as_void()) }
    }

    /// Recovers a `U` if the object was allocated as a `U` (alone or as an
    /// array element). Returns null otherwise, including for memory not
    /// allocated by this crate.
    pub fn downcast<U: 'static>(&self) -> Ptr<U> {
        let address = self.address();
        let matches = heap::lookup(address).is_some_and(|block| {
            block.type_id == TypeId::of::<U>()
                && (address - block.payload) % mem::size_of::<U>().max(1) == 0
        });
        if matches {
            // SAFETY: the heap table records a `U` at this address.
            unsafe { Ptr::from_raw(address as *mut U) }
        } else {
            Ptr::null()
        }
    }

    /// Views the object's leading bytes as a `U`.
    ///
    /// # Panics
    /// Traps if `U` is larger than `T` or the address is misaligned for `U`.
    #[track_caller]
    pub fn reinterpret<U: FromBytes>(&self) -> Ptr<U>
    where
        T: AsBytes,
    {
        if self.is_null() {
            return Ptr::null();
        }
        if mem::size_of::<U>() > mem::size_of::<T>() {
            trap(Violation::SpanOutOfBounds {
                index: 0,
                count: mem::size_of::<U>(),
                extent: mem::size_of::<T>(),
            });
        }
        require_aligned::<U>(self.address());
        // SAFETY: in bounds, aligned, and any bytes form a valid `U`.
        unsafe { Ptr::from_raw(self.as_raw().cast::<U>()) }
    }
}

impl<T> ArrayPtr<T> {
    /// Recovers an array of `U` if the allocation was made as one. The result
    /// has the allocation's full extent and points at the same address.
    /// Returns null on mismatch.
    pub fn downcast<U: 'static>(&self) -> ArrayPtr<U> {
        let base = self.base() as usize;
        let Some(block) = heap::lookup(base) else {
            return ArrayPtr::null();
        };
        if block.payload != base || block.type_id != TypeId::of::<U>() {
            return ArrayPtr::null();
        }
        let size = mem::size_of::<U>().max(1) as isize;
        let index = (self.address() as isize).wrapping_sub(base as isize) / size;
        // SAFETY: the heap table records `count` values of `U` at `base`.
        unsafe { ArrayPtr::from_raw_parts_at(base as *mut U, block.count, index) }
    }

    /// Views the allocation as `U`s. The extent is rescaled by
    /// `size_of::<T>() / size_of::<U>()`; the index is kept as is.
    ///
    /// # Panics
    /// Traps if the base is misaligned for `U`.
    #[track_caller]
    pub fn reinterpret<U: FromBytes>(&self) -> ArrayPtr<U>
    where
        T: AsBytes,
    {
        if self.is_null() {
            return ArrayPtr::null();
        }
        require_aligned::<U>(self.base() as usize);
        ArrayPtr::from_span(self.span().rescaled::<U>())
    }
}

impl<T> StackArrayPtr<T> {
    /// Stack-scoped form of [`ArrayPtr::reinterpret`]; the temporal bound is kept.
    #[track_caller]
    pub fn reinterpret<U: FromBytes>(&self) -> StackArrayPtr<U>
    where
        T: AsBytes,
    {
        if !self.is_null() {
            require_aligned::<U>(self.base() as usize);
        }
        StackArrayPtr::with_bound(self.span().rescaled::<U>(), self.bound())
    }
}

/// Makes a writable pointer from a read-only address.
///
/// # Safety
/// `raw` must be null or point to a live, writable `T` outside any stack
/// frame, with no outstanding shared borrows while it is written.
pub unsafe fn const_cast<T>(raw: *const T) -> Ptr<T> {
    Ptr::from_raw(raw.cast_mut())
}

/// Makes a writable array pointer from a read-only address.
///
/// # Safety
/// As for [`const_cast`], for `extent` elements.
pub unsafe fn const_cast_array<T>(raw: *const T, extent: usize) -> ArrayPtr<T> {
    ArrayPtr::from_raw_parts(raw.cast_mut(), extent)
}
