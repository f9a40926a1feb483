//! A null-checked pointer to exactly one object.
//!
//! `Ptr<T>` supports dereference and nothing else: no indexing, no pointer
//! arithmetic. Because it can never be moved off its object, the only check a
//! dereference needs is a null check.

use super::array::ArrayPtr;
use super::stack::StackPtr;
use crate::alloc::{heap, Marker};
use crate::error::{trap, Violation};
use core::cmp::Ordering;
use core::ffi::c_void;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::ops::{Deref, DerefMut, Sub};
use core::ptr;

/// A pointer to a single heap or static object.
///
/// Copies share the referent. Like a raw pointer, keeping accesses through
/// different copies from overlapping is the caller's responsibility.
#[repr(transparent)]
pub struct Ptr<T> {
    data: *mut T,
}

impl<T> Ptr<T> {
    /// The null pointer.
    #[inline(always)]
    pub const fn null() -> Self {
        Self {
            data: ptr::null_mut(),
        }
    }

    /// Wraps a raw address.
    ///
    /// # Safety
    /// `raw` must be null or point to a live `T` outside any stack frame, and
    /// stay live for as long as the pointer (or a copy) is dereferenced.
    #[inline(always)]
    pub const unsafe fn from_raw(raw: *mut T) -> Self {
        Self { data: raw }
    }

    /// Points at an object with static storage duration.
    #[inline(always)]
    pub fn from_static(target: &'static mut T) -> Self {
        Self { data: target }
    }

    /// Converts a stack-scoped pointer whose data is known to be off the stack.
    ///
    /// # Panics
    /// Traps with [`Violation::HeapOnly`] if `other` refers to stack data.
    #[track_caller]
    pub fn from_stack(other: &StackPtr<T>) -> Self {
        if !other.is_null() && !other.not_on_stack() {
            trap(Violation::HeapOnly {
                address: other.address(),
            });
        }
        Self {
            data: other.as_raw(),
        }
    }

    /// Returns `true` if the pointer is null.
    #[inline(always)]
    pub fn is_null(&self) -> bool {
        self.data.is_null()
    }

    /// Shared access, or `None` if null.
    #[inline(always)]
    pub fn get(&self) -> Option<&T> {
        // SAFETY: non-null `data` points to a live `T` per the construction contract.
        unsafe { self.data.as_ref() }
    }

    /// Exclusive access, or `None` if null.
    #[inline(always)]
    pub fn get_mut(&mut self) -> Option<&mut T> {
        // SAFETY: as for `get`.
        unsafe { self.data.as_mut() }
    }

    #[inline(always)]
    #[track_caller]
    fn checked(&self) -> *mut T {
        if self.data.is_null() {
            trap(Violation::NullDereference);
        }
        self.data
    }

    /// Converts to a stack-scoped pointer flagged as heap or static.
    #[inline(always)]
    pub fn to_stack(&self) -> StackPtr<T> {
        StackPtr::from_heap(self.data)
    }

    /// The raw address. Only for interfacing with unchecked code.
    #[inline(always)]
    pub fn as_raw(&self) -> *mut T {
        self.data
    }

    /// The address as an untyped pointer.
    #[inline(always)]
    pub fn as_void(&self) -> *mut c_void {
        self.data.cast()
    }

    /// The address as an integer.
    #[inline(always)]
    pub fn address(&self) -> usize {
        self.data as usize
    }

    /// Reports the referent to a heap marker.
    pub fn mark(&self, marker: &mut Marker) {
        marker.mark(self.address());
    }

    /// Releases the object and nulls this handle. Null is a no-op.
    ///
    /// Other copies of the pointer are not nulled and dangle afterwards.
    ///
    /// # Safety
    /// No copy of this pointer may be dereferenced after the call.
    ///
    /// # Panics
    /// Traps with [`Violation::InvalidFree`] if the pointer is not the start
    /// of a live allocation made by this crate.
    #[track_caller]
    pub unsafe fn free(&mut self) {
        if !self.data.is_null() {
            heap::release(self.address());
        }
        self.data = ptr::null_mut();
    }
}

impl<T> Deref for Ptr<T> {
    type Target = T;

    #[inline(always)]
    #[track_caller]
    fn deref(&self) -> &T {
        // SAFETY: null-checked; liveness per the construction contract.
        unsafe { &*self.checked() }
    }
}

impl<T> DerefMut for Ptr<T> {
    #[inline(always)]
    #[track_caller]
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: as for `deref`.
        unsafe { &mut *self.checked() }
    }
}

impl<T> Clone for Ptr<T> {
    #[inline(always)]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Ptr<T> {}

impl<T> Default for Ptr<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T> From<ArrayPtr<T>> for Ptr<T> {
    #[track_caller]
    fn from(array: ArrayPtr<T>) -> Self {
        array.to_ptr()
    }
}

impl<T> Sub for Ptr<T> {
    type Output = isize;

    fn sub(self, other: Self) -> isize {
        let size = core::mem::size_of::<T>().max(1) as isize;
        (self.address() as isize).wrapping_sub(other.address() as isize) / size
    }
}

impl<T> PartialEq for Ptr<T> {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl<T> Eq for Ptr<T> {}

impl<T> PartialOrd for Ptr<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Ptr<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.address().cmp(&other.address())
    }
}

impl<T> Hash for Ptr<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address().hash(state);
    }
}

impl<T> fmt::Debug for Ptr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Ptr").field(&self.data).finish()
    }
}

impl<T> fmt::Pointer for Ptr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&self.data, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::new_object;

    #[test]
    fn test_null_pointer() {
        let p: Ptr<i32> = Ptr::null();
        let q = p;
        assert!(p.is_null());
        assert_eq!(p, q);
        assert_eq!(p, Ptr::default());
        assert!(p.get().is_none());
    }

    #[test]
    #[should_panic(expected = "null dereference")]
    fn test_null_deref_traps() {
        let p: Ptr<i32> = Ptr::null();
        let _ = *p;
    }

    #[test]
    fn test_copies_share_referent() {
        let mut p = new_object(41);
        let q = p;
        *p += 1;
        assert_eq!(*q, 42);
        unsafe { p.free() };
        assert!(p.is_null());
        assert!(!q.is_null());
    }

    #[test]
    fn test_static_referent() {
        static mut COUNTER: u32 = 0;
        // SAFETY: only this test touches COUNTER.
        let mut p = Ptr::from_static(unsafe { &mut *core::ptr::addr_of_mut!(COUNTER) });
        *p = 3;
        assert_eq!(*p, 3);
    }

    #[test]
    fn test_heap_pointer_round_trips_through_stack_form() {
        let p = new_object(7u8);
        let l = p.to_stack();
        assert!(l.not_on_stack());
        assert_eq!(Ptr::from_stack(&l), p);
    }

    #[test]
    #[should_panic(expected = "heap-only conversion")]
    fn test_stack_data_cannot_become_heap_pointer() {
        let mut local = 1u32;
        let l = StackPtr::new(&mut local);
        let _ = Ptr::from_stack(&l);
    }
}
