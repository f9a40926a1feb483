//! Bounds-checked pointer into a heap or static array.
//!
//! An [`ArrayPtr`] carries the base of its allocation, a current index and the
//! allocation's element extent. Arithmetic moves the index without checking,
//! so a loop pointer may sit one past the end or before the start. Every
//! *access* (`*p`, `p[i]`, `get`, slices) re-validates
//! `0 <= index + i < extent` and traps otherwise.

use super::bounds::ActiveBounds;
use super::singleton::Ptr;
use super::span::{BoundedPtr, Span};
use super::stack_array::StackArrayPtr;
use crate::alloc::{heap, Marker};
use crate::error::{trap, OrTrap, Violation};
use core::cmp::Ordering;
use core::ffi::c_void;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::ops::{Add, AddAssign, Deref, DerefMut, Index, IndexMut, Sub, SubAssign};
use core::slice;

/// A bounds-checked pointer into an array allocation that is not on the stack.
#[repr(transparent)]
pub struct ArrayPtr<T> {
    span: Span<T>,
}

impl<T> ArrayPtr<T> {
    /// The null pointer: no base, extent 0.
    #[inline(always)]
    pub fn null() -> Self {
        Self { span: Span::null() }
    }

    /// Wraps `extent` elements at `data`, positioned at index 0.
    ///
    /// # Safety
    /// `data` must be null or the base of at least `extent` live `T`s outside
    /// any stack frame.
    #[inline(always)]
    pub unsafe fn from_raw_parts(data: *mut T, extent: usize) -> Self {
        Self::from_raw_parts_at(data, extent, 0)
    }

    /// Wraps `extent` elements at `data`, positioned at `index`.
    ///
    /// # Safety
    /// As for [`ArrayPtr::from_raw_parts`].
    #[inline(always)]
    pub unsafe fn from_raw_parts_at(data: *mut T, extent: usize, index: isize) -> Self {
        Self {
            span: Span::new(data, extent, index),
        }
    }

    /// Points at an array with static storage duration.
    pub fn from_static(slice: &'static mut [T]) -> Self {
        Self {
            span: Span::new(slice.as_mut_ptr(), slice.len(), 0),
        }
    }

    /// Converts a stack-scoped array pointer whose data is known to be off the
    /// stack, keeping its index.
    ///
    /// # Panics
    /// Traps with [`Violation::HeapOnly`] if `other` refers to stack data.
    #[track_caller]
    pub fn from_stack(other: &StackArrayPtr<T>) -> Self {
        if !other.is_null() && !other.not_on_stack() {
            trap(Violation::HeapOnly {
                address: other.base() as usize,
            });
        }
        Self {
            span: *other.span(),
        }
    }

    #[inline(always)]
    pub(crate) fn from_span(span: Span<T>) -> Self {
        Self { span }
    }

    #[inline(always)]
    pub(crate) fn span(&self) -> &Span<T> {
        &self.span
    }

    /// Returns `true` if the pointer has no base.
    #[inline(always)]
    pub fn is_null(&self) -> bool {
        self.span.is_null()
    }

    /// Current index into the allocation.
    #[inline(always)]
    pub fn index(&self) -> isize {
        self.span.index()
    }

    /// Number of elements in the allocation.
    #[inline(always)]
    pub fn size(&self) -> usize {
        self.span.extent()
    }

    /// Base address of the allocation.
    #[inline(always)]
    pub fn base(&self) -> *mut T {
        self.span.data()
    }

    /// Element `i` positions from the current index, or `None` when out of
    /// bounds or null.
    #[inline]
    pub fn get(&self, i: isize) -> Option<&T> {
        // SAFETY: `locate` validated the element.
        self.span.locate(i).ok().map(|p| unsafe { &*p })
    }

    /// Mutable form of [`ArrayPtr::get`].
    #[inline]
    pub fn get_mut(&mut self, i: isize) -> Option<&mut T> {
        // SAFETY: `locate` validated the element.
        self.span.locate(i).ok().map(|p| unsafe { &mut *p })
    }

    /// A pointer `delta` elements away in the same allocation. Unchecked.
    #[inline(always)]
    pub fn offset(&self, delta: isize) -> Self {
        Self {
            span: self.span.shifted(delta),
        }
    }

    /// Advances by one element and returns the moved pointer.
    #[inline(always)]
    pub fn increment(&mut self) -> &mut Self {
        self.span.shift(1);
        self
    }

    /// Steps back by one element and returns the moved pointer.
    #[inline(always)]
    pub fn decrement(&mut self) -> &mut Self {
        self.span.shift(-1);
        self
    }

    /// Advances by one element and returns the position before the move.
    #[inline(always)]
    pub fn post_increment(&mut self) -> Self {
        let before = *self;
        self.span.shift(1);
        before
    }

    /// Steps back by one element and returns the position before the move.
    #[inline(always)]
    pub fn post_decrement(&mut self) -> Self {
        let before = *self;
        self.span.shift(-1);
        before
    }

    /// The same allocation positioned at index 0.
    pub fn begin(&self) -> Self {
        self.offset(-self.index())
    }

    /// The same allocation positioned one past its last element.
    pub fn end(&self) -> Self {
        self.offset(self.size() as isize - self.index())
    }

    /// Elements from the current index to the end, validated once.
    ///
    /// # Panics
    /// Traps on null or when the index lies outside `[0, size]`.
    #[track_caller]
    pub fn as_slice(&self) -> &[T] {
        let len = self.span.remaining().or_trap();
        let data = self.span.span(len).or_trap();
        // SAFETY: `span` validated `len` elements from `data`.
        unsafe { slice::from_raw_parts(data, len) }
    }

    /// Mutable form of [`ArrayPtr::as_slice`].
    #[track_caller]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        let len = self.span.remaining().or_trap();
        let data = self.span.span(len).or_trap();
        // SAFETY: as for `as_slice`.
        unsafe { slice::from_raw_parts_mut(data, len) }
    }

    /// Iterates from the current index to the end of the allocation.
    #[track_caller]
    pub fn iter(&self) -> slice::Iter<'_, T> {
        self.as_slice().iter()
    }

    /// Returns `true` if `bytes` bytes from the current index lie in the allocation.
    pub fn spatial_check(&self, bytes: usize) -> bool {
        self.span.spatial_check(bytes)
    }

    /// Converts to a single-object pointer at the current element.
    ///
    /// # Panics
    /// Traps if the current index is out of bounds. A null pointer converts to null.
    #[track_caller]
    pub fn to_ptr(&self) -> Ptr<T> {
        if self.is_null() {
            return Ptr::null();
        }
        let data = self.span.locate_or_trap(0);
        // SAFETY: `data` is a validated element of a non-stack allocation.
        unsafe { Ptr::from_raw(data) }
    }

    /// Converts to a stack-scoped array pointer flagged as heap or static.
    #[inline(always)]
    pub fn to_stack(&self) -> StackArrayPtr<T> {
        StackArrayPtr::from_heap_span(self.span)
    }

    /// Address of the current element. Only for interfacing with unchecked code.
    #[inline(always)]
    pub fn as_raw(&self) -> *mut T {
        self.span.current()
    }

    /// Address of the current element as an untyped pointer.
    #[inline(always)]
    pub fn as_void(&self) -> *mut c_void {
        self.as_raw().cast()
    }

    /// Address of the current element as an integer.
    #[inline(always)]
    pub fn address(&self) -> usize {
        self.span.address()
    }

    /// Reports the allocation to a heap marker.
    pub fn mark(&self, marker: &mut Marker) {
        marker.mark(self.base() as usize);
    }

    /// Releases the whole allocation, whatever the current index, and nulls
    /// this handle. Null is a no-op.
    ///
    /// # Safety
    /// No copy of this pointer may be used to access the allocation afterwards.
    ///
    /// # Panics
    /// Traps with [`Violation::InvalidFree`] if the base is not a live
    /// allocation made by this crate.
    #[track_caller]
    pub unsafe fn free(&mut self) {
        if !self.is_null() {
            heap::release(self.base() as usize);
        }
        self.span.clear();
    }
}

impl<T> BoundedPtr<T> for ArrayPtr<T> {
    #[inline(always)]
    fn base(&self) -> *mut T {
        self.span.data()
    }

    #[inline(always)]
    fn index(&self) -> isize {
        self.span.index()
    }

    #[inline(always)]
    fn size(&self) -> usize {
        self.span.extent()
    }

    #[inline(always)]
    fn offset(&self, delta: isize) -> Self {
        ArrayPtr::offset(self, delta)
    }

    fn spatial_check(&self, bytes: usize) -> bool {
        self.span.spatial_check(bytes)
    }

    #[track_caller]
    fn require_span(&self, count: usize) -> *mut T {
        self.span.span(count).or_trap()
    }

    #[track_caller]
    fn remaining(&self) -> usize {
        self.span.remaining().or_trap()
    }
}

impl<T> Deref for ArrayPtr<T> {
    type Target = T;

    #[inline(always)]
    #[track_caller]
    fn deref(&self) -> &T {
        // SAFETY: `locate_or_trap` validated the element.
        unsafe { &*self.span.locate_or_trap(0) }
    }
}

impl<T> DerefMut for ArrayPtr<T> {
    #[inline(always)]
    #[track_caller]
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: `locate_or_trap` validated the element.
        unsafe { &mut *self.span.locate_or_trap(0) }
    }
}

impl<T> Index<isize> for ArrayPtr<T> {
    type Output = T;

    #[inline(always)]
    #[track_caller]
    fn index(&self, i: isize) -> &T {
        // SAFETY: `locate_or_trap` validated the element.
        unsafe { &*self.span.locate_or_trap(i) }
    }
}

impl<T> IndexMut<isize> for ArrayPtr<T> {
    #[inline(always)]
    #[track_caller]
    fn index_mut(&mut self, i: isize) -> &mut T {
        // SAFETY: `locate_or_trap` validated the element.
        unsafe { &mut *self.span.locate_or_trap(i) }
    }
}

impl<T> Add<isize> for ArrayPtr<T> {
    type Output = Self;

    #[inline(always)]
    fn add(self, delta: isize) -> Self {
        self.offset(delta)
    }
}

impl<T> Sub<isize> for ArrayPtr<T> {
    type Output = Self;

    #[inline(always)]
    fn sub(self, delta: isize) -> Self {
        self.offset(delta.wrapping_neg())
    }
}

impl<T> AddAssign<isize> for ArrayPtr<T> {
    #[inline(always)]
    fn add_assign(&mut self, delta: isize) {
        self.span.shift(delta);
    }
}

impl<T> SubAssign<isize> for ArrayPtr<T> {
    #[inline(always)]
    fn sub_assign(&mut self, delta: isize) {
        self.span.shift(delta.wrapping_neg());
    }
}

/// Pointer difference in elements.
impl<T> Sub for ArrayPtr<T> {
    type Output = isize;

    #[inline(always)]
    fn sub(self, other: Self) -> isize {
        self.span.distance(&other.span)
    }
}

impl<T> Clone for ArrayPtr<T> {
    #[inline(always)]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ArrayPtr<T> {}

impl<T> Default for ArrayPtr<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T> From<Ptr<T>> for ArrayPtr<T> {
    /// A single object viewed as a one-element array.
    fn from(p: Ptr<T>) -> Self {
        let extent = usize::from(!p.is_null());
        Self {
            span: Span::new(p.as_raw(), extent, 0),
        }
    }
}

impl<'a, T> IntoIterator for &'a ArrayPtr<T> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;

    #[track_caller]
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T> PartialEq for ArrayPtr<T> {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.address() == other.address()
    }
}

impl<T> Eq for ArrayPtr<T> {}

impl<T> PartialOrd for ArrayPtr<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for ArrayPtr<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.address().cmp(&other.address())
    }
}

impl<T> Hash for ArrayPtr<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address().hash(state);
    }
}

impl<T> fmt::Debug for ArrayPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayPtr")
            .field("base", &self.base())
            .field("index", &self.index())
            .field("size", &self.size())
            .field("bounds", &core::any::type_name::<ActiveBounds>())
            .finish()
    }
}

impl<T> fmt::Pointer for ArrayPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&self.as_raw(), f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::new_array;

    #[test]
    fn test_null_array() {
        let a: ArrayPtr<u8> = ArrayPtr::null();
        assert!(a.is_null());
        assert_eq!(a.size(), 0);
        assert!(a.get(0).is_none());
        assert!(a.to_ptr().is_null());
        assert_eq!(a, ArrayPtr::default());
    }

    #[test]
    #[should_panic(expected = "null dereference")]
    fn test_null_index_traps() {
        let a: ArrayPtr<u8> = ArrayPtr::null();
        let _ = a[0];
    }

    #[test]
    fn test_slice_at_offset() {
        let mut a = new_array::<i32>(5);
        for (i, v) in [10, 20, 30, 40, 50].into_iter().enumerate() {
            a[i as isize] = v;
        }
        let s = a + 2;
        assert_eq!(*s, 30);
        assert_eq!(s.index(), 2);
        assert_eq!(s[2], 50);
        assert!(s.get(3).is_none());
        assert_eq!(s.as_slice(), &[30, 40, 50]);
        unsafe { a.free() };
    }

    #[test]
    #[should_panic(expected = "out of bounds: index 5 outside extent 5")]
    fn test_slice_past_end_traps() {
        let a = new_array::<i32>(5);
        let s = a + 2;
        let _ = s[3];
    }

    #[test]
    fn test_arithmetic_is_unchecked_until_access() {
        let a = new_array::<u16>(3);
        let mut p = a.offset(-1);
        assert!(p.get(0).is_none());
        p.increment();
        assert_eq!(p, a);
        assert_eq!(p.post_increment(), a);
        assert_eq!(p - a, 1);
        p += 2;
        assert_eq!(p, a.end());
        assert!(p.as_slice().is_empty());
        p -= 3;
        assert_eq!(p, a.begin());
    }

    #[test]
    fn test_iteration_covers_remaining_elements() {
        let mut a = new_array::<u32>(4);
        a.as_mut_slice().copy_from_slice(&[1, 2, 3, 4]);
        let sum: u32 = (&a.offset(1)).into_iter().sum();
        assert_eq!(sum, 9);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_to_ptr_out_of_range_traps() {
        let a = new_array::<u8>(2);
        let _ = (a + 2).to_ptr();
    }

    #[test]
    fn test_single_object_as_array() {
        let p = crate::alloc::new_object(9i64);
        let a = ArrayPtr::from(p);
        assert_eq!(a.size(), 1);
        assert_eq!(a[0], 9);
        assert_eq!(a.to_ptr(), p);
    }
}
