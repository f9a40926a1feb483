//! Stack-scoped bounds-checked array pointer.
//!
//! [`StackArrayPtr`] is the form in which fixed-size local arrays are passed
//! down the call stack. It has the full [`ArrayPtr`] access surface plus the
//! temporal bound of [`StackPtr`]: assigning a pointer into a callee's array
//! to one built in a shallower frame traps.

use super::array::ArrayPtr;
use super::span::{BoundedPtr, Span};
use super::stack::StackPtr;
use crate::alloc::Marker;
use crate::error::OrTrap;
use crate::stack::{Residency, TemporalBound};
use core::cmp::Ordering;
use core::ffi::c_void;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::ops::{Add, AddAssign, Deref, DerefMut, Index, IndexMut, Sub, SubAssign};
use core::slice;

/// A bounds-checked array pointer that may refer to stack data.
pub struct StackArrayPtr<T> {
    span: Span<T>,
    bound: TemporalBound,
}

impl<T> StackArrayPtr<T> {
    /// The null pointer, bound to the caller's frame.
    #[inline(always)]
    pub fn null() -> Self {
        Self {
            span: Span::null(),
            bound: TemporalBound::capture_heap(),
        }
    }

    /// Points at the first element of `slice`, which may be a local array.
    #[inline(always)]
    pub fn from_slice(slice: &mut [T]) -> Self {
        let data = slice.as_mut_ptr();
        Self {
            span: Span::new(data, slice.len(), 0),
            bound: TemporalBound::capture_for(data as usize),
        }
    }

    /// Wraps `extent` elements at `data`, classifying the storage.
    ///
    /// # Safety
    /// `data` must be null or the base of at least `extent` live `T`s. Stack
    /// storage must belong to the calling frame or one of its callers.
    #[inline(always)]
    pub unsafe fn from_raw_parts(data: *mut T, extent: usize) -> Self {
        Self::from_raw_parts_at(data, extent, 0)
    }

    /// Wraps `extent` elements at `data`, positioned at `index`.
    ///
    /// # Safety
    /// As for [`StackArrayPtr::from_raw_parts`].
    #[inline(always)]
    pub unsafe fn from_raw_parts_at(data: *mut T, extent: usize, index: isize) -> Self {
        Self {
            span: Span::new(data, extent, index),
            bound: TemporalBound::capture_for(data as usize),
        }
    }

    #[inline(always)]
    pub(crate) fn from_heap_span(span: Span<T>) -> Self {
        Self {
            span,
            bound: TemporalBound::capture_heap(),
        }
    }

    #[inline(always)]
    pub(crate) fn with_bound(span: Span<T>, bound: TemporalBound) -> Self {
        Self { span, bound }
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

    /// Returns `true` if the referenced data is heap or static.
    #[inline(always)]
    pub fn not_on_stack(&self) -> bool {
        self.bound.not_on_stack()
    }

    /// Returns `true` if `address` lies outside the calling thread's stack.
    pub fn data_not_on_stack(address: *const T) -> bool {
        Residency::of(address as usize) == Residency::Heap
    }

    /// Flags the referenced data as static, lifting escape checks on it.
    ///
    /// # Safety
    /// The data must outlive every pointer it may be assigned to.
    pub unsafe fn set_as_global(&mut self) {
        self.bound.set_heap();
    }

    /// The temporal bound and residency flag.
    #[inline(always)]
    pub fn bound(&self) -> TemporalBound {
        self.bound
    }

    /// Returns `true` if this pointer may take on an array based at `address`.
    pub fn can_accept(&self, address: *const T) -> bool {
        Self::data_not_on_stack(address) || self.bound.admits(address as usize)
    }

    /// Takes on the allocation and index of `other`.
    ///
    /// # Panics
    /// Traps with [`Violation::StackEscape`](crate::Violation::StackEscape) if
    /// `other` refers to a stack array deeper than this pointer's bound.
    #[track_caller]
    pub fn assign(&mut self, other: &StackArrayPtr<T>) {
        self.bound
            .accept(other.base() as usize, other.bound.residency())
            .or_trap();
        self.span = other.span;
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

    /// Mutable form of [`StackArrayPtr::get`].
    #[inline]
    pub fn get_mut(&mut self, i: isize) -> Option<&mut T> {
        // SAFETY: `locate` validated the element.
        self.span.locate(i).ok().map(|p| unsafe { &mut *p })
    }

    /// A pointer `delta` elements away with the same temporal bound. Unchecked.
    #[inline(always)]
    pub fn offset(&self, delta: isize) -> Self {
        Self {
            span: self.span.shifted(delta),
            bound: self.bound,
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
        let before = self.offset(0);
        self.span.shift(1);
        before
    }

    /// Steps back by one element and returns the position before the move.
    #[inline(always)]
    pub fn post_decrement(&mut self) -> Self {
        let before = self.offset(0);
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
    #[track_caller]
    pub fn as_slice(&self) -> &[T] {
        let len = self.span.remaining().or_trap();
        let data = self.span.span(len).or_trap();
        // SAFETY: `span` validated `len` elements from `data`.
        unsafe { slice::from_raw_parts(data, len) }
    }

    /// Mutable form of [`StackArrayPtr::as_slice`].
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

    /// Converts to a stack-scoped single-object pointer at the current
    /// element, keeping the temporal bound.
    ///
    /// # Panics
    /// Traps if the current index is out of bounds. A null pointer converts to null.
    #[track_caller]
    pub fn to_stack_ptr(&self) -> StackPtr<T> {
        if self.is_null() {
            return StackPtr::with_bound(core::ptr::null_mut(), self.bound);
        }
        StackPtr::with_bound(self.span.locate_or_trap(0), self.bound)
    }

    /// Converts to a heap-only array pointer.
    ///
    /// # Panics
    /// Traps with [`Violation::HeapOnly`](crate::Violation::HeapOnly) if the
    /// data is on the stack.
    #[track_caller]
    pub fn to_heap(&self) -> ArrayPtr<T> {
        ArrayPtr::from_stack(self)
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
}

impl<T> BoundedPtr<T> for StackArrayPtr<T> {
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
        StackArrayPtr::offset(self, delta)
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

impl<T> Deref for StackArrayPtr<T> {
    type Target = T;

    #[inline(always)]
    #[track_caller]
    fn deref(&self) -> &T {
        // SAFETY: `locate_or_trap` validated the element.
        unsafe { &*self.span.locate_or_trap(0) }
    }
}

impl<T> DerefMut for StackArrayPtr<T> {
    #[inline(always)]
    #[track_caller]
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: `locate_or_trap` validated the element.
        unsafe { &mut *self.span.locate_or_trap(0) }
    }
}

impl<T> Index<isize> for StackArrayPtr<T> {
    type Output = T;

    #[inline(always)]
    #[track_caller]
    fn index(&self, i: isize) -> &T {
        // SAFETY: `locate_or_trap` validated the element.
        unsafe { &*self.span.locate_or_trap(i) }
    }
}

impl<T> IndexMut<isize> for StackArrayPtr<T> {
    #[inline(always)]
    #[track_caller]
    fn index_mut(&mut self, i: isize) -> &mut T {
        // SAFETY: `locate_or_trap` validated the element.
        unsafe { &mut *self.span.locate_or_trap(i) }
    }
}

impl<T> Add<isize> for &StackArrayPtr<T> {
    type Output = StackArrayPtr<T>;

    #[inline(always)]
    fn add(self, delta: isize) -> StackArrayPtr<T> {
        self.offset(delta)
    }
}

impl<T> Sub<isize> for &StackArrayPtr<T> {
    type Output = StackArrayPtr<T>;

    #[inline(always)]
    fn sub(self, delta: isize) -> StackArrayPtr<T> {
        self.offset(delta.wrapping_neg())
    }
}

impl<T> AddAssign<isize> for StackArrayPtr<T> {
    #[inline(always)]
    fn add_assign(&mut self, delta: isize) {
        self.span.shift(delta);
    }
}

impl<T> SubAssign<isize> for StackArrayPtr<T> {
    #[inline(always)]
    fn sub_assign(&mut self, delta: isize) {
        self.span.shift(delta.wrapping_neg());
    }
}

/// Pointer difference in elements.
impl<T> Sub for &StackArrayPtr<T> {
    type Output = isize;

    #[inline(always)]
    fn sub(self, other: Self) -> isize {
        self.span.distance(&other.span)
    }
}

impl<T> Clone for StackArrayPtr<T> {
    #[inline(always)]
    fn clone(&self) -> Self {
        let mut bound = TemporalBound::capture();
        if self.bound.not_on_stack() {
            bound.set_heap();
        }
        Self {
            span: self.span,
            bound,
        }
    }
}

impl<T> Default for StackArrayPtr<T> {
    #[inline(always)]
    fn default() -> Self {
        Self::null()
    }
}

impl<T> From<ArrayPtr<T>> for StackArrayPtr<T> {
    #[inline(always)]
    fn from(a: ArrayPtr<T>) -> Self {
        a.to_stack()
    }
}

impl<'a, T> IntoIterator for &'a StackArrayPtr<T> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;

    #[track_caller]
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T> PartialEq for StackArrayPtr<T> {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.address() == other.address()
    }
}

impl<T> Eq for StackArrayPtr<T> {}

impl<T> PartialOrd for StackArrayPtr<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for StackArrayPtr<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.address().cmp(&other.address())
    }
}

impl<T> Hash for StackArrayPtr<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address().hash(state);
    }
}

impl<T> fmt::Debug for StackArrayPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StackArrayPtr")
            .field("base", &self.base())
            .field("index", &self.index())
            .field("size", &self.size())
            .field("bound", &format_args!("{:#x}", self.bound.frame()))
            .field("residency", &self.bound.residency())
            .finish()
    }
}
