//! Stack-scoped single-object pointer.
//!
//! A [`StackPtr`] may refer to a local variable. It records the stack pointer
//! of the frame that built it (its temporal bound) and refuses, at the moment
//! of assignment, to take on any stack address deeper than that frame: such an
//! address belongs to a callee and would dangle once the callee returns.

use super::singleton::Ptr;
use crate::alloc::Marker;
use crate::error::{trap, OrTrap, Violation};
use crate::stack::{Residency, TemporalBound};
use core::ffi::c_void;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::ops::{Deref, DerefMut, Sub};
use core::ptr;

/// A null-checked pointer that may refer to stack data, with escape checking.
///
/// Cloning re-captures the temporal bound at the clone site. Construction
/// functions are `#[inline(always)]` so that the bound is the caller's frame.
pub struct StackPtr<T> {
    data: *mut T,
    bound: TemporalBound,
}

impl<T> StackPtr<T> {
    /// The null pointer, bound to the caller's frame.
    #[inline(always)]
    pub fn null() -> Self {
        Self {
            data: ptr::null_mut(),
            bound: TemporalBound::capture_heap(),
        }
    }

    /// Points at `target`, which may be a local of the calling frame.
    #[inline(always)]
    pub fn new(target: &mut T) -> Self {
        let data: *mut T = target;
        Self {
            data,
            bound: TemporalBound::capture_for(data as usize),
        }
    }

    /// Wraps a raw address, classifying it as stack or heap.
    ///
    /// # Safety
    /// `raw` must be null or point to a live `T`. If it is a stack address, it
    /// must belong to the calling frame or one of its callers.
    #[inline(always)]
    pub unsafe fn from_raw(raw: *mut T) -> Self {
        Self {
            data: raw,
            bound: TemporalBound::capture_for(raw as usize),
        }
    }

    #[inline(always)]
    pub(crate) fn from_heap(raw: *mut T) -> Self {
        Self {
            data: raw,
            bound: TemporalBound::capture_heap(),
        }
    }

    #[inline(always)]
    pub(crate) fn with_bound(data: *mut T, bound: TemporalBound) -> Self {
        Self { data, bound }
    }

    /// Returns `true` if the pointer is null.
    #[inline(always)]
    pub fn is_null(&self) -> bool {
        self.data.is_null()
    }

    /// Returns `true` if the referenced data is heap or static.
    #[inline(always)]
    pub fn not_on_stack(&self) -> bool {
        self.bound.not_on_stack()
    }

    /// The temporal bound and residency flag.
    #[inline(always)]
    pub fn bound(&self) -> TemporalBound {
        self.bound
    }

    /// Returns `true` if this pointer may take on `address`.
    pub fn can_accept(&self, address: *const T) -> bool {
        let address = address as usize;
        Residency::of(address) == Residency::Heap || self.bound.admits(address)
    }

    /// Takes on the referent of `other`.
    ///
    /// # Panics
    /// Traps with [`Violation::StackEscape`] if `other` refers to stack data
    /// deeper than this pointer's bound.
    #[track_caller]
    pub fn assign(&mut self, other: &StackPtr<T>) {
        self.bound
            .accept(other.address(), other.bound.residency())
            .or_trap();
        self.data = other.data;
    }

    /// Points this pointer at `target`.
    ///
    /// # Panics
    /// Traps with [`Violation::StackEscape`] if `target` is a stack location
    /// deeper than this pointer's bound.
    #[track_caller]
    pub fn point_to(&mut self, target: &mut T) {
        let data: *mut T = target;
        let address = data as usize;
        self.bound.accept(address, Residency::of(address)).or_trap();
        self.data = data;
    }

    /// Shared access, or `None` if null.
    #[inline(always)]
    pub fn get(&self) -> Option<&T> {
        // SAFETY: non-null `data` is live per the construction and assignment checks.
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
}

impl<T> Deref for StackPtr<T> {
    type Target = T;

    #[inline(always)]
    #[track_caller]
    fn deref(&self) -> &T {
        // SAFETY: null-checked; liveness per the escape checks.
        unsafe { &*self.checked() }
    }
}

impl<T> DerefMut for StackPtr<T> {
    #[inline(always)]
    #[track_caller]
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: as for `deref`.
        unsafe { &mut *self.checked() }
    }
}

impl<T> Clone for StackPtr<T> {
    #[inline(always)]
    fn clone(&self) -> Self {
        let mut bound = TemporalBound::capture();
        if self.bound.not_on_stack() {
            bound.set_heap();
        }
        Self {
            data: self.data,
            bound,
        }
    }
}

impl<T> Default for StackPtr<T> {
    #[inline(always)]
    fn default() -> Self {
        Self::null()
    }
}

impl<T> From<Ptr<T>> for StackPtr<T> {
    #[inline(always)]
    fn from(p: Ptr<T>) -> Self {
        Self::from_heap(p.as_raw())
    }
}

impl<T> Sub for &StackPtr<T> {
    type Output = isize;

    fn sub(self, other: Self) -> isize {
        let size = core::mem::size_of::<T>().max(1) as isize;
        (self.address() as isize).wrapping_sub(other.address() as isize) / size
    }
}

impl<T> PartialEq for StackPtr<T> {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl<T> Eq for StackPtr<T> {}

impl<T> PartialEq<Ptr<T>> for StackPtr<T> {
    fn eq(&self, other: &Ptr<T>) -> bool {
        self.data == other.as_raw()
    }
}

impl<T> Hash for StackPtr<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address().hash(state);
    }
}

impl<T> fmt::Debug for StackPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StackPtr")
            .field("data", &self.data)
            .field("bound", &format_args!("{:#x}", self.bound.frame()))
            .field("residency", &self.bound.residency())
            .finish()
    }
}
