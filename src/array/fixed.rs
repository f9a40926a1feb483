//! Fixed-size arrays held inline, usually on the stack.

use crate::error::{trap, Violation};
use crate::mem::ZeroValue;
use crate::ptr::{ArrayPtr, StackArrayPtr};
use crate::stack::Residency;
use core::ops::{Index, IndexMut};

/// Inline storage for `N` elements with checked pointer conversions.
///
/// Usually a local variable. Passing it down the call stack goes through
/// [`FixedArray::as_stack_array`], which keeps escape checking in force; a
/// plain [`ArrayPtr`] is only handed out when the array itself is known to
/// live off the stack (for example, as a field of a heap object).
#[derive(Debug, Clone, PartialEq, Eq)]
#[repr(transparent)]
pub struct FixedArray<T, const N: usize> {
    data: [T; N],
}

impl<T, const N: usize> FixedArray<T, N> {
    /// Wraps an array value.
    pub const fn new(data: [T; N]) -> Self {
        Self { data }
    }

    /// Number of elements, `N`.
    pub const fn len(&self) -> usize {
        N
    }

    /// Returns `true` if `N` is zero.
    pub const fn is_empty(&self) -> bool {
        N == 0
    }

    /// Raw pointer to the first element.
    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.data.as_mut_ptr()
    }

    /// The elements as a slice.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// The elements as a mutable slice.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Unwraps the inner array.
    pub fn into_inner(self) -> [T; N] {
        self.data
    }

    /// A stack-scoped pointer to the first element, bound to the caller's frame.
    #[inline(always)]
    pub fn as_stack_array(&mut self) -> StackArrayPtr<T> {
        StackArrayPtr::from_slice(&mut self.data)
    }

    /// A stack-scoped pointer to element `i`.
    ///
    /// # Panics
    /// Traps unless `i < N`.
    #[inline(always)]
    #[track_caller]
    pub fn offset(&mut self, i: usize) -> StackArrayPtr<T> {
        check_index(i, N);
        self.as_stack_array().offset(i as isize)
    }

    /// Returns `true` if this array lives outside the current thread's stack.
    pub fn not_on_stack(&self) -> bool {
        Residency::of(self.data.as_ptr() as usize) == Residency::Heap
    }

    /// A heap-only pointer to the first element.
    ///
    /// # Panics
    /// Traps with [`Violation::HeapOnly`] if the array is on the stack.
    #[track_caller]
    pub fn as_array_ptr(&mut self) -> ArrayPtr<T> {
        if !self.not_on_stack() {
            trap(Violation::HeapOnly {
                address: self.data.as_ptr() as usize,
            });
        }
        // SAFETY: `N` elements off the stack, valid as long as `self` is.
        unsafe { ArrayPtr::from_raw_parts(self.data.as_mut_ptr(), N) }
    }

    /// A heap-only pointer to element `i`.
    ///
    /// # Panics
    /// Traps unless `i < N` and the array is off the stack.
    #[track_caller]
    pub fn offset_array_ptr(&mut self, i: usize) -> ArrayPtr<T> {
        check_index(i, N);
        self.as_array_ptr().offset(i as isize)
    }

    /// Sets every element to its zero value.
    pub fn zero(&mut self)
    where
        T: ZeroValue,
    {
        self.data.iter_mut().for_each(ZeroValue::set_zero);
    }
}

#[inline(always)]
#[track_caller]
fn check_index(i: usize, extent: usize) {
    if i >= extent {
        trap(Violation::OutOfBounds {
            index: i as isize,
            extent,
        });
    }
}

impl<T, const N: usize> Index<usize> for FixedArray<T, N> {
    type Output = T;

    #[inline(always)]
    #[track_caller]
    fn index(&self, i: usize) -> &T {
        check_index(i, N);
        &self.data[i]
    }
}

impl<T, const N: usize> IndexMut<usize> for FixedArray<T, N> {
    #[inline(always)]
    #[track_caller]
    fn index_mut(&mut self, i: usize) -> &mut T {
        check_index(i, N);
        &mut self.data[i]
    }
}

impl<T: Default, const N: usize> Default for FixedArray<T, N> {
    fn default() -> Self {
        Self {
            data: core::array::from_fn(|_| T::default()),
        }
    }
}

impl<T, const N: usize> From<[T; N]> for FixedArray<T, N> {
    fn from(data: [T; N]) -> Self {
        Self::new(data)
    }
}
