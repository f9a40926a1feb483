//! Arrays for `static` items.

use crate::error::{trap, Violation};
use crate::mem::{self, ZeroValue};
use crate::ptr::ArrayPtr;
use core::cell::UnsafeCell;
use core::fmt;
use core::ops::Index;

/// Inline storage for `N` elements with static storage duration.
///
/// Declared as a `static`; since the data never lives on a stack, it converts
/// straight to [`ArrayPtr`]. Writes go through the returned pointers, which
/// carry raw-pointer aliasing rules.
///
/// ```
/// use rampart::array::GlobalArray;
///
/// static TABLE: GlobalArray<u32, 4> = GlobalArray::new([1, 2, 3, 4]);
///
/// let mut p = TABLE.offset(1);
/// *p = 20;
/// assert_eq!(TABLE[1], 20);
/// ```
pub struct GlobalArray<T, const N: usize> {
    data: UnsafeCell<[T; N]>,
}

// SAFETY: element access is through checked pointers with raw-pointer
// semantics; synchronising concurrent writes is the caller's job.
unsafe impl<T: Send + Sync, const N: usize> Sync for GlobalArray<T, N> {}

impl<T, const N: usize> GlobalArray<T, N> {
    /// Wraps an array value.
    pub const fn new(data: [T; N]) -> Self {
        Self {
            data: UnsafeCell::new(data),
        }
    }

    /// Number of elements, `N`.
    pub const fn len(&self) -> usize {
        N
    }

    /// Returns `true` if `N` is zero.
    pub const fn is_empty(&self) -> bool {
        N == 0
    }

    /// A pointer to the first element.
    pub fn as_array_ptr(&'static self) -> ArrayPtr<T> {
        // SAFETY: `N` elements with static storage duration.
        unsafe { ArrayPtr::from_raw_parts(self.data.get().cast::<T>(), N) }
    }

    /// A pointer to element `i`.
    ///
    /// # Panics
    /// Traps unless `i < N`.
    #[track_caller]
    pub fn offset(&'static self, i: usize) -> ArrayPtr<T> {
        if i >= N {
            trap(Violation::OutOfBounds {
                index: i as isize,
                extent: N,
            });
        }
        self.as_array_ptr().offset(i as isize)
    }

    /// Sets every element to its zero value.
    pub fn zero(&'static self)
    where
        T: ZeroValue,
    {
        mem::zero(&self.as_array_ptr(), N);
    }
}

impl<T, const N: usize> Index<usize> for GlobalArray<T, N> {
    type Output = T;

    #[track_caller]
    fn index(&self, i: usize) -> &T {
        if i >= N {
            trap(Violation::OutOfBounds {
                index: i as isize,
                extent: N,
            });
        }
        // SAFETY: in bounds; see the `Sync` impl for aliasing.
        unsafe { &*self.data.get().cast::<T>().add(i) }
    }
}

impl<T: fmt::Debug, const N: usize> fmt::Debug for GlobalArray<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalArray")
            .field("len", &N)
            .field("data", &self.data.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static SCORES: GlobalArray<i64, 3> = GlobalArray::new([7, 8, 9]);
    static SCRATCH: GlobalArray<u8, 4> = GlobalArray::new([1; 4]);

    #[test]
    fn test_global_array_is_heap_class() {
        let p = SCORES.as_array_ptr();
        assert_eq!(p.size(), 3);
        assert!(p.to_stack().not_on_stack());
        assert_eq!(SCORES[2], 9);
        assert_eq!(SCORES.len(), 3);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_global_offset_checked() {
        let _ = SCORES.offset(3);
    }

    #[test]
    fn test_global_zero() {
        SCRATCH.zero();
        assert_eq!(SCRATCH.as_array_ptr().as_slice(), &[0; 4]);
    }
}
