//! Row-major two-dimensional heap arrays.

use crate::alloc::{heap, Marker};
use crate::error::{OrTrap, Violation};
use crate::ptr::ArrayPtr;
use core::fmt;
use core::ops::{Index, IndexMut};
use core::ptr;

/// A row-major two-dimensional heap array.
///
/// Cell `(x, y)` lives at `y * x_extent + x` in one flat block, so an access
/// is checked once against both extents instead of through a pointer to
/// row pointers.
pub struct Matrix<T> {
    data: *mut T,
    x_extent: usize,
    y_extent: usize,
}

impl<T> Matrix<T> {
    /// The null matrix.
    pub const fn null() -> Self {
        Self {
            data: ptr::null_mut(),
            x_extent: 0,
            y_extent: 0,
        }
    }

    /// # Safety
    /// `data` must hold `x_extent * y_extent` live values outside any stack frame.
    pub(crate) unsafe fn from_raw_parts(data: *mut T, x_extent: usize, y_extent: usize) -> Self {
        Self {
            data,
            x_extent,
            y_extent,
        }
    }

    /// Returns `true` for a matrix with no block behind it.
    pub fn is_null(&self) -> bool {
        self.data.is_null()
    }

    /// Number of columns.
    pub fn x_extent(&self) -> usize {
        self.x_extent
    }

    /// Number of rows.
    pub fn y_extent(&self) -> usize {
        self.y_extent
    }

    /// Total number of cells.
    pub fn len(&self) -> usize {
        self.x_extent * self.y_extent
    }

    /// Returns `true` if the matrix has no cells.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn locate(&self, x: usize, y: usize) -> Result<*mut T, Violation> {
        if self.data.is_null() {
            return Err(Violation::NullDereference);
        }
        if x >= self.x_extent {
            return Err(Violation::OutOfBounds {
                index: x as isize,
                extent: self.x_extent,
            });
        }
        if y >= self.y_extent {
            return Err(Violation::OutOfBounds {
                index: y as isize,
                extent: self.y_extent,
            });
        }
        // SAFETY: both coordinates are in range.
        Ok(unsafe { self.data.add(y * self.x_extent + x) })
    }

    /// Cell `(x, y)`, or `None` when out of range.
    pub fn get(&self, x: usize, y: usize) -> Option<&T> {
        // SAFETY: `locate` validated the cell.
        self.locate(x, y).ok().map(|p| unsafe { &*p })
    }

    /// Mutable form of [`Matrix::get`].
    pub fn get_mut(&mut self, x: usize, y: usize) -> Option<&mut T> {
        // SAFETY: `locate` validated the cell.
        self.locate(x, y).ok().map(|p| unsafe { &mut *p })
    }

    /// All cells as one flat array pointer.
    pub fn as_array_ptr(&self) -> ArrayPtr<T> {
        // SAFETY: the matrix block holds `len()` values.
        unsafe { ArrayPtr::from_raw_parts(self.data, self.len()) }
    }

    /// Reports the block to a heap marker.
    pub fn mark(&self, marker: &mut Marker) {
        marker.mark(self.data as usize);
    }

    /// Releases the block and nulls this handle. Null is a no-op.
    ///
    /// # Safety
    /// No copy of this matrix may be used afterwards.
    #[track_caller]
    pub unsafe fn free(&mut self) {
        if !self.data.is_null() {
            heap::release(self.data as usize);
        }
        *self = Self::null();
    }
}

impl<T> Index<(usize, usize)> for Matrix<T> {
    type Output = T;

    #[inline]
    #[track_caller]
    fn index(&self, (x, y): (usize, usize)) -> &T {
        // SAFETY: `locate` validated the cell.
        unsafe { &*self.locate(x, y).or_trap() }
    }
}

impl<T> IndexMut<(usize, usize)> for Matrix<T> {
    #[inline]
    #[track_caller]
    fn index_mut(&mut self, (x, y): (usize, usize)) -> &mut T {
        // SAFETY: `locate` validated the cell.
        unsafe { &mut *self.locate(x, y).or_trap() }
    }
}

impl<T> Clone for Matrix<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Matrix<T> {}

impl<T> Default for Matrix<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T> PartialEq for Matrix<T> {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl<T> Eq for Matrix<T> {}

impl<T> fmt::Debug for Matrix<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matrix")
            .field("data", &self.data)
            .field("x_extent", &self.x_extent)
            .field("y_extent", &self.y_extent)
            .finish()
    }
}
