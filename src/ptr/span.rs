//! The checked `(base, index, extent)` core shared by both array pointer kinds.

use super::bounds::{ActiveBounds, Bounds, BoundsCheck};
use crate::error::{trap, Violation};
use core::fmt;
use core::mem;
use core::ptr;

/// Base address, current index and element extent of an array allocation.
pub(crate) struct Span<T> {
    data: *mut T,
    index: isize,
    extent: usize,
    bounds: Bounds,
}

impl<T> Clone for Span<T> {
    #[inline(always)]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Span<T> {}

impl<T> Span<T> {
    #[inline(always)]
    pub(crate) fn null() -> Self {
        Self::new(ptr::null_mut(), 0, 0)
    }

    #[inline(always)]
    pub(crate) fn new(data: *mut T, extent: usize, index: isize) -> Self {
        Self {
            data,
            index,
            extent,
            bounds: ActiveBounds::make_bounds(data, extent),
        }
    }

    #[inline(always)]
    pub(crate) fn is_null(&self) -> bool {
        self.data.is_null()
    }

    #[inline(always)]
    pub(crate) fn data(&self) -> *mut T {
        self.data
    }

    #[inline(always)]
    pub(crate) fn index(&self) -> isize {
        self.index
    }

    #[inline(always)]
    pub(crate) fn extent(&self) -> usize {
        self.extent
    }

    /// Same allocation, shifted index. The shift itself is not checked.
    #[inline(always)]
    pub(crate) fn shifted(&self, delta: isize) -> Self {
        Self {
            index: self.index.wrapping_add(delta),
            ..*self
        }
    }

    #[inline(always)]
    pub(crate) fn shift(&mut self, delta: isize) {
        self.index = self.index.wrapping_add(delta);
    }

    /// Raw address of the current element, without any check.
    #[inline(always)]
    pub(crate) fn current(&self) -> *mut T {
        self.data.wrapping_offset(self.index)
    }

    #[inline(always)]
    pub(crate) fn address(&self) -> usize {
        self.current() as usize
    }

    /// Validates an access at `offset` from the current index.
    #[inline(always)]
    pub(crate) fn locate(&self, offset: isize) -> Result<*mut T, Violation> {
        if self.data.is_null() {
            return Err(Violation::NullDereference);
        }
        let index = self.index.wrapping_add(offset);
        if ActiveBounds::check(&self.bounds, self.data, index, self.extent) {
            // SAFETY: `index` is within `[0, extent)` of the allocation at `data`.
            Ok(unsafe { self.data.offset(index) })
        } else {
            Err(Violation::OutOfBounds {
                index,
                extent: self.extent,
            })
        }
    }

    #[inline(always)]
    #[track_caller]
    pub(crate) fn locate_or_trap(&self, offset: isize) -> *mut T {
        match self.locate(offset) {
            Ok(p) => p,
            Err(v) => trap(v),
        }
    }

    /// Validates `count` elements starting at the current index in one check.
    pub(crate) fn span(&self, count: usize) -> Result<*mut T, Violation> {
        if count == 0 {
            return Ok(self.current());
        }
        if self.data.is_null() {
            return Err(Violation::NullDereference);
        }
        let fits = self.index >= 0
            && (self.index as usize)
                .checked_add(count)
                .is_some_and(|end| end <= self.extent);
        if fits {
            // SAFETY: `index` is within `[0, extent]`.
            Ok(unsafe { self.data.offset(self.index) })
        } else {
            Err(Violation::SpanOutOfBounds {
                index: self.index,
                count,
                extent: self.extent,
            })
        }
    }

    /// Elements from the current index to the end of the extent.
    pub(crate) fn remaining(&self) -> Result<usize, Violation> {
        if self.data.is_null() {
            return Err(Violation::NullDereference);
        }
        if self.index < 0 || self.index as usize > self.extent {
            return Err(Violation::OutOfBounds {
                index: self.index,
                extent: self.extent,
            });
        }
        Ok(self.extent - self.index as usize)
    }

    /// Byte-count form of [`Span::span`]. A partial element counts as whole.
    pub(crate) fn spatial_check(&self, bytes: usize) -> bool {
        let count = bytes.div_ceil(mem::size_of::<T>().max(1));
        self.span(count).is_ok()
    }

    /// Element distance between the current positions of two spans.
    pub(crate) fn distance(&self, other: &Self) -> isize {
        let size = mem::size_of::<T>();
        if size == 0 {
            return self.index.wrapping_sub(other.index);
        }
        (self.address() as isize).wrapping_sub(other.address() as isize) / size as isize
    }

    /// Reinterprets the span as `U` elements, rescaling the extent.
    pub(crate) fn rescaled<U>(&self) -> Span<U> {
        let extent = self.extent.saturating_mul(mem::size_of::<T>()) / mem::size_of::<U>().max(1);
        Span::new(self.data.cast::<U>(), extent, self.index)
    }

    /// Clears the local handle.
    pub(crate) fn clear(&mut self) {
        *self = Self::null();
    }
}

impl<T> fmt::Debug for Span<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Span")
            .field("data", &self.data)
            .field("index", &self.index)
            .field("extent", &self.extent)
            .finish()
    }
}

/// Operations shared by the bounds-checked array pointer kinds.
///
/// Bulk operations (`mem`, `ffi`) are written against this trait so they
/// accept heap and stack array pointers alike, and validate a whole span once
/// instead of every element.
pub trait BoundedPtr<T>: Sized {
    /// Base address of the allocation (element 0).
    fn base(&self) -> *mut T;

    /// Current index into the allocation.
    fn index(&self) -> isize;

    /// Number of elements in the allocation.
    fn size(&self) -> usize;

    /// A pointer into the same allocation at `delta` elements from this one.
    fn offset(&self, delta: isize) -> Self;

    /// Returns `true` if `bytes` bytes starting at the current index lie in
    /// the allocation.
    fn spatial_check(&self, bytes: usize) -> bool;

    /// Validates `count` elements from the current index and returns the
    /// address of the first.
    ///
    /// # Panics
    /// Traps on a null pointer or when the span leaves the allocation.
    fn require_span(&self, count: usize) -> *mut T;

    /// Number of elements from the current index to the end of the allocation.
    ///
    /// # Panics
    /// Traps on a null pointer or an index outside `[0, size]`.
    fn remaining(&self) -> usize;
}
