//! Bounds-check strategies for array pointers.
//!
//! An array pointer validates every access. How it validates is a build-time
//! choice: [`SoftwareBounds`] compares the effective index against the extent,
//! while [`RegisterBounds`] precomputes an address range when the pointer is
//! built (the "make bounds" step) and checks the accessed address against its
//! lower and upper limits. Both strategies accept exactly the same accesses;
//! the `bounds-register` feature selects which one [`ActiveBounds`] names.

use core::fmt;
use core::mem;

/// A pluggable bounds-check mechanism.
pub trait BoundsCheck {
    /// Per-pointer state built when the pointer's extent is established.
    type Bounds: Copy + fmt::Debug;

    /// Builds the bounds for `extent` elements starting at `base`.
    fn make_bounds<T>(base: *const T, extent: usize) -> Self::Bounds;

    /// Returns `true` if element `index` of `base` lies within the bounds.
    fn check<T>(bounds: &Self::Bounds, base: *const T, index: isize, extent: usize) -> bool;
}

/// Index comparison against the stored extent.
#[derive(Debug, Clone, Copy, Default)]
pub struct SoftwareBounds;

impl BoundsCheck for SoftwareBounds {
    type Bounds = ();

    #[inline(always)]
    fn make_bounds<T>(_base: *const T, _extent: usize) -> Self::Bounds {}

    #[inline(always)]
    fn check<T>(_bounds: &(), _base: *const T, index: isize, extent: usize) -> bool {
        index >= 0 && (index as usize) < extent
    }
}

/// An address-range bounds register: inclusive `[lower, upper]` byte addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundsRegister {
    lower: usize,
    upper: usize,
}

impl BoundsRegister {
    /// Makes bounds covering `len` bytes at `base`.
    #[inline(always)]
    pub const fn make(base: usize, len: usize) -> Self {
        Self {
            lower: base,
            // An empty range gets an upper limit below its lower limit.
            upper: base.wrapping_add(len).wrapping_sub(1),
        }
    }

    /// Lower-limit check.
    #[inline(always)]
    pub const fn check_lower(&self, address: usize) -> bool {
        address >= self.lower
    }

    /// Upper-limit check.
    #[inline(always)]
    pub const fn check_upper(&self, address: usize) -> bool {
        self.upper >= self.lower && address <= self.upper
    }

    /// Lowest covered address.
    pub const fn lower(&self) -> usize {
        self.lower
    }

    /// Highest covered address.
    pub const fn upper(&self) -> usize {
        self.upper
    }
}

/// Address-range checking through a [`BoundsRegister`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RegisterBounds;

impl BoundsCheck for RegisterBounds {
    type Bounds = BoundsRegister;

    #[inline(always)]
    fn make_bounds<T>(base: *const T, extent: usize) -> BoundsRegister {
        BoundsRegister::make(base as usize, extent.saturating_mul(mem::size_of::<T>()))
    }

    #[inline(always)]
    fn check<T>(bounds: &BoundsRegister, base: *const T, index: isize, extent: usize) -> bool {
        let size = mem::size_of::<T>();
        if size == 0 {
            // Zero-sized elements all share one address.
            return SoftwareBounds::check(&(), base, index, extent);
        }
        if index < 0 {
            return false;
        }
        // An offset that leaves the address space is out of bounds.
        let Some(first) = (index as usize)
            .checked_mul(size)
            .and_then(|offset| (base as usize).checked_add(offset))
        else {
            return false;
        };
        let Some(last) = first.checked_add(size - 1) else {
            return false;
        };
        bounds.check_lower(first) && bounds.check_upper(last)
    }
}

/// The strategy compiled into the pointer types.
#[cfg(not(feature = "bounds-register"))]
pub type ActiveBounds = SoftwareBounds;

/// The strategy compiled into the pointer types.
#[cfg(feature = "bounds-register")]
pub type ActiveBounds = RegisterBounds;

/// Bounds state stored in each array pointer.
pub(crate) type Bounds = <ActiveBounds as BoundsCheck>::Bounds;
