//! Checked fill, copy and compare over array pointers.
//!
//! Each operation validates its whole span once through
//! [`BoundedPtr::require_span`] and then runs unchecked. Element-wise
//! operations (`zero`, `fill`, `copy`, `clone_into`) take element counts and
//! work for any type; the byte-level ones (`memset`, `memcpy`, `memmove`,
//! `memcmp`) take byte counts like their C namesakes and are restricted to
//! types for which every byte pattern is meaningful.

use crate::error::{trap, Violation};
use crate::ptr::{ArrayPtr, BoundedPtr, Ptr};
use core::cmp::Ordering;
use core::mem;
use core::ptr;
use core::slice;
use zerocopy::{AsBytes, FromBytes};

/// A type with a distinguished zero value.
///
/// Implemented for every [`num_traits::Zero`] type and for the nullable
/// pointer kinds. Implement it directly for types with a custom zero.
pub trait ZeroValue {
    /// Overwrites `self` with the zero value.
    fn set_zero(&mut self);
}

impl<T: num_traits::Zero> ZeroValue for T {
    #[inline]
    fn set_zero(&mut self) {
        *self = T::zero();
    }
}

impl<T> ZeroValue for Ptr<T> {
    fn set_zero(&mut self) {
        *self = Ptr::null();
    }
}

impl<T> ZeroValue for ArrayPtr<T> {
    fn set_zero(&mut self) {
        *self = ArrayPtr::null();
    }
}

#[inline]
#[track_caller]
fn elements<T, P: BoundedPtr<T>>(p: &P, count: usize) -> *mut T {
    p.require_span(count)
}

#[inline]
#[track_caller]
fn bytes_of<T, P: BoundedPtr<T>>(p: &P, bytes: usize) -> *mut u8 {
    p.require_span(bytes.div_ceil(mem::size_of::<T>().max(1))).cast()
}

fn overlaps(a: *const u8, b: *const u8, bytes: usize) -> bool {
    let (a, b) = (a as usize, b as usize);
    bytes != 0 && a < b.wrapping_add(bytes) && b < a.wrapping_add(bytes)
}

/// Sets `count` elements from `dst` to zero.
#[track_caller]
pub fn zero<T: ZeroValue, P: BoundedPtr<T>>(dst: &P, count: usize) {
    let data = elements(dst, count);
    // SAFETY: `count` elements validated.
    unsafe { slice::from_raw_parts_mut(data, count) }
        .iter_mut()
        .for_each(ZeroValue::set_zero);
}

/// Assigns clones of `value` to `count` elements from `dst`.
#[track_caller]
pub fn fill<T: Clone, P: BoundedPtr<T>>(dst: &P, value: &T, count: usize) {
    let data = elements(dst, count);
    // SAFETY: `count` elements validated; `value` is a separate borrow.
    unsafe { slice::from_raw_parts_mut(data, count) }.fill(value.clone());
}

/// Copies `count` elements from `src` into `dst` with `clone_from`.
///
/// # Panics
/// Traps with [`Violation::OverlappingCopy`] if the ranges overlap.
#[track_caller]
pub fn copy<T: Clone, D: BoundedPtr<T>, S: BoundedPtr<T>>(dst: &D, src: &S, count: usize) {
    let to = elements(dst, count);
    let from = elements(src, count);
    if overlaps(to.cast(), from.cast(), count * mem::size_of::<T>()) {
        trap(Violation::OverlappingCopy);
    }
    // SAFETY: both spans validated and disjoint.
    let (to, from) = unsafe {
        (
            slice::from_raw_parts_mut(to, count),
            slice::from_raw_parts(from, count),
        )
    };
    to.clone_from_slice(from);
}

/// Replaces `count` elements of `dst` with clones of the elements of `src`.
/// Overlapping ranges are handled like `memmove`.
#[track_caller]
pub fn clone_into<T: Clone, D: BoundedPtr<T>, S: BoundedPtr<T>>(dst: &D, src: &S, count: usize) {
    let to = elements(dst, count);
    let from = elements(src, count);
    let step = |i: usize| {
        // SAFETY: `i < count` in both validated spans; the clone is taken
        // before the destination is written.
        unsafe {
            let value = (*from.add(i)).clone();
            *to.add(i) = value;
        }
    };
    if (to as usize) <= (from as usize) {
        (0..count).for_each(step);
    } else {
        (0..count).rev().for_each(step);
    }
}

/// Bulk copy of `count` `Copy` elements. Overlap is allowed.
#[track_caller]
pub fn copy_trivial<T: Copy, D: BoundedPtr<T>, S: BoundedPtr<T>>(dst: &D, src: &S, count: usize) {
    let to = elements(dst, count);
    let from = elements(src, count);
    // SAFETY: both spans validated; `ptr::copy` permits overlap.
    unsafe { ptr::copy(from, to, count) };
}

/// Sets `bytes` bytes from `dst` to `byte`.
#[track_caller]
pub fn memset<T: AsBytes + FromBytes, P: BoundedPtr<T>>(dst: &P, byte: u8, bytes: usize) {
    let data = bytes_of(dst, bytes);
    // SAFETY: the span covers `bytes` bytes and any pattern is a valid `T`.
    unsafe { ptr::write_bytes(data, byte, bytes) };
}

/// Copies `bytes` bytes from `src` to `dst`.
///
/// # Panics
/// Traps with [`Violation::OverlappingCopy`] if the ranges overlap.
#[track_caller]
pub fn memcpy<T, D, S>(dst: &D, src: &S, bytes: usize)
where
    T: AsBytes + FromBytes,
    D: BoundedPtr<T>,
    S: BoundedPtr<T>,
{
    let to = bytes_of(dst, bytes);
    let from = bytes_of(src, bytes);
    if overlaps(to, from, bytes) {
        trap(Violation::OverlappingCopy);
    }
    // SAFETY: both spans validated and disjoint.
    unsafe { ptr::copy_nonoverlapping(from, to, bytes) };
}

/// Copies `bytes` bytes from `src` to `dst`; the ranges may overlap.
#[track_caller]
pub fn memmove<T, D, S>(dst: &D, src: &S, bytes: usize)
where
    T: AsBytes + FromBytes,
    D: BoundedPtr<T>,
    S: BoundedPtr<T>,
{
    let to = bytes_of(dst, bytes);
    let from = bytes_of(src, bytes);
    // SAFETY: both spans validated.
    unsafe { ptr::copy(from, to, bytes) };
}

/// Lexicographic comparison of `bytes` bytes.
#[track_caller]
pub fn memcmp<T, A, B>(a: &A, b: &B, bytes: usize) -> Ordering
where
    T: AsBytes,
    A: BoundedPtr<T>,
    B: BoundedPtr<T>,
{
    let left = bytes_of(a, bytes);
    let right = bytes_of(b, bytes);
    // SAFETY: both spans validated; `AsBytes` types have no padding.
    let (left, right) = unsafe {
        (
            slice::from_raw_parts(left.cast_const(), bytes),
            slice::from_raw_parts(right.cast_const(), bytes),
        )
    };
    left.cmp(right)
}
