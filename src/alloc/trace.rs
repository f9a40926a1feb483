//! Reachability marking over the heap table.
//!
//! A type that stores checked pointers implements [`Trace`] to report them.
//! Allocations made with [`new_traced_object`](super::new_traced_object) or
//! [`new_traced_array`](super::new_traced_array) record a type-erased trace
//! routine, so the marker can follow references out of a block without
//! knowing its type. Any address that falls inside a live block marks the
//! whole block, which makes the mark phase conservative with respect to
//! interior pointers.
//!
//! Only marking is provided. What to do with the blocks left unmarked is up
//! to the caller; nothing is freed here.

use super::heap;
use crate::array::Matrix;
use crate::ptr::{ArrayPtr, Ptr, StackArrayPtr, StackPtr};
use std::collections::BTreeSet;

/// Reports the heap references a value holds.
pub trait Trace {
    /// Calls [`Marker::mark`] for every pointer held by `self`.
    fn trace(&self, marker: &mut Marker);
}

/// Collects the set of blocks reachable from a group of roots.
#[derive(Debug, Default)]
pub struct Marker {
    marked: BTreeSet<usize>,
    pending: Vec<usize>,
}

impl Marker {
    /// An empty marker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the block containing `address`, if any. Null and non-heap
    /// addresses are ignored.
    pub fn mark(&mut self, address: usize) {
        if address == 0 {
            return;
        }
        if let Some(block) = heap::lookup(address) {
            if self.marked.insert(block.payload) {
                self.pending.push(block.payload);
            }
        }
    }

    /// Marks everything `root` refers to.
    pub fn root<R: Trace + ?Sized>(&mut self, root: &R) -> &mut Self {
        root.trace(self);
        self
    }

    /// Follows references out of marked blocks until nothing new is found.
    pub fn finish(mut self) -> MarkSet {
        while let Some(payload) = self.pending.pop() {
            heap::trace_block(payload, &mut self);
        }
        MarkSet {
            marked: self.marked,
        }
    }
}

/// Result of a completed mark phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkSet {
    marked: BTreeSet<usize>,
}

impl MarkSet {
    /// Returns `true` if the block containing `address` was reached.
    pub fn is_marked(&self, address: usize) -> bool {
        heap::lookup(address).is_some_and(|b| self.marked.contains(&b.payload))
    }

    /// Number of blocks reached.
    pub fn len(&self) -> usize {
        self.marked.len()
    }

    /// Returns `true` if nothing was reached.
    pub fn is_empty(&self) -> bool {
        self.marked.is_empty()
    }

    /// Payload addresses of live blocks that were not reached.
    pub fn unreachable(&self) -> Vec<usize> {
        heap::live_blocks()
            .into_iter()
            .map(|b| b.payload)
            .filter(|payload| !self.marked.contains(payload))
            .collect()
    }
}

/// Runs a complete mark phase from `root`.
pub fn mark_from<R: Trace + ?Sized>(root: &R) -> MarkSet {
    let mut marker = Marker::new();
    marker.root(root);
    marker.finish()
}

/// Type-erased trace routine stored with traced blocks.
pub(crate) unsafe fn trace_elements<T: Trace>(payload: *const u8, count: usize, marker: &mut Marker) {
    let values = core::slice::from_raw_parts(payload.cast::<T>(), count);
    for value in values {
        value.trace(marker);
    }
}

macro_rules! trace_nothing {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Trace for $ty {
                #[inline(always)]
                fn trace(&self, _marker: &mut Marker) {}
            }
        )*
    };
}

trace_nothing!(
    (), bool, char, u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64,
    &'static str, String,
);

impl<T> Trace for Ptr<T> {
    fn trace(&self, marker: &mut Marker) {
        self.mark(marker);
    }
}

impl<T> Trace for ArrayPtr<T> {
    fn trace(&self, marker: &mut Marker) {
        self.mark(marker);
    }
}

impl<T> Trace for StackPtr<T> {
    fn trace(&self, marker: &mut Marker) {
        self.mark(marker);
    }
}

impl<T> Trace for StackArrayPtr<T> {
    fn trace(&self, marker: &mut Marker) {
        self.mark(marker);
    }
}

impl<T> Trace for Matrix<T> {
    fn trace(&self, marker: &mut Marker) {
        self.mark(marker);
    }
}

impl<T: Trace> Trace for Option<T> {
    fn trace(&self, marker: &mut Marker) {
        if let Some(value) = self {
            value.trace(marker);
        }
    }
}

impl<T: Trace> Trace for [T] {
    fn trace(&self, marker: &mut Marker) {
        for value in self {
            value.trace(marker);
        }
    }
}

impl<T: Trace, const N: usize> Trace for [T; N] {
    fn trace(&self, marker: &mut Marker) {
        self.as_slice().trace(marker);
    }
}

impl<T: Trace> Trace for Vec<T> {
    fn trace(&self, marker: &mut Marker) {
        self.as_slice().trace(marker);
    }
}

macro_rules! trace_tuple {
    ($($name:ident),+) => {
        impl<$($name: Trace),+> Trace for ($($name,)+) {
            #[allow(non_snake_case)]
            fn trace(&self, marker: &mut Marker) {
                let ($($name,)+) = self;
                $($name.trace(marker);)+
            }
        }
    };
}

trace_tuple!(A);
trace_tuple!(A, B);
trace_tuple!(A, B, C);
trace_tuple!(A, B, C, D);
