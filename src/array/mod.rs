//! Owning array storage and multi-dimensional allocations.
//!
//! [`FixedArray`] and [`GlobalArray`] hold their elements inline and hand out
//! checked pointers on demand: a fixed array living in a stack frame yields
//! [`StackArrayPtr`](crate::ptr::StackArrayPtr)s, a global array yields plain
//! [`ArrayPtr`](crate::ptr::ArrayPtr)s. [`Matrix`] and [`Tailed`] describe
//! heap blocks produced by [`crate::alloc`].

mod fixed;
mod global;
mod matrix;
mod tailed;

pub use fixed::FixedArray;
pub use global::GlobalArray;
pub use matrix::Matrix;
pub use tailed::Tailed;
