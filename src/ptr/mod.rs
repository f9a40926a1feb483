//! The checked pointer family.
//!
//! | Type              | Storage        | Arithmetic | Checks on access       |
//! |-------------------|----------------|------------|------------------------|
//! | [`Ptr`]           | heap / static  | no         | null                   |
//! | [`ArrayPtr`]      | heap / static  | yes        | null, bounds           |
//! | [`StackPtr`]      | any            | no         | null (+ escape on set) |
//! | [`StackArrayPtr`] | any            | yes        | null, bounds (+ escape)|
//!
//! Pointers are plain values: copying one never touches the referent, and
//! none of them own what they point to. Memory comes from [`crate::alloc`] or
//! from owning arrays in [`crate::array`], and is released explicitly.

pub mod bounds;
mod span;

mod array;
mod singleton;
mod stack;
mod stack_array;

pub use array::ArrayPtr;
pub use bounds::{ActiveBounds, BoundsCheck, BoundsRegister, RegisterBounds, SoftwareBounds};
pub use singleton::Ptr;
pub use span::BoundedPtr;
pub use stack::StackPtr;
pub use stack_array::StackArrayPtr;
