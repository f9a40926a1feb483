//! # `rampart` - Checked Pointers for Unmanaged Memory
//!
//! A family of pointer types that carry enough metadata to check every access
//! at run time, plus the allocation, cast and memory routines that keep those
//! checks intact. Code written against raw pointers can be moved onto these
//! types one pointer at a time.
//!
//! ## Pointer Kinds
//!
//! 1. **Singleton pointers** ([`Ptr<T>`]):
//!    - One object on the heap or in static storage
//!    - Null-checked dereference, no arithmetic
//!
//! 2. **Array pointers** ([`ArrayPtr<T>`]):
//!    - Base, current index and extent
//!    - Every dereference and index is checked against `[0, extent)`
//!    - Arithmetic moves the index freely; only access is checked
//!
//! 3. **Stack-scoped pointers** ([`StackPtr<T>`], [`StackArrayPtr<T>`]):
//!    - May point into stack frames
//!    - Carry a temporal bound: the frame they were created in
//!    - Assigning an address from a deeper (younger) frame traps
//!
//! ## Failure Model
//!
//! A failed check is a [`Violation`] and ends in [`trap`]: a panic whose
//! message starts with the violation kind. Non-trapping probes (`get`,
//! `spatial_check`, `can_accept`) are available where a caller wants to test
//! first. Allocation failure is fatal and never surfaces as a null pointer.
//!
//! ## Memory
//!
//! Allocations made through [`alloc`] are recorded in a process-wide heap
//! table with their element type and drop routine. `free` consults the table,
//! so double frees and frees of stack or static memory trap instead of
//! corrupting the allocator. The table also backs [`Ptr::downcast`] and the
//! mark phase in [`alloc::Marker`].
//!
//! ## Threads
//!
//! Temporal bounds are computed from the calling thread's stack. Threads
//! started with [`thread::spawn`] initialise their stack extent before user
//! code runs; other threads do so lazily.
//!
//! ## Example
//!
//! ```rust
//! use rampart::{new_array_with, ArrayPtr};
//!
//! let mut values: ArrayPtr<i32> = new_array_with(5, |i| (i as i32 + 1) * 10);
//! assert_eq!(values[2], 30);
//!
//! let mut cursor = values + 4;
//! assert_eq!(*cursor, 50);
//! cursor += 1;
//! assert!(cursor.get(0).is_none());
//!
//! unsafe { values.free() };
//! assert!(values.is_null());
//! ```

#![warn(missing_docs, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod alloc;
pub mod array;
pub mod cast;
pub mod error;
pub mod ffi;
pub mod mem;
pub mod ptr;
pub mod stack;
pub mod thread;

pub use alloc::{
    heap_stats, new_aligned_array, new_array, new_array_filled, new_array_with, new_matrix,
    new_object, new_traced_array, new_traced_object, new_variable_tail, new_zeroed_array,
    new_zeroed_object, resize_array, HeapStats, Trace,
};
pub use array::{FixedArray, GlobalArray, Matrix, Tailed};
pub use cast::{const_cast, const_cast_array};
pub use error::{trap, Violation};
pub use mem::ZeroValue;
pub use ptr::{ArrayPtr, BoundedPtr, Ptr, StackArrayPtr, StackPtr};
pub use stack::{Residency, StackExtent, TemporalBound};

// Compile-time assertions for pointer layout
const _: () = {
    use core::mem;

    // Singleton pointers are a bare address.
    assert!(mem::size_of::<Ptr<u64>>() == mem::size_of::<usize>());
    assert!(mem::size_of::<Ptr<u8>>() == mem::size_of::<*mut u8>());

    // Array pointers carry base, index and extent, plus a register when the
    // address-range strategy is compiled in.
    #[cfg(not(feature = "bounds-register"))]
    assert!(mem::size_of::<ArrayPtr<u64>>() == mem::size_of::<usize>() * 3);
    #[cfg(feature = "bounds-register")]
    assert!(mem::size_of::<ArrayPtr<u64>>() == mem::size_of::<usize>() * 5);

    // Fixed arrays add no header to their elements.
    assert!(mem::size_of::<FixedArray<u32, 8>>() == mem::size_of::<[u32; 8]>());
};
