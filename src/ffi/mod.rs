//! Checked wrappers over the C string and stdio functions.
//!
//! Every wrapper takes checked pointers, validates termination and extents
//! first, and only then touches the underlying buffer or calls into libc.
//! Strings are byte arrays holding a NUL terminator somewhere in their extent;
//! the pointer's current index marks the start of the string.

pub mod stdio;
pub mod string;
