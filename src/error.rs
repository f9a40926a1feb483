//! Checked-pointer violations and the single trap path.
//!
//! Every check in this crate either succeeds or ends in [`trap`]. There is no
//! recovery protocol: a failed spatial or temporal check means the program is
//! about to touch memory it does not own, so execution stops at the point of
//! violation. Non-trapping probes (`get`, `can_accept`, `spatial_check`, ...)
//! exist for callers that want to test a condition first.

use core::fmt;
use serde::Serialize;

/// A memory-safety violation detected by a checked pointer operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    /// Dereference or index through a null pointer.
    NullDereference,
    /// Element access outside `[0, extent)`.
    OutOfBounds {
        /// Effective index of the access.
        index: isize,
        /// Number of elements in the backing extent.
        extent: usize,
    },
    /// Bulk operation spanning past the end (or before the start) of an extent.
    SpanOutOfBounds {
        /// Starting index of the span.
        index: isize,
        /// Number of elements covered by the span.
        count: usize,
        /// Number of elements in the backing extent.
        extent: usize,
    },
    /// A stack address assigned into a pointer whose temporal bound it violates.
    StackEscape {
        /// Temporal bound of the receiving pointer.
        bound: usize,
        /// Address that would have escaped.
        address: usize,
    },
    /// A stack-resident pointer converted to a heap-only pointer kind.
    HeapOnly {
        /// Address of the stack-resident data.
        address: usize,
    },
    /// The underlying allocator could not satisfy the request, or the request
    /// size overflowed.
    AllocationFailure {
        /// Requested size in bytes (saturated on overflow).
        size: usize,
        /// Requested alignment.
        align: usize,
    },
    /// Requested alignment is not a power of two.
    InvalidAlignment {
        /// The rejected alignment.
        align: usize,
    },
    /// Reinterpreted memory is not aligned for the target element type.
    Misaligned {
        /// Base address of the reinterpreted memory.
        address: usize,
        /// Alignment required by the target type.
        align: usize,
    },
    /// `free` on an address that is not the base of a live allocation.
    InvalidFree {
        /// The address passed to `free`.
        address: usize,
    },
    /// Non-overlapping copy requested over overlapping extents.
    OverlappingCopy,
    /// String operation on a buffer without a NUL terminator in its extent.
    Unterminated {
        /// Number of bytes searched.
        extent: usize,
    },
}

impl Violation {
    /// Stable short name of the violation class.
    pub const fn kind(&self) -> &'static str {
        match self {
            Violation::NullDereference => "null dereference",
            Violation::OutOfBounds { .. } => "out of bounds",
            Violation::SpanOutOfBounds { .. } => "span out of bounds",
            Violation::StackEscape { .. } => "stack escape",
            Violation::HeapOnly { .. } => "heap-only conversion",
            Violation::AllocationFailure { .. } => "allocation failure",
            Violation::InvalidAlignment { .. } => "invalid alignment",
            Violation::Misaligned { .. } => "misaligned reinterpretation",
            Violation::InvalidFree { .. } => "invalid free",
            Violation::OverlappingCopy => "overlapping copy",
            Violation::Unterminated { .. } => "unterminated string",
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())?;
        match *self {
            Violation::NullDereference | Violation::OverlappingCopy => Ok(()),
            Violation::OutOfBounds { index, extent } => {
                write!(f, ": index {index} outside extent {extent}")
            }
            Violation::SpanOutOfBounds { index, count, extent } => {
                write!(f, ": {count} elements at index {index} exceed extent {extent}")
            }
            Violation::StackEscape { bound, address } => {
                write!(f, ": address {address:#x} is deeper than bound {bound:#x}")
            }
            Violation::HeapOnly { address } => {
                write!(f, ": address {address:#x} is on the stack")
            }
            Violation::AllocationFailure { size, align } => {
                write!(f, ": {size} bytes aligned to {align}")
            }
            Violation::InvalidAlignment { align } => {
                write!(f, ": {align} is not a power of two")
            }
            Violation::Misaligned { address, align } => {
                write!(f, ": {address:#x} is not aligned to {align}")
            }
            Violation::InvalidFree { address } => {
                write!(f, ": {address:#x} is not a live allocation")
            }
            Violation::Unterminated { extent } => {
                write!(f, ": no terminator within {extent} bytes")
            }
        }
    }
}

impl std::error::Error for Violation {}

/// Stops execution at a failed check.
///
/// # Panics
/// Always. The panic message starts with [`Violation::kind`].
#[cold]
#[inline(never)]
#[track_caller]
pub fn trap(violation: Violation) -> ! {
    #[cfg(feature = "tracing")]
    tracing::error!(
        kind = violation.kind(),
        location = %core::panic::Location::caller(),
        "{violation}"
    );
    panic!("{violation}")
}

/// Converts a probe result into a trap.
pub(crate) trait OrTrap<T> {
    fn or_trap(self) -> T;
}

impl<T> OrTrap<T> for Result<T, Violation> {
    #[inline(always)]
    #[track_caller]
    fn or_trap(self) -> T {
        match self {
            Ok(value) => value,
            Err(violation) => trap(violation),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_leads_with_kind() {
        let v = Violation::OutOfBounds { index: 5, extent: 5 };
        assert_eq!(v.to_string(), "out of bounds: index 5 outside extent 5");
        assert_eq!(Violation::NullDereference.to_string(), "null dereference");
    }

    #[test]
    fn test_serializes_with_kind_tag() {
        let v = Violation::SpanOutOfBounds { index: 2, count: 4, extent: 5 };
        let json = serde_json::to_value(v).unwrap();
        assert_eq!(json["kind"], "span_out_of_bounds");
        assert_eq!(json["count"], 4);
    }

    #[test]
    #[should_panic(expected = "stack escape")]
    fn test_trap_panics() {
        trap(Violation::StackEscape { bound: 0x2000, address: 0x1000 });
    }

    #[test]
    fn test_or_trap_passes_values_through() {
        let ok: Result<u8, Violation> = Ok(3);
        assert_eq!(ok.or_trap(), 3);
    }
}
