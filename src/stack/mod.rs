//! Thread stack extents and temporal bounds.
//!
//! Stack-scoped pointers need two facts about an address: whether it lies in
//! the calling thread's stack at all, and how deep in that stack it lies. The
//! first comes from [`StackExtent`], queried from the OS once per thread. The
//! second comes from [`stack_pointer`], read at the point a pointer is built.
//!
//! All reasoning assumes a downward-growing stack: a frame created later (a
//! callee) occupies lower addresses than the frame that called it.

mod os;

use crate::error::Violation;
use core::cell::Cell;

/// Distance kept above the probe address when the OS cannot report a stack.
const FALLBACK_HEADROOM: usize = 256 * 1024;
/// Assumed stack size when the OS cannot report one.
const FALLBACK_SIZE: usize = 8 * 1024 * 1024;

thread_local! {
    static EXTENT: Cell<Option<StackExtent>> = const { Cell::new(None) };
}

/// Reads the stack pointer of the calling frame.
#[cfg(target_arch = "x86_64")]
#[inline(always)]
pub fn stack_pointer() -> usize {
    let sp: usize;
    // SAFETY: reads a register, no memory access.
    unsafe {
        core::arch::asm!("mov {}, rsp", out(reg) sp, options(nomem, nostack, preserves_flags));
    }
    sp
}

/// Reads the stack pointer of the calling frame.
#[cfg(target_arch = "aarch64")]
#[inline(always)]
pub fn stack_pointer() -> usize {
    let sp: usize;
    // SAFETY: reads a register, no memory access.
    unsafe {
        core::arch::asm!("mov {}, sp", out(reg) sp, options(nomem, nostack, preserves_flags));
    }
    sp
}

/// Approximates the stack pointer of the calling frame with the address of a local.
#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
#[inline(always)]
pub fn stack_pointer() -> usize {
    let marker = 0u8;
    core::hint::black_box(&marker) as *const u8 as usize
}

/// The address range of the current thread's stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackExtent {
    low: usize,
    high: usize,
}

impl StackExtent {
    pub(crate) const fn from_bounds(low: usize, high: usize) -> Self {
        Self { low, high }
    }

    /// Queries and caches the calling thread's stack extent.
    ///
    /// Call this first thing in a new thread. Threads that never call it get
    /// the extent lazily on first use of a stack-scoped pointer.
    pub fn init_thread() -> Self {
        let extent = os::query().unwrap_or_else(Self::approximate);
        let _ = EXTENT.try_with(|cell| cell.set(Some(extent)));

        #[cfg(feature = "tracing")]
        tracing::debug!(
            low = format_args!("{:#x}", extent.low),
            high = format_args!("{:#x}", extent.high),
            "stack extent initialised"
        );

        extent
    }

    /// Returns the calling thread's stack extent.
    #[inline]
    pub fn current() -> Self {
        EXTENT
            .try_with(Cell::get)
            .ok()
            .flatten()
            .unwrap_or_else(Self::init_thread)
    }

    fn approximate() -> Self {
        let high = stack_pointer().saturating_add(FALLBACK_HEADROOM);
        Self {
            low: high.saturating_sub(FALLBACK_SIZE),
            high,
        }
    }

    /// Lowest address of the stack region.
    #[inline(always)]
    pub const fn low(&self) -> usize {
        self.low
    }

    /// One past the highest address of the stack region.
    #[inline(always)]
    pub const fn high(&self) -> usize {
        self.high
    }

    /// Size of the stack region in bytes.
    pub const fn size(&self) -> usize {
        self.high - self.low
    }

    /// Returns `true` if `address` lies inside this stack.
    #[inline(always)]
    pub const fn contains(&self, address: usize) -> bool {
        self.low <= address && address < self.high
    }
}

/// Where the data behind a pointer lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Residency {
    /// On the current thread's stack; subject to temporal checks.
    Stack,
    /// Heap or static storage; may be stored anywhere.
    Heap,
}

impl Residency {
    /// Classifies `address` against the calling thread's stack.
    #[inline]
    pub fn of(address: usize) -> Self {
        if StackExtent::current().contains(address) {
            Residency::Stack
        } else {
            Residency::Heap
        }
    }
}

/// The deepest frame a stack-scoped pointer may refer to, plus its residency flag.
///
/// `frame` is the stack pointer at the time the owning pointer was built. Any
/// stack address at or above it belongs to that frame or one of its callers
/// and outlives the pointer; anything below belongs to a callee and dangles
/// once the callee returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemporalBound {
    frame: usize,
    residency: Residency,
}

impl TemporalBound {
    /// Captures the caller's frame with stack residency.
    #[inline(always)]
    pub fn capture() -> Self {
        Self {
            frame: stack_pointer(),
            residency: Residency::Stack,
        }
    }

    /// Captures the caller's frame and classifies `address`.
    #[inline(always)]
    pub fn capture_for(address: usize) -> Self {
        let frame = stack_pointer();
        Self {
            frame,
            residency: Residency::of(address),
        }
    }

    /// Captures the caller's frame for data known to be off the stack.
    #[inline(always)]
    pub fn capture_heap() -> Self {
        Self {
            frame: stack_pointer(),
            residency: Residency::Heap,
        }
    }

    /// Stack pointer recorded at capture.
    #[inline(always)]
    pub const fn frame(&self) -> usize {
        self.frame
    }

    /// Residency of the data currently referenced.
    #[inline(always)]
    pub const fn residency(&self) -> Residency {
        self.residency
    }

    /// Returns `true` if the referenced data is heap or static.
    #[inline(always)]
    pub const fn not_on_stack(&self) -> bool {
        matches!(self.residency, Residency::Heap)
    }

    /// Marks the referenced data as heap or static.
    #[inline(always)]
    pub fn set_heap(&mut self) {
        self.residency = Residency::Heap;
    }

    /// Returns `true` if a stack `address` may be held under this bound.
    #[inline(always)]
    pub const fn admits(&self, address: usize) -> bool {
        address == 0 || self.frame <= address
    }

    /// Validates storing `address` (with the given residency) under this bound
    /// and adopts the residency on success. The frame is never changed.
    #[inline]
    pub fn accept(&mut self, address: usize, residency: Residency) -> Result<(), Violation> {
        if matches!(residency, Residency::Heap) || self.admits(address) {
            self.residency = residency;
            Ok(())
        } else {
            Err(Violation::StackEscape {
                bound: self.frame,
                address,
            })
        }
    }
}
