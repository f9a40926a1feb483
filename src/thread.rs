//! Thread creation with a pointer-typed entry routine.

use crate::ptr::Ptr;
use crate::stack::StackExtent;
use std::io;
use std::thread::{Builder, JoinHandle};

/// Routine and argument packaged for the new thread.
struct Runner<T> {
    routine: fn(Ptr<T>),
    arg: usize,
}

// SAFETY: only the address crosses threads; `spawn`'s contract makes the
// referent safe to use from the new thread.
unsafe impl<T: Send> Send for Runner<T> {}

impl<T> Runner<T> {
    fn run(self) {
        StackExtent::init_thread();
        // SAFETY: the address came from a `Ptr<T>`; see `spawn`.
        let arg = unsafe { Ptr::from_raw(self.arg as *mut T) };
        (self.routine)(arg);
    }
}

/// Runs `routine(arg)` on a new thread whose stack extent is initialised
/// before the routine starts.
///
/// # Safety
/// `arg` must be null or point to heap or static data that stays live until
/// the thread is done with it, and nothing else may access it mutably
/// meanwhile. Stack-resident data is rejected by [`Ptr`] itself.
///
/// # Errors
/// Returns the OS error if the thread could not be created.
pub unsafe fn spawn<T: Send + 'static>(
    routine: fn(Ptr<T>),
    arg: Ptr<T>,
) -> io::Result<JoinHandle<()>> {
    let runner = Runner {
        routine,
        arg: arg.address(),
    };

    #[cfg(feature = "tracing")]
    tracing::debug!(arg = format_args!("{:#x}", runner.arg), "spawning thread");

    Builder::new().spawn(move || runner.run())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::new_object;
    use crate::ptr::StackPtr;

    fn bump(counter: Ptr<u64>) {
        let mut counter = counter;
        *counter += 41;
        let mut local = 1u64;
        let view = StackPtr::new(&mut local);
        *counter += *view;
    }

    #[test]
    fn test_spawn_runs_routine() {
        let mut counter = new_object(0u64);
        let handle = unsafe { spawn(bump, counter) }.unwrap();
        handle.join().unwrap();
        assert_eq!(*counter, 42);
        unsafe { counter.free() };
    }

    fn observe_extent(out: Ptr<(usize, usize)>) {
        let mut out = out;
        let extent = StackExtent::current();
        let local = 0u8;
        *out = (extent.size(), usize::from(extent.contains(&local as *const u8 as usize)));
    }

    #[test]
    fn test_new_thread_has_own_extent() {
        let mut out = new_object((0usize, 0usize));
        unsafe { spawn(observe_extent, out) }.unwrap().join().unwrap();
        assert!(out.0 > 0);
        assert_eq!(out.1, 1);
        unsafe { out.free() };
    }
}
