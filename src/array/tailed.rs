//! Structs with a trailing variable-length array.

use crate::error::{trap, Violation};
use crate::ptr::{ArrayPtr, Ptr};
use core::alloc::Layout;
use core::mem::{self, MaybeUninit};
use core::ptr::{self, addr_of, addr_of_mut};

/// A header followed by a variable-length array of `T` in the same block.
///
/// Only ever exists behind a [`Ptr`] from
/// [`new_variable_tail`](crate::alloc::new_variable_tail); the tail length is
/// stored in the block and the tail is reached through [`Ptr::tail`].
#[repr(C)]
pub struct Tailed<H, T> {
    head: H,
    tail_len: usize,
    tail: [T; 0],
}

impl<H, T> Tailed<H, T> {
    /// The header.
    pub fn head(&self) -> &H {
        &self.head
    }

    /// Mutable access to the header.
    pub fn head_mut(&mut self) -> &mut H {
        &mut self.head
    }

    /// Number of tail elements.
    pub fn tail_len(&self) -> usize {
        self.tail_len
    }

    fn tail_offset() -> usize {
        let probe = MaybeUninit::<Self>::uninit();
        let base = probe.as_ptr();
        // SAFETY: computes a field address without reading.
        unsafe { addr_of!((*base).tail) as usize - base as usize }
    }

    /// Layout of a block with `tail_len` tail elements.
    pub(crate) fn layout(tail_len: usize) -> Option<Layout> {
        let bytes = tail_len
            .checked_mul(mem::size_of::<T>())?
            .checked_add(Self::tail_offset())?
            .max(mem::size_of::<Self>());
        Layout::from_size_align(bytes, mem::align_of::<Self>())
            .ok()
            .map(|layout| layout.pad_to_align())
    }

    /// # Safety
    /// `block` must be valid for writes of [`Tailed::layout`]`(tail_len)`.
    pub(crate) unsafe fn init(block: *mut Self, head: H, tail_len: usize)
    where
        T: Default,
    {
        addr_of_mut!((*block).head).write(head);
        addr_of_mut!((*block).tail_len).write(tail_len);
        let tail = addr_of_mut!((*block).tail).cast::<T>();
        for i in 0..tail_len {
            tail.add(i).write(T::default());
        }
    }

    /// Drop routine recorded with the block.
    pub(crate) unsafe fn drop_raw(payload: *mut u8, tail_len: usize) {
        let block = payload.cast::<Self>();
        ptr::drop_in_place(addr_of_mut!((*block).head));
        let tail = addr_of_mut!((*block).tail).cast::<T>();
        ptr::drop_in_place(ptr::slice_from_raw_parts_mut(tail, tail_len));
    }
}

impl<H, T> Ptr<Tailed<H, T>> {
    /// The tail as a bounds-checked array pointer.
    ///
    /// The tail is interior to the block: free the block through this `Ptr`,
    /// not through the tail pointer.
    #[track_caller]
    pub fn tail(&self) -> ArrayPtr<T> {
        let block = self.as_raw();
        if block.is_null() {
            trap(Violation::NullDereference);
        }
        // SAFETY: non-null blocks were initialised by `Tailed::init`.
        unsafe {
            let len = (*block).tail_len;
            ArrayPtr::from_raw_parts(addr_of_mut!((*block).tail).cast::<T>(), len)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::{is_live, new_variable_tail};

    struct Packet {
        kind: u8,
    }

    #[test]
    fn test_tail_is_sized_and_indexable() {
        let mut p = new_variable_tail::<Packet, u32>(4, Packet { kind: 3 });
        assert_eq!(p.head().kind, 3);
        assert_eq!(p.tail_len(), 4);
        let mut tail = p.tail();
        assert_eq!(tail.size(), 4);
        tail[3] = 99;
        assert_eq!(p.tail()[3], 99);
        assert!(tail.get(4).is_none());
        assert!(is_live(p.address()));
        assert!(!is_live(tail.address()));
        unsafe { p.free() };
        assert!(p.is_null());
    }

    #[test]
    fn test_layout_covers_tail() {
        let layout = Tailed::<u8, u64>::layout(3).unwrap();
        assert!(layout.size() >= Tailed::<u8, u64>::tail_offset() + 24);
        assert_eq!(layout.align(), mem::align_of::<u64>().max(mem::align_of::<usize>()));
    }

    #[test]
    #[should_panic(expected = "at least one element")]
    fn test_empty_tail_rejected() {
        let _ = new_variable_tail::<u8, u8>(0, 1);
    }

    #[test]
    fn test_tail_drops_owned_elements() {
        let mut p = new_variable_tail::<String, String>(2, "head".to_owned());
        p.tail()[0] = "a".repeat(8);
        unsafe { p.free() };
    }
}
