use core::cmp::Ordering;
use rampart::mem::{clone_into, copy, copy_trivial, fill, memcmp, memcpy, memmove, memset, zero};
use rampart::{const_cast_array, new_array, new_array_with, new_object, ArrayPtr, FixedArray, Ptr, StackArrayPtr};
use zerocopy::{AsBytes, FromBytes, FromZeroes};

#[derive(Debug, Clone, Copy, Default, PartialEq, AsBytes, FromBytes, FromZeroes)]
#[repr(C)]
struct Header {
    tag: u32,
    len: u32,
}

#[test]
fn test_mixed_pointer_kinds_copy() {
    let heap = new_array_with(4, |i| i as u16 * 3);
    let mut local = [0u16; 6];
    let stack = StackArrayPtr::from_slice(&mut local);
    copy(&(stack.offset(2)), &heap, 4);
    assert_eq!(local, [0, 0, 0, 3, 6, 9]);
}

#[test]
fn test_fixed_array_zero_and_fill() {
    let mut fixed = FixedArray::<f64, 4>::from([1.5; 4]);
    let view = fixed.as_stack_array();
    fill(&view, &2.0, 2);
    zero(&view.offset(3), 1);
    assert_eq!(fixed.as_slice(), &[2.0, 2.0, 1.5, 0.0]);
}

#[test]
#[should_panic(expected = "span out of bounds")]
fn test_copy_past_destination_traps() {
    let src = new_array::<u8>(8);
    let dst = new_array::<u8>(4);
    copy(&dst, &src, 5);
}

#[test]
fn test_overlapping_moves() {
    let a = new_array_with(6, |i| i as u8);
    memmove(&a.offset(2), &a, 4);
    assert_eq!(a.as_slice(), &[0, 1, 0, 1, 2, 3]);

    let b = new_array_with(6, |i| format!("{i}"));
    clone_into(&b, &b.offset(1), 5);
    assert_eq!(b.as_slice(), &["1", "2", "3", "4", "5", "5"]);

    let c = new_array_with(4, |i| i as i64);
    copy_trivial(&c.offset(1), &c, 3);
    assert_eq!(c.as_slice(), &[0, 0, 1, 2]);
}

#[test]
#[should_panic(expected = "overlapping copy")]
fn test_memcpy_overlap_traps() {
    let a = new_array::<u8>(8);
    memcpy(&a.offset(1), &a, 4);
}

#[test]
fn test_struct_byte_operations() {
    let records = new_array::<Header>(2);
    memset(&records, 0x01, 8);
    assert_eq!(records[0].tag, 0x0101_0101);
    assert_eq!(records[1], Header::default());

    let other = new_array::<Header>(2);
    memcpy(&other, &records, 16);
    assert_eq!(memcmp(&other, &records, 16), Ordering::Equal);
    memset(&other.offset(1), 0xff, 1);
    assert_eq!(memcmp(&other, &records, 16), Ordering::Greater);
}

#[test]
fn test_zero_pointer_slots() {
    let slots = new_array_with(3, |i| new_object(i));
    zero(&slots, 3);
    assert!(slots.iter().all(Ptr::is_null));
}

#[test]
fn test_reinterpret_header_as_words() {
    let mut records = new_array::<Header>(2);
    records[1] = Header { tag: 7, len: 9 };
    let words = records.reinterpret::<u32>();
    assert_eq!(words.size(), 4);
    assert_eq!(words[2], 7);
    assert_eq!(words[3], 9);
    let back = words.reinterpret::<Header>();
    assert_eq!(back[1], Header { tag: 7, len: 9 });
}

#[test]
fn test_downcast_through_erasure() {
    let p = new_object(Header { tag: 1, len: 2 });
    let erased = p.erase();
    assert_eq!(erased.downcast::<Header>().len, 2);
    assert!(erased.downcast::<u64>().is_null());

    let a = new_array::<Header>(3);
    let bytes = a.reinterpret::<u8>();
    let restored = bytes.downcast::<Header>();
    assert_eq!(restored.size(), 3);
    assert!(bytes.downcast::<u16>().is_null());
}

#[test]
fn test_const_cast_static_table() {
    static WORDS: [u8; 4] = *b"abcd";
    let p: ArrayPtr<u8> = unsafe { const_cast_array(WORDS.as_ptr(), WORDS.len()) };
    assert_eq!(p[3], b'd');
    assert!(p.get(4).is_none());
    assert!(p.downcast::<u8>().is_null());
}
