use proptest::prelude::*;
use rampart::ptr::{BoundsCheck, RegisterBounds, SoftwareBounds};
use rampart::{new_array_with, new_object, ArrayPtr, BoundedPtr, Ptr};

#[test]
fn test_slice_scenario() {
    let mut a = new_array_with(5, |i| (i as i32 + 1) * 10);
    assert_eq!(a[2], 30);

    let mut b = a + 4;
    assert_eq!(*b, 50);
    assert_eq!(b - a, 4);

    b += 1;
    assert_eq!(b.index(), 5);
    assert!(b.get(0).is_none());
    assert_eq!(b, a.end());

    b -= 5;
    assert_eq!(b, a.begin());
    assert_eq!(*b, 10);

    unsafe { a.free() };
}

#[test]
#[should_panic(expected = "out of bounds: index 5 outside extent 5")]
fn test_one_past_end_deref_traps() {
    let a = new_array_with(5, |i| i as u8);
    let end = a + 5;
    let _ = *end;
}

#[test]
#[should_panic(expected = "out of bounds: index -1 outside extent 3")]
fn test_before_start_index_traps() {
    let a = new_array_with(3, |i| i as u8);
    let _ = (a + 1)[-2];
}

#[test]
#[should_panic(expected = "null dereference")]
fn test_null_array_index_traps() {
    let a: ArrayPtr<u16> = ArrayPtr::null();
    let _ = a[0];
}

#[test]
fn test_pre_and_post_increment() {
    let a = new_array_with(3, |i| i as u64);
    let mut p = a;
    let before = p.post_increment();
    assert_eq!(*before, 0);
    assert_eq!(*p, 1);
    assert_eq!(**p.increment(), 2);
    assert_eq!(**p.decrement(), 1);
    let before = p.post_decrement();
    assert_eq!(*before, 1);
    assert_eq!(p.index(), 0);
}

#[test]
fn test_ordering_follows_address() {
    let a = new_array_with(4, |i| i);
    assert!(a < a + 1);
    assert!(a + 3 > a + 2);
    assert_ne!(a, a + 1);
}

#[test]
fn test_singleton_conversions() {
    let a = new_array_with(3, |i| i as i32 * 2);
    let p: Ptr<i32> = (a + 2).to_ptr();
    assert_eq!(*p, 4);

    let back = ArrayPtr::from(p);
    assert_eq!(back.size(), 1);
    assert_eq!(back[0], 4);
    assert!(back.get(1).is_none());

    let null = ArrayPtr::from(Ptr::<i32>::null());
    assert_eq!(null.size(), 0);
    assert!(null.is_null());
}

#[test]
#[should_panic(expected = "out of bounds")]
fn test_to_ptr_past_end_traps() {
    let a = new_array_with(2, |_| 0u8);
    let _ = (a + 2).to_ptr();
}

#[test]
fn test_spatial_check_uses_bytes() {
    let a = new_array_with(4, |_| 0u32);
    assert!(a.spatial_check(16));
    assert!(!a.spatial_check(17));
    assert!((a + 3).spatial_check(4));
    assert!(!(a + 3).spatial_check(5));
    assert_eq!((a + 1).remaining(), 3);
}

#[test]
fn test_iteration_from_current_index() {
    let a = new_array_with(5, |i| i as u8 + 1);
    let tail: Vec<u8> = (a + 2).iter().copied().collect();
    assert_eq!(tail, vec![3, 4, 5]);
    let total: u32 = (&a).into_iter().map(|&v| u32::from(v)).sum();
    assert_eq!(total, 15);
}

#[test]
fn test_copies_share_referent() {
    let mut p = new_object(7u32);
    let mut q = p;
    *q = 9;
    assert_eq!(*p, 9);
    assert_eq!(p, q);
    unsafe { p.free() };
}

#[test]
fn test_debug_names_bounds_strategy() {
    let a = new_array_with(2, |_| 0u8);
    let text = format!("{a:?}");
    assert!(text.contains("ArrayPtr"));
    assert!(text.contains("size: 2"));
    assert!(text.contains("Bounds"));
}

#[test]
fn test_far_offsets_rejected() {
    let a = new_array_with(4, |i| i as u64 * 100);
    for index in [(1isize << 61) + 1, (1isize << 62) + 1, isize::MAX, isize::MIN, -(1isize << 61) + 1] {
        assert!(a.offset(index).get(0).is_none(), "index {index} accepted");
    }
}

#[test]
#[should_panic(expected = "out of bounds")]
fn test_far_offset_index_traps() {
    let a = new_array_with(4, |_| 0u64);
    let _ = a[(1isize << 61) + 1];
}

proptest! {
    #[test]
    fn test_far_indices_checked(extent in 1usize..16, index in any::<isize>()) {
        let a = new_array_with(extent, |i| i);
        let inside = index >= 0 && (index as usize) < extent;
        prop_assert_eq!(a.get(index).is_some(), inside);
    }

    #[test]
    fn test_bounds_strategies_agree(extent in 0usize..32, index in any::<isize>()) {
        let data = vec![0u32; extent.max(1)];
        let base = data.as_ptr();
        let software = SoftwareBounds::check(&SoftwareBounds::make_bounds(base, extent), base, index, extent);
        let register = RegisterBounds::check(&RegisterBounds::make_bounds(base, extent), base, index, extent);
        prop_assert_eq!(software, register);
    }

    #[test]
    fn test_access_valid_iff_index_in_extent(extent in 1usize..64, index in -80isize..80) {
        let a = new_array_with(extent, |i| i);
        let p = a.offset(index);
        let inside = index >= 0 && (index as usize) < extent;
        prop_assert_eq!(p.get(0).is_some(), inside);
        if inside {
            prop_assert_eq!(p.get(0).copied(), Some(index as usize));
        }
    }

    #[test]
    fn test_offset_difference_roundtrips(extent in 1usize..64, start in 0isize..64, d in -64isize..64) {
        let a = new_array_with(extent, |_| 0u16).offset(start);
        prop_assert_eq!((a + d) - a, d);
        prop_assert_eq!(((a + d) - d).index(), a.index());
    }

    #[test]
    fn test_spatial_check_matches_span(extent in 0usize..32, index in 0isize..40, bytes in 0usize..160) {
        let a = new_array_with(extent, |_| 0u32).offset(index);
        let elements = bytes.div_ceil(4);
        let index = index as usize;
        let expected = elements == 0 || (index <= extent && elements <= extent - index);
        prop_assert_eq!(a.spatial_check(bytes), expected);
    }
}
