use rampart::alloc::{mark_from, Marker, Trace};
use rampart::{
    new_array, new_matrix, new_object, new_traced_array, new_traced_object, resize_array, ArrayPtr, Ptr,
};

#[derive(Default)]
struct Bucket {
    entries: ArrayPtr<u64>,
    overflow: Option<Ptr<Bucket>>,
}

impl Trace for Bucket {
    fn trace(&self, marker: &mut Marker) {
        self.entries.trace(marker);
        self.overflow.trace(marker);
    }
}

#[test]
fn test_traced_array_reaches_element_targets() {
    let mut table = new_traced_array::<Bucket>(3);
    table[0].entries = new_array(4);
    table[2].entries = new_array(2);
    let spill = new_traced_object(Bucket {
        entries: new_array(1),
        overflow: None,
    });
    table[2].overflow = Some(spill);
    let orphan = new_array::<u64>(8);

    let set = mark_from(&table);
    assert_eq!(set.len(), 5);
    assert!(set.is_marked(table[0].entries.address()));
    assert!(set.is_marked(spill.entries.address()));
    assert!(!set.is_marked(orphan.address()));
    assert!(set.unreachable().contains(&orphan.address()));
}

#[test]
fn test_interior_pointer_marks_whole_block() {
    let block = new_array::<u32>(16);
    let inner = block + 9;
    let set = mark_from(&inner.to_ptr());
    assert!(set.is_marked(block.address()));
    assert!(set.is_marked((block + 15).address()));
    assert_eq!(set.len(), 1);
}

#[test]
fn test_untraced_blocks_are_leaves() {
    struct Holder(Ptr<u8>);
    let leaf = new_object(1u8);
    let holder = new_object(Holder(leaf));
    let set = mark_from(&holder);
    assert!(set.is_marked(holder.address()));
    assert!(!set.is_marked(leaf.address()));
    assert_eq!(holder.0.address(), leaf.address());
}

#[test]
fn test_several_roots() {
    let a = new_object(1i32);
    let b = new_array::<i32>(2);
    let m = new_matrix::<i32>(2, 2);
    let mut marker = Marker::new();
    marker.root(&a).root(&b).root(&m);
    let set = marker.finish();
    assert_eq!(set.len(), 3);
    assert!(!set.is_empty());
}

#[test]
fn test_resized_array_still_traces_elements() {
    let mut table = new_traced_array::<Bucket>(1);
    table[0].entries = new_array(3);
    let child = table[0].entries.address();
    assert!(mark_from(&table).is_marked(child));

    let grown = unsafe { resize_array(table, 2) };
    let set = mark_from(&grown);
    assert!(set.is_marked(child));
    assert!(!set.unreachable().contains(&child));
    assert_eq!(set.len(), 2);
}
