//! Integration tests for the erasure-internals crate.
//!
//! These tests drive the crate the way the `erasure` crate does: concept
//! trees are declared as constants, normalized, turned into tables through a
//! [`TableBuilder`], and erased values are manipulated exclusively through the
//! entries of those tables.
//!
//! ## Normalization Tests
//! - `test_normalize_deduplicates_shared_subconcepts`: a requirement reached
//!   through two composites is kept once, at its first position
//! - `test_normalize_relaxed_injects_typeid`: one typeid requirement per slot
//! - `test_normalize_deduced_slot_follows_argument`: a deduced slot whose
//!   argument is merged with another slot is canonicalized accordingly
//! - `test_normalize_conflicting_fixed_types`: merging two fixed types fails
//!
//! ## Table Tests
//! - `test_table_dispatch_and_destroy`: clone, read and destroy values only
//!   through table entries, with drop tracking
//! - `test_table_equality_tracks_types`: equal assignments give equal tables
//! - `test_table_convert_with_renaming`: narrowing with a slot renaming keeps
//!   the entries and the typeid information
//! - `test_table_convert_checks_same_type`: target same-type constraints are
//!   verified against the source's concrete types
//!
//! ## Membership Tests
//! - `test_membership_matches_normalization`: the `const` predicates agree
//!   with the runtime normalizer on the concepts used above

use std::{any::TypeId, cell::Cell, rc::Rc};

use erasure_internals::{
    Node, RawRef, RawStorage, RawTable, RequirementId, RequirementKey, SlotId, SlotKey,
    TYPEID_REQUIREMENT, TableBuilder, TableError, TypeInfo, membership, normalize,
};
use triomphe::Arc;

// Requirement types. Only their `TypeId`s are used.
struct Drop0;
struct Clone0;
struct Read0;
struct ReadA;
struct TypeidThis;

type DropFn = unsafe fn(RawStorage);
type CloneFn = unsafe fn(RawRef<'_>) -> RawStorage;
type ReadFn = unsafe fn(RawRef<'_>) -> i64;

const THIS: SlotKey = SlotKey::Placeholder(0);
const A: SlotKey = SlotKey::Placeholder(1);

const DROP: RequirementKey = RequirementKey {
    name: "drop",
    slots: &[THIS],
    type_id: TypeId::of::<Drop0>,
};
const CLONE: RequirementKey = RequirementKey {
    name: "clone",
    slots: &[THIS],
    type_id: TypeId::of::<Clone0>,
};
const READ: RequirementKey = RequirementKey {
    name: "read",
    slots: &[THIS],
    type_id: TypeId::of::<Read0>,
};
const READ_A: RequirementKey = RequirementKey {
    name: "read",
    slots: &[A],
    type_id: TypeId::of::<ReadA>,
};
const TYPEID_THIS: RequirementKey = RequirementKey {
    name: TYPEID_REQUIREMENT,
    slots: &[THIS],
    type_id: TypeId::of::<TypeidThis>,
};

const LIFETIME: &[Node] = &[Node::Primitive(DROP), Node::Primitive(CLONE)];
const READABLE: &[Node] = &[Node::Composite(LIFETIME), Node::Primitive(READ)];
const BOTH: &[Node] = &[
    Node::Composite(READABLE),
    Node::Composite(LIFETIME),
    Node::Relaxed,
];
const RENAMED: &[Node] = &[Node::Primitive(READ_A), Node::Relaxed];

/// A value that counts how often it is dropped.
#[derive(Clone)]
struct Tracked {
    value: i64,
    drops: Rc<Cell<usize>>,
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.drops.set(self.drops.get() + 1);
    }
}

unsafe fn drop_entry<T: 'static>(storage: RawStorage) {
    // SAFETY: Only registered in tables where the slot is `T`.
    drop(unsafe { storage.into_box::<T>() });
}

unsafe fn clone_entry<T: Clone + 'static>(value: RawRef<'_>) -> RawStorage {
    // SAFETY: Only registered in tables where the slot is `T`.
    RawStorage::new(unsafe { value.cast::<T>() }.clone())
}

unsafe fn read_tracked(value: RawRef<'_>) -> i64 {
    // SAFETY: Only registered in tables where the slot is `Tracked`.
    unsafe { value.cast::<Tracked>() }.value
}

unsafe fn read_integer<T: Copy + Into<i64> + 'static>(value: RawRef<'_>) -> i64 {
    // SAFETY: Only registered in tables where the slot is `T`.
    (*unsafe { value.cast::<T>() }).into()
}

fn tracked_table(tree: &'static [Node]) -> RawTable {
    let mut builder = TableBuilder::new(Arc::new(normalize(tree).unwrap()));
    builder.bind(&THIS, TypeInfo::of::<Tracked>());
    builder.insert(&DROP, drop_entry::<Tracked> as DropFn);
    builder.insert(&CLONE, clone_entry::<Tracked> as CloneFn);
    builder.insert(&READ, read_tracked as ReadFn);
    builder.finish().unwrap()
}

fn integer_table<T: Copy + Into<i64> + 'static>() -> RawTable {
    let mut builder = TableBuilder::new(Arc::new(normalize(READABLE).unwrap()));
    builder.bind(&THIS, TypeInfo::of::<T>());
    builder.insert(&DROP, drop_entry::<T> as DropFn);
    builder.insert(&CLONE, clone_entry::<T> as CloneFn);
    builder.insert(&READ, read_integer::<T> as ReadFn);
    builder.finish().unwrap()
}

#[test]
fn test_normalize_deduplicates_shared_subconcepts() {
    let concept = normalize(BOTH).unwrap();
    let names: Vec<_> = concept.requirements().map(RequirementId::name).collect();
    assert_eq!(names, ["drop", "clone", "read", TYPEID_REQUIREMENT]);
    assert!(concept.is_relaxed());
    assert_eq!(concept.index_of(TypeId::of::<Read0>(), &READ), Some(2));
}

#[test]
fn test_normalize_relaxed_injects_typeid() {
    const TWO_SLOTS: &[Node] = &[
        Node::Primitive(READ),
        Node::Primitive(READ_A),
        Node::Relaxed,
    ];
    let concept = normalize(TWO_SLOTS).unwrap();
    let typeids: Vec<_> = concept
        .requirements()
        .filter(|id| id.name() == TYPEID_REQUIREMENT)
        .map(|id| id.slots().to_vec())
        .collect();
    assert_eq!(
        typeids,
        [vec![SlotId::Placeholder(0)], vec![SlotId::Placeholder(1)]]
    );
    // An explicit typeid requirement is found through the injected one.
    assert_eq!(
        concept.index_of(TypeId::of::<TypeidThis>(), &TYPEID_THIS),
        Some(2)
    );
}

#[test]
fn test_normalize_deduced_slot_follows_argument() {
    const POINTEE_A: SlotKey = SlotKey::Deduced {
        name: "pointee",
        arg: &A,
    };
    const SHOW_POINTEE_A: RequirementKey = RequirementKey {
        name: "show",
        slots: &[POINTEE_A],
        type_id: TypeId::of::<Read0>,
    };
    const TREE: &[Node] = &[Node::Primitive(SHOW_POINTEE_A), Node::SameType(A, THIS)];
    let concept = normalize(TREE).unwrap();
    let id = concept.requirements().next().unwrap();
    assert_eq!(
        id.slots(),
        [SlotId::Deduced {
            name: "pointee",
            arg: Box::new(SlotId::Placeholder(0)),
        }]
    );
}

#[test]
fn test_normalize_conflicting_fixed_types() {
    const U8: SlotKey = SlotKey::Fixed { name: "u8", id: TypeId::of::<u8> };
    const U16: SlotKey = SlotKey::Fixed { name: "u16", id: TypeId::of::<u16> };
    const TREE: &[Node] = &[Node::SameType(THIS, U8), Node::SameType(THIS, U16)];
    assert!(matches!(
        normalize(TREE),
        Err(TableError::ConflictingTypes { .. })
    ));
}

#[test]
fn test_table_dispatch_and_destroy() {
    let drops = Rc::new(Cell::new(0));
    let table = tracked_table(BOTH);
    assert_eq!(table.len(), 4);

    let storage = RawStorage::new(Tracked {
        value: 42,
        drops: drops.clone(),
    });
    let read: ReadFn = table.entry(TypeId::of::<Read0>(), &READ).unwrap();
    let clone: CloneFn = table.entry(TypeId::of::<Clone0>(), &CLONE).unwrap();
    let destroy: DropFn = table.entry(TypeId::of::<Drop0>(), &DROP).unwrap();

    // SAFETY: The storage holds a `Tracked`, which is the type bound to the
    // table's only slot.
    let copy = unsafe { clone(storage.as_ref()) };
    assert_ne!(copy.addr(), storage.addr());
    // SAFETY: See above.
    assert_eq!(unsafe { read(copy.as_ref()) }, 42);

    // SAFETY: See above.
    unsafe { destroy(copy) };
    assert_eq!(drops.get(), 1);
    // SAFETY: See above.
    unsafe { destroy(storage) };
    assert_eq!(drops.get(), 2);

    assert_eq!(
        table.entry::<TypeInfo>(TypeId::of::<TypeidThis>(), &TYPEID_THIS),
        Some(TypeInfo::of::<Tracked>())
    );
}

#[test]
fn test_table_equality_tracks_types() {
    assert_eq!(integer_table::<i32>(), integer_table::<i32>());
    assert_ne!(integer_table::<i32>(), integer_table::<u8>());

    let table = integer_table::<u8>();
    let read: ReadFn = table.entry(TypeId::of::<Read0>(), &READ).unwrap();
    let value = 200_u8;
    // SAFETY: The table binds `This` to `u8`.
    assert_eq!(unsafe { read(RawRef::new(&value)) }, 200);
    assert_eq!(
        table.first_difference(&integer_table::<i32>()),
        Some((TypeInfo::of::<u8>(), TypeInfo::of::<i32>()))
    );
}

#[test]
fn test_table_convert_with_renaming() {
    let source = tracked_table(BOTH);
    let narrowed = source
        .convert(Arc::new(normalize(RENAMED).unwrap()), &[(THIS, A)])
        .unwrap();
    assert_eq!(narrowed.len(), 2);
    assert_eq!(narrowed.type_of(&A), Some(TypeInfo::of::<Tracked>()));
    assert_eq!(narrowed.type_of(&THIS), None);

    let drops = Rc::new(Cell::new(0));
    let value = Tracked {
        value: 7,
        drops: drops.clone(),
    };
    let direct: ReadFn = source.entry(TypeId::of::<Read0>(), &READ).unwrap();
    let renamed: ReadFn = narrowed.entry(TypeId::of::<ReadA>(), &READ_A).unwrap();
    // SAFETY: Both tables bind their slot to `Tracked`.
    let (left, right) = unsafe { (direct(RawRef::new(&value)), renamed(RawRef::new(&value))) };
    assert_eq!(left, right);
    drop(value);
    assert_eq!(drops.get(), 1);
}

#[test]
fn test_table_convert_checks_same_type() {
    const TWO_SLOTS: &[Node] = &[Node::Primitive(READ), Node::Primitive(READ_A)];
    const JOINED: &[Node] = &[
        Node::Primitive(READ),
        Node::Primitive(READ_A),
        Node::SameType(THIS, A),
    ];
    let build = |this: TypeInfo, a: TypeInfo| {
        let mut builder = TableBuilder::new(Arc::new(normalize(TWO_SLOTS).unwrap()));
        builder.bind(&THIS, this);
        builder.bind(&A, a);
        builder.insert(&READ, read_integer::<i32> as ReadFn);
        builder.insert(&READ_A, read_integer::<i32> as ReadFn);
        builder.finish().unwrap()
    };

    let same = build(TypeInfo::of::<i32>(), TypeInfo::of::<i32>());
    let joined = same.convert(Arc::new(normalize(JOINED).unwrap()), &[]);
    assert_eq!(joined.map(|table| table.len()), Ok(1));

    let different = build(TypeInfo::of::<i32>(), TypeInfo::of::<i64>());
    assert!(matches!(
        different.convert(Arc::new(normalize(JOINED).unwrap()), &[]),
        Err(TableError::SlotMismatch { .. })
    ));
}

#[test]
fn test_membership_matches_normalization() {
    const {
        assert!(membership::includes(BOTH, READABLE, &[]));
        assert!(membership::includes(BOTH, RENAMED, &[(THIS, A)]));
        assert!(!membership::includes(LIFETIME, READABLE, &[]));
        assert!(membership::provides(BOTH, &TYPEID_THIS, &[]));
        assert!(!membership::provides(READABLE, &TYPEID_THIS, &[]));
    }
    let concept = normalize(BOTH).unwrap();
    for key in [DROP, CLONE, READ, TYPEID_THIS] {
        assert!(concept.index_of((key.type_id)(), &key).is_some());
    }
}
