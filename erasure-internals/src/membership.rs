//! `const fn` predicates over concept declaration trees.
//!
//! These functions run while the compiler monomorphizes a call site. The
//! `erasure` crate wraps them in `const { assert!(..) }` blocks so that using
//! an operation the concept does not declare fails to compile instead of
//! failing at runtime.
//!
//! [`SlotKey::Fixed`] keys are compared by type name, since [`TypeId`]
//! cannot be compared in a `const` context.
//!
//! Same-type constraints between placeholders are followed transitively.
//! Constraints that involve a deduced or fixed slot are only followed when
//! they link the two compared slots directly.
//!
//! [`TypeId`]: core::any::TypeId

use crate::key::{Node, RequirementKey, SlotKey, TYPEID_REQUIREMENT};

/// Byte-wise string equality usable in `const` contexts.
pub const fn str_eq(left: &str, right: &str) -> bool {
    let left = left.as_bytes();
    let right = right.as_bytes();
    if left.len() != right.len() {
        return false;
    }
    let mut index = 0;
    while index < left.len() {
        if left[index] != right[index] {
            return false;
        }
        index += 1;
    }
    true
}

/// Returns `true` if the tree contains the relaxed marker anywhere.
pub const fn is_relaxed(tree: &[Node]) -> bool {
    let mut index = 0;
    while index < tree.len() {
        match &tree[index] {
            Node::Relaxed => return true,
            Node::Composite(inner) => {
                if is_relaxed(*inner) {
                    return true;
                }
            }
            Node::Primitive(_) | Node::SameType(..) => {}
        }
        index += 1;
    }
    false
}

/// Returns `true` if `root` provides the requirement `want`.
///
/// The slots of `want` are written in the vocabulary of another concept and
/// translated through `renames`, a list of `(source, target)` pairs. Pass an
/// empty list when `want` is written in the vocabulary of `root`.
///
/// The typeid requirement is provided by every relaxed concept.
pub const fn provides(
    root: &[Node],
    want: &RequirementKey,
    renames: &[(SlotKey, SlotKey)],
) -> bool {
    if declares(root, root, want, renames) {
        return true;
    }
    str_eq(want.name, TYPEID_REQUIREMENT) && is_relaxed(root)
}

/// Returns `true` if every primitive requirement and same-type constraint of
/// `target` holds in `source` after renaming.
///
/// Typeid requirements are always considered available, since a table can
/// derive them from its slot assignment.
pub const fn includes(source: &[Node], target: &[Node], renames: &[(SlotKey, SlotKey)]) -> bool {
    let mut index = 0;
    while index < target.len() {
        match &target[index] {
            Node::Primitive(want) => {
                if !str_eq(want.name, TYPEID_REQUIREMENT) && !provides(source, want, renames) {
                    return false;
                }
            }
            Node::Composite(inner) => {
                if !includes(source, *inner, renames) {
                    return false;
                }
            }
            Node::SameType(left, right) => {
                if !slot_eq(
                    source,
                    source_of(left, renames),
                    source_of(right, renames),
                ) {
                    return false;
                }
            }
            Node::Relaxed => {}
        }
        index += 1;
    }
    true
}

/// Walks `tree` looking for a primitive matching `want`, comparing slots
/// under the same-type constraints of `root`.
const fn declares(
    tree: &[Node],
    root: &[Node],
    want: &RequirementKey,
    renames: &[(SlotKey, SlotKey)],
) -> bool {
    let mut index = 0;
    while index < tree.len() {
        match &tree[index] {
            Node::Primitive(have) => {
                if requirement_matches(root, have, want, renames) {
                    return true;
                }
            }
            Node::Composite(inner) => {
                if declares(*inner, root, want, renames) {
                    return true;
                }
            }
            Node::SameType(..) | Node::Relaxed => {}
        }
        index += 1;
    }
    false
}

/// Compares a declared requirement with a wanted one.
const fn requirement_matches(
    root: &[Node],
    have: &RequirementKey,
    want: &RequirementKey,
    renames: &[(SlotKey, SlotKey)],
) -> bool {
    if !str_eq(have.name, want.name) || have.slots.len() != want.slots.len() {
        return false;
    }
    let mut index = 0;
    while index < have.slots.len() {
        if !renamed_eq(root, &have.slots[index], &want.slots[index], renames) {
            return false;
        }
        index += 1;
    }
    true
}

/// Compares a slot of `root` with a slot written in the renamed vocabulary.
const fn renamed_eq(
    root: &[Node],
    have: &SlotKey,
    want: &SlotKey,
    renames: &[(SlotKey, SlotKey)],
) -> bool {
    match want {
        SlotKey::Placeholder(_) => slot_eq(root, have, source_of(want, renames)),
        SlotKey::Fixed { .. } => identical(have, want) || linked(root, have, want),
        SlotKey::Deduced { name, arg } => match have {
            SlotKey::Deduced {
                name: have_name,
                arg: have_arg,
            } => str_eq(*have_name, *name) && renamed_eq(root, *have_arg, *arg, renames),
            SlotKey::Placeholder(_) | SlotKey::Fixed { .. } => linked(root, have, want),
        },
    }
}

/// Translates a target placeholder back to the source slot it was renamed
/// from. Slots without a rename translate to themselves.
const fn source_of<'a>(want: &'a SlotKey, renames: &'a [(SlotKey, SlotKey)]) -> &'a SlotKey {
    let mut index = 0;
    while index < renames.len() {
        if identical(&renames[index].1, want) {
            return &renames[index].0;
        }
        index += 1;
    }
    want
}

/// Slot equality in the vocabulary of `root`, following same-type
/// constraints.
const fn slot_eq(root: &[Node], left: &SlotKey, right: &SlotKey) -> bool {
    match (left, right) {
        (SlotKey::Placeholder(left), SlotKey::Placeholder(right)) => {
            *left == *right || (same_type_class(root, *left) & bit(*right)) != 0
        }
        (
            SlotKey::Fixed {
                name: left_name, ..
            },
            SlotKey::Fixed {
                name: right_name, ..
            },
        ) => str_eq(*left_name, *right_name) || linked(root, left, right),
        (
            SlotKey::Deduced {
                name: left_name,
                arg: left_arg,
            },
            SlotKey::Deduced {
                name: right_name,
                arg: right_arg,
            },
        ) => {
            (str_eq(*left_name, *right_name) && slot_eq(root, *left_arg, *right_arg))
                || linked(root, left, right)
        }
        _ => linked(root, left, right),
    }
}

/// Structural slot equality without any same-type reasoning.
const fn identical(left: &SlotKey, right: &SlotKey) -> bool {
    match (left, right) {
        (SlotKey::Placeholder(left), SlotKey::Placeholder(right)) => *left == *right,
        (SlotKey::Fixed { name: left, .. }, SlotKey::Fixed { name: right, .. }) => {
            str_eq(*left, *right)
        }
        (
            SlotKey::Deduced {
                name: left_name,
                arg: left_arg,
            },
            SlotKey::Deduced {
                name: right_name,
                arg: right_arg,
            },
        ) => str_eq(*left_name, *right_name) && identical(*left_arg, *right_arg),
        _ => false,
    }
}

/// Returns `true` if `root` declares a same-type constraint between exactly
/// these two slots, in either order.
const fn linked(root: &[Node], left: &SlotKey, right: &SlotKey) -> bool {
    let mut index = 0;
    while index < root.len() {
        match &root[index] {
            Node::SameType(a, b) => {
                if (identical(a, left) && identical(b, right))
                    || (identical(a, right) && identical(b, left))
                {
                    return true;
                }
            }
            Node::Composite(inner) => {
                if linked(*inner, left, right) {
                    return true;
                }
            }
            Node::Primitive(_) | Node::Relaxed => {}
        }
        index += 1;
    }
    false
}

/// Bit for a placeholder position in a class mask.
const fn bit(index: u8) -> u32 {
    1u32 << index
}

/// Bitmask of the placeholders that `root` constrains to be the same type as
/// the placeholder at `index`.
const fn same_type_class(root: &[Node], index: u8) -> u32 {
    let mut mask = bit(index);
    loop {
        let next = widen(root, mask);
        if next == mask {
            return mask;
        }
        mask = next;
    }
}

/// One closure step: adds every placeholder joined to a member of `mask`.
const fn widen(tree: &[Node], mut mask: u32) -> u32 {
    let mut index = 0;
    while index < tree.len() {
        match &tree[index] {
            Node::SameType(SlotKey::Placeholder(left), SlotKey::Placeholder(right)) => {
                let pair = bit(*left) | bit(*right);
                if mask & pair != 0 {
                    mask |= pair;
                }
            }
            Node::Composite(inner) => mask = widen(*inner, mask),
            _ => {}
        }
        index += 1;
    }
    mask
}

#[cfg(test)]
mod tests {
    use core::any::TypeId;

    use super::*;

    const THIS: SlotKey = SlotKey::Placeholder(0);
    const A: SlotKey = SlotKey::Placeholder(1);
    const B: SlotKey = SlotKey::Placeholder(2);
    const POINTEE: SlotKey = SlotKey::Deduced {
        name: "pointee",
        arg: &THIS,
    };

    const fn key(name: &'static str, slots: &'static [SlotKey]) -> RequirementKey {
        RequirementKey {
            name,
            slots,
            type_id: TypeId::of::<()>,
        }
    }

    const DROP_THIS: RequirementKey = key("drop", &[THIS]);
    const DROP_A: RequirementKey = key("drop", &[A]);
    const DROP_B: RequirementKey = key("drop", &[B]);
    const ADD: RequirementKey = key("add", &[THIS, A]);
    const SHOW_POINTEE: RequirementKey = key("show", &[POINTEE]);
    const SHOW_A: RequirementKey = key("show", &[A]);
    const TYPEID_A: RequirementKey = key(TYPEID_REQUIREMENT, &[A]);

    const INNER: &[Node] = &[Node::Primitive(DROP_THIS)];
    const TREE: &[Node] = &[
        Node::Composite(INNER),
        Node::Primitive(ADD),
        Node::SameType(A, B),
    ];
    const RELAXED: &[Node] = &[Node::Composite(TREE), Node::Relaxed];
    const ASSOCIATED: &[Node] = &[
        Node::Primitive(SHOW_A),
        Node::SameType(POINTEE, A),
    ];

    #[test]
    fn test_str_eq() {
        assert!(str_eq("", ""));
        assert!(str_eq("add", "add"));
        assert!(!str_eq("add", "adds"));
        assert!(!str_eq("add", "sub"));
    }

    #[test]
    fn test_provides_nested_and_direct() {
        assert!(provides(TREE, &DROP_THIS, &[]));
        assert!(provides(TREE, &ADD, &[]));
        assert!(!provides(TREE, &DROP_A, &[]));
        assert!(!provides(TREE, &key("add", &[A, THIS]), &[]));
    }

    #[test]
    fn test_provides_follows_same_type() {
        assert!(provides(TREE, &key("add", &[THIS, B]), &[]));
        assert!(!provides(TREE, &DROP_B, &[]));
        assert!(provides(ASSOCIATED, &SHOW_POINTEE, &[]));
    }

    #[test]
    fn test_provides_renamed() {
        // Target slot `A` was renamed from source slot `This`.
        let renames = [(THIS, A)];
        assert!(provides(TREE, &DROP_A, &renames));
        assert!(!provides(TREE, &DROP_B, &renames));
    }

    #[test]
    fn test_fixed_slots_compare_by_name() {
        const U32: SlotKey = SlotKey::Fixed {
            name: "u32",
            id: TypeId::of::<u32>,
        };
        const U8: SlotKey = SlotKey::Fixed {
            name: "u8",
            id: TypeId::of::<u8>,
        };
        const CALL: &[Node] = &[Node::Primitive(key("call", &[THIS, U32, U32]))];

        assert!(provides(CALL, &key("call", &[THIS, U32, U32]), &[]));
        assert!(!provides(CALL, &key("call", &[THIS, U8, U8]), &[]));
        assert!(!provides(CALL, &key("call", &[THIS, U32, U8]), &[]));
        assert!(!includes(CALL, &[Node::Primitive(key("call", &[THIS, U8, U32]))], &[]));
    }

    #[test]
    fn test_relaxed() {
        assert!(!is_relaxed(TREE));
        assert!(is_relaxed(RELAXED));
        assert!(!provides(TREE, &TYPEID_A, &[]));
        assert!(provides(RELAXED, &TYPEID_A, &[]));
    }

    #[test]
    fn test_includes() {
        assert!(includes(TREE, INNER, &[]));
        assert!(includes(RELAXED, TREE, &[]));
        assert!(!includes(INNER, TREE, &[]));
        assert!(includes(TREE, &[Node::Primitive(DROP_A)], &[(THIS, A)]));
        assert!(includes(TREE, &[Node::Primitive(TYPEID_A)], &[]));
        assert!(includes(TREE, &[Node::SameType(A, B)], &[]));
        assert!(!includes(TREE, &[Node::SameType(THIS, B)], &[]));
    }

    #[test]
    fn test_checks_run_in_const_context() {
        const CHECKED: bool = provides(TREE, &ADD, &[]) && includes(RELAXED, TREE, &[]);
        static_assertions::const_assert!(CHECKED);
    }
}
