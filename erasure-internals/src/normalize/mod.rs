//! Concept normalization.
//!
//! A concept is declared as a tree of [`Node`]s: primitive requirements,
//! nested concepts, same-type constraints and the relaxed marker. Normalizing
//! turns that tree into the canonical form used to lay out operation tables:
//!
//! 1. The tree is flattened. A requirement reached through several
//!    composition paths is kept once, at the position of its first
//!    occurrence.
//! 2. Same-type constraints are merged in a [`UnionFind`]. Because the
//!    argument of a deduced slot can itself be merged, the constraints are
//!    replayed until no class changes.
//! 3. Every requirement's slots are replaced by their representatives and
//!    duplicates are removed again.
//! 4. Relaxed concepts get one typeid requirement per non-fixed slot.
//!
//! Normalization does not look at concrete types. A slot that no slot map can
//! bind is rejected when a table is instantiated, not here.

mod union_find;

use alloc::vec::Vec;
use core::any::TypeId;

use hashbrown::{HashMap, HashSet};
use indexmap::IndexSet;
use rustc_hash::FxBuildHasher;

pub use self::union_find::UnionFind;
use crate::{
    error::TableError,
    key::{Node, RequirementId, RequirementKey, SlotId, SlotKey, TYPEID_REQUIREMENT},
};

/// Canonical form of a concept.
#[derive(Debug)]
pub struct NormalizedConcept {
    /// Canonical requirements, in table order.
    requirements: IndexSet<RequirementId, FxBuildHasher>,
    /// Maps the [`TypeId`] of every requirement type in the tree to the
    /// index of its canonical requirement.
    aliases: HashMap<TypeId, usize, FxBuildHasher>,
    /// Canonical slots mentioned by the concept.
    slots: IndexSet<SlotId, FxBuildHasher>,
    /// Maps every non-representative slot to its representative.
    substitution: HashMap<SlotId, SlotId, FxBuildHasher>,
    /// Whether the concept carries the relaxed marker.
    relaxed: bool,
}

/// Normalizes a concept declaration tree.
///
/// # Errors
///
/// Returns [`TableError::ConflictingTypes`] if same-type constraints join two
/// distinct concrete types.
pub fn normalize(tree: &'static [Node]) -> Result<NormalizedConcept, TableError> {
    let mut flat = Flattened::default();
    flat.visit(tree);

    let mut classes = UnionFind::new();
    let pairs: Vec<(SlotId, SlotId)> = flat
        .same_type
        .iter()
        .map(|(left, right)| (SlotId::from(left), SlotId::from(right)))
        .collect();
    for (left, right) in &pairs {
        classes.insert(left.clone());
        classes.insert(right.clone());
    }
    loop {
        let mut changed = false;
        for (left, right) in &pairs {
            let left = classes.canonical(left);
            let right = classes.canonical(right);
            changed |= classes.union(left, right)?;
        }
        if !changed {
            break;
        }
    }

    let mut concept = NormalizedConcept {
        requirements: IndexSet::default(),
        aliases: HashMap::default(),
        slots: IndexSet::default(),
        substitution: classes.into_substitution(),
        relaxed: flat.relaxed,
    };

    for key in &flat.requirements {
        let id = concept.canonical_key(key);
        for slot in id.slots() {
            concept.slots.insert(slot.clone());
        }
        let (index, _) = concept.requirements.insert_full(id);
        concept.aliases.entry((key.type_id)()).or_insert(index);
    }
    for (left, right) in &pairs {
        let left = concept.canonical_slot(left);
        let right = concept.canonical_slot(right);
        concept.slots.insert(left);
        concept.slots.insert(right);
    }

    if concept.relaxed {
        let erased: Vec<SlotId> = concept
            .slots
            .iter()
            .filter(|slot| !slot.is_fixed())
            .cloned()
            .collect();
        for slot in erased {
            concept
                .requirements
                .insert(RequirementId::new(TYPEID_REQUIREMENT, alloc::vec![slot]));
        }
    }

    Ok(concept)
}

impl NormalizedConcept {
    /// Returns the number of canonical requirements.
    #[inline]
    pub fn len(&self) -> usize {
        self.requirements.len()
    }

    /// Returns `true` if the concept has no requirements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    /// Returns `true` if the concept carries the relaxed marker.
    #[inline]
    pub fn is_relaxed(&self) -> bool {
        self.relaxed
    }

    /// Iterates over the canonical requirements in table order.
    pub fn requirements(&self) -> impl ExactSizeIterator<Item = &RequirementId> {
        self.requirements.iter()
    }

    /// Iterates over the canonical slots of the concept.
    pub fn slots(&self) -> impl ExactSizeIterator<Item = &SlotId> {
        self.slots.iter()
    }

    /// Iterates over `(member, representative)` pairs of every same-type
    /// class with more than one member.
    pub fn substitution(&self) -> impl Iterator<Item = (&SlotId, &SlotId)> {
        self.substitution.iter()
    }

    /// Canonicalizes a slot.
    pub fn canonical_slot(&self, slot: &SlotId) -> SlotId {
        let slot = match slot {
            SlotId::Deduced { name, arg } => SlotId::Deduced {
                name: *name,
                arg: alloc::boxed::Box::new(self.canonical_slot(arg)),
            },
            other => other.clone(),
        };
        match self.substitution.get(&slot) {
            Some(representative) => representative.clone(),
            None => slot,
        }
    }

    /// Canonicalizes the slots of a requirement key.
    pub fn canonical_key(&self, key: &RequirementKey) -> RequirementId {
        RequirementId::new(
            key.name,
            key.slots
                .iter()
                .map(|slot| self.canonical_slot(&SlotId::from(slot)))
                .collect(),
        )
    }

    /// Returns the table index of a canonical requirement.
    #[inline]
    pub fn position(&self, id: &RequirementId) -> Option<usize> {
        self.requirements.get_index_of(id)
    }

    /// Returns the table index of the requirement declared by the Rust type
    /// `type_id` with key `key`.
    ///
    /// Requirement types that appear literally in the concept are found
    /// through their [`TypeId`]; others are canonicalized first.
    pub fn index_of(&self, type_id: TypeId, key: &RequirementKey) -> Option<usize> {
        if let Some(index) = self.aliases.get(&type_id) {
            return Some(*index);
        }
        self.position(&self.canonical_key(key))
    }
}

/// Result of flattening a declaration tree.
#[derive(Default)]
struct Flattened {
    /// Primitive requirements in first-occurrence order.
    requirements: Vec<RequirementKey>,
    /// Structural identities of the requirements collected so far.
    seen: HashSet<RequirementId, FxBuildHasher>,
    /// Composite subtrees already visited, by address and length.
    visited: HashSet<(usize, usize), FxBuildHasher>,
    /// Same-type constraints in declaration order.
    same_type: Vec<(SlotKey, SlotKey)>,
    /// Whether the relaxed marker was found.
    relaxed: bool,
}

impl Flattened {
    /// Collects every node of `tree` and of its composites.
    fn visit(&mut self, tree: &'static [Node]) {
        if !self.visited.insert((tree.as_ptr().addr(), tree.len())) {
            return;
        }
        for node in tree {
            match node {
                Node::Primitive(key) => {
                    if self.seen.insert(key.id()) {
                        self.requirements.push(*key);
                    }
                }
                Node::Composite(inner) => self.visit(*inner),
                Node::SameType(left, right) => self.same_type.push((*left, *right)),
                Node::Relaxed => self.relaxed = true,
            }
        }
    }
}
