//! Union-find over slot identities.

use alloc::{boxed::Box, vec::Vec};

use hashbrown::HashMap;
use indexmap::IndexSet;
use rustc_hash::FxBuildHasher;

use crate::{error::TableError, key::SlotId};

/// Disjoint sets of slots that a concept constrains to be the same type.
///
/// Each class has one representative, picked by [`SlotId::rank`]: a concrete
/// type wins over placeholders, a lower placeholder wins over a higher one,
/// and placeholders win over deduced slots. Joining two classes represented by
/// different concrete types fails with [`TableError::ConflictingTypes`].
#[derive(Default, Debug)]
pub struct UnionFind {
    /// Every slot seen so far; its position is its index in `parent`.
    ids: IndexSet<SlotId, FxBuildHasher>,
    /// Parent links. A root is its own parent.
    parent: Vec<usize>,
}

impl UnionFind {
    /// Creates an empty union-find.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of slots tracked.
    #[inline]
    pub fn len(&self) -> usize {
        self.parent.len()
    }

    /// Returns `true` if no slot is tracked.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Adds a slot as its own singleton class if it is not tracked yet and
    /// returns its index.
    pub fn insert(&mut self, slot: SlotId) -> usize {
        let (index, inserted) = self.ids.insert_full(slot);
        if inserted {
            self.parent.push(index);
        }
        index
    }

    /// Finds the root of the class containing `index`, halving the path on
    /// the way.
    fn find(&mut self, mut index: usize) -> usize {
        while self.parent[index] != index {
            let grandparent = self.parent[self.parent[index]];
            self.parent[index] = grandparent;
            index = grandparent;
        }
        index
    }

    /// Joins the classes of two slots.
    ///
    /// Returns `Ok(true)` if two distinct classes were merged and `Ok(false)`
    /// if the slots already were in the same class.
    pub fn union(&mut self, left: SlotId, right: SlotId) -> Result<bool, TableError> {
        let left = self.insert(left);
        let right = self.insert(right);
        let left = self.find(left);
        let right = self.find(right);
        if left == right {
            return Ok(false);
        }

        let (keep, merge) = match (self.ids.get_index(left), self.ids.get_index(right)) {
            (Some(left_id), Some(right_id)) => {
                if let (SlotId::Fixed(first), SlotId::Fixed(second)) = (left_id, right_id) {
                    return Err(TableError::ConflictingTypes {
                        first: *first,
                        second: *second,
                    });
                }
                if left_id.rank() <= right_id.rank() {
                    (left, right)
                } else {
                    (right, left)
                }
            }
            _ => (left, right),
        };
        self.parent[merge] = keep;
        Ok(true)
    }

    /// Returns the representative of the class containing `slot`, or `None`
    /// if the slot is not tracked.
    pub fn representative(&mut self, slot: &SlotId) -> Option<SlotId> {
        let index = self.ids.get_index_of(slot)?;
        let root = self.find(index);
        self.ids.get_index(root).cloned()
    }

    /// Canonicalizes a slot: the arguments of deduced slots are canonicalized
    /// first, then the slot is replaced by its representative. Untracked slots
    /// canonicalize to themselves.
    pub fn canonical(&mut self, slot: &SlotId) -> SlotId {
        let slot = match slot {
            SlotId::Deduced { name, arg } => SlotId::Deduced {
                name: *name,
                arg: Box::new(self.canonical(arg)),
            },
            other => other.clone(),
        };
        self.representative(&slot).unwrap_or(slot)
    }

    /// Consumes the union-find, returning a map from every slot that is not
    /// its own representative to its representative.
    pub fn into_substitution(mut self) -> HashMap<SlotId, SlotId, FxBuildHasher> {
        let mut substitution = HashMap::default();
        for index in 0..self.parent.len() {
            let root = self.find(index);
            if root != index
                && let (Some(member), Some(representative)) =
                    (self.ids.get_index(index), self.ids.get_index(root))
            {
                substitution.insert(member.clone(), representative.clone());
            }
        }
        substitution
    }
}
