//! Incremental construction of [`RawTable`]s.

use alloc::vec::Vec;

use indexmap::map::Entry;
use triomphe::Arc;

use super::{Assignment, RawTable, entry, typeid_entry};
use crate::{
    error::TableError,
    key::{RequirementKey, SlotId, SlotKey, TYPEID_REQUIREMENT, TypeInfo},
    normalize::NormalizedConcept,
};

/// Builder for a [`RawTable`].
///
/// Every primitive requirement of a concept binds the slots it is written over
/// and inserts its entry. [`TableBuilder::finish`] then fills the typeid
/// entries a relaxed concept injected and checks that no requirement was
/// left without an entry.
pub struct TableBuilder {
    /// The concept being instantiated.
    concept: Arc<NormalizedConcept>,
    /// Concrete types bound so far, by canonical slot.
    assignment: Assignment,
    /// Entries inserted so far, in the concept's order.
    entries: Vec<Option<entry::SharedEntry>>,
    /// First inconsistency found while binding or inserting.
    error: Option<TableError>,
}

impl TableBuilder {
    /// Creates an empty builder for `concept`.
    pub fn new(concept: Arc<NormalizedConcept>) -> Self {
        let entries = core::iter::repeat_with(|| None)
            .take(concept.len())
            .collect();
        Self {
            concept,
            assignment: Assignment::default(),
            entries,
            error: None,
        }
    }

    /// Returns the concept being instantiated.
    #[inline]
    pub fn concept(&self) -> &NormalizedConcept {
        &self.concept
    }

    /// Records the concrete type of a slot.
    ///
    /// Binding a slot that shares a same-type class with an already bound
    /// slot to a different type makes [`TableBuilder::finish`] fail.
    pub fn bind(&mut self, slot: &SlotKey, info: TypeInfo) {
        let slot = self.concept.canonical_slot(&SlotId::from(slot));
        match self.assignment.entry(slot) {
            Entry::Occupied(bound) => {
                let bound = *bound.get();
                if bound != info {
                    self.fail(TableError::SlotMismatch {
                        first: bound.name(),
                        second: info.name(),
                    });
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(info);
            }
        }
    }

    /// Inserts the entry of the requirement with key `key`.
    ///
    /// Inserting an entry for a requirement the concept does not declare makes
    /// [`TableBuilder::finish`] fail. Inserting the same requirement twice keeps
    /// the first entry, mirroring the "first declaration wins" rule of the
    /// normalizer.
    pub fn insert<E: Copy + Send + Sync + 'static>(&mut self, key: &RequirementKey, value: E) {
        let Some(index) = self.concept.index_of((key.type_id)(), key) else {
            self.fail(TableError::UnknownRequirement {
                requirement: key.name,
            });
            return;
        };
        if let Some(slot @ None) = self.entries.get_mut(index) {
            *slot = Some(entry::erase(value));
        }
    }

    /// Records the first error; later errors are dropped.
    fn fail(&mut self, error: TableError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    /// Completes the table.
    ///
    /// # Errors
    ///
    /// Returns the first inconsistency recorded by [`TableBuilder::bind`] or
    /// [`TableBuilder::insert`], or [`TableError::UnknownRequirement`] if a
    /// requirement has no entry.
    pub fn finish(self) -> Result<RawTable, TableError> {
        let Self {
            concept,
            assignment,
            entries,
            error,
        } = self;
        if let Some(error) = error {
            return Err(error);
        }

        let entries = concept
            .requirements()
            .zip(entries)
            .map(|(id, entry)| match entry {
                Some(entry) => Ok(entry),
                None if id.name() == TYPEID_REQUIREMENT => typeid_entry(id, &assignment),
                None => Err(TableError::UnknownRequirement {
                    requirement: id.name(),
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RawTable {
            concept,
            assignment,
            entries,
        })
    }
}

impl core::fmt::Debug for TableBuilder {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TableBuilder")
            .field("assignment", &self.assignment)
            .field(
                "filled",
                &self.entries.iter().filter(|entry| entry.is_some()).count(),
            )
            .field("error", &self.error)
            .finish()
    }
}
