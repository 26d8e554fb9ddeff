//! Immutable operation tables.
//!
//! A [`RawTable`] pairs a [`NormalizedConcept`] with one concrete type per
//! slot (the assignment) and one entry per canonical requirement. Entries are
//! stored in the concept's requirement order and are never replaced after
//! [`TableBuilder::finish`] returns.
//!
//! Two tables for the same concept are equal iff their assignments are equal,
//! which is what decides whether two erased values may be combined in one
//! operation.

mod builder;
mod entry;

use alloc::vec::Vec;
use core::any::TypeId;

use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;
use triomphe::Arc;

pub use self::builder::TableBuilder;
use self::entry::SharedEntry;
use crate::{
    error::TableError,
    key::{RequirementId, RequirementKey, SlotId, SlotKey, TYPEID_REQUIREMENT, TypeInfo},
    normalize::NormalizedConcept,
};

/// Slot to concrete type assignment of a table.
type Assignment = IndexMap<SlotId, TypeInfo, FxBuildHasher>;

/// An immutable operation table for one concept and one slot assignment.
pub struct RawTable {
    /// The concept this table implements.
    concept: Arc<NormalizedConcept>,
    /// Concrete type of every canonical slot.
    assignment: Assignment,
    /// One entry per canonical requirement, in the concept's order.
    entries: Vec<SharedEntry>,
}

impl RawTable {
    /// Returns the normalized concept this table implements.
    #[inline]
    pub fn concept(&self) -> &Arc<NormalizedConcept> {
        &self.concept
    }

    /// Returns the number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the table has no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` if the table's concept is relaxed.
    #[inline]
    pub fn is_relaxed(&self) -> bool {
        self.concept.is_relaxed()
    }

    /// Returns the concrete type assigned to a slot.
    pub fn type_of(&self, slot: &SlotKey) -> Option<TypeInfo> {
        let slot = self.concept.canonical_slot(&SlotId::from(slot));
        self.assignment.get(&slot).copied()
    }

    /// Iterates over the slot assignment.
    pub fn assignment(&self) -> impl ExactSizeIterator<Item = (&SlotId, TypeInfo)> {
        self.assignment.iter().map(|(slot, info)| (slot, *info))
    }

    /// Returns the entry of the requirement declared by the Rust type
    /// `type_id` with key `key`, read back as `E`.
    ///
    /// Returns `None` if the concept has no such requirement or if the entry
    /// is not of type `E`.
    pub fn entry<E: Copy + 'static>(&self, type_id: TypeId, key: &RequirementKey) -> Option<E> {
        let index = self.concept.index_of(type_id, key)?;
        entry::read(self.entries.get(index)?)
    }

    /// Returns the first slot whose concrete type differs between the two
    /// tables, with the type in `self` and in `other`.
    pub fn first_difference(&self, other: &RawTable) -> Option<(TypeInfo, TypeInfo)> {
        self.assignment.iter().find_map(|(slot, info)| {
            let theirs = other.assignment.get(slot)?;
            (info != theirs).then_some((*info, *theirs))
        })
    }

    /// Converts the table to another concept whose requirements are a subset
    /// of this one's after renaming.
    ///
    /// `renames` lists `(source, target)` slot pairs: the target concept's slot
    /// `target` corresponds to this table's slot `source`. Slots without a
    /// pair keep their name.
    ///
    /// Entries are shared, not copied. Typeid entries the source lacks are
    /// derived from its assignment.
    ///
    /// # Errors
    ///
    /// - [`TableError::UnknownRequirement`] if the target needs a requirement
    ///   this table has no entry for.
    /// - [`TableError::SlotMismatch`] if a same-type constraint of the target
    ///   does not hold for this table's concrete types.
    /// - [`TableError::UnboundSlot`] if a derived typeid entry has no type.
    pub fn convert(
        &self,
        target: Arc<NormalizedConcept>,
        renames: &[(SlotKey, SlotKey)],
    ) -> Result<RawTable, TableError> {
        let renames: Vec<(SlotId, SlotId)> = renames
            .iter()
            .map(|(source, target)| (SlotId::from(source), SlotId::from(target)))
            .collect();
        let source_slot =
            |slot: &SlotId| self.concept.canonical_slot(&rename_back(slot, &renames));

        let mut assignment = Assignment::default();
        for slot in target.slots() {
            if let Some(info) = self.assignment.get(&source_slot(slot)) {
                assignment.insert(slot.clone(), *info);
            }
        }

        for (member, representative) in target.substitution() {
            let member = self.assignment.get(&source_slot(member));
            let representative = self.assignment.get(&source_slot(representative));
            if let (Some(member), Some(representative)) = (member, representative)
                && member != representative
            {
                return Err(TableError::SlotMismatch {
                    first: representative.name(),
                    second: member.name(),
                });
            }
        }

        let mut entries = Vec::with_capacity(target.len());
        for id in target.requirements() {
            let renamed = RequirementId::new(id.name(), id.slots().iter().map(source_slot).collect());
            let shared = self
                .concept
                .position(&renamed)
                .and_then(|index| self.entries.get(index));
            match shared {
                Some(shared) => entries.push(shared.clone()),
                None if id.name() == TYPEID_REQUIREMENT => {
                    entries.push(typeid_entry(id, &assignment)?);
                }
                None => {
                    return Err(TableError::UnknownRequirement {
                        requirement: id.name(),
                    });
                }
            }
        }

        Ok(RawTable {
            concept: target,
            assignment,
            entries,
        })
    }
}

impl PartialEq for RawTable {
    fn eq(&self, other: &Self) -> bool {
        self.assignment == other.assignment
    }
}

impl Eq for RawTable {}

impl core::fmt::Debug for RawTable {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RawTable")
            .field("assignment", &self.assignment)
            .field("entries", &self.entries.len())
            .field("relaxed", &self.is_relaxed())
            .finish()
    }
}

/// Builds the typeid entry of requirement `id` from an assignment.
fn typeid_entry(id: &RequirementId, assignment: &Assignment) -> Result<SharedEntry, TableError> {
    let slot = id
        .slots()
        .first()
        .ok_or(TableError::UnknownRequirement {
            requirement: id.name(),
        })?;
    let info = assignment
        .get(slot)
        .ok_or_else(|| TableError::UnboundSlot { slot: slot.clone() })?;
    Ok(entry::erase(*info))
}

/// Translates a slot of the target vocabulary back to the source vocabulary.
fn rename_back(slot: &SlotId, renames: &[(SlotId, SlotId)]) -> SlotId {
    match slot {
        SlotId::Deduced { name, arg } => SlotId::Deduced {
            name: *name,
            arg: alloc::boxed::Box::new(rename_back(arg, renames)),
        },
        _ => renames
            .iter()
            .find(|(_, target)| target == slot)
            .map_or_else(|| slot.clone(), |(source, _)| source.clone()),
    }
}

#[cfg(test)]
mod tests {
    use alloc::boxed::Box;

    use super::*;
    use crate::{key::Node, normalize::normalize, storage::RawRef};

    struct Show0;
    struct Show1;
    struct Size0;

    type ShowFn = fn(RawRef<'_>) -> usize;

    const THIS: SlotKey = SlotKey::Placeholder(0);
    const A: SlotKey = SlotKey::Placeholder(1);

    const SHOW_THIS: RequirementKey = RequirementKey {
        name: "show",
        slots: &[THIS],
        type_id: TypeId::of::<Show0>,
    };
    const SHOW_A: RequirementKey = RequirementKey {
        name: "show",
        slots: &[A],
        type_id: TypeId::of::<Show1>,
    };
    const SIZE_THIS: RequirementKey = RequirementKey {
        name: "size",
        slots: &[THIS],
        type_id: TypeId::of::<Size0>,
    };

    fn show_u32(value: RawRef<'_>) -> usize {
        // SAFETY: Only used in tables where `This` is `u32`.
        unsafe { *value.cast::<u32>() as usize }
    }

    fn width_of<T>(_: RawRef<'_>) -> usize {
        core::mem::size_of::<T>()
    }

    fn build_u32(tree: &'static [Node]) -> RawTable {
        let concept = Arc::new(normalize(tree).unwrap());
        let mut builder = TableBuilder::new(concept);
        builder.bind(&THIS, TypeInfo::of::<u32>());
        builder.insert(&SHOW_THIS, show_u32 as ShowFn);
        builder.insert(&SIZE_THIS, width_of::<u32> as ShowFn);
        builder.finish().unwrap()
    }

    static SOURCE: &[Node] = &[
        Node::Primitive(SHOW_THIS),
        Node::Primitive(SIZE_THIS),
        Node::Relaxed,
    ];
    static SHOW_ONLY: &[Node] = &[Node::Primitive(SHOW_THIS)];
    static SHOW_RENAMED: &[Node] = &[Node::Primitive(SHOW_A), Node::Relaxed];

    #[test]
    fn test_entry_lookup() {
        let table = build_u32(SOURCE);
        assert_eq!(table.len(), 3);
        assert!(table.is_relaxed());
        let value = 5_u32;
        let show: ShowFn = table.entry(TypeId::of::<Show0>(), &SHOW_THIS).unwrap();
        assert_eq!(show(RawRef::new(&value)), 5);
        assert!(table.entry::<u8>(TypeId::of::<Show0>(), &SHOW_THIS).is_none());
        assert!(table.entry::<ShowFn>(TypeId::of::<()>(), &SHOW_A).is_none());
        assert_eq!(table.type_of(&THIS), Some(TypeInfo::of::<u32>()));
        assert_eq!(table.type_of(&A), None);
    }

    #[test]
    fn test_injected_typeid_entry() {
        let table = build_u32(SOURCE);
        let key = RequirementKey {
            name: TYPEID_REQUIREMENT,
            slots: &[THIS],
            type_id: TypeId::of::<()>,
        };
        assert_eq!(
            table.entry::<TypeInfo>(TypeId::of::<()>(), &key),
            Some(TypeInfo::of::<u32>())
        );
    }

    #[test]
    fn test_equality_by_assignment() {
        let first = build_u32(SOURCE);
        let second = build_u32(SOURCE);
        assert_eq!(first, second);
        assert_eq!(first.first_difference(&second), None);

        let concept = Arc::new(normalize(SHOW_ONLY).unwrap());
        let mut builder = TableBuilder::new(concept);
        builder.bind(&THIS, TypeInfo::of::<u64>());
        builder.insert(&SHOW_THIS, width_of::<u64> as ShowFn);
        let other = builder.finish().unwrap();
        assert_ne!(first, other);
        assert_eq!(
            first.first_difference(&other),
            Some((TypeInfo::of::<u32>(), TypeInfo::of::<u64>()))
        );
    }

    #[test]
    fn test_convert_subset() {
        let table = build_u32(SOURCE);
        let target = Arc::new(normalize(SHOW_ONLY).unwrap());
        let converted = table.convert(target, &[]).unwrap();
        assert_eq!(converted.len(), 1);
        let value = 9_u32;
        let show: ShowFn = converted
            .entry(TypeId::of::<Show0>(), &SHOW_THIS)
            .unwrap();
        assert_eq!(show(RawRef::new(&value)), 9);
    }

    #[test]
    fn test_convert_renamed() {
        let table = build_u32(SOURCE);
        let target = Arc::new(normalize(SHOW_RENAMED).unwrap());
        let converted = table.convert(target, &[(THIS, A)]).unwrap();
        assert_eq!(converted.type_of(&A), Some(TypeInfo::of::<u32>()));
        assert!(converted.entry::<ShowFn>(TypeId::of::<Show1>(), &SHOW_A).is_some());
        let typeid = RequirementKey {
            name: TYPEID_REQUIREMENT,
            slots: &[A],
            type_id: TypeId::of::<()>,
        };
        assert_eq!(
            converted.entry::<TypeInfo>(TypeId::of::<()>(), &typeid),
            Some(TypeInfo::of::<u32>())
        );
    }

    #[test]
    fn test_convert_missing_requirement() {
        let concept = Arc::new(normalize(SHOW_ONLY).unwrap());
        let mut builder = TableBuilder::new(concept);
        builder.bind(&THIS, TypeInfo::of::<u32>());
        builder.insert(&SHOW_THIS, show_u32 as ShowFn);
        let table = builder.finish().unwrap();

        let target = Arc::new(normalize(SOURCE).unwrap());
        assert_eq!(
            table.convert(target, &[]).err(),
            Some(TableError::UnknownRequirement { requirement: "size" })
        );
    }

    #[test]
    fn test_rename_back() {
        let renames = [(SlotId::Placeholder(0), SlotId::Placeholder(1))];
        assert_eq!(
            rename_back(&SlotId::Placeholder(1), &renames),
            SlotId::Placeholder(0)
        );
        assert_eq!(
            rename_back(&SlotId::Placeholder(2), &renames),
            SlotId::Placeholder(2)
        );
        assert_eq!(
            rename_back(
                &SlotId::Deduced {
                    name: "pointee",
                    arg: Box::new(SlotId::Placeholder(1)),
                },
                &renames
            ),
            SlotId::Deduced {
                name: "pointee",
                arg: Box::new(SlotId::Placeholder(0)),
            }
        );
    }

    static_assertions::assert_impl_all!(RawTable: Send, Sync);
}
