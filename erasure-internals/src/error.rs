//! Errors raised while normalizing concepts and building operation tables.

use core::any::TypeId;

use crate::key::SlotId;

/// Failure to normalize a concept or to build or convert an operation table.
///
/// Concepts that type-check at their instantiation site never produce these
/// errors through the `erasure` crate; they indicate a hand-written requirement
/// that does not register the entries it declares, or a conversion whose
/// target constraints do not hold for the source's concrete types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum TableError {
    /// A same-type constraint joins two distinct concrete types.
    #[error("same-type constraint joins distinct concrete types {first:?} and {second:?}")]
    ConflictingTypes {
        /// The concrete type kept as representative.
        first: TypeId,
        /// The concrete type that could not be merged.
        second: TypeId,
    },
    /// A slot was bound to two different concrete types.
    #[error("slot is bound to both `{first}` and `{second}`")]
    SlotMismatch {
        /// Name of the first concrete type.
        first: &'static str,
        /// Name of the second concrete type.
        second: &'static str,
    },
    /// A requirement has no entry, or an entry was inserted for a requirement
    /// the concept does not declare.
    #[error("requirement `{requirement}` has no entry in the table")]
    UnknownRequirement {
        /// Name of the requirement.
        requirement: &'static str,
    },
    /// A typeid entry was requested for a slot without a concrete type.
    #[error("slot {slot:?} has no concrete type")]
    UnboundSlot {
        /// The unbound slot.
        slot: SlotId,
    },
}
