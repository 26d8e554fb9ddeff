//! Identities for slots and primitive requirements.
//!
//! Every slot and requirement exists in two forms:
//!
//! - A `const`-constructible description ([`SlotKey`], [`RequirementKey`],
//!   [`Node`]) which the `erasure` crate embeds in associated constants. These
//!   can be inspected by the `const fn` predicates in [`membership`] while the
//!   compiler monomorphizes a call site.
//! - An owned, hashable runtime form ([`SlotId`], [`RequirementId`]) used by
//!   the normalizer and the operation tables.
//!
//! [`membership`]: crate::membership

use alloc::{boxed::Box, vec::Vec};
use core::any::TypeId;

/// Name under which the per-slot type information requirement is registered.
///
/// The normalizer injects one requirement with this name per slot when a
/// concept is relaxed, and table builders fill those entries with the
/// [`TypeInfo`] of the slot.
pub const TYPEID_REQUIREMENT: &str = "erasure::requirements::Typeid";

/// Compile-time description of a slot.
#[derive(Clone, Copy, Debug)]
pub enum SlotKey {
    /// One of the interchangeable placeholders, identified by its position.
    Placeholder(u8),
    /// A concrete type that does not vary between bindings.
    Fixed {
        /// Fully qualified name of the type, compared in `const` contexts.
        name: &'static str,
        /// [`TypeId`] of the type, compared at runtime.
        id: fn() -> TypeId,
    },
    /// The type computed by the metafunction `name` from the type of `arg`.
    Deduced {
        /// Fully qualified name of the metafunction.
        name: &'static str,
        /// The slot the metafunction is applied to.
        arg: &'static SlotKey,
    },
}

/// Owned runtime identity of a slot.
///
/// Unlike [`SlotKey`] this type can be hashed, ordered and compared, which
/// makes it usable as a key in the normalizer's union-find and in table
/// assignments.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub enum SlotId {
    /// A placeholder, identified by its position.
    Placeholder(u8),
    /// A concrete type.
    Fixed(TypeId),
    /// The result of a metafunction applied to another slot.
    Deduced {
        /// Fully qualified name of the metafunction.
        name: &'static str,
        /// The slot the metafunction is applied to.
        arg: Box<SlotId>,
    },
}

impl SlotId {
    /// Ordering used to pick the representative of a same-type class.
    ///
    /// Lower ranks win: concrete types first, then placeholders by position,
    /// then deduced slots.
    pub(crate) fn rank(&self) -> (u8, u8) {
        match self {
            SlotId::Fixed(_) => (0, 0),
            SlotId::Placeholder(index) => (1, *index),
            SlotId::Deduced { .. } => (2, 0),
        }
    }

    /// Returns `true` if this slot names a concrete type.
    #[inline]
    pub fn is_fixed(&self) -> bool {
        matches!(self, SlotId::Fixed(_))
    }
}

impl From<&SlotKey> for SlotId {
    fn from(key: &SlotKey) -> Self {
        match key {
            SlotKey::Placeholder(index) => SlotId::Placeholder(*index),
            SlotKey::Fixed { id, .. } => SlotId::Fixed(id()),
            SlotKey::Deduced { name, arg } => SlotId::Deduced {
                name: *name,
                arg: Box::new(SlotId::from(*arg)),
            },
        }
    }
}

/// Compile-time description of a primitive requirement.
///
/// The fields are public so that requirement types can build their key in an
/// associated constant with a struct literal, which gives the `slots` array a
/// `'static` lifetime.
#[derive(Clone, Copy, Debug)]
pub struct RequirementKey {
    /// Fully qualified name of the requirement, shared by every instantiation.
    pub name: &'static str,
    /// The slots the requirement is written over, in declaration order.
    pub slots: &'static [SlotKey],
    /// [`TypeId`] of the Rust type that declared this key.
    pub type_id: fn() -> TypeId,
}

impl RequirementKey {
    /// Converts the key to its runtime identity, without canonicalizing the
    /// slots.
    pub fn id(&self) -> RequirementId {
        RequirementId::new(self.name, self.slots.iter().map(SlotId::from).collect())
    }
}

/// Owned runtime identity of a primitive requirement.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct RequirementId {
    /// Fully qualified name of the requirement.
    name: &'static str,
    /// The slots the requirement is written over.
    slots: Vec<SlotId>,
}

impl RequirementId {
    /// Creates a requirement identity from its name and slots.
    #[inline]
    pub fn new(name: &'static str, slots: Vec<SlotId>) -> Self {
        Self { name, slots }
    }

    /// Returns the name of the requirement.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the slots of the requirement.
    #[inline]
    pub fn slots(&self) -> &[SlotId] {
        &self.slots
    }
}

/// One node of a concept's declaration tree.
#[derive(Clone, Copy, Debug)]
pub enum Node {
    /// A primitive requirement.
    Primitive(RequirementKey),
    /// A nested concept.
    Composite(&'static [Node]),
    /// Both slots must resolve to the same type.
    SameType(SlotKey, SlotKey),
    /// The relaxed matching marker.
    Relaxed,
}

/// Identity and name of a concrete type.
///
/// Equality and hashing only consider the [`TypeId`].
#[derive(Clone, Copy)]
pub struct TypeInfo {
    /// The [`TypeId`] of the type.
    id: TypeId,
    /// The [`core::any::type_name`] of the type.
    name: &'static str,
}

impl TypeInfo {
    /// Returns the [`TypeInfo`] of `T`.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: core::any::type_name::<T>(),
        }
    }

    /// Returns the [`TypeId`] of the type.
    #[inline]
    pub fn id(self) -> TypeId {
        self.id
    }

    /// Returns the name of the type.
    #[inline]
    pub fn name(self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeInfo {}

impl core::hash::Hash for TypeInfo {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl core::fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name)
    }
}

impl core::fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name)
    }
}
