//! The [`Concept`] family of traits.
//!
//! A concept is a zero-sized type describing a set of operations. It exposes
//! that set twice:
//!
//! - as data, through [`Concept::TREE`], which the runtime normalizer and the
//!   compile-time membership checks read;
//! - as code, through [`Instantiate`], which builds the operation table for
//!   one assignment of concrete types.
//!
//! Primitive requirements implement all three traits. Tuples of concepts and
//! [`SameType`] combine them.
//!
//! # Declaring a Requirement
//!
//! ```
//! use core::any::TypeId;
//!
//! use erasure::{
//!     Concept, Instantiate, Primitive,
//!     internals::{Node, RawRef, RequirementKey, TableBuilder, TypeInfo},
//!     slots::{Resolve, Slot, SlotMap, This},
//! };
//!
//! /// Returns the length of a string-like value.
//! struct HasLen<T = This>(core::marker::PhantomData<T>);
//!
//! impl<T: Slot> Concept for HasLen<T> {
//!     const TREE: &'static [Node] = &[Node::Primitive(<Self as Primitive>::KEY)];
//! }
//!
//! impl<T: Slot> Primitive for HasLen<T> {
//!     type Entry = unsafe fn(RawRef<'_>) -> usize;
//!     const KEY: RequirementKey = RequirementKey {
//!         name: "my_crate::HasLen",
//!         slots: &[T::KEY],
//!         type_id: TypeId::of::<Self>,
//!     };
//! }
//!
//! unsafe fn len<S: AsRef<str> + 'static>(value: RawRef<'_>) -> usize {
//!     // SAFETY: The entry is only registered for tables binding `S`.
//!     unsafe { value.cast::<S>() }.as_ref().len()
//! }
//!
//! impl<M: SlotMap, T: Resolve<M>> Instantiate<M> for HasLen<T>
//! where
//!     T::Out: AsRef<str>,
//! {
//!     fn instantiate(builder: &mut TableBuilder) {
//!         builder.bind(&T::KEY, TypeInfo::of::<T::Out>());
//!         builder.insert(&<Self as Primitive>::KEY, len::<T::Out> as <Self as Primitive>::Entry);
//!     }
//! }
//! ```

use erasure_internals::{Node, RequirementKey, TableBuilder, TypeInfo, membership};

use crate::slots::{Resolve, Slot, SlotMap};

/// A statically declared set of operations.
pub trait Concept: 'static {
    /// The declaration tree of the concept.
    const TREE: &'static [Node];
}

/// A requirement that corresponds to exactly one table entry.
pub trait Primitive: Concept {
    /// The type of the table entry, usually an `unsafe fn` pointer working on
    /// erased arguments.
    type Entry: Copy + Send + Sync + 'static;

    /// The `const` identity of the requirement.
    const KEY: RequirementKey;
}

/// Table construction for a concept under the slot map `M`.
#[diagnostic::on_unimplemented(
    message = "`{Self}` cannot be instantiated for the slot map `{M}`",
    note = "every slot the concept mentions must be bound, and the bound types must support the required operations"
)]
pub trait Instantiate<M: SlotMap>: Concept {
    /// Binds the slots and inserts the entries of every primitive requirement.
    fn instantiate(builder: &mut TableBuilder);
}

/// Returns `true` if the concept `C` declares the requirement `R`.
///
/// Usable in `const` contexts; the typeid requirement counts as declared by
/// every relaxed concept.
#[must_use]
pub const fn declares<C: Concept, R: Primitive>() -> bool {
    membership::provides(C::TREE, &R::KEY, &[])
}

/// Returns `true` if the concept `C` carries the relaxed marker.
#[must_use]
pub const fn is_relaxed<C: Concept>() -> bool {
    membership::is_relaxed(C::TREE)
}

/// Constraint that two slots hold the same concrete type.
///
/// The normalizer merges the two slots into one, so requirements written over
/// either of them share table entries.
pub struct SameType<A, B>(core::marker::PhantomData<fn() -> (A, B)>);

impl<A: Slot, B: Slot> Concept for SameType<A, B> {
    const TREE: &'static [Node] = &[Node::SameType(A::KEY, B::KEY)];
}

impl<M: SlotMap, A: Resolve<M>, B: Resolve<M, Out = A::Out>> Instantiate<M> for SameType<A, B> {
    fn instantiate(builder: &mut TableBuilder) {
        builder.bind(&A::KEY, TypeInfo::of::<A::Out>());
        builder.bind(&B::KEY, TypeInfo::of::<B::Out>());
    }
}

/// Marker switching a concept to relaxed matching.
///
/// A relaxed concept carries a typeid entry for every slot, allows
/// [`Any::assign`](crate::Any::assign) between values of different types as
/// long as the concept can copy them, and makes equality and ordering of
/// values with different types well defined instead of a dispatch failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Relaxed;

impl Concept for Relaxed {
    const TREE: &'static [Node] = &[Node::Relaxed];
}

impl<M: SlotMap> Instantiate<M> for Relaxed {
    fn instantiate(_builder: &mut TableBuilder) {}
}

impl Concept for () {
    const TREE: &'static [Node] = &[];
}

impl<M: SlotMap> Instantiate<M> for () {
    fn instantiate(_builder: &mut TableBuilder) {}
}

macro_rules! tuple_concept {
    ($($name:ident),+) => {
        impl<$($name: Concept),+> Concept for ($($name,)+) {
            const TREE: &'static [Node] = &[$(Node::Composite($name::TREE)),+];
        }

        impl<M: SlotMap, $($name: Instantiate<M>),+> Instantiate<M> for ($($name,)+) {
            fn instantiate(builder: &mut TableBuilder) {
                $($name::instantiate(builder);)+
            }
        }
    };
}

tuple_concept!(A);
tuple_concept!(A, B);
tuple_concept!(A, B, C);
tuple_concept!(A, B, C, D);
tuple_concept!(A, B, C, D, E);
tuple_concept!(A, B, C, D, E, F);
tuple_concept!(A, B, C, D, E, F, G);
tuple_concept!(A, B, C, D, E, F, G, H);
tuple_concept!(A, B, C, D, E, F, G, H, I);
tuple_concept!(A, B, C, D, E, F, G, H, I, J);
tuple_concept!(A, B, C, D, E, F, G, H, I, J, K);
tuple_concept!(A, B, C, D, E, F, G, H, I, J, K, L);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        requirements::{Addable, Destructible, Typeid},
        slots::{SlotA, This},
    };

    type Nested = ((Destructible, Addable), (Addable, Relaxed));

    #[test]
    fn test_tuple_trees_nest() {
        assert_eq!(<()>::TREE.len(), 0);
        assert_eq!(Nested::TREE.len(), 2);
        assert!(matches!(Nested::TREE[0], Node::Composite(inner) if inner.len() == 2));
    }

    #[test]
    fn test_const_membership() {
        const {
            assert!(declares::<Nested, Destructible>());
            assert!(declares::<Nested, Addable>());
            assert!(!declares::<Nested, Destructible<SlotA>>());
            assert!(declares::<Nested, Typeid>());
            assert!(!declares::<(Destructible,), Typeid>());
            assert!(is_relaxed::<Nested>());
            assert!(!is_relaxed::<Destructible>());
            assert!(declares::<(Destructible, SameType<This, SlotA>), Destructible<SlotA>>());
        }
    }
}
