#![cfg_attr(not(doc), no_std)]
#![deny(
    missing_docs,
    clippy::alloc_instead_of_core,
    clippy::std_instead_of_alloc,
    clippy::std_instead_of_core,
    clippy::missing_safety_doc,
    clippy::undocumented_unsafe_blocks,
    clippy::multiple_unsafe_ops_per_block,
    clippy::as_ptr_cast_mut,
    clippy::ptr_as_ptr,
    rustdoc::invalid_rust_codeblocks,
    rustdoc::broken_intra_doc_links,
    missing_copy_implementations,
    unused_doc_comments
)]
// Extra checks on nightly
#![cfg_attr(nightly_extra_checks, feature(rustdoc_missing_doc_code_examples))]
#![cfg_attr(nightly_extra_checks, forbid(rustdoc::missing_doc_code_examples))]
// Make docs.rs generate better docs
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Value-level polymorphism driven by statically declared concepts.
//!
//! ## Overview
//!
//! This crate erases the concrete type of a value while keeping a chosen set
//! of operations on it. The set is a **concept**: a tuple of requirements such
//! as "can be copied", "can be added to a value of the same type" or "can be
//! displayed". An erased value carries a shared table with one entry per
//! requirement, so the operations work without knowing the concrete type.
//!
//! Unlike `dyn Trait`, a concept can relate several values: `Addable` takes
//! two operands and returns a third value, all of the same unknown type. The
//! table for a concept and a concrete type is built once and shared, so two
//! erased values can check cheaply whether they hold the same concrete types
//! before an operation combines them.
//!
//! ## Quick Example
//!
//! ```
//! use erasure::{
//!     Any,
//!     requirements::{Addable, CopyConstructible, Displayable, EqualityComparable, Typeid},
//! };
//!
//! type Number = (CopyConstructible, Addable, EqualityComparable, Displayable, Typeid);
//!
//! let three: Any<Number> = Any::new(3_i32);
//! let four: Any<Number> = Any::new(4_i32);
//! let seven = &three + &four;
//! assert_eq!(seven.to_string(), "7");
//! assert_eq!(seven.downcast::<i32>().ok(), Some(7));
//!
//! let real: Any<Number> = Any::new(7.0_f64);
//! assert!(three.try_add(&real).is_err());
//! ```
//!
//! ## Core Concepts
//!
//! - **Slots** ([`slots`]) name the concrete types a concept talks about.
//!   [`This`](slots::This) is the type of the value itself; further
//!   placeholders relate several types, and deduced slots such as
//!   [`Pointee`](slots::Pointee) are computed from other slots.
//! - **Concepts** ([`Concept`]) are tuples of requirements from the
//!   [`requirements`] catalog, nested freely. Duplicates collapse, and
//!   [`SameType`](requirements::SameType) merges slots.
//! - **Bindings** ([`Binding`]) map every slot of a concept to a concrete type
//!   and hold the matching operation entries. They are immutable and shared,
//!   and compare equal by their concrete types.
//! - **Erased values** ([`Any`], [`AnyRef`], [`AnyMut`]) pair storage or a
//!   reference with a binding.
//! - **Dispatch** ([`dispatch`]) checks that all operands carry equal bindings
//!   and calls the table entry. Mismatches surface as [`BadDispatch`].
//!
//! A concept is **strict** by default: operations on values of different
//! types fail. Adding [`Relaxed`](requirements::Relaxed) gives every slot
//! runtime type information, lets [`Any::assign`] replace a value with one of
//! another type, and makes equality and ordering across types well defined.
//!
//! Whether a concept declares an operation is decided at compile time. Using
//! an operation the concept lacks is a build error, not a runtime failure.
//!
//! For the runtime data structures, see the [`erasure-internals`] crate.
//!
//! [`erasure-internals`]: erasure_internals
//!
//! ## Features
//!
//! - `std`: guards the table cache with [`std::sync::RwLock`] instead of a
//!   spin lock, and enables `std` support in `tracing`.
//!
//! ## Logging
//!
//! Table construction and conversion are logged at the `trace` level, and
//! dispatch failures at the `debug` level, through [`tracing`].

extern crate alloc;

#[cfg(all(feature = "std", not(doc)))]
extern crate std;

pub mod cache;
pub mod dispatch;
pub mod prelude;
pub mod requirements;
pub mod slots;

mod any;
mod binding;
mod concept;
mod error;

pub use erasure_internals::TableError;

pub use self::{
    any::{Any, AnyMut, AnyRef},
    binding::{Binding, Rename, Renaming, SlotPair},
    concept::{Concept, Instantiate, Primitive, declares, is_relaxed},
    error::BadDispatch,
};

/// Runtime building blocks for writing requirements outside this crate.
///
/// A custom requirement implements [`Primitive`](crate::Primitive) with an
/// entry type, and [`Instantiate`](crate::Instantiate) to bind its slots and
/// insert the entry into the [`TableBuilder`]. Entries usually take
/// [`RawRef`]/[`RawMut`] arguments and return [`RawStorage`].
pub mod internals {
    pub use erasure_internals::{
        Node, RawMut, RawRef, RawStorage, RequirementKey, SlotKey, TableBuilder, TypeInfo,
    };
}
