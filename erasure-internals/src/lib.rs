#![no_std]
#![forbid(
    missing_docs,
    clippy::alloc_instead_of_core,
    clippy::std_instead_of_alloc,
    clippy::std_instead_of_core,
    clippy::missing_safety_doc,
    clippy::missing_docs_in_private_items,
    clippy::undocumented_unsafe_blocks,
    clippy::multiple_unsafe_ops_per_block,
    rustdoc::invalid_rust_codeblocks,
    rustdoc::broken_intra_doc_links,
    unused_doc_comments
)]
#![deny(missing_copy_implementations)]
#![allow(rustdoc::private_intra_doc_links)]
//! Internal implementation crate for [`erasure`].
//!
//! # Overview
//!
//! This crate contains the runtime data structures and unsafe operations that
//! power the [`erasure`] type erasure library. The `erasure` crate turns
//! concept declarations and concrete types into calls into this crate; all
//! pointer juggling and table bookkeeping happens here.
//!
//! **This crate is an implementation detail.** No semantic versioning guarantees
//! are provided. Users should depend on the [`erasure`] crate, not this one.
//!
//! # Architecture
//!
//! - **[`key`]**: Identities for slots and primitive requirements
//!   - [`SlotKey`] / [`RequirementKey`] / [`Node`]: `const` descriptions
//!     embedded in associated constants
//!   - [`SlotId`] / [`RequirementId`]: owned runtime identities
//!   - [`TypeInfo`]: [`TypeId`] plus type name
//!
//! - **[`membership`]**: `const fn` predicates deciding at monomorphization
//!   time whether a concept declares a requirement or includes another concept
//!
//! - **[`normalize`]**: Concept normalization
//!   - [`normalize()`]: flattening, deduplication, same-type merging and
//!     typeid injection
//!   - [`UnionFind`]: the slot equivalence structure
//!
//! - **[`storage`]**: Type-erased value cells
//!   - [`RawStorage`]: owned, [`Box`]-based allocation
//!   - [`RawRef`] / [`RawMut`]: borrowed views (shared/mutable)
//!
//! - **[`table`]**: Immutable operation tables
//!   - [`TableBuilder`]: collects slot assignments and entries
//!   - [`RawTable`]: the finished table, with subset conversion
//!
//! # Safety Strategy
//!
//! An erased value is a pointer whose pointee type is only known to the
//! operation table it is paired with. Safety rests on that pairing:
//!
//! - **Module-based encapsulation**: the pointer fields of the storage cells
//!   are private to [`storage`], so every way to create one is visible in a
//!   single file
//! - **Typed entries**: table entries are stored behind [`Any`] and read back
//!   with a checked downcast, so a lookup can return `None` but never a
//!   function pointer of the wrong signature
//! - **Documented cast contracts**: every typed access to a cell is an
//!   `unsafe` method stating the type obligation the caller must uphold
//!
//! [`erasure`]: https://docs.rs/erasure/latest/erasure/
//! [`TypeId`]: core::any::TypeId
//! [`Any`]: core::any::Any
//! [`Box`]: alloc::boxed::Box

extern crate alloc;

mod error;
pub mod key;
pub mod membership;
pub mod normalize;
pub mod storage;
pub mod table;

pub use error::TableError;
pub use key::{
    Node, RequirementId, RequirementKey, SlotId, SlotKey, TYPEID_REQUIREMENT, TypeInfo,
};
pub use normalize::{NormalizedConcept, UnionFind, normalize};
pub use storage::{RawMut, RawRef, RawStorage};
pub use table::{RawTable, TableBuilder};
