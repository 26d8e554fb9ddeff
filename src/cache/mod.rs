//! The process-wide table cache.
//!
//! Normalizing a concept and building a table for a slot map are both pure
//! functions of types, so their results are interned: the first
//! [`Binding::new`](crate::Binding::new) for a `(concept, slot map)` pair
//! builds the table, and later calls share it. Sharing is an optimization only.
//! Bindings compare equal by their slot assignment, so code behaves the same
//! with interning switched off or after the cache is cleared.
//!
//! The cache is guarded by a read-write lock: [`std::sync::RwLock`] with the
//! `std` feature, [`spin::RwLock`] without it.
//!
//! # Examples
//!
//! ```
//! use erasure::{Any, cache, requirements::Destructible};
//!
//! cache::clear();
//! let first: Any<Destructible> = Any::new(1_u8);
//! let second: Any<Destructible> = Any::new(2_u8);
//! assert!(first.binding().ptr_eq(second.binding()));
//! assert!(cache::table_count() >= 1);
//! ```

mod interner;

use core::{
    any::{TypeId, type_name},
    sync::atomic::{AtomicBool, Ordering},
};

use erasure_internals::{NormalizedConcept, RawTable, TableBuilder, TableError, normalize};
use triomphe::Arc;

use self::interner::Interner;
use crate::{
    concept::{Concept, Instantiate},
    slots::SlotMap,
};

/// Normalized concepts by [`TypeId`] of the concept.
static CONCEPTS: Interner<TypeId, Arc<NormalizedConcept>> = Interner::new();
/// Tables by [`TypeId`] of the concept and of the slot map.
static TABLES: Interner<(TypeId, TypeId), Arc<RawTable>> = Interner::new();
static INTERNING: AtomicBool = AtomicBool::new(true);

/// Switches table interning on or off.
///
/// With interning off, every [`Binding::new`](crate::Binding::new) builds a
/// fresh table. Normalized concepts are cached either way. Interning is on by
/// default.
pub fn set_interning(enabled: bool) {
    INTERNING.store(enabled, Ordering::Relaxed);
}

/// Returns `true` if tables are interned.
#[must_use]
pub fn is_interning() -> bool {
    INTERNING.load(Ordering::Relaxed)
}

/// Removes every cached table and normalized concept.
///
/// Existing bindings keep their tables alive.
pub fn clear() {
    let tables = TABLES.clear();
    let concepts = CONCEPTS.clear();
    tracing::trace!(tables, concepts, "cleared table cache");
}

/// Returns the number of interned tables.
#[must_use]
pub fn table_count() -> usize {
    TABLES.len()
}

/// Returns the number of cached normalized concepts.
#[must_use]
pub fn concept_count() -> usize {
    CONCEPTS.len()
}

/// Returns the normalized form of `C`.
pub(crate) fn concept<C: Concept>() -> Result<Arc<NormalizedConcept>, TableError> {
    let key = TypeId::of::<C>();
    if let Some(concept) = CONCEPTS.get(&key) {
        return Ok(concept);
    }

    let concept = Arc::new(normalize(C::TREE)?);
    tracing::trace!(
        concept = type_name::<C>(),
        requirements = concept.len(),
        relaxed = concept.is_relaxed(),
        "normalized concept"
    );
    Ok(CONCEPTS.intern(key, concept))
}

/// Returns the table of `C` under the slot map `M`.
pub(crate) fn table<C: Instantiate<M>, M: SlotMap>() -> Result<Arc<RawTable>, TableError> {
    let key = (TypeId::of::<C>(), TypeId::of::<M>());
    let interning = is_interning();
    if interning && let Some(table) = TABLES.get(&key) {
        return Ok(table);
    }

    let mut builder = TableBuilder::new(concept::<C>()?);
    C::instantiate(&mut builder);
    let table = Arc::new(builder.finish()?);
    tracing::trace!(
        concept = type_name::<C>(),
        slots = type_name::<M>(),
        entries = table.len(),
        "built operation table"
    );

    if !interning {
        return Ok(table);
    }
    Ok(TABLES.intern(key, table))
}
