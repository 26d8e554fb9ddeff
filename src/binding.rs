//! Typed handles to operation tables.

use core::{
    any::{TypeId, type_name},
    fmt,
    marker::PhantomData,
};

use erasure_internals::{RawTable, SlotKey, TableError, TypeInfo, membership};
use triomphe::Arc;

use crate::{
    cache,
    concept::{Concept, Instantiate, Primitive},
    error::BadDispatch,
    slots::{Slot, SlotMap},
};

/// A list of slot renamings used when converting between concepts.
///
/// `()` is the identity. A [`Rename<From, To>`] or a tuple of them maps slot
/// `From` of the source concept to slot `To` of the target concept; slots
/// without a renaming keep their name.
pub trait Renaming: 'static {
    /// `(source, target)` slot pairs.
    const PAIRS: &'static [(SlotKey, SlotKey)];
}

/// Renames slot `From` of the source concept to slot `To` of the target.
pub struct Rename<From, To>(PhantomData<fn() -> (From, To)>);

/// A single `(source, target)` slot pair.
pub trait SlotPair: 'static {
    /// The pair.
    const PAIR: (SlotKey, SlotKey);
}

impl<From: Slot, To: Slot> SlotPair for Rename<From, To> {
    const PAIR: (SlotKey, SlotKey) = (From::KEY, To::KEY);
}

impl Renaming for () {
    const PAIRS: &'static [(SlotKey, SlotKey)] = &[];
}

impl<From: Slot, To: Slot> Renaming for Rename<From, To> {
    const PAIRS: &'static [(SlotKey, SlotKey)] = &[<Self as SlotPair>::PAIR];
}

macro_rules! tuple_renaming {
    ($($name:ident),+) => {
        impl<$($name: SlotPair),+> Renaming for ($($name,)+) {
            const PAIRS: &'static [(SlotKey, SlotKey)] = &[$($name::PAIR),+];
        }
    };
}

tuple_renaming!(A);
tuple_renaming!(A, B);
tuple_renaming!(A, B, C);
tuple_renaming!(A, B, C, D);
tuple_renaming!(A, B, C, D, E);

/// A shared, immutable operation table for the concept `C`.
///
/// A binding records one concrete type per slot of `C` and one entry per
/// requirement. Bindings are cheap to clone (one reference count increment)
/// and compare equal iff they assign the same concrete types to the same
/// slots. Erased values may only be combined in one operation if their
/// bindings are equal.
///
/// # Examples
///
/// ```
/// use erasure::{
///     Binding,
///     requirements::{Addable, Destructible},
///     slots::Single,
///     slots::This,
/// };
///
/// type Arith = (Destructible, Addable);
///
/// let first = Binding::<Arith>::new::<Single<This, i32>>();
/// let second = Binding::<Arith>::new::<Single<This, i32>>();
/// let third = Binding::<Arith>::new::<Single<This, f64>>();
/// assert_eq!(first, second);
/// assert_ne!(first, third);
/// ```
pub struct Binding<C: Concept> {
    /// The shared table.
    table: Arc<RawTable>,
    /// Marker for the concept.
    _concept: PhantomData<fn() -> C>,
}

impl<C: Concept> Binding<C> {
    /// Returns the binding of `C` under the slot map `M`.
    ///
    /// Tables are interned by `(C, M)`; see [`cache`](crate::cache).
    ///
    /// # Panics
    ///
    /// Panics if the table cannot be built, which only happens for a
    /// hand-written requirement whose [`Instantiate`] impl does not insert the
    /// entry it declares. Use [`Binding::try_new`] to handle that case.
    #[must_use]
    #[track_caller]
    pub fn new<M: SlotMap>() -> Self
    where
        C: Instantiate<M>,
    {
        match Self::try_new::<M>() {
            Ok(binding) => binding,
            Err(error) => panic!(
                "cannot build the operation table of `{}`: {error}",
                type_name::<C>()
            ),
        }
    }

    /// Returns the binding of `C` under the slot map `M`.
    ///
    /// # Errors
    ///
    /// Returns the [`TableError`] describing why the table cannot be built.
    pub fn try_new<M: SlotMap>() -> Result<Self, TableError>
    where
        C: Instantiate<M>,
    {
        cache::table::<C, M>().map(Self::from_table)
    }

    /// Wraps a table built for `C`.
    pub(crate) fn from_table(table: Arc<RawTable>) -> Self {
        Self {
            table,
            _concept: PhantomData,
        }
    }

    /// Returns the underlying table.
    #[must_use]
    pub fn as_raw(&self) -> &RawTable {
        &self.table
    }

    /// Returns `true` if both bindings share the same table.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.table, &other.table)
    }

    /// Returns `true` if `C` is relaxed.
    #[must_use]
    pub fn is_relaxed(&self) -> bool {
        self.table.is_relaxed()
    }

    /// Returns the concrete type this binding assigns to slot `S`.
    #[must_use]
    pub fn type_of<S: Slot>(&self) -> Option<TypeInfo> {
        self.table.type_of(&S::KEY)
    }

    /// Returns the entry of requirement `R`.
    ///
    /// # Errors
    ///
    /// Returns [`BadDispatch::MissingRequirement`] if the table has no entry for
    /// `R`.
    pub fn entry<R: Primitive>(&self) -> Result<R::Entry, BadDispatch> {
        self.table
            .entry::<R::Entry>(TypeId::of::<R>(), &R::KEY)
            .ok_or(BadDispatch::MissingRequirement {
                requirement: R::KEY.name,
            })
    }

    /// Converts the binding to the concept `D`, renaming slots with `Ren`.
    ///
    /// `D`'s requirements, after renaming, must be a subset of `C`'s; this is
    /// checked at compile time. The entries are shared with this binding.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::SlotMismatch`] if a same-type constraint of `D`
    /// does not hold for the concrete types of this binding.
    pub fn convert<D: Concept, Ren: Renaming>(&self) -> Result<Binding<D>, TableError> {
        const {
            assert!(
                membership::includes(C::TREE, D::TREE, Ren::PAIRS),
                "the target concept requires operations the source concept does not provide"
            );
        }
        if TypeId::of::<C>() == TypeId::of::<D>() && Ren::PAIRS.is_empty() {
            return Ok(Binding::from_table(self.table.clone()));
        }

        let table = self.table.convert(cache::concept::<D>()?, Ren::PAIRS)?;
        tracing::trace!(
            source = type_name::<C>(),
            target = type_name::<D>(),
            renaming = type_name::<Ren>(),
            entries = table.len(),
            "converted operation table"
        );
        Ok(Binding::from_table(Arc::new(table)))
    }
}

impl<C: Concept> Clone for Binding<C> {
    fn clone(&self) -> Self {
        Self::from_table(self.table.clone())
    }
}

impl<C: Concept> PartialEq for Binding<C> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || *self.table == *other.table
    }
}

impl<C: Concept> Eq for Binding<C> {}

impl<C: Concept> fmt::Debug for Binding<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("concept", &type_name::<C>())
            .field("table", &*self.table)
            .finish()
    }
}
