//! The built-in requirement catalog.
//!
//! Every requirement is a zero-sized type implementing [`Concept`],
//! [`Primitive`] and [`Instantiate`]. Requirements are parameterized by the
//! slots they operate on; the defaults make the common single-slot form short
//! to write (`Addable` is `Addable<This, This, This>`).
//!
//! | Requirement | Operation | Surface |
//! |---|---|---|
//! | [`Destructible<T>`] | drop an owned `T` | [`Drop`] for [`Any`] |
//! | [`Constructible<T>`] | clone a `T` | [`Clone`] for [`Any`], [`Any::from_ref`] |
//! | [`CopyConstructible<T>`] | both of the above | |
//! | [`Assignable<T, U>`] | `*t = u.clone().into()` | [`Any::assign`], [`AnyMut::assign`] |
//! | [`Typeid<T>`] | type information of `T` | `type_info`, `downcast_*` |
//! | [`Addable<T, U, R>`] | `t + u` | [`Add`](core::ops::Add), `try_add` |
//! | [`Subtractable<T, U, R>`] | `t - u` | [`Sub`](core::ops::Sub), `try_sub` |
//! | [`Multipliable<T, U, R>`] | `t * u` | [`Mul`](core::ops::Mul), `try_mul` |
//! | [`AddAssignable<T, U>`] | `t += u` | [`AddAssign`](core::ops::AddAssign) |
//! | [`SubAssignable<T, U>`] | `t -= u` | [`SubAssign`](core::ops::SubAssign) |
//! | [`EqualityComparable<T, U>`] | `t == u` | [`PartialEq`] |
//! | [`LessThanComparable<T, U>`] | `t.partial_cmp(u)` | [`PartialOrd`] |
//! | [`Displayable<T>`] | [`Display`](core::fmt::Display) | [`Display`](core::fmt::Display) |
//! | [`Debuggable<T>`] | [`Debug`](core::fmt::Debug) | [`Debug`](core::fmt::Debug) |
//! | [`Dereferenceable<R, T>`] | `&*t` | `pointee` |
//! | [`Callable<In, Out, T>`] | `t(arg)` | `call` |
//!
//! [`Any`]: crate::Any
//! [`Any::from_ref`]: crate::Any::from_ref
//! [`Any::assign`]: crate::Any::assign
//! [`AnyMut::assign`]: crate::AnyMut::assign

use core::{
    any::TypeId,
    cmp::Ordering,
    fmt,
    marker::PhantomData,
    ops::{Add, AddAssign, Deref, Mul, Sub, SubAssign},
};

use erasure_internals::{
    Node, RawMut, RawRef, RawStorage, RequirementKey, TableBuilder, TypeInfo,
};

pub use crate::concept::{Relaxed, SameType};
use crate::{
    concept::{Concept, Instantiate, Primitive},
    slots::{Fixed, FixedType, Pointee, Resolve, Slot, SlotMap, This},
};

/// Implements [`Concept`] and [`Primitive`] for a requirement over slots.
macro_rules! primitive {
    ($name:ident<$($slot:ident),+> => $entry:ty) => {
        impl<$($slot: Slot),+> Concept for $name<$($slot),+> {
            const TREE: &'static [Node] = &[Node::Primitive(<Self as Primitive>::KEY)];
        }

        impl<$($slot: Slot),+> Primitive for $name<$($slot),+> {
            type Entry = $entry;
            const KEY: RequirementKey = RequirementKey {
                name: concat!("erasure::requirements::", stringify!($name)),
                slots: &[$(<$slot as Slot>::KEY),+],
                type_id: TypeId::of::<Self>,
            };
        }
    };
}

/// Records the concrete type of slot `S` under `M`.
fn bind<M: SlotMap, S: Resolve<M>>(builder: &mut TableBuilder) {
    builder.bind(&S::KEY, TypeInfo::of::<S::Out>());
}

/// A requirement of the form `Output = Left op Right`.
///
/// Used by [`dispatch::binary`](crate::dispatch::binary) to tie the operand
/// slots to the entry.
pub trait BinaryOperation:
    Primitive<Entry = unsafe fn(RawRef<'_>, RawRef<'_>) -> RawStorage>
{
    /// Slot of the left operand.
    type Left: Slot;
    /// Slot of the right operand.
    type Right: Slot;
    /// Slot of the result.
    type Output: Slot;
}

/// A requirement of the form `Target op= Operand`.
///
/// Used by [`dispatch::compound`](crate::dispatch::compound).
pub trait CompoundAssignment: Primitive<Entry = unsafe fn(RawMut<'_>, RawRef<'_>)> {
    /// Slot of the modified value.
    type Target: Slot;
    /// Slot of the operand.
    type Operand: Slot;
}

/// The value in slot `T` can be dropped.
pub struct Destructible<T = This>(PhantomData<fn() -> T>);

primitive!(Destructible<T> => unsafe fn(RawStorage));

/// # Safety
///
/// The storage must hold a `V`.
unsafe fn destroy<V: 'static>(storage: RawStorage) {
    // SAFETY: Guaranteed by the caller.
    let value = unsafe { storage.into_box::<V>() };
    drop(value);
}

impl<M: SlotMap, T: Resolve<M>> Instantiate<M> for Destructible<T> {
    fn instantiate(builder: &mut TableBuilder) {
        bind::<M, T>(builder);
        builder.insert(&<Self as Primitive>::KEY, destroy::<T::Out> as <Self as Primitive>::Entry);
    }
}

/// The value in slot `T` can be cloned into new storage.
pub struct Constructible<T = This>(PhantomData<fn() -> T>);

primitive!(Constructible<T> => unsafe fn(RawRef<'_>) -> RawStorage);

/// # Safety
///
/// The reference must point to a `V`.
unsafe fn construct<V: Clone + 'static>(source: RawRef<'_>) -> RawStorage {
    // SAFETY: Guaranteed by the caller.
    let source = unsafe { source.cast::<V>() };
    RawStorage::new(source.clone())
}

impl<M: SlotMap, T: Resolve<M>> Instantiate<M> for Constructible<T>
where
    T::Out: Clone,
{
    fn instantiate(builder: &mut TableBuilder) {
        bind::<M, T>(builder);
        builder.insert(
            &<Self as Primitive>::KEY,
            construct::<T::Out> as <Self as Primitive>::Entry,
        );
    }
}

/// The value in slot `T` can be cloned and dropped.
pub struct CopyConstructible<T = This>(PhantomData<fn() -> T>);

impl<T: Slot> Concept for CopyConstructible<T> {
    const TREE: &'static [Node] = <(Constructible<T>, Destructible<T>)>::TREE;
}

impl<M: SlotMap, T: Resolve<M>> Instantiate<M> for CopyConstructible<T>
where
    T::Out: Clone,
{
    fn instantiate(builder: &mut TableBuilder) {
        <(Constructible<T>, Destructible<T>) as Instantiate<M>>::instantiate(builder);
    }
}

/// The value in slot `U` can be assigned to the value in slot `T`.
pub struct Assignable<T = This, U = T>(PhantomData<fn() -> (T, U)>);

primitive!(Assignable<T, U> => unsafe fn(RawMut<'_>, RawRef<'_>));

impl<T: Slot, U: Slot> CompoundAssignment for Assignable<T, U> {
    type Target = T;
    type Operand = U;
}

/// # Safety
///
/// `target` must point to a `V` and `source` to a `W`.
unsafe fn assign<V: 'static, W: Clone + Into<V> + 'static>(target: RawMut<'_>, source: RawRef<'_>) {
    // SAFETY: Guaranteed by the caller.
    let source = unsafe { source.cast::<W>() };
    // SAFETY: Guaranteed by the caller.
    let target = unsafe { target.cast::<V>() };
    *target = source.clone().into();
}

impl<M: SlotMap, T: Resolve<M>, U: Resolve<M>> Instantiate<M> for Assignable<T, U>
where
    U::Out: Clone + Into<T::Out>,
{
    fn instantiate(builder: &mut TableBuilder) {
        bind::<M, T>(builder);
        bind::<M, U>(builder);
        builder.insert(
            &<Self as Primitive>::KEY,
            assign::<T::Out, U::Out> as <Self as Primitive>::Entry,
        );
    }
}

/// Type information of the value in slot `T` is available at runtime.
///
/// Relaxed concepts carry this requirement for every slot implicitly.
pub struct Typeid<T = This>(PhantomData<fn() -> T>);

primitive!(Typeid<T> => TypeInfo);

impl<M: SlotMap, T: Resolve<M>> Instantiate<M> for Typeid<T> {
    fn instantiate(builder: &mut TableBuilder) {
        bind::<M, T>(builder);
        builder.insert(&<Self as Primitive>::KEY, TypeInfo::of::<T::Out>());
    }
}

/// Declares a binary operator requirement `R = T op U`.
macro_rules! binary_operator {
    ($(#[$meta:meta])* $name:ident, $op:ident, $method:ident, $entry_fn:ident) => {
        $(#[$meta])*
        pub struct $name<T = This, U = T, R = T>(PhantomData<fn() -> (T, U, R)>);

        primitive!($name<T, U, R> => unsafe fn(RawRef<'_>, RawRef<'_>) -> RawStorage);

        impl<T: Slot, U: Slot, R: Slot> BinaryOperation for $name<T, U, R> {
            type Left = T;
            type Right = U;
            type Output = R;
        }

        /// # Safety
        ///
        /// `left` must point to a `V` and `right` to a `W`.
        unsafe fn $entry_fn<V, W>(left: RawRef<'_>, right: RawRef<'_>) -> RawStorage
        where
            V: Clone + $op<W> + 'static,
            W: Clone + 'static,
            V::Output: 'static,
        {
            // SAFETY: Guaranteed by the caller.
            let left = unsafe { left.cast::<V>() };
            // SAFETY: Guaranteed by the caller.
            let right = unsafe { right.cast::<W>() };
            RawStorage::new(left.clone().$method(right.clone()))
        }

        impl<M, T, U, R> Instantiate<M> for $name<T, U, R>
        where
            M: SlotMap,
            T: Resolve<M>,
            U: Resolve<M>,
            R: Resolve<M>,
            T::Out: Clone + $op<U::Out, Output = R::Out>,
            U::Out: Clone,
        {
            fn instantiate(builder: &mut TableBuilder) {
                bind::<M, T>(builder);
                bind::<M, U>(builder);
                bind::<M, R>(builder);
                builder.insert(
                    &<Self as Primitive>::KEY,
                    $entry_fn::<T::Out, U::Out> as <Self as Primitive>::Entry,
                );
            }
        }
    };
}

binary_operator!(
    /// `T + U` yields an `R`.
    Addable, Add, add, add_entry
);
binary_operator!(
    /// `T - U` yields an `R`.
    Subtractable, Sub, sub, sub_entry
);
binary_operator!(
    /// `T * U` yields an `R`.
    Multipliable, Mul, mul, mul_entry
);

/// Declares a compound assignment requirement `T op= U`.
macro_rules! compound_assignment {
    ($(#[$meta:meta])* $name:ident, $op:ident, $method:ident, $entry_fn:ident) => {
        $(#[$meta])*
        pub struct $name<T = This, U = T>(PhantomData<fn() -> (T, U)>);

        primitive!($name<T, U> => unsafe fn(RawMut<'_>, RawRef<'_>));

        impl<T: Slot, U: Slot> CompoundAssignment for $name<T, U> {
            type Target = T;
            type Operand = U;
        }

        /// # Safety
        ///
        /// `target` must point to a `V` and `operand` to a `W`.
        unsafe fn $entry_fn<V, W>(target: RawMut<'_>, operand: RawRef<'_>)
        where
            V: $op<W> + 'static,
            W: Clone + 'static,
        {
            // SAFETY: Guaranteed by the caller.
            let operand = unsafe { operand.cast::<W>() };
            // SAFETY: Guaranteed by the caller.
            let target = unsafe { target.cast::<V>() };
            target.$method(operand.clone());
        }

        impl<M, T, U> Instantiate<M> for $name<T, U>
        where
            M: SlotMap,
            T: Resolve<M>,
            U: Resolve<M>,
            T::Out: $op<U::Out>,
            U::Out: Clone,
        {
            fn instantiate(builder: &mut TableBuilder) {
                bind::<M, T>(builder);
                bind::<M, U>(builder);
                builder.insert(
                    &<Self as Primitive>::KEY,
                    $entry_fn::<T::Out, U::Out> as <Self as Primitive>::Entry,
                );
            }
        }
    };
}

compound_assignment!(
    /// `T += U`.
    AddAssignable, AddAssign, add_assign, add_assign_entry
);
compound_assignment!(
    /// `T -= U`.
    SubAssignable, SubAssign, sub_assign, sub_assign_entry
);

/// `T == U`.
pub struct EqualityComparable<T = This, U = T>(PhantomData<fn() -> (T, U)>);

primitive!(EqualityComparable<T, U> => unsafe fn(RawRef<'_>, RawRef<'_>) -> bool);

/// # Safety
///
/// `left` must point to a `V` and `right` to a `W`.
unsafe fn equals<V: PartialEq<W> + 'static, W: 'static>(left: RawRef<'_>, right: RawRef<'_>) -> bool {
    // SAFETY: Guaranteed by the caller.
    let left = unsafe { left.cast::<V>() };
    // SAFETY: Guaranteed by the caller.
    let right = unsafe { right.cast::<W>() };
    left == right
}

impl<M: SlotMap, T: Resolve<M>, U: Resolve<M>> Instantiate<M> for EqualityComparable<T, U>
where
    T::Out: PartialEq<U::Out>,
{
    fn instantiate(builder: &mut TableBuilder) {
        bind::<M, T>(builder);
        bind::<M, U>(builder);
        builder.insert(
            &<Self as Primitive>::KEY,
            equals::<T::Out, U::Out> as <Self as Primitive>::Entry,
        );
    }
}

/// `T` and `U` have a partial order.
pub struct LessThanComparable<T = This, U = T>(PhantomData<fn() -> (T, U)>);

primitive!(LessThanComparable<T, U> => unsafe fn(RawRef<'_>, RawRef<'_>) -> Option<Ordering>);

/// # Safety
///
/// `left` must point to a `V` and `right` to a `W`.
unsafe fn compare<V: PartialOrd<W> + 'static, W: 'static>(
    left: RawRef<'_>,
    right: RawRef<'_>,
) -> Option<Ordering> {
    // SAFETY: Guaranteed by the caller.
    let left = unsafe { left.cast::<V>() };
    // SAFETY: Guaranteed by the caller.
    let right = unsafe { right.cast::<W>() };
    left.partial_cmp(right)
}

impl<M: SlotMap, T: Resolve<M>, U: Resolve<M>> Instantiate<M> for LessThanComparable<T, U>
where
    T::Out: PartialOrd<U::Out>,
{
    fn instantiate(builder: &mut TableBuilder) {
        bind::<M, T>(builder);
        bind::<M, U>(builder);
        builder.insert(
            &<Self as Primitive>::KEY,
            compare::<T::Out, U::Out> as <Self as Primitive>::Entry,
        );
    }
}

/// Declares a formatting requirement.
macro_rules! formatting {
    ($(#[$meta:meta])* $name:ident, $fmt_trait:ident, $entry_fn:ident) => {
        $(#[$meta])*
        pub struct $name<T = This>(PhantomData<fn() -> T>);

        primitive!($name<T> => unsafe fn(RawRef<'_>, &mut fmt::Formatter<'_>) -> fmt::Result);

        /// # Safety
        ///
        /// `value` must point to a `V`.
        unsafe fn $entry_fn<V: fmt::$fmt_trait + 'static>(
            value: RawRef<'_>,
            formatter: &mut fmt::Formatter<'_>,
        ) -> fmt::Result {
            // SAFETY: Guaranteed by the caller.
            let value = unsafe { value.cast::<V>() };
            fmt::$fmt_trait::fmt(value, formatter)
        }

        impl<M: SlotMap, T: Resolve<M>> Instantiate<M> for $name<T>
        where
            T::Out: fmt::$fmt_trait,
        {
            fn instantiate(builder: &mut TableBuilder) {
                bind::<M, T>(builder);
                builder.insert(
                    &<Self as Primitive>::KEY,
                    $entry_fn::<T::Out> as <Self as Primitive>::Entry,
                );
            }
        }
    };
}

formatting!(
    /// `T` implements [`Display`](fmt::Display).
    Displayable, Display, display_entry
);
formatting!(
    /// `T` implements [`Debug`](fmt::Debug).
    Debuggable, Debug, debug_entry
);

/// The value in slot `T` dereferences to the value in slot `R`.
///
/// `R` is usually [`Pointee<T>`](crate::slots::Pointee), but may be any slot
/// bound to the target type.
pub struct Dereferenceable<R = Pointee, T = This>(PhantomData<fn() -> (R, T)>);

primitive!(Dereferenceable<R, T> => unsafe fn(RawRef<'_>) -> RawRef<'_>);

/// # Safety
///
/// `value` must point to a `P`.
unsafe fn dereference<'a, P>(value: RawRef<'a>) -> RawRef<'a>
where
    P: Deref + 'static,
    P::Target: Sized + 'static,
{
    // SAFETY: Guaranteed by the caller.
    let value = unsafe { value.cast::<P>() };
    RawRef::new(value.deref())
}

impl<M: SlotMap, R: Resolve<M>, T: Resolve<M>> Instantiate<M> for Dereferenceable<R, T>
where
    T::Out: Deref<Target = R::Out>,
{
    fn instantiate(builder: &mut TableBuilder) {
        bind::<M, R>(builder);
        bind::<M, T>(builder);
        builder.insert(
            &<Self as Primitive>::KEY,
            dereference::<T::Out> as <Self as Primitive>::Entry,
        );
    }
}

/// The value in slot `T` can be called with an `In`, returning an `Out`.
///
/// `In` and `Out` are concrete types passed through unerased, identified as
/// [`Fixed`] slots.
pub struct Callable<In, Out, T = This>(PhantomData<fn(In) -> (Out, T)>);

impl<In: FixedType, Out: FixedType, T: Slot> Concept for Callable<In, Out, T> {
    const TREE: &'static [Node] = &[Node::Primitive(<Self as Primitive>::KEY)];
}

impl<In: FixedType, Out: FixedType, T: Slot> Primitive for Callable<In, Out, T> {
    type Entry = unsafe fn(RawRef<'_>, In) -> Out;
    const KEY: RequirementKey = RequirementKey {
        name: "erasure::requirements::Callable",
        slots: &[
            T::KEY,
            <Fixed<In> as Slot>::KEY,
            <Fixed<Out> as Slot>::KEY,
        ],
        type_id: TypeId::of::<Self>,
    };
}

/// # Safety
///
/// `function` must point to an `F`.
unsafe fn call<F: Fn(In) -> Out + 'static, In, Out>(function: RawRef<'_>, argument: In) -> Out {
    // SAFETY: Guaranteed by the caller.
    let function = unsafe { function.cast::<F>() };
    function(argument)
}

impl<M: SlotMap, In: FixedType, Out: FixedType, T: Resolve<M>> Instantiate<M>
    for Callable<In, Out, T>
where
    T::Out: Fn(In) -> Out,
{
    fn instantiate(builder: &mut TableBuilder) {
        bind::<M, T>(builder);
        builder.insert(
            &<Self as Primitive>::KEY,
            call::<T::Out, In, Out> as <Self as Primitive>::Entry,
        );
    }
}

#[cfg(test)]
mod tests {
    use erasure_internals::{TYPEID_REQUIREMENT, membership::str_eq};

    use super::*;
    use crate::{concept::declares, slots::SlotA};

    #[test]
    fn test_typeid_name_matches_injected_requirement() {
        const {
            assert!(str_eq(<Typeid as Primitive>::KEY.name, TYPEID_REQUIREMENT));
        }
    }

    #[test]
    fn test_requirement_keys() {
        let key = <Addable<This, SlotA, Fixed<i32>> as Primitive>::KEY;
        assert_eq!(key.name, "erasure::requirements::Addable");
        assert_eq!(key.slots.len(), 3);
        assert_eq!((key.type_id)(), TypeId::of::<Addable<This, SlotA, Fixed<i32>>>());
        assert_ne!(
            (<Callable<u8, u8> as Primitive>::KEY.type_id)(),
            (<Callable<u16, u8> as Primitive>::KEY.type_id)()
        );
    }

    #[test]
    fn test_composite_requirements() {
        const {
            assert!(declares::<CopyConstructible, Constructible>());
            assert!(declares::<CopyConstructible, Destructible>());
            assert!(!declares::<CopyConstructible<SlotA>, Destructible>());
            assert!(declares::<(Addable, Relaxed), Typeid>());
        }
    }

    #[test]
    fn test_fixed_slots_distinguish_requirements() {
        type Doubling = (Destructible, Callable<u32, u32>, Addable<This, This, Fixed<u64>>);
        const {
            assert!(declares::<Doubling, Callable<u32, u32>>());
            assert!(!declares::<Doubling, Callable<u8, u8>>());
            assert!(!declares::<Doubling, Callable<u32, u64>>());
            assert!(declares::<Doubling, Addable<This, This, Fixed<u64>>>());
            assert!(!declares::<Doubling, Addable<This, This, Fixed<u32>>>());
        }
    }
}
