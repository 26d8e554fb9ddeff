//! Slots, slot maps and slot resolution.
//!
//! A concept is written over *slots*: names for the concrete types an erased
//! value works with. Requirements such as [`Addable<This,
//! SlotA>`](crate::requirements::Addable) mention slots instead of types, and a
//! [`Binding`](crate::Binding) fixes one concrete type per slot.
//!
//! # Slot Kinds
//!
//! - **Placeholders**: [`This`], [`SlotA`], [`SlotB`], [`SlotC`] and
//!   [`SlotD`]. They are interchangeable; [`This`] is merely the default slot
//!   of an erased value.
//! - **[`Fixed<T>`]**: always the concrete type `T`. Useful for requirements
//!   whose operands or results are not erased, e.g. `Addable<This,
//!   Fixed<i32>>`.
//! - **[`Deduced<F>`]**: the type computed by the metafunction `F` from the
//!   type of another slot, e.g. [`Pointee<This>`] for the target of a smart
//!   pointer.
//!
//! # Slot Maps
//!
//! A [`SlotMap`] assigns concrete types to placeholders at the type level.
//! [`Bindings`] is the only implementation; every position is either
//! [`Bound<T>`] or [`Unbound`]. Resolving an unbound placeholder does not
//! type-check, so a concept can only be instantiated with a map that binds
//! every placeholder it mentions.
//!
//! ```
//! use erasure::{
//!     Binding,
//!     requirements::{Addable, Destructible},
//!     slots::{Bindings, Bound, SlotA, This},
//! };
//!
//! type Mixed = (Destructible<This>, Destructible<SlotA>, Addable<This, SlotA>);
//!
//! let binding = Binding::<Mixed>::new::<Bindings<Bound<i64>, Bound<i64>>>();
//! assert_eq!(binding.type_of::<SlotA>().unwrap().name(), "i64");
//! ```

use core::{any::TypeId, marker::PhantomData, ops::Deref};

use erasure_internals::SlotKey;

/// A name for a concrete type within a concept.
pub trait Slot: 'static {
    /// The `const` description of this slot.
    const KEY: SlotKey;
}

/// A slot that a [`SlotMap`] can bind.
pub trait Placeholder: Slot {
    /// `M` with this placeholder bound to `T`.
    type Insert<M: SlotMap, T: 'static>: SlotMap;
}

/// Resolution of a slot to a concrete type under a slot map.
#[diagnostic::on_unimplemented(
    message = "the slot `{Self}` has no concrete type under `{M}`",
    note = "bind every placeholder the concept mentions"
)]
pub trait Resolve<M: SlotMap>: Slot {
    /// The concrete type.
    type Out: 'static;
}

/// An assignment of concrete types to placeholders.
pub trait SlotMap: 'static {
    /// The entry for [`This`].
    type This: 'static;
    /// The entry for [`SlotA`].
    type A: 'static;
    /// The entry for [`SlotB`].
    type B: 'static;
    /// The entry for [`SlotC`].
    type C: 'static;
    /// The entry for [`SlotD`].
    type D: 'static;
}

/// A slot map entry holding a concrete type.
pub trait BoundTo {
    /// The concrete type.
    type Type: 'static;
}

/// Slot map entry: the placeholder is bound to `T`.
pub struct Bound<T>(PhantomData<fn() -> T>);

/// Slot map entry: the placeholder has no type.
#[derive(Debug, Clone, Copy)]
pub struct Unbound;

impl<T: 'static> BoundTo for Bound<T> {
    type Type = T;
}

/// The slot map with the given entries, one per placeholder.
pub struct Bindings<T = Unbound, A = Unbound, B = Unbound, C = Unbound, D = Unbound>(
    PhantomData<fn() -> (T, A, B, C, D)>,
);

impl<T: 'static, A: 'static, B: 'static, C: 'static, D: 'static> SlotMap
    for Bindings<T, A, B, C, D>
{
    type This = T;
    type A = A;
    type B = B;
    type C = C;
    type D = D;
}

/// The slot map binding no placeholder.
pub type Empty = Bindings;

/// The slot map binding only `S` to `T`.
pub type Single<S, T> = <S as Placeholder>::Insert<Empty, T>;

macro_rules! placeholder {
    (
        $(#[$meta:meta])*
        $name:ident = $index:literal,
        $field:ident,
        <$m:ident, $t:ident> $insert:ty
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub struct $name;

        impl Slot for $name {
            const KEY: SlotKey = SlotKey::Placeholder($index);
        }

        impl Placeholder for $name {
            type Insert<$m: SlotMap, $t: 'static> = $insert;
        }

        impl<M: SlotMap> Resolve<M> for $name
        where
            M::$field: BoundTo,
        {
            type Out = <M::$field as BoundTo>::Type;
        }
    };
}

placeholder!(
    /// The default slot of an erased value.
    This = 0, This, <M, T> Bindings<Bound<T>, M::A, M::B, M::C, M::D>
);
placeholder!(
    /// The first additional placeholder.
    SlotA = 1, A, <M, T> Bindings<M::This, Bound<T>, M::B, M::C, M::D>
);
placeholder!(
    /// The second additional placeholder.
    SlotB = 2, B, <M, T> Bindings<M::This, M::A, Bound<T>, M::C, M::D>
);
placeholder!(
    /// The third additional placeholder.
    SlotC = 3, C, <M, T> Bindings<M::This, M::A, M::B, Bound<T>, M::D>
);
placeholder!(
    /// The fourth additional placeholder.
    SlotD = 4, D, <M, T> Bindings<M::This, M::A, M::B, M::C, Bound<T>>
);

/// A concrete type that can appear in a [`Fixed`] slot.
///
/// Whether a concept declares a requirement is decided at compile time, where
/// [`TypeId`]s cannot be compared, so fixed slots are told apart by
/// [`NAME`](FixedType::NAME). Implement this trait with [`fixed_type!`].
///
/// [`fixed_type!`]: crate::fixed_type
#[diagnostic::on_unimplemented(
    message = "`{Self}` cannot be used in a `Fixed` slot",
    note = "implement `FixedType` for `{Self}` with `erasure::fixed_type!`"
)]
pub trait FixedType: 'static {
    /// Name identifying the type. Distinct types must have distinct names.
    const NAME: &'static str;
}

/// Implements [`FixedType`](crate::slots::FixedType) for the listed types,
/// naming each by its path in the calling module.
///
/// ```
/// use erasure::{
///     Any,
///     requirements::{Callable, Destructible},
/// };
///
/// #[derive(Debug, PartialEq)]
/// struct Celsius(f64);
///
/// erasure::fixed_type!(Celsius);
///
/// type Conversion = (Destructible, Callable<f64, Celsius>);
///
/// let convert: Any<Conversion> = Any::new(|kelvin: f64| Celsius(kelvin - 273.15));
/// assert_eq!(convert.call::<f64, Celsius>(273.15), Celsius(0.0));
/// ```
#[macro_export]
macro_rules! fixed_type {
    ($($ty:ident),+ $(,)?) => {
        $(
            impl $crate::slots::FixedType for $ty {
                const NAME: &'static str = concat!(module_path!(), "::", stringify!($ty));
            }
        )+
    };
}

macro_rules! builtin_fixed_type {
    ($($ty:ty => $name:literal),+ $(,)?) => {
        $(
            impl FixedType for $ty {
                const NAME: &'static str = $name;
            }
        )+
    };
}

builtin_fixed_type!(
    () => "()",
    bool => "bool",
    char => "char",
    u8 => "u8",
    u16 => "u16",
    u32 => "u32",
    u64 => "u64",
    u128 => "u128",
    usize => "usize",
    i8 => "i8",
    i16 => "i16",
    i32 => "i32",
    i64 => "i64",
    i128 => "i128",
    isize => "isize",
    f32 => "f32",
    f64 => "f64",
    &'static str => "&str",
    alloc::string::String => "alloc::string::String",
);

/// A slot that always stands for the concrete type `T`.
pub struct Fixed<T>(PhantomData<fn() -> T>);

impl<T: FixedType> Slot for Fixed<T> {
    const KEY: SlotKey = SlotKey::Fixed {
        name: T::NAME,
        id: TypeId::of::<T>,
    };
}

impl<M: SlotMap, T: FixedType> Resolve<M> for Fixed<T> {
    type Out = T;
}

/// A metafunction from the type of one slot to another type.
///
/// Implement [`Evaluate`] for every slot map under which the metafunction is
/// defined.
pub trait Deduce: 'static {
    /// Fully qualified name identifying the metafunction.
    const NAME: &'static str;
    /// The slot the metafunction is applied to.
    type Arg: Slot;
}

/// Evaluation of a [`Deduce`] metafunction under a slot map.
pub trait Evaluate<M: SlotMap>: Deduce {
    /// The computed type.
    type Out: 'static;
}

/// The slot holding the result of the metafunction `F`.
pub struct Deduced<F>(PhantomData<fn() -> F>);

impl<F: Deduce> Slot for Deduced<F> {
    const KEY: SlotKey = SlotKey::Deduced {
        name: F::NAME,
        arg: &<F::Arg as Slot>::KEY,
    };
}

impl<M: SlotMap, F: Evaluate<M>> Resolve<M> for Deduced<F> {
    type Out = F::Out;
}

/// Metafunction computing [`Deref::Target`] of a slot's type.
pub struct PointeeOf<S = This>(PhantomData<fn() -> S>);

impl<S: Slot> Deduce for PointeeOf<S> {
    const NAME: &'static str = "erasure::slots::PointeeOf";
    type Arg = S;
}

impl<M: SlotMap, S: Resolve<M>> Evaluate<M> for PointeeOf<S>
where
    S::Out: Deref,
    <S::Out as Deref>::Target: Sized + 'static,
{
    type Out = <S::Out as Deref>::Target;
}

/// The slot holding the target type of the smart pointer in slot `S`.
pub type Pointee<S = This> = Deduced<PointeeOf<S>>;

#[cfg(test)]
mod tests {
    use alloc::boxed::Box;

    use super::*;

    fn resolved<S: Resolve<M>, M: SlotMap>() -> TypeId {
        TypeId::of::<S::Out>()
    }

    #[test]
    fn test_placeholder_keys() {
        assert!(matches!(This::KEY, SlotKey::Placeholder(0)));
        assert!(matches!(SlotA::KEY, SlotKey::Placeholder(1)));
        assert!(matches!(SlotD::KEY, SlotKey::Placeholder(4)));
        assert!(matches!(
            Pointee::<SlotB>::KEY,
            SlotKey::Deduced {
                name: "erasure::slots::PointeeOf",
                arg: SlotKey::Placeholder(2),
            }
        ));
    }

    #[test]
    fn test_single_binds_one_placeholder() {
        assert_eq!(resolved::<This, Single<This, u8>>(), TypeId::of::<u8>());
        assert_eq!(resolved::<SlotC, Single<SlotC, u8>>(), TypeId::of::<u8>());
        type Two = <SlotB as Placeholder>::Insert<Single<This, u8>, u16>;
        assert_eq!(resolved::<This, Two>(), TypeId::of::<u8>());
        assert_eq!(resolved::<SlotB, Two>(), TypeId::of::<u16>());
    }

    #[test]
    fn test_fixed_keys_are_named() {
        struct Local;
        crate::fixed_type!(Local);

        assert!(matches!(Fixed::<u64>::KEY, SlotKey::Fixed { name: "u64", .. }));
        assert!(Local::NAME.ends_with("::Local"));
        assert!(Local::NAME.starts_with("erasure::slots"));
    }

    #[test]
    fn test_fixed_and_deduced_resolution() {
        assert_eq!(resolved::<Fixed<i8>, Empty>(), TypeId::of::<i8>());
        assert_eq!(
            resolved::<Pointee, Single<This, Box<u32>>>(),
            TypeId::of::<u32>()
        );
    }

    static_assertions::assert_impl_all!(Bindings<Bound<u8>>: SlotMap);
    static_assertions::assert_impl_all!(This: Resolve<Single<This, u8>>);
    static_assertions::assert_not_impl_any!(SlotA: Resolve<Single<This, u8>>);
}
