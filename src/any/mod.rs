//! Erased values.
//!
//! Three flavors share one binding model:
//!
//! - [`Any<C, S>`] owns a value of any type bound to slot `S` of the concept
//!   `C`.
//! - [`AnyRef<'a, C, S>`] is a shared reference to such a value.
//! - [`AnyMut<'a, C, S>`] is a mutable reference to such a value.
//!
//! Every flavor carries a [`Binding<C>`](crate::Binding). Operations combine
//! values only if their bindings are equal; see [`dispatch`](crate::dispatch).
//! Whether the concept declares an operation is checked at compile time, so
//! calling `+` on an `Any` whose concept lacks [`Addable`] does not build:
//!
//! ```compile_fail
//! use erasure::{Any, requirements::CopyConstructible};
//!
//! let left: Any<CopyConstructible> = Any::new(1);
//! let right: Any<CopyConstructible> = Any::new(2);
//! let _ = &left + &right;
//! ```
//!
//! Likewise, a concept must be able to drop the values it owns, including
//! the results of its operations:
//!
//! ```compile_fail
//! use erasure::{Any, requirements::Typeid};
//!
//! let _value: Any<Typeid> = Any::new(1);
//! ```
//!
//! ```compile_fail
//! use erasure::{
//!     AnyRef,
//!     requirements::{Addable, Typeid},
//! };
//!
//! type NoDrop = (Addable, Typeid);
//!
//! let (one, two) = (1_i32, 2_i32);
//! let left: AnyRef<'_, NoDrop> = AnyRef::new(&one);
//! let right: AnyRef<'_, NoDrop> = AnyRef::new(&two);
//! let _sum = &left + &right;
//! ```
//!
//! Concrete argument and result types are part of a requirement, so a
//! function declared over `u32` cannot be called with a `u8`:
//!
//! ```compile_fail
//! use erasure::{
//!     Any,
//!     requirements::{Callable, Destructible},
//! };
//!
//! type Doubling = (Destructible, Callable<u32, u32>);
//!
//! let double: Any<Doubling> = Any::new(|n: u32| n * 2);
//! let _ = double.call::<u8, u8>(1);
//! ```
//!
//! [`Addable`]: crate::requirements::Addable

/// Asserts at compile time that the concept `$c` declares `$r`.
macro_rules! require {
    ($c:ty, $r:ty, $message:literal) => {
        const { assert!($crate::concept::declares::<$c, $r>(), $message) }
    };
}

mod mut_;
mod ops;
mod owned;
mod ref_;

use core::any::type_name;

use erasure_internals::TypeInfo;

pub use self::{mut_::AnyMut, owned::Any, ref_::AnyRef};
use crate::{
    binding::{Binding, Renaming},
    concept::Concept,
    error::BadDispatch,
    slots::Slot,
};

/// Checks that `binding` assigns `T` to the slot `S`.
fn check_type<C: Concept, S: Slot, T: 'static>(binding: &Binding<C>) -> Result<(), BadDispatch> {
    match binding.type_of::<S>() {
        Some(expected) if expected == TypeInfo::of::<T>() => Ok(()),
        expected => Err(BadDispatch::WrongType {
            expected: expected.map_or("<unbound>", |info| info.name()),
            actual: type_name::<T>(),
        }),
    }
}

/// Converts the binding of a value in slot `S` of `C` to slot `S2` of `D`.
///
/// # Panics
///
/// Panics if the converted binding does not assign the value's type to `S2`,
/// or if a same-type constraint of `D` does not hold.
#[track_caller]
fn convert_binding<C, S, D, Ren, S2>(binding: &Binding<C>) -> Binding<D>
where
    C: Concept,
    S: Slot,
    D: Concept,
    Ren: Renaming,
    S2: Slot,
{
    let converted = match binding.convert::<D, Ren>() {
        Ok(converted) => converted,
        Err(error) => panic!(
            "cannot convert `{}` to `{}`: {error}",
            type_name::<C>(),
            type_name::<D>()
        ),
    };
    let source = binding.type_of::<S>();
    let target = converted.type_of::<S2>();
    if source.is_none() || source != target {
        panic!(
            "cannot convert `{}` to `{}`: the value has type `{}`, but the target slot holds `{}`",
            type_name::<C>(),
            type_name::<D>(),
            source.map_or("<unbound>", |info| info.name()),
            target.map_or("<unbound>", |info| info.name()),
        );
    }
    converted
}
