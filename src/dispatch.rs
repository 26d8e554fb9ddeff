//! The dispatch protocol.
//!
//! Every operation on erased values follows the same steps:
//!
//! 1. **Match**: all operands must carry equal bindings
//!    ([`require_match`]). Values of different concrete types never reach an
//!    entry, for strict and relaxed concepts alike.
//! 2. **Look up**: the entry of the requirement is read from the shared table
//!    ([`entry`]). Whether the concept declares the requirement is checked at
//!    compile time.
//! 3. **Unwrap**: slot arguments are passed as
//!    [`RawRef`](crate::internals::RawRef)/[`RawMut`](crate::internals::RawMut);
//!    arguments of concrete types pass through unchanged.
//! 4. **Rewrap**: results in a placeholder or deduced slot become an
//!    [`Any`] sharing the operands' binding; results in a [`Fixed<T>`] slot
//!    are returned as `T` ([`Rewrap`]).
//!
//! Requirement-specific surfaces such as [`Add`](core::ops::Add) for [`Any`]
//! are thin wrappers around [`binary`] and [`compound`].
//!
//! # Examples
//!
//! ```
//! use erasure::{
//!     Any, dispatch,
//!     requirements::{Addable, CopyConstructible},
//!     slots::{Fixed, This},
//! };
//!
//! type Widening = (CopyConstructible, Addable<This, This, Fixed<i32>>);
//!
//! #[derive(Clone, Copy)]
//! struct Small(i8);
//! impl core::ops::Add for Small {
//!     type Output = i32;
//!     fn add(self, rhs: Small) -> i32 {
//!         i32::from(self.0) + i32::from(rhs.0)
//!     }
//! }
//!
//! let left: Any<Widening> = Any::new(Small(2));
//! let right: Any<Widening> = Any::new(Small(40));
//! let sum: i32 =
//!     dispatch::binary::<Addable<This, This, Fixed<i32>>, _>(&left.as_ref(), &right.as_ref())
//!         .unwrap();
//! assert_eq!(sum, 42);
//! ```

use core::any::type_name;

use erasure_internals::RawStorage;

use crate::{
    any::{Any, AnyMut, AnyRef},
    binding::Binding,
    concept::{Concept, Primitive, declares},
    error::BadDispatch,
    requirements::{BinaryOperation, CompoundAssignment},
    slots::{Deduced, Fixed, FixedType, SlotA, SlotB, SlotC, SlotD, This},
};

/// Checks that all bindings are equal and returns the first one.
///
/// # Errors
///
/// - [`BadDispatch::NoOperands`] if `bindings` is empty.
/// - [`BadDispatch::Mismatch`] naming the first slot whose concrete types
///   differ.
pub fn require_match<'b, C: Concept>(
    bindings: &[&'b Binding<C>],
) -> Result<&'b Binding<C>, BadDispatch> {
    let Some((first, rest)) = bindings.split_first() else {
        return Err(BadDispatch::NoOperands);
    };
    for other in rest {
        if *first != *other {
            let (left, right) = first
                .as_raw()
                .first_difference(other.as_raw())
                .map_or(("<unknown>", "<unknown>"), |(left, right)| {
                    (left.name(), right.name())
                });
            let error = BadDispatch::Mismatch { left, right };
            tracing::debug!(concept = type_name::<C>(), %error, "dispatch failed");
            return Err(error);
        }
    }
    Ok(*first)
}

/// Matches the bindings and returns the entry of requirement `R`.
///
/// Fails to compile if `C` does not declare `R`.
///
/// # Errors
///
/// Returns the errors of [`require_match`], or
/// [`BadDispatch::MissingRequirement`] if the table has no entry for `R`.
pub fn entry<C: Concept, R: Primitive>(bindings: &[&Binding<C>]) -> Result<R::Entry, BadDispatch> {
    const {
        assert!(
            declares::<C, R>(),
            "the concept does not declare the requirement of this operation"
        );
    }
    require_match(bindings)?.entry::<R>().inspect_err(|error| {
        tracing::debug!(
            concept = type_name::<C>(),
            requirement = type_name::<R>(),
            %error,
            "dispatch failed"
        );
    })
}

/// Applies the binary operation `Op` to two erased values.
///
/// # Errors
///
/// Returns the errors of [`entry`].
pub fn binary<Op, C>(
    left: &AnyRef<'_, C, Op::Left>,
    right: &AnyRef<'_, C, Op::Right>,
) -> Result<<Op::Output as Rewrap<C>>::Output, BadDispatch>
where
    Op: BinaryOperation,
    C: Concept,
    Op::Output: Rewrap<C>,
{
    let operation = entry::<C, Op>(&[left.binding(), right.binding()])?;
    // SAFETY: Both bindings are equal, so the entry was instantiated for the
    // concrete types the binding assigns to `Op::Left` and `Op::Right`, which
    // are the types of the operands.
    let result = unsafe { operation(left.as_raw(), right.as_raw()) };
    // SAFETY: The entry returns storage holding the concrete type the binding
    // assigns to `Op::Output`.
    Ok(unsafe { <Op::Output as Rewrap<C>>::rewrap(result, left.binding()) })
}

/// Applies the compound assignment `Op` to a target and an operand.
///
/// # Errors
///
/// Returns the errors of [`entry`]. The target is not modified on error.
pub fn compound<Op, C>(
    target: &mut AnyMut<'_, C, Op::Target>,
    operand: &AnyRef<'_, C, Op::Operand>,
) -> Result<(), BadDispatch>
where
    Op: CompoundAssignment,
    C: Concept,
{
    let operation = entry::<C, Op>(&[target.binding(), operand.binding()])?;
    // SAFETY: Both bindings are equal, so the entry was instantiated for the
    // concrete types of the target and the operand. The target is borrowed
    // mutably, so the operand cannot alias it.
    unsafe { operation(target.as_raw_mut(), operand.as_raw()) };
    Ok(())
}

/// Unwraps a dispatch result in operations whose signature cannot return
/// errors.
#[track_caller]
pub(crate) fn dispatched<T>(result: Result<T, BadDispatch>) -> T {
    match result {
        Ok(value) => value,
        Err(error) => panic!("{error}"),
    }
}

/// Conversion of an operation result back to a caller-visible value.
pub trait Rewrap<C: Concept>: crate::slots::Slot {
    /// The caller-visible result type.
    type Output;

    /// Wraps `storage`.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `storage` holds a value of the concrete type `binding` assigns to
    ///    `Self`.
    unsafe fn rewrap(storage: RawStorage, binding: &Binding<C>) -> Self::Output;
}

impl<C: Concept, T: FixedType> Rewrap<C> for Fixed<T> {
    type Output = T;

    unsafe fn rewrap(storage: RawStorage, _binding: &Binding<C>) -> T {
        // SAFETY: Guaranteed by the caller: the concrete type of `Fixed<T>` is
        // always `T`.
        let value = unsafe { storage.into_box::<T>() };
        *value
    }
}

macro_rules! rewrap_erased {
    ($($slot:ty => [$($generics:tt)*]),+ $(,)?) => {
        $(
            impl<C: Concept, $($generics)*> Rewrap<C> for $slot {
                type Output = Any<C, $slot>;

                unsafe fn rewrap(storage: RawStorage, binding: &Binding<C>) -> Any<C, $slot> {
                    // SAFETY: Guaranteed by the caller.
                    unsafe { Any::from_parts(storage, binding.clone()) }
                }
            }
        )+
    };
}

rewrap_erased!(
    This => [],
    SlotA => [],
    SlotB => [],
    SlotC => [],
    SlotD => [],
    Deduced<F> => [F: crate::slots::Deduce],
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        requirements::{Addable, CopyConstructible, Typeid},
        slots::Single,
    };

    type Arith = (CopyConstructible, Addable, Typeid);

    #[test]
    fn test_require_match() {
        let first = Binding::<Arith>::new::<Single<This, i32>>();
        let second = Binding::<Arith>::new::<Single<This, i32>>();
        let other = Binding::<Arith>::new::<Single<This, u64>>();

        assert!(require_match(&[&first, &second]).is_ok());
        assert_eq!(
            require_match::<Arith>(&[]).err(),
            Some(BadDispatch::NoOperands)
        );
        assert_eq!(
            require_match(&[&first, &second, &other]).err(),
            Some(BadDispatch::Mismatch {
                left: "i32",
                right: "u64"
            })
        );
    }

    #[test]
    fn test_entry() {
        let binding = Binding::<Arith>::new::<Single<This, i32>>();
        let info = entry::<Arith, Typeid>(&[&binding]).unwrap();
        assert_eq!(info.name(), "i32");
    }
}
