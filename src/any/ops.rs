//! Operator and formatting impls for erased values.
//!
//! Operators whose signatures cannot return errors panic with the
//! [`BadDispatch`] when their operands hold different concrete types. The
//! exceptions are equality and ordering under relaxed concepts: values of
//! different types compare unequal and are ordered by their type.

use core::{
    cmp::Ordering,
    fmt,
    ops::{Add, AddAssign, Mul, Sub, SubAssign},
};

use super::{Any, AnyMut, AnyRef};
use crate::{
    concept::{Concept, is_relaxed},
    dispatch::{self, Rewrap, dispatched},
    error::BadDispatch,
    requirements::{
        AddAssignable, Addable, Debuggable, Displayable, EqualityComparable, LessThanComparable,
        Multipliable, SubAssignable, Subtractable,
    },
    slots::Slot,
};

macro_rules! binary_operator {
    ($op:ident, $method:ident, $requirement:ident) => {
        impl<C: Concept, L: Rewrap<C>, R: Slot> $op<&Any<C, R>> for &Any<C, L> {
            type Output = L::Output;

            #[track_caller]
            fn $method(self, rhs: &Any<C, R>) -> L::Output {
                dispatched(dispatch::binary::<$requirement<L, R, L>, C>(
                    &self.as_ref(),
                    &rhs.as_ref(),
                ))
            }
        }

        impl<C: Concept, L: Rewrap<C>, R: Slot> $op<Any<C, R>> for Any<C, L> {
            type Output = L::Output;

            #[track_caller]
            fn $method(self, rhs: Any<C, R>) -> L::Output {
                (&self).$method(&rhs)
            }
        }

        impl<'a, 'b, C: Concept, L: Rewrap<C>, R: Slot> $op<&AnyRef<'b, C, R>>
            for &AnyRef<'a, C, L>
        {
            type Output = L::Output;

            #[track_caller]
            fn $method(self, rhs: &AnyRef<'b, C, R>) -> L::Output {
                dispatched(dispatch::binary::<$requirement<L, R, L>, C>(self, rhs))
            }
        }

        impl<'a, 'b, C: Concept, L: Rewrap<C>, R: Slot> $op<AnyRef<'b, C, R>>
            for AnyRef<'a, C, L>
        {
            type Output = L::Output;

            #[track_caller]
            fn $method(self, rhs: AnyRef<'b, C, R>) -> L::Output {
                (&self).$method(&rhs)
            }
        }
    };
}

binary_operator!(Add, add, Addable);
binary_operator!(Sub, sub, Subtractable);
binary_operator!(Mul, mul, Multipliable);

macro_rules! compound_assignment {
    ($op:ident, $method:ident, $requirement:ident) => {
        impl<C: Concept, L: Slot, R: Slot> $op<&Any<C, R>> for Any<C, L> {
            #[track_caller]
            fn $method(&mut self, rhs: &Any<C, R>) {
                dispatched(dispatch::compound::<$requirement<L, R>, C>(
                    &mut self.as_mut(),
                    &rhs.as_ref(),
                ));
            }
        }

        impl<C: Concept, L: Slot, R: Slot> $op<AnyRef<'_, C, R>> for Any<C, L> {
            #[track_caller]
            fn $method(&mut self, rhs: AnyRef<'_, C, R>) {
                dispatched(dispatch::compound::<$requirement<L, R>, C>(
                    &mut self.as_mut(),
                    &rhs,
                ));
            }
        }

        impl<C: Concept, L: Slot, R: Slot> $op<&Any<C, R>> for AnyMut<'_, C, L> {
            #[track_caller]
            fn $method(&mut self, rhs: &Any<C, R>) {
                dispatched(dispatch::compound::<$requirement<L, R>, C>(self, &rhs.as_ref()));
            }
        }

        impl<C: Concept, L: Slot, R: Slot> $op<AnyRef<'_, C, R>> for AnyMut<'_, C, L> {
            #[track_caller]
            fn $method(&mut self, rhs: AnyRef<'_, C, R>) {
                dispatched(dispatch::compound::<$requirement<L, R>, C>(self, &rhs));
            }
        }
    };
}

compound_assignment!(AddAssign, add_assign, AddAssignable);
compound_assignment!(SubAssign, sub_assign, SubAssignable);

#[track_caller]
fn equals<C: Concept, L: Slot, R: Slot>(left: &AnyRef<'_, C, L>, right: &AnyRef<'_, C, R>) -> bool {
    match dispatch::entry::<C, EqualityComparable<L, R>>(&[left.binding(), right.binding()]) {
        // SAFETY: Both bindings are equal, so the entry was instantiated for
        // the concrete types of both values.
        Ok(equals) => unsafe { equals(left.as_raw(), right.as_raw()) },
        Err(BadDispatch::Mismatch { .. }) if is_relaxed::<C>() => false,
        Err(error) => panic!("{error}"),
    }
}

#[track_caller]
fn compare<C: Concept, L: Slot, R: Slot>(
    left: &AnyRef<'_, C, L>,
    right: &AnyRef<'_, C, R>,
) -> Option<Ordering> {
    match dispatch::entry::<C, LessThanComparable<L, R>>(&[left.binding(), right.binding()]) {
        // SAFETY: Both bindings are equal, so the entry was instantiated for
        // the concrete types of both values.
        Ok(compare) => unsafe { compare(left.as_raw(), right.as_raw()) },
        Err(BadDispatch::Mismatch { .. }) if is_relaxed::<C>() => {
            let left = left.binding().type_of::<L>()?;
            let right = right.binding().type_of::<R>()?;
            match left.id().cmp(&right.id()) {
                Ordering::Equal => None,
                ordering => Some(ordering),
            }
        }
        Err(error) => panic!("{error}"),
    }
}

impl<C: Concept, L: Slot, R: Slot> PartialEq<Any<C, R>> for Any<C, L> {
    #[track_caller]
    fn eq(&self, other: &Any<C, R>) -> bool {
        equals(&self.as_ref(), &other.as_ref())
    }
}

impl<'b, C: Concept, L: Slot, R: Slot> PartialEq<AnyRef<'b, C, R>> for AnyRef<'_, C, L> {
    #[track_caller]
    fn eq(&self, other: &AnyRef<'b, C, R>) -> bool {
        equals(self, other)
    }
}

impl<'b, C: Concept, L: Slot, R: Slot> PartialEq<AnyMut<'b, C, R>> for AnyMut<'_, C, L> {
    #[track_caller]
    fn eq(&self, other: &AnyMut<'b, C, R>) -> bool {
        equals(&self.as_ref(), &other.as_ref())
    }
}

impl<C: Concept, L: Slot, R: Slot> PartialOrd<Any<C, R>> for Any<C, L> {
    #[track_caller]
    fn partial_cmp(&self, other: &Any<C, R>) -> Option<Ordering> {
        compare(&self.as_ref(), &other.as_ref())
    }
}

impl<'b, C: Concept, L: Slot, R: Slot> PartialOrd<AnyRef<'b, C, R>> for AnyRef<'_, C, L> {
    #[track_caller]
    fn partial_cmp(&self, other: &AnyRef<'b, C, R>) -> Option<Ordering> {
        compare(self, other)
    }
}

impl<'b, C: Concept, L: Slot, R: Slot> PartialOrd<AnyMut<'b, C, R>> for AnyMut<'_, C, L> {
    #[track_caller]
    fn partial_cmp(&self, other: &AnyMut<'b, C, R>) -> Option<Ordering> {
        compare(&self.as_ref(), &other.as_ref())
    }
}

impl<C: Concept, S: Slot> fmt::Display for AnyRef<'_, C, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let display =
            dispatch::entry::<C, Displayable<S>>(&[self.binding()]).map_err(|_| fmt::Error)?;
        // SAFETY: The value has the type the binding assigns to `S`, which is
        // the type the entry was instantiated for.
        unsafe { display(self.as_raw(), f) }
    }
}

impl<C: Concept, S: Slot> fmt::Display for Any<C, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.as_ref(), f)
    }
}

impl<C: Concept, S: Slot> fmt::Display for AnyMut<'_, C, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.as_ref(), f)
    }
}

/// Formats the value with [`Debuggable<S>`] if the concept declares it, and
/// its type name otherwise.
impl<C: Concept, S: Slot> fmt::Debug for AnyRef<'_, C, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.binding().entry::<Debuggable<S>>() {
            // SAFETY: The value has the type the binding assigns to `S`, which
            // is the type the entry was instantiated for.
            Ok(debug) => unsafe { debug(self.as_raw(), f) },
            Err(_) => f
                .debug_struct("Any")
                .field(
                    "type",
                    &self
                        .binding()
                        .type_of::<S>()
                        .map_or("<unbound>", |info| info.name()),
                )
                .finish_non_exhaustive(),
        }
    }
}

impl<C: Concept, S: Slot> fmt::Debug for Any<C, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.as_ref(), f)
    }
}

impl<C: Concept, S: Slot> fmt::Debug for AnyMut<'_, C, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.as_ref(), f)
    }
}

#[cfg(test)]
mod tests {
    use alloc::{format, string::ToString};

    use super::*;
    use crate::{
        concept::Relaxed,
        requirements::{CopyConstructible, Destructible, Typeid},
        slots::{Fixed, This},
    };

    type Number = (
        CopyConstructible,
        Addable,
        Subtractable,
        Multipliable,
        AddAssignable,
        SubAssignable,
        EqualityComparable,
        LessThanComparable,
        Displayable,
        Debuggable,
        Typeid,
    );
    type Loose = (CopyConstructible, EqualityComparable, LessThanComparable, Relaxed);

    #[test]
    fn test_arithmetic() {
        let three: Any<Number> = Any::new(3_i32);
        let four: Any<Number> = Any::new(4_i32);
        assert_eq!((&three + &four).downcast_ref::<i32>(), Some(&7));
        assert_eq!((&three - &four).downcast_ref::<i32>(), Some(&-1));
        assert_eq!((three.clone() * four.clone()).downcast_ref::<i32>(), Some(&12));
        assert_eq!((three.as_ref() + four.as_ref()).to_string(), "7");

        let mut total = three.clone();
        total += &four;
        total -= three.as_ref();
        assert_eq!(total, four);
    }

    #[test]
    fn test_fixed_result() {
        type Widening = (Destructible, Addable<This, This, Fixed<u64>>);

        #[derive(Clone)]
        struct Small(u8);

        impl Add for Small {
            type Output = u64;

            fn add(self, rhs: Small) -> u64 {
                u64::from(self.0) + u64::from(rhs.0)
            }
        }

        let left: Any<Widening> = Any::new(Small(200));
        let right: Any<Widening> = Any::new(Small(100));
        let sum = dispatch::binary::<Addable<This, This, Fixed<u64>>, _>(
            &left.as_ref(),
            &right.as_ref(),
        );
        assert_eq!(sum, Ok(300));
    }

    #[test]
    fn test_mismatch_is_reported() {
        let three: Any<Number> = Any::new(3_i32);
        let four: Any<Number> = Any::new(4_i64);
        assert_eq!(
            three.try_add(&four).err(),
            Some(BadDispatch::Mismatch {
                left: "i32",
                right: "i64"
            })
        );
    }

    #[test]
    #[should_panic(expected = "operands hold different concrete types")]
    fn test_strict_equality_mismatch_panics() {
        let three: Any<Number> = Any::new(3_i32);
        let four: Any<Number> = Any::new(4_i64);
        let _ = three == four;
    }

    #[test]
    fn test_relaxed_comparison() {
        let number: Any<Loose> = Any::new(1_i32);
        let other: Any<Loose> = Any::new(1_i32);
        let text: Any<Loose> = Any::new("1");
        assert!(number == other);
        assert!(number != text);
        let two: Any<Loose> = Any::new(2_i32);
        assert!(number < two);

        let forward = number.partial_cmp(&text);
        let backward = text.partial_cmp(&number);
        assert!(forward.is_some());
        assert_eq!(forward.map(Ordering::reverse), backward);
    }

    #[test]
    fn test_formatting() {
        let value: Any<Number> = Any::new(42_i32);
        assert_eq!(value.to_string(), "42");
        assert_eq!(format!("{value:?}"), "42");

        let opaque: Any<(Destructible, Typeid)> = Any::new(42_u8);
        assert_eq!(format!("{opaque:?}"), "Any { type: \"u8\", .. }");
    }
}
