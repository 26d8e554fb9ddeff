use core::any::type_name;

use erasure_internals::{RawRef, TypeInfo};

use super::{check_type, convert_binding};
use crate::{
    binding::{Binding, Renaming},
    concept::{Concept, Instantiate, is_relaxed},
    dispatch::{self, Rewrap, dispatched},
    error::BadDispatch,
    requirements::{Addable, Callable, Dereferenceable, Multipliable, Subtractable, Typeid},
    slots::{FixedType, Placeholder, Single, Slot},
};

/// FIXME: Once rust-lang/rust#132922 gets resolved, we can make the `raw` field
/// an unsafe field and remove this module.
mod limit_field_access {
    use core::marker::PhantomData;

    use erasure_internals::RawRef;

    use crate::{
        binding::Binding,
        concept::Concept,
        slots::{Slot, This},
    };

    /// A shared reference to a value of any type that satisfies the concept
    /// `C`.
    ///
    /// [`AnyRef`] supports the same read-only operations as
    /// [`Any`](crate::Any) and never owns the value, so the concept does not
    /// need [`Destructible`](crate::requirements::Destructible). Cloning an
    /// [`AnyRef`] copies the reference and shares the binding.
    ///
    /// # Examples
    ///
    /// ```
    /// use erasure::{
    ///     AnyRef,
    ///     requirements::{Displayable, EqualityComparable},
    /// };
    ///
    /// type Shown = (Displayable, EqualityComparable);
    ///
    /// let (text, other) = (String::from("borrowed"), String::from("borrowed"));
    /// let value: AnyRef<'_, Shown> = AnyRef::new(&text);
    /// let other: AnyRef<'_, Shown> = AnyRef::new(&other);
    /// assert_eq!(value.to_string(), "borrowed");
    /// assert!(value == other);
    /// ```
    pub struct AnyRef<'a, C: Concept, S: Slot = This> {
        /// # Safety
        ///
        /// The following safety invariants are guaranteed to be upheld as long
        /// as this struct exists:
        ///
        /// 1. `raw` points to a value of the concrete type `binding` assigns to
        ///    `S`.
        raw: RawRef<'a>,
        binding: Binding<C>,
        _slot: PhantomData<fn() -> S>,
    }

    impl<'a, C: Concept, S: Slot> AnyRef<'a, C, S> {
        /// Creates a reference from its parts.
        ///
        /// # Safety
        ///
        /// The caller must ensure:
        ///
        /// 1. `raw` points to a value of the concrete type `binding` assigns to
        ///    `S`.
        #[must_use]
        pub(crate) unsafe fn from_parts(raw: RawRef<'a>, binding: Binding<C>) -> Self {
            // SAFETY: We must uphold the safety invariants of the raw field:
            // 1. Guaranteed by the caller.
            Self {
                raw,
                binding,
                _slot: PhantomData,
            }
        }

        /// Returns the binding of the value.
        #[must_use]
        pub fn binding(&self) -> &Binding<C> {
            &self.binding
        }

        /// Returns an untyped reference to the value.
        #[must_use]
        pub fn as_raw(&self) -> RawRef<'a> {
            self.raw
        }
    }

    impl<C: Concept, S: Slot> Clone for AnyRef<'_, C, S> {
        fn clone(&self) -> Self {
            // SAFETY: We must uphold the safety invariants of the raw field:
            // 1. Upheld by `self`.
            Self {
                raw: self.raw,
                binding: self.binding.clone(),
                _slot: PhantomData,
            }
        }
    }
}

pub use limit_field_access::AnyRef;

impl<'a, C: Concept, S: Slot> AnyRef<'a, C, S> {
    /// Erases a reference to `value`, binding the slot `S` to its type.
    #[must_use]
    pub fn new<T: 'static>(value: &'a T) -> Self
    where
        S: Placeholder,
        C: Instantiate<Single<S, T>>,
    {
        let binding = Binding::<C>::new::<Single<S, T>>();
        // SAFETY: The binding was built with `S` bound to `T`.
        unsafe { Self::from_parts(RawRef::new(value), binding) }
    }

    /// Erases a reference to `value` under an existing binding.
    ///
    /// # Errors
    ///
    /// Returns [`BadDispatch::WrongType`] if `binding` does not assign `T` to
    /// the slot `S`.
    pub fn with_binding<T: 'static>(value: &'a T, binding: Binding<C>) -> Result<Self, BadDispatch> {
        check_type::<C, S, T>(&binding)?;
        // SAFETY: `check_type` verified that the binding assigns `T` to `S`.
        Ok(unsafe { Self::from_parts(RawRef::new(value), binding) })
    }

    /// Returns the type information of the value.
    ///
    /// Available if `C` declares [`Typeid<S>`] or is relaxed.
    #[must_use]
    pub fn type_info(&self) -> TypeInfo {
        const {
            assert!(
                crate::concept::declares::<C, Typeid<S>>() || is_relaxed::<C>(),
                "the concept provides no type information"
            );
        }
        dispatched(self.binding().entry::<Typeid<S>>())
    }

    /// Returns a reference to the value if it has type `T`.
    #[must_use]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&'a T> {
        if self.type_info() != TypeInfo::of::<T>() {
            return None;
        }
        // SAFETY: The value has type `T`, checked above.
        Some(unsafe { self.as_raw().cast::<T>() })
    }

    /// Converts the reference to the concept `D`.
    ///
    /// # Panics
    ///
    /// Panics if a same-type constraint of `D` does not hold for the concrete
    /// types of this value's binding.
    #[must_use]
    #[track_caller]
    pub fn convert<D: Concept>(&self) -> AnyRef<'a, D, S> {
        self.convert_with::<D, (), S>()
    }

    /// Converts the reference to the concept `D`, renaming slots with `Ren`
    /// and moving the value to slot `S2`.
    ///
    /// # Panics
    ///
    /// Panics if the renamed binding does not assign this value's type to
    /// `S2`, or if a same-type constraint of `D` does not hold.
    #[must_use]
    #[track_caller]
    pub fn convert_with<D: Concept, Ren: Renaming, S2: Slot>(&self) -> AnyRef<'a, D, S2> {
        let binding = convert_binding::<C, S, D, Ren, S2>(self.binding());
        // SAFETY: `convert_binding` verified that the converted binding assigns
        // the value's type to `S2`.
        unsafe { AnyRef::from_parts(self.as_raw(), binding) }
    }

    /// Returns the value the held value dereferences to, in slot `R`.
    #[must_use]
    pub fn pointee<R: Slot>(&self) -> AnyRef<'a, C, R> {
        let dereference = dispatched(dispatch::entry::<C, Dereferenceable<R, S>>(&[
            self.binding(),
        ]));
        // SAFETY: The value has the type the binding assigns to `S`, which is
        // the type the entry was instantiated for.
        let target = unsafe { dereference(self.as_raw()) };
        // SAFETY: The entry returns a reference to the type the binding assigns
        // to `R`.
        unsafe { AnyRef::from_parts(target, self.binding().clone()) }
    }

    /// Calls the held value with `argument`.
    pub fn call<In: FixedType, Out: FixedType>(&self, argument: In) -> Out {
        let call = dispatched(dispatch::entry::<C, Callable<In, Out, S>>(&[
            self.binding(),
        ]));
        tracing::trace!(
            function = self.binding().type_of::<S>().map_or("<unbound>", |info| info.name()),
            argument = type_name::<In>(),
            "calling erased function"
        );
        // SAFETY: The value has the type the binding assigns to `S`, which is
        // the type the entry was instantiated for.
        unsafe { call(self.as_raw(), argument) }
    }

    /// Adds `rhs` to this value.
    ///
    /// # Errors
    ///
    /// Returns the [`BadDispatch`] if the bindings differ.
    pub fn try_add<R: Slot>(&self, rhs: &AnyRef<'_, C, R>) -> Result<S::Output, BadDispatch>
    where
        S: Rewrap<C>,
    {
        dispatch::binary::<Addable<S, R, S>, C>(self, rhs)
    }

    /// Subtracts `rhs` from this value.
    ///
    /// # Errors
    ///
    /// Returns the [`BadDispatch`] if the bindings differ.
    pub fn try_sub<R: Slot>(&self, rhs: &AnyRef<'_, C, R>) -> Result<S::Output, BadDispatch>
    where
        S: Rewrap<C>,
    {
        dispatch::binary::<Subtractable<S, R, S>, C>(self, rhs)
    }

    /// Multiplies this value by `rhs`.
    ///
    /// # Errors
    ///
    /// Returns the [`BadDispatch`] if the bindings differ.
    pub fn try_mul<R: Slot>(&self, rhs: &AnyRef<'_, C, R>) -> Result<S::Output, BadDispatch>
    where
        S: Rewrap<C>,
    {
        dispatch::binary::<Multipliable<S, R, S>, C>(self, rhs)
    }
}

#[cfg(test)]
mod tests {
    use alloc::{boxed::Box, string::String};

    use super::*;
    use crate::{
        Any,
        requirements::{CopyConstructible, Destructible},
        slots::Pointee,
    };

    type Boxed = (Destructible, Dereferenceable, Typeid<Pointee>, Typeid);

    #[test]
    fn test_reference_reads_original() {
        let text = String::from("shared");
        let value: AnyRef<'_, Typeid> = AnyRef::new(&text);
        let copy = value.clone();
        assert_eq!(copy.downcast_ref::<String>(), Some(&text));
        assert!(core::ptr::eq(
            value.downcast_ref::<String>().unwrap(),
            copy.downcast_ref::<String>().unwrap()
        ));
    }

    #[test]
    fn test_pointee() {
        let boxed: Any<Boxed> = Any::new(Box::new(5_u64));
        let inner = boxed.pointee::<Pointee>();
        assert_eq!(inner.type_info(), TypeInfo::of::<u64>());
        assert_eq!(inner.downcast_ref::<u64>(), Some(&5));
    }

    #[test]
    fn test_call() {
        type Function = (Destructible, Callable<u32, u32>);
        let double: Any<Function> = Any::new(|x: u32| x * 2);
        assert_eq!(double.call::<u32, u32>(21), 42);
    }

    #[test]
    fn test_copy_from_reference() {
        let number = 12_i64;
        let borrowed: AnyRef<'_, (CopyConstructible, Typeid)> = AnyRef::new(&number);
        let owned = Any::from_ref(borrowed);
        assert_eq!(owned.downcast_ref::<i64>(), Some(&12));
    }

    static_assertions::assert_impl_all!(AnyRef<'static, Typeid>: Clone);
    static_assertions::assert_not_impl_any!(AnyRef<'static, Typeid>: Copy, Send, Sync);
}
