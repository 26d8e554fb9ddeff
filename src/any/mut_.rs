use erasure_internals::{RawMut, RawRef, TypeInfo};

use super::{AnyRef, check_type};
use crate::{
    binding::Binding,
    concept::{Concept, Instantiate},
    dispatch,
    error::BadDispatch,
    requirements::Assignable,
    slots::{Placeholder, Single, Slot},
};

/// FIXME: Once rust-lang/rust#132922 gets resolved, we can make the `raw` field
/// an unsafe field and remove this module.
mod limit_field_access {
    use core::marker::PhantomData;

    use erasure_internals::{RawMut, RawRef};

    use crate::{
        binding::Binding,
        concept::Concept,
        slots::{Slot, This},
    };

    /// A mutable reference to a value of any type that satisfies the concept
    /// `C`.
    ///
    /// Writes through an [`AnyMut`] are visible in the referenced value.
    /// Unlike [`Any::assign`](crate::Any::assign), assigning through an
    /// [`AnyMut`] never changes the type of the referenced value, so it needs
    /// [`Assignable`](crate::requirements::Assignable) even for relaxed
    /// concepts.
    ///
    /// # Examples
    ///
    /// ```
    /// use erasure::{
    ///     AnyMut, AnyRef,
    ///     requirements::{AddAssignable, Assignable},
    /// };
    ///
    /// type Counter = (Assignable, AddAssignable);
    ///
    /// let mut count = 1_u32;
    /// let (step, reset) = (4_u32, 10_u32);
    /// let step: AnyRef<'_, Counter> = AnyRef::new(&step);
    /// let reset: AnyRef<'_, Counter> = AnyRef::new(&reset);
    ///
    /// let mut value: AnyMut<'_, Counter> = AnyMut::new(&mut count);
    /// value += step.clone();
    /// value.assign(reset).unwrap();
    /// value += step;
    /// drop(value);
    /// assert_eq!(count, 14);
    /// ```
    pub struct AnyMut<'a, C: Concept, S: Slot = This> {
        /// # Safety
        ///
        /// The following safety invariants are guaranteed to be upheld as long
        /// as this struct exists:
        ///
        /// 1. `raw` points to a value of the concrete type `binding` assigns to
        ///    `S`.
        /// 2. Only values of that type are written through `raw`.
        raw: RawMut<'a>,
        binding: Binding<C>,
        _slot: PhantomData<fn() -> S>,
    }

    impl<'a, C: Concept, S: Slot> AnyMut<'a, C, S> {
        /// Creates a mutable reference from its parts.
        ///
        /// # Safety
        ///
        /// The caller must ensure:
        ///
        /// 1. `raw` points to a value of the concrete type `binding` assigns to
        ///    `S`.
        #[must_use]
        pub(crate) unsafe fn from_parts(raw: RawMut<'a>, binding: Binding<C>) -> Self {
            // SAFETY: We must uphold the safety invariants of the raw field:
            // 1. Guaranteed by the caller.
            // 2. Writes go through the binding's entries only.
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
        pub fn as_raw(&self) -> RawRef<'_> {
            self.raw.as_ref()
        }

        /// Returns an untyped mutable reference to the value.
        #[must_use]
        pub fn as_raw_mut(&mut self) -> RawMut<'_> {
            self.raw.reborrow()
        }

        /// Converts into an untyped mutable reference for the full lifetime.
        #[must_use]
        pub(crate) fn into_raw(self) -> RawMut<'a> {
            self.raw
        }
    }
}

pub use limit_field_access::AnyMut;

impl<'a, C: Concept, S: Slot> AnyMut<'a, C, S> {
    /// Erases a mutable reference to `value`, binding the slot `S` to its
    /// type.
    #[must_use]
    pub fn new<T: 'static>(value: &'a mut T) -> Self
    where
        S: Placeholder,
        C: Instantiate<Single<S, T>>,
    {
        let binding = Binding::<C>::new::<Single<S, T>>();
        // SAFETY: The binding was built with `S` bound to `T`.
        unsafe { Self::from_parts(RawMut::new(value), binding) }
    }

    /// Erases a mutable reference to `value` under an existing binding.
    ///
    /// # Errors
    ///
    /// Returns [`BadDispatch::WrongType`] if `binding` does not assign `T` to
    /// the slot `S`.
    pub fn with_binding<T: 'static>(
        value: &'a mut T,
        binding: Binding<C>,
    ) -> Result<Self, BadDispatch> {
        check_type::<C, S, T>(&binding)?;
        // SAFETY: `check_type` verified that the binding assigns `T` to `S`.
        Ok(unsafe { Self::from_parts(RawMut::new(value), binding) })
    }

    /// Reborrows the reference for a shorter lifetime.
    #[must_use]
    pub fn reborrow(&mut self) -> AnyMut<'_, C, S> {
        let binding = self.binding().clone();
        // SAFETY: The reborrow points to the same value.
        unsafe { AnyMut::from_parts(self.as_raw_mut(), binding) }
    }

    /// Returns a shared reference to the value.
    #[must_use]
    pub fn as_ref(&self) -> AnyRef<'_, C, S> {
        // SAFETY: The reference points to the same value.
        unsafe { AnyRef::from_parts(self.as_raw(), self.binding().clone()) }
    }

    /// Converts into a shared reference for the full lifetime.
    #[must_use]
    pub fn into_ref(self) -> AnyRef<'a, C, S> {
        let binding = self.binding().clone();
        let raw: RawRef<'a> = self.into_raw().into_ref();
        // SAFETY: The reference points to the same value.
        unsafe { AnyRef::from_parts(raw, binding) }
    }

    /// Returns the type information of the value.
    #[must_use]
    pub fn type_info(&self) -> TypeInfo {
        self.as_ref().type_info()
    }

    /// Returns a reference to the value if it has type `T`.
    #[must_use]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.as_ref().downcast_ref()
    }

    /// Returns a mutable reference to the value if it has type `T`.
    #[must_use]
    pub fn downcast_mut<T: 'static>(&mut self) -> Option<&mut T> {
        if self.type_info() != TypeInfo::of::<T>() {
            return None;
        }
        // SAFETY: The value has type `T`, checked above, so writes through the
        // returned reference keep its type.
        Some(unsafe { self.as_raw_mut().cast::<T>() })
    }

    /// Converts into a mutable reference to the value if it has type `T`.
    ///
    /// # Errors
    ///
    /// Returns `self` unchanged if the value has another type.
    pub fn downcast<T: 'static>(self) -> Result<&'a mut T, Self> {
        if self.type_info() != TypeInfo::of::<T>() {
            return Err(self);
        }
        // SAFETY: The value has type `T`, checked above.
        Ok(unsafe { self.into_raw().cast::<T>() })
    }

    /// Assigns the value behind `source` to the referenced value in place.
    ///
    /// # Errors
    ///
    /// Returns [`BadDispatch::Mismatch`] if the bindings differ. The referenced
    /// value is unchanged on error.
    pub fn assign<'s>(&mut self, source: impl Into<AnyRef<'s, C, S>>) -> Result<(), BadDispatch> {
        dispatch::compound::<Assignable<S>, C>(self, &source.into())
    }
}
