use erasure_internals::{RawStorage, TypeInfo};

use super::{AnyMut, AnyRef, check_type, convert_binding};
use crate::{
    binding::{Binding, Renaming},
    concept::{Concept, Instantiate, is_relaxed},
    dispatch::{self, Rewrap, dispatched},
    error::BadDispatch,
    requirements::{Addable, Assignable, Constructible, Destructible, Multipliable, Subtractable},
    slots::{FixedType, Placeholder, Single, Slot},
};

/// FIXME: Once rust-lang/rust#132922 gets resolved, we can make the `storage`
/// field an unsafe field and remove this module.
mod limit_field_access {
    use core::{marker::PhantomData, mem::ManuallyDrop};

    use erasure_internals::{RawMut, RawRef, RawStorage};

    use crate::{
        binding::Binding,
        concept::Concept,
        dispatch::dispatched,
        requirements::Destructible,
        slots::{Slot, This},
    };

    /// An owned value of any type that satisfies the concept `C`.
    ///
    /// The value sits in slot `S` of the concept, [`This`] by default. Every
    /// operation the concept declares for `S` is available on the value, with
    /// the surface listed in the [requirement
    /// catalog](crate::requirements).
    ///
    /// The concept must declare [`Destructible<S>`] so the value can be
    /// dropped. [`Clone`] additionally needs
    /// [`Constructible<S>`](crate::requirements::Constructible).
    ///
    /// # Examples
    ///
    /// ```
    /// use erasure::{
    ///     Any,
    ///     requirements::{Addable, CopyConstructible, Displayable, Typeid},
    /// };
    ///
    /// type Number = (CopyConstructible, Addable, Displayable, Typeid);
    ///
    /// let three: Any<Number> = Any::new(3_i32);
    /// let four: Any<Number> = Any::new(4_i32);
    /// let seven = &three + &four;
    /// assert_eq!(seven.to_string(), "7");
    /// assert_eq!(seven.downcast_ref::<i32>(), Some(&7));
    /// ```
    pub struct Any<C: Concept, S: Slot = This> {
        /// # Safety
        ///
        /// The following safety invariants are guaranteed to be upheld as long
        /// as this struct exists:
        ///
        /// 1. The storage holds a value of the concrete type `binding` assigns
        ///    to `S`.
        /// 2. The storage is only taken out when the value is dropped or
        ///    `self` is consumed.
        storage: ManuallyDrop<RawStorage>,
        binding: Binding<C>,
        _slot: PhantomData<fn() -> S>,
    }

    impl<C: Concept, S: Slot> Any<C, S> {
        /// Creates an erased value from its parts.
        ///
        /// # Safety
        ///
        /// The caller must ensure:
        ///
        /// 1. `storage` holds a value of the concrete type `binding` assigns
        ///    to `S`.
        #[must_use]
        pub(crate) unsafe fn from_parts(storage: RawStorage, binding: Binding<C>) -> Self {
            require!(C, Destructible<S>, "the concept cannot drop owned values");
            // SAFETY: We must uphold the safety invariants of the storage
            // field:
            // 1. Guaranteed by the caller.
            // 2. The storage was just wrapped.
            Self {
                storage: ManuallyDrop::new(storage),
                binding,
                _slot: PhantomData,
            }
        }

        /// Decomposes the value into its parts without dropping it.
        ///
        /// The storage holds a value of the type the binding assigns to `S`;
        /// the caller becomes responsible for destroying it.
        #[must_use]
        pub(crate) fn into_parts(self) -> (RawStorage, Binding<C>) {
            let mut this = ManuallyDrop::new(self);
            // SAFETY: `this` is never used or dropped again, so the storage is
            // taken exactly once.
            let storage = unsafe { ManuallyDrop::take(&mut this.storage) };
            // SAFETY: `this` is never used or dropped again, so the binding is
            // read exactly once.
            let binding = unsafe { core::ptr::read(&this.binding) };
            (storage, binding)
        }

        /// Returns the binding of the value.
        #[must_use]
        pub fn binding(&self) -> &Binding<C> {
            &self.binding
        }

        /// Returns an untyped reference to the value.
        #[must_use]
        pub fn as_raw(&self) -> RawRef<'_> {
            self.storage.as_ref()
        }

        /// Returns an untyped mutable reference to the value.
        #[must_use]
        pub fn as_raw_mut(&mut self) -> RawMut<'_> {
            self.storage.as_mut()
        }
    }

    impl<C: Concept, S: Slot> Drop for Any<C, S> {
        fn drop(&mut self) {
            require!(C, Destructible<S>, "the concept cannot drop owned values");
            // `from_parts` asserts the same requirement, and every binding of
            // `C` carries an entry for each requirement `C` declares.
            let destroy = dispatched(self.binding.entry::<Destructible<S>>());
            // SAFETY: `self` is being dropped, so the storage is taken exactly
            // once.
            let storage = unsafe { ManuallyDrop::take(&mut self.storage) };
            // SAFETY: The storage holds the type the binding assigns to `S`,
            // which is the type the entry was instantiated for.
            unsafe { destroy(storage) };
        }
    }
}

pub use limit_field_access::Any;

impl<C: Concept, S: Slot> Any<C, S> {
    /// Erases `value`, binding the slot `S` to its type.
    ///
    /// Every other slot of `C` must be unbound; use [`Any::with_binding`] for
    /// concepts over several slots.
    #[must_use]
    pub fn new<T: 'static>(value: T) -> Self
    where
        S: Placeholder,
        C: Instantiate<Single<S, T>>,
    {
        require!(C, Destructible<S>, "the concept cannot drop owned values");
        let binding = Binding::<C>::new::<Single<S, T>>();
        // SAFETY: The binding was built with `S` bound to `T`.
        unsafe { Self::from_parts(RawStorage::new(value), binding) }
    }

    /// Erases `value` under an existing binding.
    ///
    /// # Errors
    ///
    /// Returns [`BadDispatch::WrongType`] if `binding` does not assign `T` to
    /// the slot `S`.
    pub fn with_binding<T: 'static>(value: T, binding: Binding<C>) -> Result<Self, BadDispatch> {
        require!(C, Destructible<S>, "the concept cannot drop owned values");
        check_type::<C, S, T>(&binding)?;
        // SAFETY: `check_type` verified that the binding assigns `T` to `S`.
        Ok(unsafe { Self::from_parts(RawStorage::new(value), binding) })
    }

    /// Copies the value behind `source` into a new owned value.
    #[must_use]
    pub fn from_ref(source: AnyRef<'_, C, S>) -> Self {
        require!(C, Destructible<S>, "the concept cannot drop owned values");
        require!(C, Constructible<S>, "the concept cannot copy values");
        let construct = dispatched(source.binding().entry::<Constructible<S>>());
        // SAFETY: The value behind `source` has the type the binding assigns
        // to `S`, which is the type the entry was instantiated for.
        let storage = unsafe { construct(source.as_raw()) };
        // SAFETY: The entry returns a copy of the same type.
        unsafe { Self::from_parts(storage, source.binding().clone()) }
    }

    /// Returns a shared reference to the value.
    #[must_use]
    pub fn as_ref(&self) -> AnyRef<'_, C, S> {
        // SAFETY: The value has the type the binding assigns to `S`, and the
        // reference borrows `self`.
        unsafe { AnyRef::from_parts(self.as_raw(), self.binding().clone()) }
    }

    /// Returns a mutable reference to the value.
    #[must_use]
    pub fn as_mut(&mut self) -> AnyMut<'_, C, S> {
        let binding = self.binding().clone();
        // SAFETY: The value has the type the binding assigns to `S`, and the
        // reference borrows `self` mutably.
        unsafe { AnyMut::from_parts(self.as_raw_mut(), binding) }
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
        self.as_mut().downcast().ok()
    }

    /// Takes the value out if it has type `T`.
    ///
    /// # Errors
    ///
    /// Returns `self` unchanged if the value has another type.
    pub fn downcast<T: 'static>(self) -> Result<T, Self> {
        if self.type_info() != TypeInfo::of::<T>() {
            return Err(self);
        }
        let (storage, _binding) = self.into_parts();
        // SAFETY: The value has type `T`, checked above.
        let value = unsafe { storage.into_box::<T>() };
        Ok(*value)
    }

    /// Assigns the value behind `source` to this value.
    ///
    /// With [`Assignable<S>`] and equal bindings, the value is assigned in
    /// place. Otherwise, relaxed concepts copy `source` with
    /// [`Constructible<S>`] and replace this value, adopting the binding of
    /// `source`; the copy completes before this value is touched, so a
    /// panicking copy leaves it unchanged.
    ///
    /// Fails to compile unless `C` declares [`Assignable<S>`], or is relaxed
    /// and declares [`Constructible<S>`].
    ///
    /// # Errors
    ///
    /// Returns [`BadDispatch::Mismatch`] if the bindings differ and no
    /// fallback applies. This value is unchanged on error.
    pub fn assign<'s>(&mut self, source: impl Into<AnyRef<'s, C, S>>) -> Result<(), BadDispatch> {
        const {
            assert!(
                crate::concept::declares::<C, Assignable<S>>()
                    || (is_relaxed::<C>() && crate::concept::declares::<C, Constructible<S>>()),
                "the concept can neither assign nor copy values"
            );
        }
        let source = source.into();

        let error = match dispatch::require_match(&[self.binding(), source.binding()]) {
            Ok(binding) => match binding.entry::<Assignable<S>>() {
                Ok(assign) => {
                    let target = self.as_raw_mut();
                    // SAFETY: Both bindings are equal, so both values have the
                    // types the entry was instantiated for. `self` is borrowed
                    // mutably, so `source` cannot alias it.
                    unsafe { assign(target, source.as_raw()) };
                    return Ok(());
                }
                Err(error) => error,
            },
            Err(error) => error,
        };
        if !is_relaxed::<C>() {
            return Err(error);
        }

        let construct = source.binding().entry::<Constructible<S>>()?;
        // SAFETY: The value behind `source` has the type its binding assigns to
        // `S`, which is the type the entry was instantiated for.
        let storage = unsafe { construct(source.as_raw()) };
        // SAFETY: The entry returns a copy of the same type.
        *self = unsafe { Self::from_parts(storage, source.binding().clone()) };
        Ok(())
    }

    /// Replaces the value with `value`, which may have another type.
    ///
    /// Only available for relaxed concepts.
    pub fn set<T: 'static>(&mut self, value: T)
    where
        S: Placeholder,
        C: Instantiate<Single<S, T>>,
    {
        const {
            assert!(
                is_relaxed::<C>(),
                "only relaxed concepts can change the type of a value"
            );
        }
        *self = Self::new(value);
    }

    /// Converts the value to the concept `D`.
    ///
    /// `D`'s requirements must be a subset of `C`'s; this is checked at compile
    /// time.
    ///
    /// # Panics
    ///
    /// Panics if a same-type constraint of `D` does not hold for the concrete
    /// types of this value's binding.
    #[must_use]
    #[track_caller]
    pub fn convert<D: Concept>(self) -> Any<D, S> {
        self.convert_with::<D, (), S>()
    }

    /// Converts the value to the concept `D`, renaming slots with `Ren` and
    /// moving the value to slot `S2`.
    ///
    /// # Panics
    ///
    /// Panics if the renamed binding does not assign this value's type to
    /// `S2`, or if a same-type constraint of `D` does not hold.
    #[must_use]
    #[track_caller]
    pub fn convert_with<D: Concept, Ren: Renaming, S2: Slot>(self) -> Any<D, S2> {
        require!(D, Destructible<S2>, "the target concept cannot drop owned values");
        let binding = convert_binding::<C, S, D, Ren, S2>(self.binding());
        let (storage, _source) = self.into_parts();
        // SAFETY: `convert_binding` verified that the converted binding assigns
        // the value's type to `S2`.
        unsafe { Any::from_parts(storage, binding) }
    }

    /// Returns the value the held value dereferences to, in slot `R`.
    #[must_use]
    pub fn pointee<R: Slot>(&self) -> AnyRef<'_, C, R> {
        self.as_ref().pointee()
    }

    /// Calls the held value with `argument`.
    pub fn call<In: FixedType, Out: FixedType>(&self, argument: In) -> Out {
        self.as_ref().call(argument)
    }

    /// Adds `rhs` to this value.
    ///
    /// # Errors
    ///
    /// Returns the [`BadDispatch`] if the bindings differ.
    pub fn try_add<R: Slot>(&self, rhs: &Any<C, R>) -> Result<S::Output, BadDispatch>
    where
        S: Rewrap<C>,
    {
        dispatch::binary::<Addable<S, R, S>, C>(&self.as_ref(), &rhs.as_ref())
    }

    /// Subtracts `rhs` from this value.
    ///
    /// # Errors
    ///
    /// Returns the [`BadDispatch`] if the bindings differ.
    pub fn try_sub<R: Slot>(&self, rhs: &Any<C, R>) -> Result<S::Output, BadDispatch>
    where
        S: Rewrap<C>,
    {
        dispatch::binary::<Subtractable<S, R, S>, C>(&self.as_ref(), &rhs.as_ref())
    }

    /// Multiplies this value by `rhs`.
    ///
    /// # Errors
    ///
    /// Returns the [`BadDispatch`] if the bindings differ.
    pub fn try_mul<R: Slot>(&self, rhs: &Any<C, R>) -> Result<S::Output, BadDispatch>
    where
        S: Rewrap<C>,
    {
        dispatch::binary::<Multipliable<S, R, S>, C>(&self.as_ref(), &rhs.as_ref())
    }
}

impl<C: Concept, S: Slot> Clone for Any<C, S> {
    fn clone(&self) -> Self {
        Self::from_ref(self.as_ref())
    }
}

impl<'a, C: Concept, S: Slot> From<&'a Any<C, S>> for AnyRef<'a, C, S> {
    fn from(value: &'a Any<C, S>) -> Self {
        value.as_ref()
    }
}

impl<'a, C: Concept, S: Slot> From<&'a mut Any<C, S>> for AnyMut<'a, C, S> {
    fn from(value: &'a mut Any<C, S>) -> Self {
        value.as_mut()
    }
}

#[cfg(test)]
mod tests {
    use alloc::{rc::Rc, string::String};
    use core::cell::Cell;

    use super::*;
    use crate::{
        concept::Relaxed,
        requirements::{CopyConstructible, EqualityComparable, Typeid},
        slots::{Bindings, Bound, SlotA, This},
    };

    type Value = (CopyConstructible, Assignable, Typeid);
    type Loose = (CopyConstructible, Typeid, Relaxed);

    struct Counted(Rc<Cell<usize>>);

    impl Drop for Counted {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn test_round_trip() {
        let value: Any<Value> = Any::new(String::from("hello"));
        assert_eq!(value.type_info(), TypeInfo::of::<String>());
        assert_eq!(value.downcast_ref::<String>().map(String::as_str), Some("hello"));
        assert!(value.downcast_ref::<&str>().is_none());
        let value = value.downcast::<u8>().unwrap_err();
        assert_eq!(value.downcast::<String>().unwrap(), "hello");
    }

    #[test]
    fn test_drop_runs_once() {
        let drops = Rc::new(Cell::new(0));
        let value: Any<Destructible> = Any::new(Counted(drops.clone()));
        assert_eq!(drops.get(), 0);
        drop(value);
        assert_eq!(drops.get(), 1);

        let value: Any<(Destructible, Typeid)> = Any::new(Counted(drops.clone()));
        let counted = value.downcast::<Counted>().ok().unwrap();
        assert_eq!(drops.get(), 1);
        drop(counted);
        assert_eq!(drops.get(), 2);
    }

    #[test]
    fn test_clone_is_independent() {
        let mut first: Any<Value> = Any::new(1_i32);
        let second = first.clone();
        *first.downcast_mut::<i32>().unwrap() = 5;
        assert_eq!(second.downcast_ref::<i32>(), Some(&1));
        assert_eq!(first.downcast_ref::<i32>(), Some(&5));
    }

    #[test]
    fn test_assign() {
        let mut target: Any<Value> = Any::new(1_i32);
        let source: Any<Value> = Any::new(2_i32);
        target.assign(&source).unwrap();
        assert_eq!(target.downcast_ref::<i32>(), Some(&2));

        let other: Any<Value> = Any::new(2_u8);
        assert_eq!(
            target.assign(&other),
            Err(BadDispatch::Mismatch {
                left: "i32",
                right: "u8"
            })
        );
        assert_eq!(target.downcast_ref::<i32>(), Some(&2));
    }

    #[test]
    fn test_relaxed_assign_replaces_value() {
        let mut target: Any<Loose> = Any::new(1_i32);
        let source: Any<Loose> = Any::new(String::from("text"));
        target.assign(&source).unwrap();
        assert_eq!(target.type_info(), TypeInfo::of::<String>());
        assert_eq!(target.binding(), source.binding());

        target.set(3.5_f64);
        assert_eq!(target.downcast_ref::<f64>(), Some(&3.5));
    }

    #[test]
    fn test_with_binding() {
        type Pair = (Destructible<This>, Destructible<SlotA>, Typeid<This>);
        let binding = Binding::<Pair>::new::<Bindings<Bound<u8>, Bound<u16>>>();
        let value = Any::<Pair, This>::with_binding(7_u8, binding.clone()).unwrap();
        assert_eq!(value.downcast_ref::<u8>(), Some(&7));
        assert_eq!(
            Any::<Pair, SlotA>::with_binding(7_u8, binding).err(),
            Some(BadDispatch::WrongType {
                expected: "u16",
                actual: "u8"
            })
        );
    }

    #[test]
    fn test_convert() {
        let value: Any<(CopyConstructible, EqualityComparable, Typeid)> = Any::new(4_u32);
        let narrowed: Any<(Destructible, Typeid)> = value.convert();
        assert_eq!(narrowed.downcast_ref::<u32>(), Some(&4));
    }

    static_assertions::assert_not_impl_any!(Any<Value>: Send, Sync, Copy);
    static_assertions::assert_impl_all!(Any<Value>: Clone);
}
