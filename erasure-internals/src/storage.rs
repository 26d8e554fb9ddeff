//! Type-erased storage cells.
//!
//! This module encapsulates the `ptr` fields of [`RawStorage`], [`RawRef`] and
//! [`RawMut`], ensuring they are only visible within this module. This
//! visibility restriction guarantees the safety invariant: **the pointer always
//! points to an initialized value of one concrete type for the lifetime of the
//! cell**.
//!
//! # Safety Invariant
//!
//! - [`RawStorage`] is only created by [`RawStorage::new`] from
//!   `Box::into_raw` and only released by [`RawStorage::into_box`], which
//!   consumes it.
//! - [`RawRef`] and [`RawMut`] are only created from a reference or from a
//!   [`RawStorage`] and carry that borrow's lifetime.
//!
//! None of the cells know which concrete type they hold. That knowledge lives
//! in the operation table the cell is paired with, and every typed access is
//! an `unsafe` method whose caller vouches for the type.
//!
//! A [`RawStorage`] does not implement [`Drop`]: the owner must hand it to
//! the destructor entry of its table. Dropping it directly leaks the value.

use alloc::boxed::Box;
use core::{marker::PhantomData, ptr::NonNull};

/// Pointee of the erased pointers in this module.
///
/// `NonNull<Erased>` points to a value whose concrete type is only known to
/// the operation table it is paired with.
struct Erased;

/// An owned, heap-allocated value of some concrete type `T`, erased to a
/// single pointer.
///
/// We cannot use a [`Box<T>`] directly, because that does not allow us to
/// type-erase the `T`.
// Copying would duplicate ownership of the allocation.
#[allow(missing_copy_implementations)]
#[repr(transparent)]
pub struct RawStorage {
    /// Pointer to the boxed value
    ///
    /// # Safety
    ///
    /// The following safety invariants are guaranteed to be upheld as long as
    /// this struct exists:
    ///
    /// 1. The pointer was created from a `Box<T>` for some `T` using
    ///    `Box::into_raw`.
    /// 2. The pointee is initialized and not aliased by any other owner.
    ptr: NonNull<Erased>,
}

impl RawStorage {
    /// Moves `value` to the heap and erases its type.
    #[inline]
    pub fn new<T: 'static>(value: T) -> Self {
        let ptr: *mut T = Box::into_raw(Box::new(value));
        let ptr: *mut Erased = ptr.cast::<Erased>();

        // SAFETY: `Box::into_raw` returns a non-null pointer
        let ptr: NonNull<Erased> = unsafe { NonNull::new_unchecked(ptr) };

        Self { ptr }
    }

    /// Returns a shared view of the stored value.
    #[inline]
    pub fn as_ref(&self) -> RawRef<'_> {
        RawRef {
            ptr: self.ptr,
            _marker: PhantomData,
        }
    }

    /// Returns a mutable view of the stored value.
    #[inline]
    pub fn as_mut(&mut self) -> RawMut<'_> {
        RawMut {
            ptr: self.ptr,
            _marker: PhantomData,
        }
    }

    /// Returns the address of the stored value.
    #[inline]
    pub fn addr(&self) -> usize {
        self.ptr.as_ptr().addr()
    }

    /// Converts the storage back into the box it was created from.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. The type `T` matches the type the storage was created with.
    #[inline]
    pub unsafe fn into_box<T: 'static>(self) -> Box<T> {
        let ptr: *mut T = self.ptr.cast::<T>().as_ptr();
        // SAFETY: The pointer came from `Box::<T>::into_raw` (guaranteed by the
        // invariants of this type and by the caller for the type `T`). `self` is
        // consumed, so no other owner remains.
        unsafe { Box::from_raw(ptr) }
    }
}

/// A lifetime-bound shared pointer to a value of some concrete type.
///
/// This behaves like a `&'a T` whose `T` has been forgotten.
#[derive(Clone, Copy)]
#[repr(transparent)]
pub struct RawRef<'a> {
    /// Pointer to the value
    ///
    /// # Safety
    ///
    /// The following safety invariants are guaranteed to be upheld as long as
    /// this struct exists:
    ///
    /// 1. The pointer was created from a `&'a T` or from a [`RawStorage`]
    ///    borrowed for `'a`.
    /// 2. The pointee is initialized and not mutated for `'a`.
    ptr: NonNull<Erased>,

    /// Marker to tell the compiler that we should
    /// behave the same as a `&'a Erased`
    _marker: PhantomData<&'a Erased>,
}

impl<'a> RawRef<'a> {
    /// Erases the type of a shared reference.
    #[inline]
    pub fn new<T: 'static>(value: &'a T) -> Self {
        Self {
            ptr: NonNull::from(value).cast::<Erased>(),
            _marker: PhantomData,
        }
    }

    /// Returns the address of the value.
    #[inline]
    pub fn addr(self) -> usize {
        self.ptr.as_ptr().addr()
    }

    /// Casts the pointer back to a reference.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. The type `T` matches the type of the referenced value.
    #[inline]
    pub unsafe fn cast<T: 'static>(self) -> &'a T {
        let ptr = self.ptr.cast::<T>();
        // SAFETY: Converting the NonNull pointer to a reference is sound because:
        // - The pointer is non-null, properly aligned and dereferenceable (it came
        //   from a reference or a live box)
        // - The pointee is an initialized `T` (guaranteed by the caller)
        // - Shared access is allowed for `'a` (invariant 2)
        unsafe { ptr.as_ref() }
    }
}

/// A lifetime-bound exclusive pointer to a value of some concrete type.
///
/// This behaves like a `&'a mut T` whose `T` has been forgotten.
#[repr(transparent)]
pub struct RawMut<'a> {
    /// Pointer to the value
    ///
    /// # Safety
    ///
    /// The following safety invariants are guaranteed to be upheld as long as
    /// this struct exists:
    ///
    /// 1. The pointer was created from a `&'a mut T` or from a [`RawStorage`]
    ///    mutably borrowed for `'a`.
    /// 2. No other pointer accesses the pointee for `'a`, except views derived
    ///    from this one.
    ptr: NonNull<Erased>,

    /// Marker to tell the compiler that we should
    /// behave the same as a `&'a mut Erased`
    _marker: PhantomData<&'a mut Erased>,
}

impl<'a> RawMut<'a> {
    /// Erases the type of a mutable reference.
    #[inline]
    pub fn new<T: 'static>(value: &'a mut T) -> Self {
        Self {
            ptr: NonNull::from(value).cast::<Erased>(),
            _marker: PhantomData,
        }
    }

    /// Reborrows for a shorter lifetime.
    #[inline]
    pub fn reborrow(&mut self) -> RawMut<'_> {
        RawMut {
            ptr: self.ptr,
            _marker: PhantomData,
        }
    }

    /// Returns a shared view for a shorter lifetime.
    #[inline]
    pub fn as_ref(&self) -> RawRef<'_> {
        RawRef {
            ptr: self.ptr,
            _marker: PhantomData,
        }
    }

    /// Converts into a shared view for the full lifetime.
    #[inline]
    pub fn into_ref(self) -> RawRef<'a> {
        RawRef {
            ptr: self.ptr,
            _marker: PhantomData,
        }
    }

    /// Returns the address of the value.
    #[inline]
    pub fn addr(&self) -> usize {
        self.ptr.as_ptr().addr()
    }

    /// Casts the pointer back to a mutable reference.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. The type `T` matches the type of the referenced value.
    #[inline]
    pub unsafe fn cast<T: 'static>(self) -> &'a mut T {
        let mut ptr = self.ptr.cast::<T>();
        // SAFETY: Converting the NonNull pointer to a mutable reference is sound
        // because:
        // - The pointer is non-null, properly aligned and dereferenceable
        // - The pointee is an initialized `T` (guaranteed by the caller)
        // - Access is exclusive for `'a` (invariant 2) and `self` is consumed
        unsafe { ptr.as_mut() }
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::String;

    use super::*;

    #[test]
    fn test_storage_size() {
        assert_eq!(
            core::mem::size_of::<RawStorage>(),
            core::mem::size_of::<usize>()
        );
        assert_eq!(
            core::mem::size_of::<Option<RawStorage>>(),
            core::mem::size_of::<usize>()
        );
        assert_eq!(
            core::mem::size_of::<RawRef<'_>>(),
            core::mem::size_of::<usize>()
        );
        assert_eq!(
            core::mem::size_of::<Option<RawMut<'_>>>(),
            core::mem::size_of::<usize>()
        );
    }

    #[test]
    fn test_storage_round_trip() {
        let mut storage = RawStorage::new(String::from("erased"));
        // SAFETY: The storage holds a `String`.
        let value = unsafe { storage.as_ref().cast::<String>() };
        assert_eq!(value, "erased");

        // SAFETY: The storage holds a `String`.
        let value = unsafe { storage.as_mut().cast::<String>() };
        value.push('!');

        // SAFETY: The storage holds a `String`.
        let boxed = unsafe { storage.into_box::<String>() };
        assert_eq!(*boxed, "erased!");
    }

    #[test]
    fn test_views_share_address() {
        let mut value = 7_u64;
        let address = core::ptr::from_ref(&value).addr();
        assert_eq!(RawRef::new(&value).addr(), address);

        let mut view = RawMut::new(&mut value);
        assert_eq!(view.addr(), address);
        assert_eq!(view.as_ref().addr(), address);
        // SAFETY: The view points to a `u64`.
        unsafe { *view.reborrow().cast::<u64>() += 1 };
        // SAFETY: The view points to a `u64`.
        assert_eq!(unsafe { *view.into_ref().cast::<u64>() }, 8);
    }

    #[test]
    fn test_zero_sized_storage() {
        let storage = RawStorage::new(());
        // SAFETY: The storage holds a `()`.
        let boxed = unsafe { storage.into_box::<()>() };
        let () = *boxed;
    }

    static_assertions::assert_not_impl_any!(RawStorage: Send, Sync, Clone, Copy);
    static_assertions::assert_not_impl_any!(RawRef<'static>: Send, Sync);
    static_assertions::assert_not_impl_any!(RawMut<'static>: Send, Sync, Clone, Copy);
}
