//! Storage for table entries of arbitrary types.

use core::any::Any;

use triomphe::Arc;
use unsize::CoerceUnsize;

/// An entry of an operation table.
///
/// Entries are usually function pointers specialized to one concrete type,
/// but any `Copy` value works (typeid entries store a [`TypeInfo`]).
///
/// [`TypeInfo`]: crate::TypeInfo
pub(crate) trait EntryValue: Any + Send + Sync {
    /// Upcasts to [`Any`] for downcasting to the entry's concrete type.
    fn as_any(&self) -> &dyn Any;
}

impl<E: Any + Send + Sync> EntryValue for E {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A shared, type-erased entry.
pub(crate) type SharedEntry = Arc<dyn EntryValue>;

/// Erases an entry value.
pub(crate) fn erase<E: Copy + Send + Sync + 'static>(entry: E) -> SharedEntry {
    Arc::new(entry).unsize(unsize::Coercion!(to dyn EntryValue))
}

/// Reads an entry back as `E`, or `None` if it has a different type.
pub(crate) fn read<E: Copy + 'static>(entry: &SharedEntry) -> Option<E> {
    let value: &dyn EntryValue = &**entry;
    value.as_any().downcast_ref::<E>().copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn double(value: u32) -> u32 {
        value * 2
    }

    #[test]
    fn test_entry_round_trip() {
        let entry = erase(double as fn(u32) -> u32);
        let read_back = read::<fn(u32) -> u32>(&entry).unwrap();
        assert_eq!(read_back(21), 42);
        assert!(read::<u32>(&entry).is_none());
    }
}
