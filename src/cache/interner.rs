use core::{
    hash::Hash,
    ops::{Deref, DerefMut},
};
#[cfg(feature = "std")]
use std::sync::RwLock;

use hashbrown::HashMap;
use rustc_hash::FxBuildHasher;
#[cfg(not(feature = "std"))]
use spin::RwLock;

type Map<K, V> = HashMap<K, V, FxBuildHasher>;

/// A map of shared values behind a read-write lock, allocated on the first
/// insert so that it can live in a `static`.
pub(crate) struct Interner<K, V>(RwLock<Option<Map<K, V>>>);

impl<K, V> Interner<K, V> {
    #[must_use]
    pub(crate) const fn new() -> Self {
        Self(RwLock::new(None))
    }
}

impl<K: Eq + Hash, V: Clone> Interner<K, V> {
    fn read(&self) -> impl Deref<Target = Option<Map<K, V>>> + '_ {
        #[cfg(not(feature = "std"))]
        let guard = self.0.read();

        #[cfg(feature = "std")]
        let guard = self.0.read().expect("Unable to acquire cache lock");

        guard
    }

    fn write(&self) -> impl DerefMut<Target = Option<Map<K, V>>> + '_ {
        #[cfg(not(feature = "std"))]
        let guard = self.0.write();

        #[cfg(feature = "std")]
        let guard = self.0.write().expect("Unable to acquire cache lock");

        guard
    }

    /// Returns the value interned under `key`.
    pub(crate) fn get(&self, key: &K) -> Option<V> {
        self.read().as_ref()?.get(key).cloned()
    }

    /// Interns `value` under `key` unless another thread got there first, and
    /// returns the interned value.
    pub(crate) fn intern(&self, key: K, value: V) -> V {
        self.write()
            .get_or_insert_with(Map::default)
            .entry(key)
            .or_insert(value)
            .clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.read().as_ref().map_or(0, Map::len)
    }

    /// Empties the map, returning how many values it held.
    pub(crate) fn clear(&self) -> usize {
        self.write().take().map_or(0, |map| map.len())
    }
}
