// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! A guarded key-value mapping, backed directly by `HashMap<K, V>`.
//!
//! Map entries are element-wrapped: iterating a map's entries never yields a
//! raw `(&K, &V)` pair, it yields a [`GuardedEntry`] (or [`GuardedEntryMut`]
//! for a mutable view) whose own `get_key`/`get_value`/`set_value` each run
//! the permission check before touching the underlying map.

use std::collections::HashMap;
use std::hash::Hash;

use crate::core::{Acquirable, Acquisition};
use crate::error::Result;

/// An acquirable mapping.
///
/// Read acquisitions expose [`GuardedMapView`]; write acquisitions expose
/// [`GuardedMapMut`]. Both address the same backing `HashMap<K, V>`.
pub struct MapAcquirable<K: Eq + Hash, V> {
    core: Acquirable<HashMap<K, V>>,
}

impl<K: Eq + Hash, V> MapAcquirable<K, V> {
    pub fn new() -> Self {
        Self {
            core: Acquirable::new(HashMap::new()),
        }
    }

    pub fn from_contents(initial: impl IntoIterator<Item = (K, V)>) -> Self {
        Self {
            core: Acquirable::new(initial.into_iter().collect()),
        }
    }

    pub fn acquire_read(&self) -> MapReadAcquisition<'_, K, V> {
        MapReadAcquisition {
            owner: self,
            acquisition: self.core.acquire_read(),
        }
    }

    pub fn acquire_write(&self) -> Result<MapWriteAcquisition<'_, K, V>> {
        Ok(MapWriteAcquisition {
            owner: self,
            acquisition: self.core.acquire_write()?,
        })
    }
}

impl<K: Eq + Hash, V> Default for MapAcquirable<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct MapReadAcquisition<'a, K: Eq + Hash, V> {
    owner: &'a MapAcquirable<K, V>,
    acquisition: Acquisition<HashMap<K, V>>,
}

impl<'a, K: Eq + Hash, V> MapReadAcquisition<'a, K, V> {
    pub fn view(&self) -> GuardedMapView<'_, K, V> {
        GuardedMapView {
            acquisition: &self.acquisition,
        }
    }

    pub fn close(&self) -> Result<()> {
        self.acquisition.close()
    }

    pub fn is_unlocked(&self) -> Result<bool> {
        self.acquisition.is_unlocked()
    }

    pub fn acquisition_type(&self) -> Result<crate::core::AcquisitionType> {
        self.acquisition.acquisition_type()
    }
}

impl<'a, K: Eq + Hash, V> std::ops::Deref for MapReadAcquisition<'a, K, V> {
    type Target = MapAcquirable<K, V>;
    fn deref(&self) -> &Self::Target {
        self.owner
    }
}

pub struct MapWriteAcquisition<'a, K: Eq + Hash, V> {
    owner: &'a MapAcquirable<K, V>,
    acquisition: Acquisition<HashMap<K, V>>,
}

impl<'a, K: Eq + Hash, V> MapWriteAcquisition<'a, K, V> {
    pub fn view(&self) -> GuardedMapMut<'_, K, V> {
        GuardedMapMut {
            acquisition: &self.acquisition,
        }
    }

    pub fn close(&self) -> Result<()> {
        self.acquisition.close()
    }

    pub fn is_unlocked(&self) -> Result<bool> {
        self.acquisition.is_unlocked()
    }

    pub fn acquisition_type(&self) -> Result<crate::core::AcquisitionType> {
        self.acquisition.acquisition_type()
    }
}

impl<'a, K: Eq + Hash, V> std::ops::Deref for MapWriteAcquisition<'a, K, V> {
    type Target = MapAcquirable<K, V>;
    fn deref(&self) -> &Self::Target {
        self.owner
    }
}

/// A read-only guarded view over a [`MapAcquirable`]'s contents.
pub struct GuardedMapView<'a, K: Eq + Hash, V> {
    acquisition: &'a Acquisition<HashMap<K, V>>,
}

impl<'a, K: Eq + Hash, V> GuardedMapView<'a, K, V> {
    pub fn len(&self) -> Result<usize> {
        self.acquisition.ensure_permitted_and_locked()?;
        // SAFETY: the check above just confirmed this thread owns a still-
        // live read (or reused/upgraded) stamp on the backing acquirable.
        Ok(unsafe { &*self.acquisition.data_ptr() }.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn contains_key(&self, key: &K) -> Result<bool> {
        self.acquisition.ensure_permitted_and_locked()?;
        // SAFETY: see `len`.
        Ok(unsafe { &*self.acquisition.data_ptr() }.contains_key(key))
    }

    pub fn get(&self, key: &K) -> Result<Option<V>>
    where
        V: Clone,
    {
        self.acquisition.ensure_permitted_and_locked()?;
        // SAFETY: see `len`.
        Ok(unsafe { &*self.acquisition.data_ptr() }.get(key).cloned())
    }

    /// The guarded key set: an iterator of cloned keys, each yield re-running
    /// the permission check.
    pub fn keys(&self) -> GuardedKeysIter<'a, K, V>
    where
        K: Clone,
    {
        GuardedKeysIter {
            acquisition: self.acquisition,
            index: 0,
        }
    }

    /// The guarded value collection.
    pub fn values(&self) -> GuardedValuesIter<'a, K, V>
    where
        V: Clone,
    {
        GuardedValuesIter {
            acquisition: self.acquisition,
            index: 0,
        }
    }

    /// The element-wrapped entry set: every yielded entry is a
    /// [`GuardedEntry`], never a raw key/value pair.
    pub fn entries(&self) -> GuardedEntriesIter<'a, K, V>
    where
        K: Clone,
    {
        GuardedEntriesIter {
            acquisition: self.acquisition,
            index: 0,
        }
    }
}

/// A mutating guarded view over a [`MapAcquirable`]'s contents, handed out
/// only from a write acquisition.
pub struct GuardedMapMut<'a, K: Eq + Hash, V> {
    acquisition: &'a Acquisition<HashMap<K, V>>,
}

impl<'a, K: Eq + Hash, V> GuardedMapMut<'a, K, V> {
    fn as_read(&self) -> GuardedMapView<'a, K, V> {
        GuardedMapView {
            acquisition: self.acquisition,
        }
    }

    pub fn len(&self) -> Result<usize> {
        self.as_read().len()
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.as_read().is_empty()
    }

    pub fn contains_key(&self, key: &K) -> Result<bool> {
        self.as_read().contains_key(key)
    }

    pub fn get(&self, key: &K) -> Result<Option<V>>
    where
        V: Clone,
    {
        self.as_read().get(key)
    }

    pub fn keys(&self) -> GuardedKeysIter<'a, K, V>
    where
        K: Clone,
    {
        self.as_read().keys()
    }

    pub fn values(&self) -> GuardedValuesIter<'a, K, V>
    where
        V: Clone,
    {
        self.as_read().values()
    }

    pub fn entries(&self) -> GuardedEntriesIter<'a, K, V>
    where
        K: Clone,
    {
        self.as_read().entries()
    }

    /// The element-wrapped, mutable entry set: every yielded entry is a
    /// [`GuardedEntryMut`], whose `set_value` writes through to the same
    /// backing map.
    pub fn entries_mut(&self) -> GuardedEntriesIterMut<'a, K, V>
    where
        K: Clone,
    {
        GuardedEntriesIterMut {
            acquisition: self.acquisition,
            index: 0,
        }
    }

    pub fn insert(&self, key: K, value: V) -> Result<Option<V>> {
        self.acquisition.ensure_permitted_and_locked()?;
        // SAFETY: the check above just confirmed this thread owns a still-
        // live write (or reused/upgraded) stamp on the backing acquirable,
        // so no other thread can be observing `data_ptr` concurrently.
        Ok(unsafe { &mut *self.acquisition.data_ptr() }.insert(key, value))
    }

    pub fn remove(&self, key: &K) -> Result<Option<V>> {
        self.acquisition.ensure_permitted_and_locked()?;
        // SAFETY: see `insert`.
        Ok(unsafe { &mut *self.acquisition.data_ptr() }.remove(key))
    }

    pub fn clear(&self) -> Result<()> {
        self.acquisition.ensure_permitted_and_locked()?;
        // SAFETY: see `insert`.
        unsafe { &mut *self.acquisition.data_ptr() }.clear();
        Ok(())
    }

    pub fn retain(&self, f: impl FnMut(&K, &mut V) -> bool) -> Result<()> {
        self.acquisition.ensure_permitted_and_locked()?;
        // SAFETY: see `insert`.
        unsafe { &mut *self.acquisition.data_ptr() }.retain(f);
        Ok(())
    }

    /// Applies `f` to the value at `key` in place; a no-op if absent.
    pub fn mutate(&self, key: &K, f: impl FnOnce(&mut V)) -> Result<()> {
        self.acquisition.ensure_permitted_and_locked()?;
        // SAFETY: see `insert`.
        if let Some(value) = unsafe { &mut *self.acquisition.data_ptr() }.get_mut(key) {
            f(value);
        }
        Ok(())
    }
}

/// A guarded iterator over a map's keys. Every call to `next()` re-runs the
/// permission check, deriving its element straight from the live map.
pub struct GuardedKeysIter<'a, K: Eq + Hash, V> {
    acquisition: &'a Acquisition<HashMap<K, V>>,
    index: usize,
}

impl<'a, K: Eq + Hash + Clone, V> Iterator for GuardedKeysIter<'a, K, V> {
    type Item = Result<K>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Err(err) = self.acquisition.ensure_permitted_and_locked() {
            return Some(Err(err));
        }
        // SAFETY: the check above just confirmed this thread owns a still-
        // live stamp on the backing acquirable.
        let map = unsafe { &*self.acquisition.data_ptr() };
        let key = map.keys().nth(self.index)?.clone();
        self.index += 1;
        Some(Ok(key))
    }
}

/// A guarded iterator over a map's values.
pub struct GuardedValuesIter<'a, K: Eq + Hash, V> {
    acquisition: &'a Acquisition<HashMap<K, V>>,
    index: usize,
}

impl<'a, K: Eq + Hash, V: Clone> Iterator for GuardedValuesIter<'a, K, V> {
    type Item = Result<V>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Err(err) = self.acquisition.ensure_permitted_and_locked() {
            return Some(Err(err));
        }
        // SAFETY: see `GuardedKeysIter::next`.
        let map = unsafe { &*self.acquisition.data_ptr() };
        let value = map.values().nth(self.index)?.clone();
        self.index += 1;
        Some(Ok(value))
    }
}

/// A guarded, element-wrapped entry: `get_key`/`get_value` each
/// independently run the permission check before reading the backing map,
/// so using one after its acquisition closes fails with
/// [`crate::AcquireError::AlreadyUnlocked`].
pub struct GuardedEntry<'a, K: Eq + Hash, V> {
    acquisition: &'a Acquisition<HashMap<K, V>>,
    key: K,
}

impl<'a, K: Eq + Hash + Clone, V> GuardedEntry<'a, K, V> {
    pub fn get_key(&self) -> Result<K> {
        self.acquisition.ensure_permitted_and_locked()?;
        Ok(self.key.clone())
    }

    pub fn get_value(&self) -> Result<Option<V>>
    where
        V: Clone,
    {
        self.acquisition.ensure_permitted_and_locked()?;
        // SAFETY: the check above just confirmed this thread owns a still-
        // live stamp on the backing acquirable.
        Ok(unsafe { &*self.acquisition.data_ptr() }.get(&self.key).cloned())
    }
}

/// A guarded, element-wrapped, mutable entry: adds `set_value`, which writes
/// through to the same backing map.
pub struct GuardedEntryMut<'a, K: Eq + Hash, V> {
    acquisition: &'a Acquisition<HashMap<K, V>>,
    key: K,
}

impl<'a, K: Eq + Hash + Clone, V> GuardedEntryMut<'a, K, V> {
    pub fn get_key(&self) -> Result<K> {
        self.acquisition.ensure_permitted_and_locked()?;
        Ok(self.key.clone())
    }

    pub fn get_value(&self) -> Result<Option<V>>
    where
        V: Clone,
    {
        self.acquisition.ensure_permitted_and_locked()?;
        // SAFETY: see `GuardedEntry::get_value`.
        Ok(unsafe { &*self.acquisition.data_ptr() }.get(&self.key).cloned())
    }

    pub fn set_value(&self, value: V) -> Result<Option<V>> {
        self.acquisition.ensure_permitted_and_locked()?;
        // SAFETY: the check above just confirmed this thread owns a still-
        // live write (or reused/upgraded) stamp on the backing acquirable.
        Ok(unsafe { &mut *self.acquisition.data_ptr() }.insert(self.key.clone(), value))
    }
}

/// A guarded iterator yielding element-wrapped [`GuardedEntry`]s.
pub struct GuardedEntriesIter<'a, K: Eq + Hash, V> {
    acquisition: &'a Acquisition<HashMap<K, V>>,
    index: usize,
}

impl<'a, K: Eq + Hash + Clone, V> Iterator for GuardedEntriesIter<'a, K, V> {
    type Item = Result<GuardedEntry<'a, K, V>>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Err(err) = self.acquisition.ensure_permitted_and_locked() {
            return Some(Err(err));
        }
        // SAFETY: the check above just confirmed this thread owns a still-
        // live stamp on the backing acquirable.
        let map = unsafe { &*self.acquisition.data_ptr() };
        let key = map.keys().nth(self.index)?.clone();
        self.index += 1;
        Some(Ok(GuardedEntry {
            acquisition: self.acquisition,
            key,
        }))
    }
}

/// A guarded iterator yielding element-wrapped [`GuardedEntryMut`]s.
pub struct GuardedEntriesIterMut<'a, K: Eq + Hash, V> {
    acquisition: &'a Acquisition<HashMap<K, V>>,
    index: usize,
}

impl<'a, K: Eq + Hash + Clone, V> Iterator for GuardedEntriesIterMut<'a, K, V> {
    type Item = Result<GuardedEntryMut<'a, K, V>>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Err(err) = self.acquisition.ensure_permitted_and_locked() {
            return Some(Err(err));
        }
        // SAFETY: see `GuardedEntriesIter::next`.
        let map = unsafe { &*self.acquisition.data_ptr() };
        let key = map.keys().nth(self.index)?.clone();
        self.index += 1;
        Some(Ok(GuardedEntryMut {
            acquisition: self.acquisition,
            key,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_visible_through_read_view() {
        let map = MapAcquirable::from_contents([("k", 1)]);
        let read = map.acquire_read();
        assert_eq!(read.view().get(&"k").unwrap(), Some(1));

        let write = map.acquire_write().expect("sole reader should upgrade");
        write.view().insert("k", 2).unwrap();
        assert_eq!(read.view().get(&"k").unwrap(), Some(2));
        write.close().unwrap();
        read.close().unwrap();
    }

    #[test]
    fn entry_fails_after_close() {
        let map = MapAcquirable::from_contents([("k", 1)]);
        let read = map.acquire_read();
        let entry = read.view().entries().next().unwrap().unwrap();
        assert_eq!(entry.get_key().unwrap(), "k");
        read.close().unwrap();
        assert_eq!(entry.get_key(), Err(crate::AcquireError::AlreadyUnlocked));
    }

    #[test]
    fn entry_set_value_writes_through() {
        let map = MapAcquirable::from_contents([("k", 1)]);
        let write = map.acquire_write().unwrap();
        let view = write.view();
        let entry = view.entries_mut().next().unwrap().unwrap();
        entry.set_value(99).unwrap();
        assert_eq!(view.get(&"k").unwrap(), Some(99));
        write.close().unwrap();
    }
}
