// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! A guarded, unordered collection of unique elements, backed directly by
//! `HashSet<T>`.

use std::collections::HashSet;
use std::hash::Hash;

use crate::core::{Acquirable, Acquisition};
use crate::error::Result;

/// An acquirable set.
///
/// Read acquisitions expose [`GuardedSetView`]; write acquisitions expose
/// [`GuardedSetMut`]. Both address the same backing `HashSet<T>`.
pub struct SetAcquirable<T: Eq + Hash> {
    core: Acquirable<HashSet<T>>,
}

impl<T: Eq + Hash> SetAcquirable<T> {
    pub fn new() -> Self {
        Self {
            core: Acquirable::new(HashSet::new()),
        }
    }

    pub fn from_contents(initial: impl IntoIterator<Item = T>) -> Self {
        Self {
            core: Acquirable::new(initial.into_iter().collect()),
        }
    }

    pub fn acquire_read(&self) -> SetReadAcquisition<'_, T> {
        SetReadAcquisition {
            owner: self,
            acquisition: self.core.acquire_read(),
        }
    }

    pub fn acquire_write(&self) -> Result<SetWriteAcquisition<'_, T>> {
        Ok(SetWriteAcquisition {
            owner: self,
            acquisition: self.core.acquire_write()?,
        })
    }
}

impl<T: Eq + Hash> Default for SetAcquirable<T> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct SetReadAcquisition<'a, T: Eq + Hash> {
    owner: &'a SetAcquirable<T>,
    acquisition: Acquisition<HashSet<T>>,
}

impl<'a, T: Eq + Hash> SetReadAcquisition<'a, T> {
    pub fn view(&self) -> GuardedSetView<'_, T> {
        GuardedSetView {
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

impl<'a, T: Eq + Hash> std::ops::Deref for SetReadAcquisition<'a, T> {
    type Target = SetAcquirable<T>;
    fn deref(&self) -> &Self::Target {
        self.owner
    }
}

pub struct SetWriteAcquisition<'a, T: Eq + Hash> {
    owner: &'a SetAcquirable<T>,
    acquisition: Acquisition<HashSet<T>>,
}

impl<'a, T: Eq + Hash> SetWriteAcquisition<'a, T> {
    pub fn view(&self) -> GuardedSetMut<'_, T> {
        GuardedSetMut {
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

impl<'a, T: Eq + Hash> std::ops::Deref for SetWriteAcquisition<'a, T> {
    type Target = SetAcquirable<T>;
    fn deref(&self) -> &Self::Target {
        self.owner
    }
}

/// A read-only guarded view over a [`SetAcquirable`]'s contents.
pub struct GuardedSetView<'a, T: Eq + Hash> {
    acquisition: &'a Acquisition<HashSet<T>>,
}

impl<'a, T: Eq + Hash> GuardedSetView<'a, T> {
    pub fn len(&self) -> Result<usize> {
        self.acquisition.ensure_permitted_and_locked()?;
        // SAFETY: the check above just confirmed this thread owns a still-
        // live read (or reused/upgraded) stamp on the backing acquirable.
        Ok(unsafe { &*self.acquisition.data_ptr() }.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn contains(&self, value: &T) -> Result<bool> {
        self.acquisition.ensure_permitted_and_locked()?;
        // SAFETY: see `len`.
        Ok(unsafe { &*self.acquisition.data_ptr() }.contains(value))
    }

    pub fn to_vec(&self) -> Result<Vec<T>>
    where
        T: Clone,
    {
        self.acquisition.ensure_permitted_and_locked()?;
        // SAFETY: see `len`.
        Ok(unsafe { &*self.acquisition.data_ptr() }.iter().cloned().collect())
    }

    /// A guarded iterator. Every call to `next()` re-runs the permission
    /// check, deriving its element straight from the live set rather than a
    /// snapshot — the cost is an `O(n)` walk per element (`HashSet` has no
    /// stable index), traded for never exposing a borrow that outlives a
    /// single `next()` call.
    pub fn iter(&self) -> GuardedSetIter<'a, T> {
        GuardedSetIter {
            acquisition: self.acquisition,
            index: 0,
        }
    }
}

/// A mutating guarded view over a [`SetAcquirable`]'s contents, handed out
/// only from a write acquisition.
pub struct GuardedSetMut<'a, T: Eq + Hash> {
    acquisition: &'a Acquisition<HashSet<T>>,
}

impl<'a, T: Eq + Hash> GuardedSetMut<'a, T> {
    fn as_read(&self) -> GuardedSetView<'a, T> {
        GuardedSetView {
            acquisition: self.acquisition,
        }
    }

    pub fn len(&self) -> Result<usize> {
        self.as_read().len()
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.as_read().is_empty()
    }

    pub fn contains(&self, value: &T) -> Result<bool> {
        self.as_read().contains(value)
    }

    pub fn to_vec(&self) -> Result<Vec<T>>
    where
        T: Clone,
    {
        self.as_read().to_vec()
    }

    pub fn iter(&self) -> GuardedSetIter<'a, T> {
        self.as_read().iter()
    }

    /// Inserts `value`, reporting whether it was newly added (`HashSet::insert`'s contract).
    pub fn insert(&self, value: T) -> Result<bool> {
        self.acquisition.ensure_permitted_and_locked()?;
        // SAFETY: the check above just confirmed this thread owns a still-
        // live write (or reused/upgraded) stamp on the backing acquirable,
        // so no other thread can be observing `data_ptr` concurrently.
        Ok(unsafe { &mut *self.acquisition.data_ptr() }.insert(value))
    }

    pub fn remove(&self, value: &T) -> Result<bool> {
        self.acquisition.ensure_permitted_and_locked()?;
        // SAFETY: see `insert`.
        Ok(unsafe { &mut *self.acquisition.data_ptr() }.remove(value))
    }

    pub fn clear(&self) -> Result<()> {
        self.acquisition.ensure_permitted_and_locked()?;
        // SAFETY: see `insert`.
        unsafe { &mut *self.acquisition.data_ptr() }.clear();
        Ok(())
    }

    pub fn extend(&self, values: impl IntoIterator<Item = T>) -> Result<()> {
        self.acquisition.ensure_permitted_and_locked()?;
        // SAFETY: see `insert`.
        unsafe { &mut *self.acquisition.data_ptr() }.extend(values);
        Ok(())
    }

    pub fn retain(&self, f: impl FnMut(&T) -> bool) -> Result<()> {
        self.acquisition.ensure_permitted_and_locked()?;
        // SAFETY: see `insert`.
        unsafe { &mut *self.acquisition.data_ptr() }.retain(f);
        Ok(())
    }
}

/// A guarded iterator over a [`GuardedSetView`] or [`GuardedSetMut`].
pub struct GuardedSetIter<'a, T: Eq + Hash> {
    acquisition: &'a Acquisition<HashSet<T>>,
    index: usize,
}

impl<'a, T: Eq + Hash + Clone> Iterator for GuardedSetIter<'a, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Err(err) = self.acquisition.ensure_permitted_and_locked() {
            return Some(Err(err));
        }
        // SAFETY: the check above just confirmed this thread owns a still-
        // live stamp on the backing acquirable.
        let set = unsafe { &*self.acquisition.data_ptr() };
        let item = set.iter().nth(self.index)?.clone();
        self.index += 1;
        Some(Ok(item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_visible_through_read_view() {
        let set = SetAcquirable::from_contents([1, 2, 3]);
        let read = set.acquire_read();
        assert!(read.view().contains(&2).unwrap());

        let write = set.acquire_write().expect("sole reader should upgrade");
        write.view().insert(4).unwrap();
        assert!(read.view().contains(&4).unwrap());
        write.close().unwrap();
        read.close().unwrap();
    }

    #[test]
    fn iterator_fails_after_close() {
        let set = SetAcquirable::from_contents(["a"]);
        let read = set.acquire_read();
        let mut iter = read.view().iter();
        assert_eq!(iter.next(), Some(Ok("a")));
        read.close().unwrap();
        assert_eq!(iter.next(), Some(Err(crate::AcquireError::AlreadyUnlocked)));
    }

    #[test]
    fn insert_reports_novelty() {
        let set = SetAcquirable::<i32>::new();
        let write = set.acquire_write().unwrap();
        assert!(write.view().insert(1).unwrap());
        assert!(!write.view().insert(1).unwrap());
        write.close().unwrap();
    }
}
