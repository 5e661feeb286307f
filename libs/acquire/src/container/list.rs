// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! A guarded, ordered sequence backed directly by `Vec<T>`.

use crate::core::{Acquirable, Acquisition};
use crate::error::Result;

/// An acquirable ordered sequence.
///
/// Read acquisitions expose [`GuardedListView`] (non-mutating); write
/// acquisitions expose [`GuardedListMut`] (full mutating API). Both address
/// the same backing `Vec<T>`.
pub struct ListAcquirable<T> {
    core: Acquirable<Vec<T>>,
}

impl<T> ListAcquirable<T> {
    pub fn new() -> Self {
        Self {
            core: Acquirable::new(Vec::new()),
        }
    }

    /// Builds an acquirable list from initial contents, copied in.
    pub fn from_contents(initial: impl IntoIterator<Item = T>) -> Self {
        Self {
            core: Acquirable::new(initial.into_iter().collect()),
        }
    }

    pub fn acquire_read(&self) -> ListReadAcquisition<'_, T> {
        ListReadAcquisition {
            owner: self,
            acquisition: self.core.acquire_read(),
        }
    }

    pub fn acquire_write(&self) -> Result<ListWriteAcquisition<'_, T>> {
        Ok(ListWriteAcquisition {
            owner: self,
            acquisition: self.core.acquire_write()?,
        })
    }
}

impl<T> Default for ListAcquirable<T> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ListReadAcquisition<'a, T> {
    owner: &'a ListAcquirable<T>,
    acquisition: Acquisition<Vec<T>>,
}

impl<'a, T> ListReadAcquisition<'a, T> {
    pub fn view(&self) -> GuardedListView<'_, T> {
        GuardedListView {
            acquisition: &self.acquisition,
            start: 0,
            end: None,
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

impl<'a, T> std::ops::Deref for ListReadAcquisition<'a, T> {
    type Target = ListAcquirable<T>;
    fn deref(&self) -> &Self::Target {
        self.owner
    }
}

pub struct ListWriteAcquisition<'a, T> {
    owner: &'a ListAcquirable<T>,
    acquisition: Acquisition<Vec<T>>,
}

impl<'a, T> ListWriteAcquisition<'a, T> {
    pub fn view(&self) -> GuardedListMut<'_, T> {
        GuardedListMut {
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

impl<'a, T> std::ops::Deref for ListWriteAcquisition<'a, T> {
    type Target = ListAcquirable<T>;
    fn deref(&self) -> &Self::Target {
        self.owner
    }
}

/// A read-only guarded view over a [`ListAcquirable`]'s contents. `start`/
/// `end` bound the window this view covers, letting [`Self::sub_view`] hand
/// out a recursive guarded view over a slice of the same backing `Vec`
/// without copying.
pub struct GuardedListView<'a, T> {
    acquisition: &'a Acquisition<Vec<T>>,
    start: usize,
    end: Option<usize>,
}

impl<'a, T> GuardedListView<'a, T> {
    fn bounds(&self, len: usize) -> (usize, usize) {
        let end = self.end.unwrap_or(len).min(len);
        (self.start.min(end), end)
    }

    pub fn len(&self) -> Result<usize> {
        self.acquisition.ensure_permitted_and_locked()?;
        // SAFETY: the check above just confirmed this thread owns a still-
        // live read (or reused/upgraded) stamp on the backing acquirable.
        let vec = unsafe { &*self.acquisition.data_ptr() };
        let (start, end) = self.bounds(vec.len());
        Ok(end - start)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn get(&self, index: usize) -> Result<Option<T>>
    where
        T: Clone,
    {
        self.acquisition.ensure_permitted_and_locked()?;
        // SAFETY: see `len`.
        let vec = unsafe { &*self.acquisition.data_ptr() };
        let (start, end) = self.bounds(vec.len());
        let idx = start + index;
        Ok(if idx < end { vec.get(idx).cloned() } else { None })
    }

    pub fn contains(&self, value: &T) -> Result<bool>
    where
        T: PartialEq,
    {
        self.acquisition.ensure_permitted_and_locked()?;
        // SAFETY: see `len`.
        let vec = unsafe { &*self.acquisition.data_ptr() };
        let (start, end) = self.bounds(vec.len());
        Ok(vec[start..end].contains(value))
    }

    pub fn to_vec(&self) -> Result<Vec<T>>
    where
        T: Clone,
    {
        self.acquisition.ensure_permitted_and_locked()?;
        // SAFETY: see `len`.
        let vec = unsafe { &*self.acquisition.data_ptr() };
        let (start, end) = self.bounds(vec.len());
        Ok(vec[start..end].to_vec())
    }

    /// A guarded iterator. Every call to `next()` re-runs the permission
    /// check, so a held iterator stops yielding the instant its acquisition
    /// closes.
    pub fn iter(&self) -> GuardedListIter<'a, T> {
        GuardedListIter {
            acquisition: self.acquisition,
            index: self.start,
            end: self.end,
        }
    }

    /// A recursive guarded view over `range`, bound to the same acquisition
    /// as `self` — sub-lists are themselves guarded views.
    pub fn sub_view(&self, range: std::ops::Range<usize>) -> Result<GuardedListView<'a, T>> {
        self.acquisition.ensure_permitted_and_locked()?;
        // SAFETY: see `len`.
        let vec = unsafe { &*self.acquisition.data_ptr() };
        let (start, end) = self.bounds(vec.len());
        let new_start = (start + range.start).min(end);
        let new_end = (start + range.end).min(end);
        Ok(GuardedListView {
            acquisition: self.acquisition,
            start: new_start,
            end: Some(new_end),
        })
    }
}

/// A mutating guarded view over a [`ListAcquirable`]'s contents, handed out
/// only from a write acquisition.
pub struct GuardedListMut<'a, T> {
    acquisition: &'a Acquisition<Vec<T>>,
}

impl<'a, T> GuardedListMut<'a, T> {
    fn as_read(&self) -> GuardedListView<'a, T> {
        GuardedListView {
            acquisition: self.acquisition,
            start: 0,
            end: None,
        }
    }

    pub fn len(&self) -> Result<usize> {
        self.as_read().len()
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.as_read().is_empty()
    }

    pub fn get(&self, index: usize) -> Result<Option<T>>
    where
        T: Clone,
    {
        self.as_read().get(index)
    }

    pub fn contains(&self, value: &T) -> Result<bool>
    where
        T: PartialEq,
    {
        self.as_read().contains(value)
    }

    pub fn to_vec(&self) -> Result<Vec<T>>
    where
        T: Clone,
    {
        self.as_read().to_vec()
    }

    pub fn iter(&self) -> GuardedListIter<'a, T> {
        self.as_read().iter()
    }

    pub fn sub_view(&self, range: std::ops::Range<usize>) -> Result<GuardedListView<'a, T>> {
        self.as_read().sub_view(range)
    }

    pub fn push(&self, value: T) -> Result<()> {
        self.acquisition.ensure_permitted_and_locked()?;
        // SAFETY: the check above just confirmed this thread owns a still-
        // live write (or reused/upgraded) stamp on the backing acquirable,
        // so no other thread can be observing `data_ptr` concurrently.
        unsafe { &mut *self.acquisition.data_ptr() }.push(value);
        Ok(())
    }

    pub fn pop(&self) -> Result<Option<T>> {
        self.acquisition.ensure_permitted_and_locked()?;
        // SAFETY: see `push`.
        Ok(unsafe { &mut *self.acquisition.data_ptr() }.pop())
    }

    /// # Panics
    ///
    /// Panics if `index > len`, the same contract `Vec::insert` has —
    /// out-of-bounds indexing is a `Vec` contract violation, not an
    /// acquisition-layer error.
    pub fn insert(&self, index: usize, value: T) -> Result<()> {
        self.acquisition.ensure_permitted_and_locked()?;
        // SAFETY: see `push`.
        unsafe { &mut *self.acquisition.data_ptr() }.insert(index, value);
        Ok(())
    }

    /// # Panics
    ///
    /// Panics if `index >= len`, the same contract `Vec::remove` has.
    pub fn remove(&self, index: usize) -> Result<T> {
        self.acquisition.ensure_permitted_and_locked()?;
        // SAFETY: see `push`.
        Ok(unsafe { &mut *self.acquisition.data_ptr() }.remove(index))
    }

    /// Replaces the element at `index`, returning the value it held.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len`.
    pub fn set(&self, index: usize, value: T) -> Result<T> {
        self.acquisition.ensure_permitted_and_locked()?;
        // SAFETY: see `push`.
        let vec = unsafe { &mut *self.acquisition.data_ptr() };
        Ok(std::mem::replace(&mut vec[index], value))
    }

    pub fn clear(&self) -> Result<()> {
        self.acquisition.ensure_permitted_and_locked()?;
        // SAFETY: see `push`.
        unsafe { &mut *self.acquisition.data_ptr() }.clear();
        Ok(())
    }

    pub fn extend(&self, values: impl IntoIterator<Item = T>) -> Result<()> {
        self.acquisition.ensure_permitted_and_locked()?;
        // SAFETY: see `push`.
        unsafe { &mut *self.acquisition.data_ptr() }.extend(values);
        Ok(())
    }

    pub fn retain(&self, f: impl FnMut(&T) -> bool) -> Result<()> {
        self.acquisition.ensure_permitted_and_locked()?;
        // SAFETY: see `push`.
        unsafe { &mut *self.acquisition.data_ptr() }.retain(f);
        Ok(())
    }

    /// Applies `f` to the element at `index` in place; a no-op if `index` is
    /// out of bounds.
    pub fn mutate(&self, index: usize, f: impl FnOnce(&mut T)) -> Result<()> {
        self.acquisition.ensure_permitted_and_locked()?;
        // SAFETY: see `push`.
        if let Some(elem) = unsafe { &mut *self.acquisition.data_ptr() }.get_mut(index) {
            f(elem);
        }
        Ok(())
    }
}

/// A guarded iterator over a [`GuardedListView`] or [`GuardedListMut`].
///
/// Re-checks `ensure_permitted_and_locked` on every `next()` call, so the
/// iterator stops yielding the instant its acquisition closes.
pub struct GuardedListIter<'a, T> {
    acquisition: &'a Acquisition<Vec<T>>,
    index: usize,
    end: Option<usize>,
}

impl<'a, T: Clone> Iterator for GuardedListIter<'a, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Err(err) = self.acquisition.ensure_permitted_and_locked() {
            return Some(Err(err));
        }
        // SAFETY: the check above just confirmed this thread owns a still-
        // live stamp on the backing acquirable.
        let vec = unsafe { &*self.acquisition.data_ptr() };
        let end = self.end.unwrap_or(vec.len()).min(vec.len());
        if self.index >= end {
            return None;
        }
        let item = vec[self.index].clone();
        self.index += 1;
        Some(Ok(item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_visible_through_read_view() {
        let list = ListAcquirable::from_contents([1, 2, 3]);
        let read = list.acquire_read();
        assert_eq!(read.view().to_vec().unwrap(), vec![1, 2, 3]);

        let write = list.acquire_write().expect("sole reader should upgrade");
        write.view().push(4).unwrap();
        assert_eq!(read.view().to_vec().unwrap(), vec![1, 2, 3, 4]);
        write.close().unwrap();
        read.close().unwrap();
    }

    #[test]
    fn iterator_fails_after_close() {
        let list = ListAcquirable::from_contents(["a", "b"]);
        let read = list.acquire_read();
        let mut iter = read.view().iter();
        assert_eq!(iter.next(), Some(Ok("a")));
        read.close().unwrap();
        assert_eq!(iter.next(), Some(Err(crate::AcquireError::AlreadyUnlocked)));
    }

    #[test]
    fn sub_view_windows_the_backing_vec() {
        let list = ListAcquirable::from_contents([0, 1, 2, 3, 4]);
        let read = list.acquire_read();
        let view = read.view();
        let sub = view.sub_view(1..4).unwrap();
        assert_eq!(sub.to_vec().unwrap(), vec![1, 2, 3]);
        read.close().unwrap();
    }

    #[test]
    fn wrong_thread_fails_on_guarded_view() {
        let list = ListAcquirable::from_contents([1]);
        let write = list.acquire_write().unwrap();
        let view = write.view();

        std::thread::scope(|scope| {
            scope.spawn(|| {
                assert_eq!(view.push(2), Err(crate::AcquireError::WrongThread));
                assert_eq!(view.to_vec(), Err(crate::AcquireError::WrongThread));
            });
        });

        assert_eq!(view.to_vec().unwrap(), vec![1]);
        write.close().unwrap();
    }
}
