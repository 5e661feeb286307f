// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Typed value acquirables: a single guarded cell holding either a
//! primitive value or a reference value.

use crate::core::{Acquirable, Acquisition, AcquisitionType};
use crate::error::{AcquireError, Result};

/// A guarded cell holding a single value of type `T`.
///
/// `get`/`set` are O(1) and run under the acquisition's lock; there is no
/// structural mutation beyond replacing the stored value.
///
/// The primitive members below are type aliases over this; the
/// nullable-reference family is `ValueAcquirable<Option<T>>` directly, and
/// the non-nullable family is [`NonNullCell`].
pub struct ValueAcquirable<T> {
    core: Acquirable<T>,
}

impl<T> Clone for ValueAcquirable<T> {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
        }
    }
}

impl<T> ValueAcquirable<T> {
    pub fn new(initial: T) -> Self {
        Self {
            core: Acquirable::new(initial),
        }
    }

    pub fn acquire_read(&self) -> ValueReadAcquisition<'_, T> {
        ValueReadAcquisition {
            owner: self,
            acquisition: self.core.acquire_read(),
        }
    }

    pub fn acquire_write(&self) -> Result<ValueWriteAcquisition<'_, T>> {
        Ok(ValueWriteAcquisition {
            owner: self,
            acquisition: self.core.acquire_write()?,
        })
    }
}

impl<T: Default> Default for ValueAcquirable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// A read acquisition over a [`ValueAcquirable`].
pub struct ValueReadAcquisition<'a, T> {
    owner: &'a ValueAcquirable<T>,
    acquisition: Acquisition<T>,
}

impl<'a, T: Clone> ValueReadAcquisition<'a, T> {
    pub fn get(&self) -> Result<T> {
        self.acquisition.ensure_permitted_and_locked()?;
        // SAFETY: `ensure_permitted_and_locked` just confirmed this thread
        // owns a still-live read (or reused/upgraded) stamp on `owner`.
        Ok(unsafe { &*self.acquisition.data_ptr() }.clone())
    }

    pub fn close(&self) -> Result<()> {
        self.acquisition.close()
    }

    pub fn is_unlocked(&self) -> Result<bool> {
        self.acquisition.is_unlocked()
    }

    pub fn acquisition_type(&self) -> Result<AcquisitionType> {
        self.acquisition.acquisition_type()
    }
}

impl<'a, T> std::ops::Deref for ValueReadAcquisition<'a, T> {
    type Target = ValueAcquirable<T>;
    fn deref(&self) -> &Self::Target {
        self.owner
    }
}

/// A write acquisition over a [`ValueAcquirable`].
pub struct ValueWriteAcquisition<'a, T> {
    owner: &'a ValueAcquirable<T>,
    acquisition: Acquisition<T>,
}

impl<'a, T: Clone> ValueWriteAcquisition<'a, T> {
    pub fn get(&self) -> Result<T> {
        self.acquisition.ensure_permitted_and_locked()?;
        // SAFETY: see `ValueReadAcquisition::get`.
        Ok(unsafe { &*self.acquisition.data_ptr() }.clone())
    }

    pub fn set(&self, value: T) -> Result<()> {
        self.acquisition.ensure_permitted_and_locked()?;
        // SAFETY: `ensure_permitted_and_locked` just confirmed this thread
        // owns a still-live write (or reused/upgraded) stamp on `owner`, so
        // no other thread can be observing `data_ptr` concurrently.
        unsafe { *self.acquisition.data_ptr() = value };
        Ok(())
    }

    pub fn close(&self) -> Result<()> {
        self.acquisition.close()
    }

    pub fn is_unlocked(&self) -> Result<bool> {
        self.acquisition.is_unlocked()
    }

    pub fn acquisition_type(&self) -> Result<AcquisitionType> {
        self.acquisition.acquisition_type()
    }
}

impl<'a, T> std::ops::Deref for ValueWriteAcquisition<'a, T> {
    type Target = ValueAcquirable<T>;
    fn deref(&self) -> &Self::Target {
        self.owner
    }
}

/// A guarded cell holding a non-nullable reference value.
///
/// Rust's type system already makes "non-nullable `T`" the default and
/// unconditional case for ordinary code; this wrapper exists for callers
/// that hold an `Option<T>` and want storing `None` to surface as a
/// recoverable [`AcquireError::NullValue`] rather than a type error, leaving
/// the cell's previous value unchanged.
pub struct NonNullCell<T> {
    inner: ValueAcquirable<Option<T>>,
}

impl<T: Clone> NonNullCell<T> {
    pub fn new(initial: T) -> Self {
        Self {
            inner: ValueAcquirable::new(Some(initial)),
        }
    }

    pub fn acquire_read(&self) -> NonNullReadAcquisition<'_, T> {
        NonNullReadAcquisition {
            acquisition: self.inner.acquire_read(),
        }
    }

    pub fn acquire_write(&self) -> Result<NonNullWriteAcquisition<'_, T>> {
        Ok(NonNullWriteAcquisition {
            acquisition: self.inner.acquire_write()?,
        })
    }
}

pub struct NonNullReadAcquisition<'a, T> {
    acquisition: ValueReadAcquisition<'a, Option<T>>,
}

impl<'a, T: Clone> NonNullReadAcquisition<'a, T> {
    /// Returns the cell's current value.
    ///
    /// # Panics
    ///
    /// Panics if the cell somehow holds `None` — unreachable through this
    /// type's public API, since [`NonNullWriteAcquisition::set`] rejects
    /// `None` before it is ever stored.
    pub fn get(&self) -> Result<T> {
        self.acquisition
            .get()
            .map(|v| v.expect("NonNullCell invariant violated: stored value was null"))
    }

    pub fn close(&self) -> Result<()> {
        self.acquisition.close()
    }

    pub fn is_unlocked(&self) -> Result<bool> {
        self.acquisition.is_unlocked()
    }
}

pub struct NonNullWriteAcquisition<'a, T> {
    acquisition: ValueWriteAcquisition<'a, Option<T>>,
}

impl<'a, T: Clone> NonNullWriteAcquisition<'a, T> {
    pub fn get(&self) -> Result<T> {
        self.acquisition
            .get()
            .map(|v| v.expect("NonNullCell invariant violated: stored value was null"))
    }

    /// Stores a new value. There is no way to call this with a null value in
    /// safe Rust (the parameter is `T`, not `Option<T>`); callers that hold
    /// an `Option<T>` and want the null case surfaced as an error instead of
    /// a type error should use [`NonNullCell::try_set_optional`] below.
    pub fn set(&self, value: T) -> Result<()> {
        self.acquisition.set(Some(value))
    }

    /// Stores a new value that may be absent, surfacing
    /// [`AcquireError::NullValue`] instead of storing `None`.
    pub fn try_set_optional(&self, value: Option<T>) -> Result<()> {
        match value {
            Some(value) => self.acquisition.set(Some(value)),
            None => Err(AcquireError::NullValue),
        }
    }

    pub fn close(&self) -> Result<()> {
        self.acquisition.close()
    }

    pub fn is_unlocked(&self) -> Result<bool> {
        self.acquisition.is_unlocked()
    }
}

macro_rules! primitive_cell {
    ($name:ident, $ty:ty, $doc:expr) => {
        #[doc = $doc]
        pub type $name = ValueAcquirable<$ty>;
    };
}

primitive_cell!(IntCell, i32, "A guarded 32-bit integer cell.");
primitive_cell!(LongCell, i64, "A guarded 64-bit integer cell.");
primitive_cell!(ShortCell, i16, "A guarded 16-bit integer cell.");
primitive_cell!(ByteCell, i8, "A guarded 8-bit integer cell.");
primitive_cell!(FloatCell, f32, "A guarded IEEE-754 32-bit float cell.");
primitive_cell!(DoubleCell, f64, "A guarded IEEE-754 64-bit float cell.");
primitive_cell!(BoolCell, bool, "A guarded boolean cell.");
/// A guarded 16-bit character cell (`u16`, a UTF-16 code unit rather than
/// Rust's 32-bit `char`).
pub type CharCell = ValueAcquirable<u16>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reentrant_read() {
        let cell = ValueAcquirable::new("x".to_string());
        let a1 = cell.acquire_read();
        let a2 = cell.acquire_read();
        assert_eq!(a1.get().unwrap(), "x");
        assert_eq!(a2.get().unwrap(), "x");
        assert!(a2.close().is_ok());
        assert!(a1.close().is_ok());
    }

    #[test]
    fn upgrade_round_trip() {
        let cell = IntCell::new(0);
        let read = cell.acquire_read();
        assert_eq!(read.get().unwrap(), 0);

        let write = cell.acquire_write().expect("sole reader should upgrade");
        assert_eq!(write.acquisition_type().unwrap(), AcquisitionType::Write);
        write.set(42).unwrap();
        assert_eq!(read.get().unwrap(), 42);

        write.close().unwrap();
        read.close().unwrap();

        let read_again = cell.acquire_read();
        assert_eq!(read_again.get().unwrap(), 42);
    }

    #[test]
    fn wrong_thread_fails() {
        let cell = IntCell::new(0);
        let write = cell.acquire_write().unwrap();

        std::thread::scope(|scope| {
            scope.spawn(|| {
                assert_eq!(write.get(), Err(AcquireError::WrongThread));
                assert_eq!(write.set(1), Err(AcquireError::WrongThread));
                assert_eq!(write.close(), Err(AcquireError::WrongThread));
            });
        });

        assert_eq!(write.get().unwrap(), 0);
        write.close().unwrap();
    }

    #[test]
    fn non_null_cell_rejects_null() {
        let cell = NonNullCell::new(1i32);
        let write = cell.acquire_write().unwrap();
        assert_eq!(write.get().unwrap(), 1);
        assert_eq!(write.try_set_optional(None), Err(AcquireError::NullValue));
        assert_eq!(write.get().unwrap(), 1);
        write.try_set_optional(Some(2)).unwrap();
        assert_eq!(write.get().unwrap(), 2);
    }
}
