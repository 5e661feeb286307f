// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The acquirable core: owns the stamped lock and the per-thread registry,
//! and mints/reuses/upgrades acquisitions over them.

use std::cell::UnsafeCell;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::thread::ThreadId;

use tracing::trace;

use crate::core::acquisition::{Acquisition, AcquisitionType, RootAcquisition};
use crate::core::stamped_lock::StampedLock;
use crate::error::Result;

pub(crate) struct AcquirableInner<S> {
    pub(crate) lock: StampedLock,
    pub(crate) data: UnsafeCell<S>,
    /// Non-owning index used purely for reentrance detection. Ownership runs
    /// the other way, from the caller's `Acquisition` to this
    /// `AcquirableInner` via `Arc`, so there is no reference cycle to break.
    pub(crate) registry: Mutex<HashMap<ThreadId, Weak<RootAcquisition<S>>>>,
}

// SAFETY: `AcquirableInner<S>` only exposes its `UnsafeCell<S>` through
// acquisitions that have already proven (via `ensure_permitted_and_locked`)
// that the calling thread holds the corresponding stamp, exactly the same
// contract a `std::sync::RwLock<S>` gives its callers.
unsafe impl<S: Send> Send for AcquirableInner<S> {}
unsafe impl<S: Send + Sync> Sync for AcquirableInner<S> {}

impl<S> AcquirableInner<S> {
    pub(crate) fn data_ptr(&self) -> *mut S {
        self.data.get()
    }

    fn lock_registry(&self) -> std::sync::MutexGuard<'_, HashMap<ThreadId, Weak<RootAcquisition<S>>>> {
        self.registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// An object that owns one unit of protected state and a read/write lock
/// guarding it.
///
/// This is the low-level building block `ValueAcquirable` and the container
/// acquirables (`ListAcquirable`, `SetAcquirable`, `MapAcquirable`) are built
/// on top of; most callers will reach for one of those instead of this type
/// directly.
pub struct Acquirable<S> {
    inner: Arc<AcquirableInner<S>>,
}

impl<S> Clone for Acquirable<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> Acquirable<S> {
    pub fn new(initial: S) -> Self {
        Self {
            inner: Arc::new(AcquirableInner {
                lock: StampedLock::new(),
                data: UnsafeCell::new(initial),
                registry: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Acquires a read acquisition, blocking until no writer holds the lock.
    ///
    /// If the calling thread already holds any acquisition on this
    /// acquirable, a lightweight [`Acquisition::Reused`] wrapper is returned
    /// immediately and no lock operation is performed.
    pub fn acquire_read(&self) -> Acquisition<S> {
        let thread = std::thread::current().id();

        {
            let registry = self.inner.lock_registry();
            if let Some(root) = registry.get(&thread).and_then(Weak::upgrade) {
                trace!(?thread, "reusing acquisition for read");
                return Acquisition::reused(root);
            }
        }

        self.inner.lock.lock_shared();

        let root = Arc::new(RootAcquisition::new(
            Arc::clone(&self.inner),
            thread,
            AcquisitionType::Read,
        ));
        self.inner
            .lock_registry()
            .insert(thread, Arc::downgrade(&root));

        Acquisition::root(root)
    }

    /// Acquires a write acquisition, blocking until no other reader or
    /// writer holds the lock.
    ///
    /// If the calling thread already holds a write acquisition, a
    /// lightweight [`Acquisition::Reused`] wrapper is returned. If it holds
    /// only a read acquisition, an upgrade is attempted and may fail with
    /// [`crate::AcquireError::UpgradeRefused`].
    pub fn acquire_write(&self) -> Result<Acquisition<S>> {
        let thread = std::thread::current().id();

        let existing = self.inner.lock_registry().get(&thread).and_then(Weak::upgrade);

        let Some(root) = existing else {
            self.inner.lock.lock_exclusive();
            let root = Arc::new(RootAcquisition::new(
                Arc::clone(&self.inner),
                thread,
                AcquisitionType::Write,
            ));
            self.inner
                .lock_registry()
                .insert(thread, Arc::downgrade(&root));
            return Ok(Acquisition::root(root));
        };

        if root.base_kind() == AcquisitionType::Write {
            trace!(?thread, "reusing acquisition for write");
            return Ok(Acquisition::reused(root));
        }

        root.upgrade()
    }

    /// Whether any thread currently holds a lock on this acquirable.
    pub fn is_locked(&self) -> bool {
        self.inner.lock.is_locked()
    }

    /// The raw stamped lock backing this acquirable, for
    /// [`crate::Condition`]'s release/reacquire around a condvar wait. Not
    /// part of the public acquisition lifecycle.
    pub(crate) fn raw_lock(&self) -> &StampedLock {
        &self.inner.lock
    }

    /// Whether `acquisition` was minted from this exact acquirable, not just
    /// one of the same type `S`.
    pub(crate) fn owns(&self, acquisition: &Acquisition<S>) -> bool {
        Arc::ptr_eq(&self.inner, acquisition.acquirable_arc())
    }
}
