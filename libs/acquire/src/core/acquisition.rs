// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The acquisition contract and the three variants that implement it: root,
//! reused, and upgraded.
//!
//! The capability surface is a single `enum` whose variants all wrap an
//! `Arc<RootAcquisition<S>>`. Ownership flows caller → acquisition (the
//! `Arc`); the acquirable's registry only ever stores a `Weak`
//! back-reference, so there is no reference cycle.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::ThreadId;

use tracing::{debug, warn};

use crate::core::acquirable::AcquirableInner;
use crate::error::{AcquireError, Result};

/// Whether an acquisition currently grants read or write access.
///
/// For a root acquisition created with [`AcquisitionType::Read`] that has
/// since been upgraded, this transiently reports `Write` for as long as any
/// [`Acquisition::Upgraded`] wrapper referring to it is live, and reverts to
/// `Read` once the outermost one closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AcquisitionType {
    Read,
    Write,
}

/// The acquisition actually registered in an acquirable's per-thread
/// registry. Holds the real lock stamp; `Reused` and `Upgraded` wrappers
/// carry no independent state of their own beyond what is needed to unwind
/// an upgrade.
#[derive(Debug)]
pub(crate) struct RootAcquisition<S> {
    pub(crate) acquirable: Arc<AcquirableInner<S>>,
    pub(crate) owner: ThreadId,
    base_kind: AcquisitionType,
    upgrade_depth: AtomicUsize,
    closed: AtomicBool,
}

impl<S> RootAcquisition<S> {
    pub(crate) fn new(
        acquirable: Arc<AcquirableInner<S>>,
        owner: ThreadId,
        base_kind: AcquisitionType,
    ) -> Self {
        Self {
            acquirable,
            owner,
            base_kind,
            upgrade_depth: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn base_kind(&self) -> AcquisitionType {
        self.base_kind
    }

    /// The type this root currently reports, folding in any live upgrade.
    pub(crate) fn current_kind(&self) -> AcquisitionType {
        if self.base_kind == AcquisitionType::Write
            || self.upgrade_depth.load(Ordering::Acquire) > 0
        {
            AcquisitionType::Write
        } else {
            AcquisitionType::Read
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Attempts to convert this root's read stamp into a write stamp in
    /// place. Only the owning thread ever calls this (it is reached
    /// exclusively through `Acquirable::acquire_write`, which only looks up
    /// *this* thread's registry entry), so there is no concurrent-upgrade
    /// race to guard against beyond the nested-vs-fresh distinction below.
    pub(crate) fn upgrade(self: &Arc<Self>) -> Result<Acquisition<S>> {
        let depth = self.upgrade_depth.load(Ordering::Acquire);
        if depth == 0 {
            // SAFETY: base_kind == Read and depth == 0 means this root
            // currently holds exactly one shared stamp and no upgrade is in
            // flight yet.
            let converted = unsafe { self.acquirable.lock.try_upgrade_to_exclusive() };
            if !converted {
                return Err(AcquireError::UpgradeRefused);
            }
            self.upgrade_depth.store(1, Ordering::Release);
            debug!(thread = ?self.owner, "read acquisition upgraded to write");
        } else {
            // Nested upgrade: the stamp is already a writer stamp, so there
            // is nothing left to convert.
            self.upgrade_depth.fetch_add(1, Ordering::AcqRel);
        }
        Ok(Acquisition::upgraded(Arc::clone(self)))
    }

    /// Closes the outermost upgrade once its depth counter reaches zero,
    /// converting the stamp back to a read stamp.
    fn unwind_upgrade(self: &Arc<Self>) {
        let depth_before = self.upgrade_depth.fetch_sub(1, Ordering::AcqRel);
        if depth_before == 1 {
            // SAFETY: depth just reached zero, so this root currently holds
            // the exclusive stamp obtained by the outermost `upgrade()` call
            // and no other upgraded wrapper still needs it.
            unsafe { self.acquirable.lock.downgrade_to_shared() };
            debug!(thread = ?self.owner, "upgrade unwound, stamp converted back to read");
        }
    }

    /// Closes the root itself: removes the registry entry and releases the
    /// real lock stamp. Fails with [`AcquireError::LockInvariantViolation`]
    /// if an upgrade is still outstanding — a root must never release its
    /// stamp while an `Upgraded` wrapper still depends on it being a write
    /// stamp.
    fn close_root(self: &Arc<Self>) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        if self.upgrade_depth.load(Ordering::Acquire) > 0 {
            warn!(
                thread = ?self.owner,
                "closing root acquisition with an upgrade still outstanding"
            );
            return Err(AcquireError::LockInvariantViolation);
        }

        {
            let mut registry = self
                .acquirable
                .registry
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            registry.remove(&self.owner);
        }

        match self.base_kind {
            // SAFETY: base_kind == Read and this root has never been closed
            // before, so it still holds the shared stamp taken at creation.
            AcquisitionType::Read => unsafe { self.acquirable.lock.unlock_shared() },
            // SAFETY: base_kind == Write and this root has never been closed
            // before, so it still holds the exclusive stamp taken at
            // creation.
            AcquisitionType::Write => unsafe { self.acquirable.lock.unlock_exclusive() },
        }

        debug!(thread = ?self.owner, "acquisition closed");
        Ok(())
    }

    pub(crate) fn data_ptr(&self) -> *mut S {
        self.acquirable.data_ptr()
    }
}

/// A scoped capability granting read or write access to an
/// [`Acquirable`](crate::Acquirable)'s protected state.
///
/// Bound to the thread that created it for its entire lifetime: every
/// operation — including operations on any guarded view obtained from it —
/// first checks that the calling thread is still the owner and that `close`
/// has not yet run.
#[derive(Debug)]
pub enum Acquisition<S> {
    Root(Arc<RootAcquisition<S>>),
    Reused(Arc<RootAcquisition<S>>),
    Upgraded {
        root: Arc<RootAcquisition<S>>,
        closed: AtomicBool,
    },
}

impl<S> Acquisition<S> {
    pub(crate) fn root(root: Arc<RootAcquisition<S>>) -> Self {
        Self::Root(root)
    }

    pub(crate) fn reused(root: Arc<RootAcquisition<S>>) -> Self {
        Self::Reused(root)
    }

    pub(crate) fn upgraded(root: Arc<RootAcquisition<S>>) -> Self {
        Self::Upgraded {
            root,
            closed: AtomicBool::new(false),
        }
    }

    fn root_ref(&self) -> &Arc<RootAcquisition<S>> {
        match self {
            Acquisition::Root(root) | Acquisition::Reused(root) => root,
            Acquisition::Upgraded { root, .. } => root,
        }
    }

    /// The thread that created this acquisition. Never changes.
    pub fn owner(&self) -> ThreadId {
        self.root_ref().owner
    }

    /// The acquirable this acquisition was minted from, for identity
    /// comparison (see [`crate::Condition`]).
    pub(crate) fn acquirable_arc(&self) -> &Arc<AcquirableInner<S>> {
        &self.root_ref().acquirable
    }

    /// The permission-and-lock predicate every guarded operation runs
    /// before touching the protected state.
    pub fn ensure_permitted_and_locked(&self) -> Result<()> {
        if std::thread::current().id() != self.owner() {
            return Err(AcquireError::WrongThread);
        }
        match self {
            Acquisition::Root(root) | Acquisition::Reused(root) => {
                if root.is_closed() {
                    return Err(AcquireError::AlreadyUnlocked);
                }
            }
            Acquisition::Upgraded { root, closed } => {
                if closed.load(Ordering::Acquire) || root.is_closed() {
                    return Err(AcquireError::AlreadyUnlocked);
                }
            }
        }
        Ok(())
    }

    /// Whether `close` has run on this specific acquisition object.
    ///
    /// A [`Acquisition::Reused`] wrapper has no lifecycle of its own — its
    /// `close` is always a no-op — so this always reports `true` for it,
    /// even immediately after it was created. This looks inconsistent with
    /// `Reused` acquisitions continuing to work, and it is by design (see
    /// `DESIGN.md`): operations are gated by
    /// [`ensure_permitted_and_locked`](Self::ensure_permitted_and_locked),
    /// not by this method.
    pub fn is_unlocked(&self) -> Result<bool> {
        if std::thread::current().id() != self.owner() {
            return Err(AcquireError::WrongThread);
        }
        Ok(match self {
            Acquisition::Root(root) => root.is_closed(),
            Acquisition::Reused(_) => true,
            Acquisition::Upgraded { closed, .. } => closed.load(Ordering::Acquire),
        })
    }

    /// The type of access this acquisition currently grants.
    pub fn acquisition_type(&self) -> Result<AcquisitionType> {
        if std::thread::current().id() != self.owner() {
            return Err(AcquireError::WrongThread);
        }
        Ok(self.root_ref().current_kind())
    }

    /// Idempotently releases this acquisition.
    ///
    /// - On a [`Acquisition::Root`]: removes the registry entry and releases
    ///   the real lock stamp. Fails with
    ///   [`AcquireError::LockInvariantViolation`] if an upgrade on this root
    ///   is still outstanding.
    /// - On a [`Acquisition::Reused`]: no-op.
    /// - On a [`Acquisition::Upgraded`]: decrements the upgrade depth
    ///   counter and, only for the outermost upgrade, converts the stamp
    ///   back to read.
    ///
    /// Fails with [`AcquireError::WrongThread`] if called from a thread
    /// other than the owner, in which case the acquirable's state is left
    /// unchanged.
    pub fn close(&self) -> Result<()> {
        if std::thread::current().id() != self.owner() {
            return Err(AcquireError::WrongThread);
        }
        match self {
            Acquisition::Root(root) => root.close_root(),
            Acquisition::Reused(_) => Ok(()),
            Acquisition::Upgraded { root, closed } => {
                if closed.swap(true, Ordering::AcqRel) {
                    return Ok(());
                }
                root.unwind_upgrade();
                Ok(())
            }
        }
    }

    pub(crate) fn data_ptr(&self) -> *mut S {
        self.root_ref().data_ptr()
    }
}

impl<S> Drop for Acquisition<S> {
    fn drop(&mut self) {
        // Best-effort release on drop so forgetting to call `close`
        // explicitly does not leak the lock. Errors are intentionally
        // swallowed here: `Drop::drop` cannot return a `Result`, and a
        // wrong-thread drop (an acquisition dropped on a thread other than
        // its owner, itself a usage bug) must not panic during unwind.
        let _ = self.close();
    }
}

// SAFETY: an `Acquisition` may be moved or shared across threads; every
// operation re-checks `owner()` against `std::thread::current()` before
// touching shared state, so cross-thread *use* is rejected at runtime rather
// than prevented at compile time.
unsafe impl<S: Send> Send for Acquisition<S> {}
unsafe impl<S: Send + Sync> Sync for Acquisition<S> {}
