// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The error taxonomy surfaced by every operation in this crate.
//!
//! Every variant here is a distinct, tagged failure kind for the
//! acquisition lifecycle; none of them are caught and swallowed inside the
//! crate itself. [`AcquireError::LockInvariantViolation`] is the one
//! exception to "surface and let the caller decide": it means the lock is in
//! a state the algorithm does not know how to recover from, and callers
//! should treat it the way they'd treat a poisoned `std::sync::Mutex`.

use thiserror::Error;

/// Errors produced by acquisitions, acquirables, and the guarded views they
/// hand out.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum AcquireError {
    /// An acquisition (or a guarded view bound to it) was used from a thread
    /// other than the one that created it.
    #[error("acquisition used from a thread other than its owner")]
    WrongThread,

    /// The acquisition's `close` has already run.
    #[error("acquisition is already unlocked")]
    AlreadyUnlocked,

    /// A non-nullable reference cell was constructed with, or `set` to, a
    /// null value.
    #[error("non-nullable cell cannot hold a null value")]
    NullValue,

    /// A read→write upgrade was attempted but another thread currently holds
    /// a conflicting lock, so the stamp conversion could not be performed.
    #[error("read acquisition could not be upgraded to write")]
    UpgradeRefused,

    /// `acquire_write` was called while the thread already holds a read
    /// acquisition on a variant of the acquirable that does not support
    /// upgrade.
    #[error("nested acquire requested a type incompatible with the held acquisition")]
    NestedAcquireTypeMismatch,

    /// An internal invariant of the lock was violated (for example, stamp
    /// conversion back to a read lock failed on close). Fatal: the
    /// acquirable's internal state can no longer be trusted.
    #[error("lock invariant violated, acquirable state is no longer trustworthy")]
    LockInvariantViolation,

    /// [`crate::Condition::wait`] was called with an acquisition that does
    /// not currently report [`crate::AcquisitionType::Write`]. Waiting on a
    /// condition releases and reacquires the write lock, so the caller must
    /// already hold it.
    #[error("condition wait requires the calling acquisition to hold the write lock")]
    ConditionRequiresWriteLock,

    /// [`crate::Condition::wait`] was called with an acquisition that does
    /// not belong to the same acquirable the condition was created from.
    #[error("condition wait requires an acquisition on the same acquirable the condition was created from")]
    ConditionAcquirableMismatch,
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = AcquireError> = core::result::Result<T, E>;
