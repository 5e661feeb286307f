// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! A write-lock condition variable.
//!
//! Not tied to any particular acquisition; it is only valid to wait on while
//! the calling thread currently holds the acquirable's write lock. Wait/
//! signal semantics are the standard library's `Condvar`'s; what this type
//! adds is releasing the acquirable's real exclusive stamp for the duration
//! of the wait and reacquiring it on wakeup, since `std::sync::Condvar`
//! only knows how to pair with a `std::sync::Mutex`, not our stamped lock.

use std::sync::{Condvar, Mutex};

use crate::core::{Acquirable, Acquisition, AcquisitionType};
use crate::error::{AcquireError, Result};

/// A condition variable scoped to one [`Acquirable`]'s write lock.
///
/// `notify_mutex` guards nothing but the `Condvar` itself; the protected
/// state lives behind the acquirable's own stamped lock, which is released
/// and reacquired around the wait directly. This is the same split std's own
/// `Condvar` forces between the value a predicate reads and the `Mutex` that
/// makes waiting on it race-free.
pub struct Condition<'a, S> {
    acquirable: &'a Acquirable<S>,
    condvar: Condvar,
    notify_mutex: Mutex<()>,
}

impl<'a, S> Condition<'a, S> {
    pub fn new(acquirable: &'a Acquirable<S>) -> Self {
        Self {
            acquirable,
            condvar: Condvar::new(),
            notify_mutex: Mutex::new(()),
        }
    }

    /// Blocks the calling thread until notified, releasing `acquisition`'s
    /// write lock for the duration and reacquiring it before returning.
    ///
    /// Fails with [`AcquireError::ConditionAcquirableMismatch`] if
    /// `acquisition` was not minted from the same acquirable this condition
    /// was created from, with [`AcquireError::ConditionRequiresWriteLock`] if
    /// it does not currently report [`AcquisitionType::Write`], and with
    /// [`AcquireError::WrongThread`] / [`AcquireError::AlreadyUnlocked`] under
    /// the same conditions as any other acquisition operation.
    ///
    /// As with any condition variable, callers must re-check their predicate
    /// in a loop after `wait` returns (spurious wakeups are possible).
    pub fn wait(&self, acquisition: &Acquisition<S>) -> Result<()> {
        acquisition.ensure_permitted_and_locked()?;
        if !self.acquirable.owns(acquisition) {
            return Err(AcquireError::ConditionAcquirableMismatch);
        }
        if acquisition.acquisition_type()? != AcquisitionType::Write {
            return Err(AcquireError::ConditionRequiresWriteLock);
        }

        let guard = self
            .notify_mutex
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        // SAFETY: `acquisition.acquisition_type()` just confirmed this
        // thread holds the acquirable's exclusive stamp (directly or via an
        // upgrade), and it is the stamp this call releases and reacquires.
        unsafe { self.acquirable.raw_lock().unlock_exclusive() };

        let _guard = self
            .condvar
            .wait(guard)
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        self.acquirable.raw_lock().lock_exclusive();
        Ok(())
    }

    /// Wakes one waiting thread, if any.
    pub fn notify_one(&self) {
        self.condvar.notify_one();
    }

    /// Wakes all waiting threads.
    pub fn notify_all(&self) {
        self.condvar.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_requires_write_lock() {
        let acquirable = Acquirable::new(0i32);
        let condition = Condition::new(&acquirable);
        let read = acquirable.acquire_read();
        assert_eq!(
            condition.wait(&read),
            Err(AcquireError::ConditionRequiresWriteLock)
        );
    }

    #[test]
    fn wait_rejects_acquisition_from_a_different_acquirable() {
        let a = Acquirable::new(0i32);
        let b = Acquirable::new(0i32);
        let condition_on_a = Condition::new(&a);
        let write_on_b = b.acquire_write().unwrap();
        assert_eq!(
            condition_on_a.wait(&write_on_b),
            Err(AcquireError::ConditionAcquirableMismatch)
        );
        // `a`'s lock was never touched by the rejected call.
        assert!(!a.is_locked());
        write_on_b.close().unwrap();
    }

    #[test]
    fn notify_wakes_waiter() {
        let acquirable = Acquirable::new(false);
        let condition = Condition::new(&acquirable);

        std::thread::scope(|scope| {
            scope.spawn(|| {
                let write = acquirable.acquire_write().unwrap();
                // SAFETY: `write` is a live write acquisition owned by this
                // thread for the whole loop body.
                while !*unsafe { &*write.data_ptr() } {
                    condition.wait(&write).unwrap();
                }
                write.close().unwrap();
            });

            std::thread::sleep(std::time::Duration::from_millis(20));
            let write = acquirable.acquire_write().unwrap();
            // SAFETY: see above.
            unsafe { *write.data_ptr() = true };
            condition.notify_one();
            write.close().unwrap();
        });
    }
}
