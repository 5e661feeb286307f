// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

// Bit layout and CAS scheme follow the reader-writer lock design in
// https://github.com/Amanieu/parking_lot/blob/master/src/rwlock.rs. The raw
// stamp operations are exposed `pub(crate)` rather than wrapped in typed
// guards, because `Acquirable` needs to hold a stamp across a call boundary
// (an `Acquisition` can outlive the call that created it), and adds one
// operation the classic design doesn't have: a non-blocking, CAS-based
// read→write conversion that only succeeds when the calling thread is the
// sole reader.

use std::sync::atomic::{AtomicUsize, Ordering};

const READER: usize = 1 << 2;
const UPGRADED: usize = 1 << 1;
const WRITER: usize = 1;

/// A stamped reader-writer lock: multiple concurrent readers, one exclusive
/// writer, and a best-effort read→write conversion that only succeeds when
/// no other reader is present.
///
/// This type carries no data; `Acquirable` pairs it with an `UnsafeCell<S>`
/// and is responsible for only touching the cell while holding the
/// corresponding stamp.
#[derive(Debug)]
pub(crate) struct StampedLock {
    state: AtomicUsize,
}

impl StampedLock {
    pub(crate) const fn new() -> Self {
        Self {
            state: AtomicUsize::new(0),
        }
    }

    fn acquire_reader(&self) -> usize {
        const MAX_READERS: usize = usize::MAX / READER / 2;

        let value = self.state.fetch_add(READER, Ordering::Acquire);
        if value > MAX_READERS * READER {
            self.state.fetch_sub(READER, Ordering::Relaxed);
            panic!("too many concurrent read acquisitions on one acquirable");
        }
        value
    }

    pub(crate) fn try_lock_shared(&self) -> bool {
        let value = self.acquire_reader();
        if value & (WRITER | UPGRADED) != 0 {
            self.state.fetch_sub(READER, Ordering::Release);
            false
        } else {
            true
        }
    }

    pub(crate) fn lock_shared(&self) {
        while !self.try_lock_shared() {
            std::thread::yield_now();
        }
    }

    pub(crate) fn try_lock_exclusive(&self) -> bool {
        self.state
            .compare_exchange(0, WRITER, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    pub(crate) fn lock_exclusive(&self) {
        while !self.try_lock_exclusive() {
            std::thread::yield_now();
        }
    }

    /// # Safety
    ///
    /// The caller must currently hold a shared (reader) stamp obtained from
    /// this lock that has not yet been released.
    pub(crate) unsafe fn unlock_shared(&self) {
        debug_assert!(self.state.load(Ordering::Relaxed) & !(WRITER | UPGRADED) > 0);
        self.state.fetch_sub(READER, Ordering::Release);
    }

    /// # Safety
    ///
    /// The caller must currently hold the exclusive (writer) stamp obtained
    /// from this lock that has not yet been released.
    pub(crate) unsafe fn unlock_exclusive(&self) {
        debug_assert_eq!(self.state.load(Ordering::Relaxed) & WRITER, WRITER);
        self.state.fetch_and(!(WRITER | UPGRADED), Ordering::Release);
    }

    /// Attempts to convert a reader stamp directly into a writer stamp.
    ///
    /// This only succeeds when the calling thread is provably the *only*
    /// reader present (`state == READER` exactly): one outstanding reader,
    /// no writer, no upgrade already in flight. Rather than blocking until
    /// every other reader drains, the attempt fails immediately so the
    /// caller can surface an upgrade-refused error instead.
    ///
    /// # Safety
    ///
    /// The caller must currently hold a shared stamp obtained from this lock
    /// that has not yet been released, and must not call this again for the
    /// same stamp after it succeeds.
    pub(crate) unsafe fn try_upgrade_to_exclusive(&self) -> bool {
        self.state
            .compare_exchange(READER, WRITER, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Atomically converts a held writer stamp back into a reader stamp
    /// without ever exposing a fully-unlocked window to other threads:
    /// reserves a reader slot for the caller before releasing the writer
    /// bit.
    ///
    /// # Safety
    ///
    /// The caller must currently hold the exclusive stamp obtained from this
    /// lock that has not yet been released.
    pub(crate) unsafe fn downgrade_to_shared(&self) {
        debug_assert_eq!(self.state.load(Ordering::Relaxed) & WRITER, WRITER);
        self.acquire_reader();
        self.state.fetch_and(!(WRITER | UPGRADED), Ordering::Release);
    }

    pub(crate) fn is_locked(&self) -> bool {
        self.state.load(Ordering::Relaxed) != 0
    }
}

impl Default for StampedLock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smoke() {
        let lock = StampedLock::new();
        assert!(lock.try_lock_shared());
        unsafe { lock.unlock_shared() };
        assert!(lock.try_lock_exclusive());
        unsafe { lock.unlock_exclusive() };
    }

    #[test]
    fn shared_excludes_exclusive() {
        let lock = StampedLock::new();
        assert!(lock.try_lock_shared());
        assert!(!lock.try_lock_exclusive());
        unsafe { lock.unlock_shared() };
        assert!(lock.try_lock_exclusive());
    }

    #[test]
    fn upgrade_succeeds_when_sole_reader() {
        let lock = StampedLock::new();
        assert!(lock.try_lock_shared());
        assert!(unsafe { lock.try_upgrade_to_exclusive() });
        unsafe { lock.downgrade_to_shared() };
        assert!(lock.try_lock_shared());
    }

    #[test]
    fn upgrade_refused_with_second_reader() {
        let lock = StampedLock::new();
        assert!(lock.try_lock_shared());
        assert!(lock.try_lock_shared());
        assert!(!unsafe { lock.try_upgrade_to_exclusive() });
        unsafe {
            lock.unlock_shared();
            lock.unlock_shared();
        }
    }

    #[test]
    fn downgrade_is_atomic_for_waiting_writers() {
        let lock = std::sync::Arc::new(StampedLock::new());
        lock.lock_exclusive();
        unsafe { lock.downgrade_to_shared() };

        let other = lock.clone();
        let handle = std::thread::spawn(move || {
            assert!(other.try_lock_shared());
            unsafe { other.unlock_shared() };
        });
        handle.join().unwrap();
        unsafe { lock.unlock_shared() };
    }
}
