//! A readers-writer lock implementation based on atomic operations.
//!
//! This provides concurrent read access and exclusive write access to protected data,
//! using spin-waiting for synchronization. The id registries sit behind it: lookups
//! are frequent, creation and destruction are rare.
//!
//! Readers are never held back by a waiting writer, so a thread that already holds
//! a read guard may take a second one without deadlocking.

use core::sync::atomic::{AtomicU32, Ordering};

use crossbeam_utils::Backoff;
use lock_api::GuardSend;

/// The raw implementation of a readers-writer lock.
///
/// Uses an atomic u32 to track state:
/// - High 16 bits: reader count (supports up to 65535 concurrent readers)
/// - Low 16 bits: writer flag (0 = no writer, 1 = writer present)
pub struct RawRwLock(AtomicU32);

/// A readers-writer lock type providing shared read access and exclusive write access.
///
/// # Example
/// ```
/// use lv2::sync::rw::RWLock;
///
/// let lock = RWLock::new(0);
/// {
///     let read_guard = lock.read(); // Multiple readers allowed
///     assert_eq!(*read_guard, 0);
/// }
/// {
///     let mut write_guard = lock.write(); // Exclusive write access
///     *write_guard += 1;
/// }
/// ```
pub type RWLock<T> = lock_api::RwLock<RawRwLock, T>;

pub type RwLockReadGuard<'a, T> = lock_api::RwLockReadGuard<'a, RawRwLock, T>;

pub type RwLockWriteGuard<'a, T> = lock_api::RwLockWriteGuard<'a, RawRwLock, T>;

const READER: u32 = 1 << 16;
const WRITER_MASK: u32 = 0xFFFF;

unsafe impl lock_api::RawRwLock for RawRwLock {
    const INIT: RawRwLock = RawRwLock(AtomicU32::new(0));
    type GuardMarker = GuardSend;

    /// Acquires shared read access, spinning while a writer holds the lock.
    fn lock_shared(&self) {
        let backoff = Backoff::new();
        while !self.try_lock_shared() {
            backoff.snooze();
        }
    }

    fn try_lock_shared(&self) -> bool {
        let mut state = self.0.load(Ordering::Relaxed);
        loop {
            if state & WRITER_MASK != 0 {
                return false;
            }
            match self.0.compare_exchange_weak(
                state,
                state + READER,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(current) => state = current,
            }
        }
    }

    /// Acquires exclusive write access, spinning while readers or another writer
    /// hold the lock.
    fn lock_exclusive(&self) {
        let backoff = Backoff::new();
        while !self.try_lock_exclusive() {
            backoff.snooze();
        }
    }

    fn try_lock_exclusive(&self) -> bool {
        self.0
            .compare_exchange(0, 1, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// # Safety
    /// - Must only be called when the lock is held for reading
    unsafe fn unlock_shared(&self) {
        self.0.fetch_sub(READER, Ordering::Release);
    }

    /// # Safety
    /// - Must only be called when the lock is held for writing
    unsafe fn unlock_exclusive(&self) {
        self.0.store(0, Ordering::Release);
    }
}
