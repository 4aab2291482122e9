//! Blocking wait for a condition published through atomics.
//!
//! The waiter re-checks its condition under the notifier's mutex, and every
//! notifier takes that mutex before signalling, so a wake-up issued between the
//! check and the park cannot be lost.

use std::time::Instant;

use parking_lot::{Condvar, Mutex};

#[derive(Default)]
pub struct Notifier {
    lock: Mutex<()>,
    cond: Condvar,
}

impl Notifier {
    pub fn new() -> Self {
        Self {
            lock: Mutex::new(()),
            cond: Condvar::new(),
        }
    }

    /// Blocks until `done` returns true or `deadline` passes.
    ///
    /// Returns the last value of `done`, so `false` means the deadline won.
    pub fn wait_until(&self, mut done: impl FnMut() -> bool, deadline: Option<Instant>) -> bool {
        let mut guard = self.lock.lock();
        loop {
            if done() {
                return true;
            }
            match deadline {
                Some(deadline) => {
                    if self.cond.wait_until(&mut guard, deadline).timed_out() {
                        return done();
                    }
                }
                None => self.cond.wait(&mut guard),
            }
        }
    }

    pub fn notify_all(&self) {
        let _guard = self.lock.lock();
        self.cond.notify_all();
    }
}
