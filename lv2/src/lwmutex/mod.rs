//! Kernel half of the lightweight mutex.
//!
//! The guest keeps the owner word in user memory and only calls into lv2 when
//! the mutex is contended. The kernel side tracks who sleeps on it and carries
//! `signaled`, a hand-off token for a thread that arrives after an unlock found
//! nobody waiting:
//!
//! - bit 0: the next locker acquires immediately
//! - sign bit: the next locker returns `CELL_EBUSY` (left by `unlock2`)

pub mod syscall;

use core::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::config::DRAIN_POLL_INTERVAL;
use crate::savestate::serial::{SerialError, SerialReader, SerialWriter};
use crate::sync::{Notifier, TicketMutex, TicketMutexGuard};
use crate::task::scheduler::{self, SleepQueue};
use crate::task::{PpuThread, Protocol};

/// Sleep queue and hand-off token, guarded together.
pub struct LwMutexQueue {
    protocol: Protocol,
    pub(crate) signaled: i32,
    pub(crate) sq: SleepQueue,
}

impl LwMutexQueue {
    pub(crate) fn add_waiter(&mut self, ppu: Arc<PpuThread>) {
        self.sq.push_back(ppu);
    }

    /// An owned hand-off requires the signaller to hold the mutex, which rules
    /// out a pending token.
    pub(crate) fn ensure_unsignaled(&self) {
        assert!(
            self.signaled == 0,
            "lwmutex hand-off with a pending token ({:#x})",
            self.signaled
        );
    }

    /// Who an unlock would wake right now.
    pub(crate) fn select(&self) -> Option<usize> {
        self.protocol.scheduler().select(&self.sq)
    }
}

pub struct LwMutex {
    protocol: Protocol,
    control: u32,
    name: u64,
    inner: TicketMutex<LwMutexQueue>,
    /// Threads inside an lwcond wait bound to this mutex. `i32::MIN` is or-ed in
    /// once destruction starts; the destroyer waits for the rest to drain.
    lwcond_waiters: AtomicI32,
    drain: Notifier,
}

impl LwMutex {
    pub(crate) fn new(protocol: Protocol, control: u32, name: u64) -> Self {
        Self::with_signaled(protocol, control, name, 0)
    }

    fn with_signaled(protocol: Protocol, control: u32, name: u64, signaled: i32) -> Self {
        Self {
            protocol,
            control,
            name,
            inner: TicketMutex::new(LwMutexQueue {
                protocol,
                signaled,
                sq: SleepQueue::new(),
            }),
            lwcond_waiters: AtomicI32::new(0),
            drain: Notifier::new(),
        }
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Guest address of the user-space control block.
    pub fn control(&self) -> u32 {
        self.control
    }

    pub fn name(&self) -> u64 {
        self.name
    }

    pub(crate) fn lock(&self) -> TicketMutexGuard<'_, LwMutexQueue> {
        self.inner.lock()
    }

    pub fn signaled(&self) -> i32 {
        self.lock().signaled
    }

    /// Ids of the threads sleeping on the mutex, in queue order.
    pub fn waiter_ids(&self) -> Vec<u32> {
        scheduler::ids(&self.lock().sq)
    }

    pub fn lwcond_waiters(&self) -> i32 {
        self.lwcond_waiters.load(Ordering::SeqCst)
    }

    pub(crate) fn enter_lwcond(&self) {
        self.lwcond_waiters.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn leave_lwcond(&self) {
        let old = self.lwcond_waiters.fetch_sub(1, Ordering::SeqCst);
        if old.wrapping_sub(1) == i32::MIN {
            self.drain.notify_all();
        }
    }

    /// Flags destruction; returns the counter with the flag set.
    fn begin_destroy(&self) -> i32 {
        self.lwcond_waiters.fetch_or(i32::MIN, Ordering::SeqCst) | i32::MIN
    }

    /// Waits until every lwcond waiter left. False if `ppu` was stopped first.
    fn wait_drained(&self, ppu: &PpuThread) -> bool {
        loop {
            if self.lwcond_waiters() == i32::MIN {
                return true;
            }
            if ppu.is_stopped() {
                return false;
            }
            let deadline = Instant::now() + DRAIN_POLL_INTERVAL;
            self.drain
                .wait_until(|| self.lwcond_waiters() == i32::MIN, Some(deadline));
        }
    }

    pub(crate) fn save(&self, ar: &mut SerialWriter) {
        ar.put_u32(self.protocol as u32);
        ar.put_u32(self.control);
        ar.put_u64(self.name);
        ar.put_i32(self.signaled());
    }

    pub(crate) fn load(ar: &mut SerialReader<'_>) -> Result<Self, SerialError> {
        let protocol = ar.get_u32()?;
        let protocol = Protocol::from_repr(protocol).ok_or(SerialError::Protocol(protocol))?;
        let control = ar.get_u32()?;
        let name = ar.get_u64()?;
        let signaled = ar.get_i32()?;
        Ok(Self::with_signaled(protocol, control, name, signaled))
    }
}

#[cfg(test)]
mod test;
