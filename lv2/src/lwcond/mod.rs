//! Kernel half of the lightweight condition variable.
//!
//! An lwcond is bound to one lwmutex at creation. A waiter releases that mutex
//! and sleeps on the condition; a signal either moves it onto the mutex's queue
//! (it will wake as owner) or wakes it without ownership (`CELL_EBUSY`), leaving
//! the re-lock to user space.
//!
//! Lock order is always condition first, then mutex. [`lock_pair`] is the only
//! place that takes both.

pub mod syscall;

use core::sync::atomic::{AtomicU32, Ordering};

use crate::lwmutex::{LwMutex, LwMutexQueue};
use crate::savestate::serial::{SerialError, SerialReader, SerialWriter};
use crate::sync::{TicketMutex, TicketMutexGuard};
use crate::task::scheduler::{self, SleepQueue};
use crate::task::Protocol;

pub use syscall::{SignalMode, SignalStatus, SignalTarget};

pub struct LwCondQueue {
    pub(crate) sq: SleepQueue,
}

pub struct LwCond {
    name: u64,
    lwid: u32,
    protocol: Protocol,
    control: u32,
    inner: TicketMutex<LwCondQueue>,
    /// Threads still waiting for the condition. Changed only under the queue lock.
    waiters: AtomicU32,
}

impl LwCond {
    pub(crate) fn new(name: u64, lwid: u32, protocol: Protocol, control: u32) -> Self {
        Self {
            name,
            lwid,
            protocol,
            control,
            inner: TicketMutex::new(LwCondQueue { sq: SleepQueue::new() }),
            waiters: AtomicU32::new(0),
        }
    }

    pub fn name(&self) -> u64 {
        self.name
    }

    /// Id of the lwmutex this condition was created with.
    pub fn lwmutex_id(&self) -> u32 {
        self.lwid
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn control(&self) -> u32 {
        self.control
    }

    pub fn waiters(&self) -> u32 {
        self.waiters.load(Ordering::SeqCst)
    }

    pub fn waiter_ids(&self) -> Vec<u32> {
        scheduler::ids(&self.lock().sq)
    }

    pub(crate) fn lock(&self) -> TicketMutexGuard<'_, LwCondQueue> {
        self.inner.lock()
    }

    fn add_waiter_count(&self) {
        self.waiters.fetch_add(1, Ordering::SeqCst);
    }

    fn sub_waiter_count(&self) {
        self.waiters.fetch_sub(1, Ordering::SeqCst);
    }

    fn clear_waiter_count(&self) {
        self.waiters.store(0, Ordering::SeqCst);
    }

    pub(crate) fn save(&self, ar: &mut SerialWriter) {
        ar.put_u64(self.name);
        ar.put_u32(self.lwid);
        ar.put_u32(self.protocol as u32);
        ar.put_u32(self.control);
    }

    pub(crate) fn load(ar: &mut SerialReader<'_>) -> Result<Self, SerialError> {
        let name = ar.get_u64()?;
        let lwid = ar.get_u32()?;
        let protocol = ar.get_u32()?;
        let protocol = Protocol::from_repr(protocol).ok_or(SerialError::Protocol(protocol))?;
        let control = ar.get_u32()?;
        Ok(Self::new(name, lwid, protocol, control))
    }
}

/// Locks a condition and its mutex in the one permitted order.
pub(crate) fn lock_pair<'a>(
    cond: &'a LwCond,
    mutex: &'a LwMutex,
) -> (TicketMutexGuard<'a, LwCondQueue>, TicketMutexGuard<'a, LwMutexQueue>) {
    let cq = cond.lock();
    let mq = mutex.lock();
    (cq, mq)
}

/// Renders a packed 8-byte object name the way the guest wrote it.
pub fn name64(name: u64) -> String {
    let bytes = name.to_be_bytes();
    let len = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..len]).into_owned()
}
