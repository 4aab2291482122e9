//! Sleep queues and the policies that pick from them.

use std::collections::VecDeque;
use std::sync::Arc;

use strum_macros::{Display, FromRepr};

use crate::syscall::error::{CellError, CELL_OK};

use super::thread::PpuThread;

/// Waiters of one lv2 object, oldest first.
pub type SleepQueue = VecDeque<Arc<PpuThread>>;

/// `SYS_SYNC_*` wake-up policy of an lv2 object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, FromRepr)]
#[repr(u32)]
pub enum Protocol {
    #[strum(serialize = "SYS_SYNC_FIFO")]
    Fifo = 1,
    #[strum(serialize = "SYS_SYNC_PRIORITY")]
    Priority = 2,
    #[strum(serialize = "SYS_SYNC_PRIORITY_INHERIT")]
    PriorityInherit = 3,
    #[strum(serialize = "SYS_SYNC_RETRY")]
    Retry = 4,
}

static FIFO: FifoScheduler = FifoScheduler;
static PRIORITY: PriorityScheduler = PriorityScheduler;

impl Protocol {
    pub fn scheduler(self) -> &'static dyn Scheduler {
        match self {
            Protocol::Fifo => &FIFO,
            _ => &PRIORITY,
        }
    }
}

pub trait Scheduler: Send + Sync {
    /// Position of the waiter that should run next. The queue is left untouched,
    /// so callers can inspect the candidate before committing.
    fn select(&self, queue: &SleepQueue) -> Option<usize>;

    fn schedule(&self, queue: &mut SleepQueue) -> Option<Arc<PpuThread>> {
        let index = self.select(queue)?;
        queue.remove(index)
    }
}

/// Oldest waiter first.
pub struct FifoScheduler;

impl Scheduler for FifoScheduler {
    fn select(&self, queue: &SleepQueue) -> Option<usize> {
        (!queue.is_empty()).then(|| 0)
    }
}

/// Numerically lowest priority first, oldest first among equals.
pub struct PriorityScheduler;

impl Scheduler for PriorityScheduler {
    fn select(&self, queue: &SleepQueue) -> Option<usize> {
        queue
            .iter()
            .enumerate()
            .min_by_key(|(_, thread)| thread.priority())
            .map(|(index, _)| index)
    }
}

pub fn position(queue: &SleepQueue, thread: &Arc<PpuThread>) -> Option<usize> {
    queue.iter().position(|t| Arc::ptr_eq(t, thread))
}

pub fn contains(queue: &SleepQueue, thread: &Arc<PpuThread>) -> bool {
    position(queue, thread).is_some()
}

/// Removes `thread` from `queue`; false if it was not there.
pub fn unqueue(queue: &mut SleepQueue, thread: &Arc<PpuThread>) -> bool {
    match position(queue, thread) {
        Some(index) => queue.remove(index).is_some(),
        None => false,
    }
}

pub fn ids(queue: &SleepQueue) -> Vec<u32> {
    queue.iter().map(|t| t.id()).collect()
}

/// Threads dequeued under a lock, woken once every lock is dropped.
#[must_use = "dequeued threads stay asleep until awake_all is called"]
#[derive(Default)]
pub struct AwakeBatch(Vec<Arc<PpuThread>>);

impl AwakeBatch {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, thread: Arc<PpuThread>) {
        self.0.push(thread);
    }

    pub fn awake_all(self) {
        for thread in self.0 {
            thread.awake();
        }
    }
}

/// How a blocking lwmutex/lwcond call ended, as left in r3 by the waker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    /// The thread owns the lwmutex.
    Acquired,
    /// Woken without ownership; the user-space side must take the lwmutex itself.
    Busy,
    TimedOut,
}

impl WaitStatus {
    pub fn from_gpr3(gpr3: u64) -> Self {
        match CellError::from_repr(gpr3 as u32) {
            Some(CellError::EBUSY) => WaitStatus::Busy,
            Some(CellError::ETIMEDOUT) => WaitStatus::TimedOut,
            _ => WaitStatus::Acquired,
        }
    }

    pub fn code(self) -> u32 {
        match self {
            WaitStatus::Acquired => CELL_OK,
            WaitStatus::Busy => CellError::EBUSY.code(),
            WaitStatus::TimedOut => CellError::ETIMEDOUT.code(),
        }
    }
}
