use core::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use bitflags::bitflags;

use crate::sync::{Notifier, TicketMutex};
use crate::syscall::SyscallRequest;

bitflags! {
    /// Execution state of a guest thread as seen by the lv2 core.
    pub struct CpuFlag: u32 {
        /// Inside a syscall.
        const WAIT = 1 << 0;
        /// Parked on some sleep queue.
        const SUSPEND = 1 << 1;
        /// The sleep has a deadline.
        const TIMED = 1 << 2;
        /// Woken by whoever dequeued it. Set exactly once per sleep.
        const SIGNAL = 1 << 3;
        /// The current syscall gave up and must be re-issued from the top.
        const AGAIN = 1 << 4;
        /// A suspension (savestate capture) was requested.
        const STOP = 1 << 5;
        const EXIT = 1 << 6;
        /// Rebuilt from a savestate and not yet back on its sleep queue.
        const REPLAY = 1 << 7;
    }
}

pub struct AtomicCpuFlag(AtomicU32);

impl AtomicCpuFlag {
    const fn new(flags: CpuFlag) -> Self {
        Self(AtomicU32::new(flags.bits()))
    }

    pub fn load(&self) -> CpuFlag {
        CpuFlag::from_bits_truncate(self.0.load(Ordering::SeqCst))
    }

    pub fn contains(&self, flags: CpuFlag) -> bool {
        self.load().contains(flags)
    }

    pub fn intersects(&self, flags: CpuFlag) -> bool {
        self.load().intersects(flags)
    }

    /// Returns the flags before the update.
    pub fn insert(&self, flags: CpuFlag) -> CpuFlag {
        CpuFlag::from_bits_truncate(self.0.fetch_or(flags.bits(), Ordering::SeqCst))
    }

    /// Returns the flags before the update.
    pub fn remove(&self, flags: CpuFlag) -> CpuFlag {
        CpuFlag::from_bits_truncate(self.0.fetch_and(!flags.bits(), Ordering::SeqCst))
    }

    fn modify(&self, insert: CpuFlag, remove: CpuFlag) -> CpuFlag {
        let old = self
            .0
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |bits| {
                Some((bits & !remove.bits()) | insert.bits())
            })
            .unwrap_or_else(|bits| bits);
        CpuFlag::from_bits_truncate(old)
    }
}

/// Which queue a thread was parked on when its wait was captured.
///
/// A thread caught in an lwcond wait is either still waiting for the condition
/// (`mutex_sleep == false`) or has already been signalled and now waits for the
/// lwmutex (`mutex_sleep == true`). Replay puts it back on the same queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitSnapshot {
    pub mutex_sleep: bool,
}

/// A guest PPU thread.
///
/// Each one runs on its own host thread; other threads only touch it through
/// the atomic state word, r3, and [`PpuThread::awake`].
pub struct PpuThread {
    id: u32,
    name: String,
    priority: AtomicU32,
    state: AtomicCpuFlag,
    gpr3: AtomicU64,
    deadline: TicketMutex<Option<Instant>>,
    snapshot: TicketMutex<Option<WaitSnapshot>>,
    pending: TicketMutex<Option<SyscallRequest>>,
    notifier: Notifier,
}

impl PpuThread {
    pub(crate) fn new(id: u32, name: &str, priority: u32) -> Self {
        Self {
            id,
            name: name.to_owned(),
            priority: AtomicU32::new(priority),
            state: AtomicCpuFlag::new(CpuFlag::empty()),
            gpr3: AtomicU64::new(0),
            deadline: TicketMutex::new(None),
            snapshot: TicketMutex::new(None),
            pending: TicketMutex::new(None),
            notifier: Notifier::new(),
        }
    }

    /// A thread rebuilt from a savestate, waiting to re-issue `pending`.
    pub(crate) fn restored(
        id: u32,
        name: &str,
        priority: u32,
        gpr3: u64,
        pending: Option<SyscallRequest>,
        snapshot: Option<WaitSnapshot>,
    ) -> Self {
        let thread = Self::new(id, name, priority);
        thread.gpr3.store(gpr3, Ordering::SeqCst);
        *thread.snapshot.lock() = snapshot;
        if pending.is_some() {
            thread.state.insert(CpuFlag::REPLAY);
        }
        *thread.pending.lock() = pending;
        thread
    }

    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn priority(&self) -> u32 {
        self.priority.load(Ordering::Relaxed)
    }

    pub fn set_priority(&self, priority: u32) {
        self.priority.store(priority, Ordering::Relaxed);
    }

    pub fn state(&self) -> &AtomicCpuFlag {
        &self.state
    }

    pub fn gpr3(&self) -> u64 {
        self.gpr3.load(Ordering::SeqCst)
    }

    pub fn set_gpr3(&self, value: u64) {
        self.gpr3.store(value, Ordering::SeqCst);
    }

    /// Marks the thread parked. A non-zero `timeout_us` arms a deadline.
    ///
    /// Called with the queue lock held, right after the thread was pushed.
    pub fn sleep(&self, timeout_us: u64) {
        let mut deadline = self.deadline.lock();
        if timeout_us != 0 {
            *deadline = Some(Instant::now() + Duration::from_micros(timeout_us));
            self.state.modify(CpuFlag::SUSPEND | CpuFlag::TIMED, CpuFlag::REPLAY);
        } else {
            *deadline = None;
            self.state.modify(CpuFlag::SUSPEND, CpuFlag::REPLAY | CpuFlag::TIMED);
        }
        drop(deadline);
        self.notifier.notify_all();
    }

    /// Hands the thread its wake-up. Must be called after it left every queue.
    pub fn awake(&self) {
        let old = self.state.modify(CpuFlag::SIGNAL, CpuFlag::SUSPEND | CpuFlag::TIMED);
        debug_assert!(
            !old.contains(CpuFlag::SIGNAL),
            "thread {:#x} woken twice",
            self.id
        );
        self.notifier.notify_all();
    }

    /// Blocks until the state word differs from `old`.
    pub fn wait_on(&self, old: CpuFlag) {
        self.notifier.wait_until(|| self.state.load() != old, None);
    }

    /// Blocks until the armed deadline passes or the thread is signalled or stopped.
    ///
    /// True only when the deadline won. Without a deadline this returns at once.
    pub fn wait_timeout(&self) -> bool {
        let Some(deadline) = *self.deadline.lock() else {
            return false;
        };
        let woken = CpuFlag::SIGNAL | CpuFlag::STOP | CpuFlag::EXIT;
        !self
            .notifier
            .wait_until(|| self.state.intersects(woken), Some(deadline))
    }

    pub fn has_deadline(&self) -> bool {
        self.state.contains(CpuFlag::TIMED)
    }

    /// Drops the deadline; the wait continues until an explicit wake-up.
    pub fn clear_deadline(&self) {
        let mut deadline = self.deadline.lock();
        *deadline = None;
        self.state.remove(CpuFlag::TIMED);
    }

    pub fn request_stop(&self) {
        self.state.insert(CpuFlag::STOP);
        self.notifier.notify_all();
    }

    /// Tears the thread down. A blocked syscall unwinds like on a stop request,
    /// but the thread is not meant to be resumed.
    pub fn request_exit(&self) {
        self.state.insert(CpuFlag::EXIT);
        self.notifier.notify_all();
    }

    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.state.intersects(CpuFlag::STOP | CpuFlag::EXIT)
    }

    pub(crate) fn finish_replay(&self) {
        if self.state.remove(CpuFlag::REPLAY).contains(CpuFlag::REPLAY) {
            self.notifier.notify_all();
        }
    }

    /// Blocks until the thread is back on its queue (or done) after a restore.
    pub fn wait_replay_settled(&self) {
        self.notifier
            .wait_until(|| !self.state.contains(CpuFlag::REPLAY), None);
    }

    pub fn wait_snapshot(&self) -> Option<WaitSnapshot> {
        *self.snapshot.lock()
    }

    pub(crate) fn take_wait_snapshot(&self) -> Option<WaitSnapshot> {
        self.snapshot.lock().take()
    }

    pub(crate) fn store_wait_snapshot(&self, snapshot: WaitSnapshot) {
        *self.snapshot.lock() = Some(snapshot);
    }

    /// The syscall this thread will re-issue when resumed.
    pub fn pending(&self) -> Option<SyscallRequest> {
        *self.pending.lock()
    }

    pub(crate) fn set_pending(&self, request: Option<SyscallRequest>) {
        *self.pending.lock() = request;
    }

    pub(crate) fn take_pending(&self) -> Option<SyscallRequest> {
        self.pending.lock().take()
    }
}

impl core::fmt::Debug for PpuThread {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PpuThread")
            .field("id", &format_args!("{:#x}", self.id))
            .field("name", &self.name)
            .field("priority", &self.priority())
            .field("state", &self.state.load())
            .finish()
    }
}
