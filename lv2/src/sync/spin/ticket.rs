use core::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_utils::Backoff;
use lock_api::{GuardSend, RawMutex};

/// A ticket-based mutex that ensures FIFO ordering for lock acquisition.
///
/// This provides fair synchronization by assigning each thread a "ticket"
/// and only allowing the thread with the matching "now serving" ticket
/// to acquire the lock. Every lv2 object and every guest thread guards its
/// mutable state with one of these; critical sections never block.
pub type TicketMutex<T> = lock_api::Mutex<RawTicketMutex, T>;

pub type TicketMutexGuard<'a, T> = lock_api::MutexGuard<'a, RawTicketMutex, T>;

/// Raw implementation of the ticket-based mutex
pub struct RawTicketMutex {
    next_ticket: AtomicUsize,      // Next available ticket number
    now_serving: AtomicUsize,      // Currently allowed ticket number
}

unsafe impl RawMutex for RawTicketMutex {
    const INIT: RawTicketMutex = RawTicketMutex {
        next_ticket: AtomicUsize::new(0),
        now_serving: AtomicUsize::new(0),
    };

    type GuardMarker = GuardSend;

    fn lock(&self) {
        // 1. Get a ticket (FIFO guarantee)
        let my_ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);

        // 2. Spin until it's our turn; yield to the host scheduler under contention
        let backoff = Backoff::new();
        while self.now_serving.load(Ordering::Acquire) != my_ticket {
            backoff.snooze();
        }
    }

    fn try_lock(&self) -> bool {
        let serving = self.now_serving.load(Ordering::Acquire);
        self.next_ticket
            .compare_exchange(serving, serving.wrapping_add(1), Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    unsafe fn unlock(&self) {
        // Advance to next ticket
        self.now_serving.fetch_add(1, Ordering::Release);
    }

    fn is_locked(&self) -> bool {
        self.next_ticket.load(Ordering::Relaxed) != self.now_serving.load(Ordering::Relaxed)
    }
}
