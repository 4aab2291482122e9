use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use super::{Notifier, RWLock};

#[test]
fn rwlock_allows_nested_readers() {
    let lock = RWLock::new(7);
    let outer = lock.read();
    let inner = lock.read();
    assert_eq!(*outer + *inner, 14);
    assert!(lock.try_write().is_none());
    drop((outer, inner));
    *lock.write() += 1;
    assert_eq!(*lock.read(), 8);
}

#[test]
fn rwlock_writer_excludes_readers() {
    let lock = RWLock::new(());
    let writer = lock.write();
    assert!(lock.try_read().is_none());
    drop(writer);
    assert!(lock.try_read().is_some());
}

#[test]
fn notifier_wakes_waiter() {
    let notifier = Arc::new(Notifier::new());
    let flag = Arc::new(AtomicBool::new(false));

    let waiter = {
        let notifier = notifier.clone();
        let flag = flag.clone();
        thread::spawn(move || notifier.wait_until(|| flag.load(Ordering::SeqCst), None))
    };

    thread::sleep(Duration::from_millis(20));
    flag.store(true, Ordering::SeqCst);
    notifier.notify_all();
    assert!(waiter.join().unwrap());
}

#[test]
fn notifier_deadline_expires() {
    let notifier = Notifier::new();
    let start = Instant::now();
    let deadline = start + Duration::from_millis(30);
    assert!(!notifier.wait_until(|| false, Some(deadline)));
    assert!(Instant::now() >= deadline);
}
