use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use super::syscall::*;
use crate::kernel::Lv2;
use crate::syscall::error::CellError;
use crate::syscall::Flow;
use crate::task::{CpuFlag, PpuThread, Protocol, WaitStatus};

fn setup() -> (Arc<Lv2>, Arc<PpuThread>) {
    crate::io::logging::init();
    let lv2 = Arc::new(Lv2::new());
    let ppu = lv2.create_ppu("main", 1000).unwrap();
    (lv2, ppu)
}

fn wait_for(what: &str, mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !done() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn create_validates_protocol() {
    let (lv2, _) = setup();
    assert_eq!(sys_lwmutex_create(&lv2, 0, 0, 0, 0), Err(CellError::EINVAL));
    assert_eq!(sys_lwmutex_create(&lv2, 5, 0, 0, 0), Err(CellError::EINVAL));

    let id = sys_lwmutex_create(&lv2, 3, 0x10, 0, 0).unwrap();
    assert_eq!(lv2.lwmutex(id).unwrap().protocol(), Protocol::Priority);

    let id = sys_lwmutex_create(&lv2, 4, 0x10, 0, 0).unwrap();
    assert_eq!(lv2.lwmutex(id).unwrap().protocol(), Protocol::Retry);
}

#[test]
fn name_needs_sign_bit_of_has_name() {
    let (lv2, _) = setup();
    let unnamed = sys_lwmutex_create(&lv2, 1, 0, 1, 0x6162_6300_0000_0000).unwrap();
    let named = sys_lwmutex_create(&lv2, 1, 0, i32::MIN, 0x6162_6300_0000_0000).unwrap();
    assert_eq!(lv2.lwmutex(unnamed).unwrap().name(), 0);
    assert_eq!(lv2.lwmutex(named).unwrap().name(), 0x6162_6300_0000_0000);
}

#[test]
fn create_fails_when_registry_full() {
    crate::io::logging::init();
    let lv2 = Lv2::with_config(crate::config::Lv2Config::default().with_object_capacity(1));
    sys_lwmutex_create(&lv2, 1, 0, 0, 0).unwrap();
    assert_eq!(sys_lwmutex_create(&lv2, 1, 0, 0, 0), Err(CellError::EAGAIN));
}

#[test]
fn missing_mutex_is_esrch() {
    let (lv2, ppu) = setup();
    assert_eq!(sys_lwmutex_lock(&lv2, &ppu, 0x8500_0000, 0), Err(CellError::ESRCH));
    assert_eq!(sys_lwmutex_unlock(&lv2, &ppu, 0x8500_0000), Err(CellError::ESRCH));
    assert_eq!(sys_lwmutex_trylock(&lv2, 0x8500_0000), Err(CellError::ESRCH));
    assert_eq!(sys_lwmutex_destroy(&lv2, &ppu, 0x8500_0000), Err(CellError::ESRCH));
}

#[test]
fn trylock_consumes_only_plain_token() {
    let (lv2, ppu) = setup();
    let id = sys_lwmutex_create(&lv2, 1, 0, 0, 0).unwrap();

    sys_lwmutex_unlock2(&lv2, &ppu, id).unwrap();
    assert_eq!(sys_lwmutex_trylock(&lv2, id), Ok(false));
    assert_eq!(lv2.lwmutex(id).unwrap().signaled(), i32::MIN);

    sys_lwmutex_unlock(&lv2, &ppu, id).unwrap();
    assert_eq!(sys_lwmutex_trylock(&lv2, id), Ok(true));
    assert_eq!(lv2.lwmutex(id).unwrap().signaled(), 0);
}

#[test]
fn unlock_hands_over_in_fifo_order() {
    let (lv2, main) = setup();
    let id = sys_lwmutex_create(&lv2, 1, 0, 0, 0).unwrap();
    let mutex = lv2.lwmutex(id).unwrap();

    let mut handles = Vec::new();
    for (i, prio) in [(0, 300), (1, 100)] {
        let handle = crate::task::spawn(&lv2, &format!("locker{}", i), prio, move |lv2, ppu| {
            sys_lwmutex_lock(lv2, ppu, id, 0)
        })
        .unwrap();
        let tid = handle.thread().id();
        wait_for("locker to queue", || mutex.waiter_ids().contains(&tid));
        handles.push(handle);
    }

    let first = handles[0].thread().id();
    let second = handles[1].thread().id();
    assert_eq!(mutex.waiter_ids(), [first, second]);

    assert_eq!(sys_lwmutex_unlock(&lv2, &main, id), Ok(Flow::Done(())));
    assert_eq!(mutex.waiter_ids(), [second]);
    assert_eq!(sys_lwmutex_unlock2(&lv2, &main, id), Ok(Flow::Done(())));
    assert!(mutex.waiter_ids().is_empty());

    let mut results = handles.into_iter().map(|h| h.join().unwrap());
    assert_eq!(results.next(), Some(Ok(Flow::Done(WaitStatus::Acquired))));
    assert_eq!(results.next(), Some(Ok(Flow::Done(WaitStatus::Busy))));
    assert_eq!(mutex.signaled(), 0);
}

#[test]
fn lock_times_out_and_leaves_queue() {
    let (lv2, _) = setup();
    let id = sys_lwmutex_create(&lv2, 2, 0, 0, 0).unwrap();

    let start = Instant::now();
    let handle = crate::task::spawn(&lv2, "timed", 500, move |lv2, ppu| {
        sys_lwmutex_lock(lv2, ppu, id, 20_000)
    })
    .unwrap();
    assert_eq!(handle.join().unwrap(), Ok(Flow::Done(WaitStatus::TimedOut)));
    assert!(start.elapsed() >= Duration::from_millis(20));
    assert!(lv2.lwmutex(id).unwrap().waiter_ids().is_empty());
}

#[test]
fn destroy_refuses_while_locked_waiters_sleep() {
    let (lv2, main) = setup();
    let id = sys_lwmutex_create(&lv2, 1, 0, 0, 0).unwrap();
    let mutex = lv2.lwmutex(id).unwrap();

    let handle = crate::task::spawn(&lv2, "sleeper", 500, move |lv2, ppu| {
        sys_lwmutex_lock(lv2, ppu, id, 0)
    })
    .unwrap();
    wait_for("sleeper to queue", || !mutex.waiter_ids().is_empty());

    assert_eq!(sys_lwmutex_destroy(&lv2, &main, id), Err(CellError::EBUSY));
    sys_lwmutex_unlock(&lv2, &main, id).unwrap();
    assert_eq!(handle.join().unwrap(), Ok(Flow::Done(WaitStatus::Acquired)));

    assert_eq!(sys_lwmutex_destroy(&lv2, &main, id), Ok(Flow::Done(())));
    assert!(lv2.lwmutex(id).is_none());
}

#[test]
fn stopped_locker_blocks_unlock_until_replayed() {
    let (lv2, main) = setup();
    let id = sys_lwmutex_create(&lv2, 1, 0, 0, 0).unwrap();
    let mutex = lv2.lwmutex(id).unwrap();

    let handle = crate::task::spawn(&lv2, "captured", 500, move |lv2, ppu| {
        sys_lwmutex_lock(lv2, ppu, id, 0)
    })
    .unwrap();
    wait_for("locker to queue", || !mutex.waiter_ids().is_empty());

    let captured = handle.thread().clone();
    captured.request_stop();
    assert_eq!(handle.join().unwrap(), Ok(Flow::Again));
    assert!(captured.state().contains(CpuFlag::AGAIN));
    assert_eq!(mutex.waiter_ids(), [captured.id()]);

    // nothing may change while the only candidate is mid-suspension
    assert_eq!(sys_lwmutex_unlock(&lv2, &main, id), Ok(Flow::Again));
    assert!(main.state().contains(CpuFlag::AGAIN));
    assert_eq!(mutex.waiter_ids(), [captured.id()]);
    assert_eq!(mutex.signaled(), 0);
}
