#![allow(dead_code)]

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use lv2::syscall::syscall_num::*;
use lv2::task::{self, PpuHandle};
use lv2::{Lv2, PpuThread, SyscallExit, SyscallReply};

pub const ANY_THREAD: u64 = 0xFFFF_FFFF;

pub const FIFO: u64 = 1;
pub const PRIORITY: u64 = 2;

pub fn setup() -> (Arc<Lv2>, Arc<PpuThread>) {
    lv2::io::logging::init();
    let lv2 = Arc::new(Lv2::new());
    let main = lv2.create_ppu("main", 1000).unwrap();
    (lv2, main)
}

pub fn wait_until(what: &str, mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !done() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        thread::sleep(Duration::from_millis(1));
    }
}

/// Issues a syscall that is expected to return.
pub fn call(lv2: &Lv2, ppu: &Arc<PpuThread>, num: usize, args: &[u64]) -> SyscallReply {
    let mut regs = [0u64; 6];
    regs[..args.len()].copy_from_slice(args);
    match lv2.syscall(ppu, num, regs) {
        SyscallExit::Returned(reply) => reply,
        SyscallExit::Suspended => panic!("syscall {} suspended unexpectedly", num),
    }
}

/// Runs one syscall on a new guest thread.
pub fn spawn_call(
    lv2: &Arc<Lv2>,
    name: &str,
    priority: u32,
    num: usize,
    args: &[u64],
) -> PpuHandle<SyscallExit> {
    let mut regs = [0u64; 6];
    regs[..args.len()].copy_from_slice(args);
    task::spawn(lv2, name, priority, move |lv2, ppu| lv2.syscall(ppu, num, regs)).unwrap()
}

pub fn returned(handle: PpuHandle<SyscallExit>) -> SyscallReply {
    handle.join().unwrap().reply().unwrap()
}

/// Creates an lwmutex and an lwcond bound to it; returns `(lwcond, lwmutex)`.
pub fn create_pair(lv2: &Lv2, ppu: &Arc<PpuThread>, protocol: u64) -> (u64, u64) {
    let mutex = call(lv2, ppu, SYSCALL_LWMUTEX_CREATE, &[protocol, 0x1000, 0, 0]);
    assert_eq!(mutex.code, 0);
    let mutex = mutex.out.unwrap() as u64;

    let cond = call(lv2, ppu, SYSCALL_LWCOND_CREATE, &[mutex, 0x2000, 0]);
    assert_eq!(cond.code, 0);
    (cond.out.unwrap() as u64, mutex)
}

/// Starts a `queue_wait` and returns once the thread sleeps on the condition.
pub fn spawn_waiter(
    lv2: &Arc<Lv2>,
    name: &str,
    priority: u32,
    cond: u64,
    mutex: u64,
    timeout: u64,
) -> PpuHandle<SyscallExit> {
    let handle = spawn_call(lv2, name, priority, SYSCALL_LWCOND_QUEUE_WAIT, &[cond, mutex, timeout]);
    let id = handle.thread().id();
    let cv = lv2.lwcond(cond as u32).unwrap();
    wait_until("waiter to sleep", || cv.waiter_ids().contains(&id));
    handle
}

/// Starts an `lwmutex_lock` and returns once the thread sleeps on the mutex.
pub fn spawn_locker(lv2: &Arc<Lv2>, name: &str, priority: u32, mutex: u64) -> PpuHandle<SyscallExit> {
    let handle = spawn_call(lv2, name, priority, SYSCALL_LWMUTEX_LOCK, &[mutex, 0]);
    let id = handle.thread().id();
    let mx = lv2.lwmutex(mutex as u32).unwrap();
    wait_until("locker to sleep", || mx.waiter_ids().contains(&id));
    handle
}

/// Takes the token a waiter left behind, so the caller owns the mutex again.
pub fn relock(lv2: &Lv2, ppu: &Arc<PpuThread>, mutex: u64) {
    assert_eq!(call(lv2, ppu, SYSCALL_LWMUTEX_TRYLOCK, &[mutex]).code, 0);
}
