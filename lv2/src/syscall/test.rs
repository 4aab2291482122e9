use std::sync::Arc;

use super::error::{CellCode, CellError};
use super::syscall_num::*;
use super::{registry, syscall_dispatch, Flow, SyscallExit, SyscallReply, SyscallRequest};
use crate::kernel::Lv2;
use crate::task::CpuFlag;

fn setup() -> (Arc<Lv2>, Arc<crate::task::PpuThread>) {
    crate::io::logging::init();
    let lv2 = Arc::new(Lv2::new());
    let ppu = lv2.create_ppu("main", 1000).unwrap();
    (lv2, ppu)
}

fn call(lv2: &Lv2, ppu: &Arc<crate::task::PpuThread>, num: usize, args: &[u64]) -> SyscallReply {
    let mut regs = [0u64; 6];
    regs[..args.len()].copy_from_slice(args);
    lv2.syscall(ppu, num, regs).reply().unwrap()
}

#[test]
fn every_number_is_registered() {
    for num in [95, 96, 97, 98, 99, 107, 108, 109, 115, 116, 128] {
        let entry = registry::lookup(num).unwrap();
        assert_eq!(entry.syscall as usize, num);
        assert_eq!(Syscall::from_repr(num), Some(entry.syscall));
    }
    assert!(registry::lookup(100).is_none());
    assert!(registry::lookup(usize::MAX).is_none());
}

#[test]
fn unknown_syscall_is_enosys() {
    let (lv2, ppu) = setup();
    let request = SyscallRequest { num: 3, args: [0; 6] };
    assert_eq!(
        syscall_dispatch(&lv2, &ppu, request),
        Flow::Done(SyscallReply::error(CellError::ENOSYS))
    );
}

#[test]
fn create_lock_unlock_through_registers() {
    let (lv2, ppu) = setup();

    let mutex = call(&lv2, &ppu, SYSCALL_LWMUTEX_CREATE, &[1, 0x1000, 0, 0]);
    assert_eq!(mutex.code, 0);
    let mutex_id = mutex.out.unwrap() as u64;

    let cond = call(&lv2, &ppu, SYSCALL_LWCOND_CREATE, &[mutex_id, 0x2000, 0]);
    let cond_id = cond.out.unwrap() as u64;

    // no waiters: trylock has nothing to take
    let busy = call(&lv2, &ppu, SYSCALL_LWMUTEX_TRYLOCK, &[mutex_id]);
    assert_eq!(busy.code, CellError::EBUSY.code());

    // unlock with nobody queued leaves the token for the next locker
    assert_eq!(call(&lv2, &ppu, SYSCALL_LWMUTEX_UNLOCK, &[mutex_id]).code, 0);
    assert_eq!(call(&lv2, &ppu, SYSCALL_LWMUTEX_LOCK, &[mutex_id, 0]).code, 0);

    // unlock2 makes the next locker come back busy
    assert_eq!(call(&lv2, &ppu, SYSCALL_LWMUTEX_UNLOCK2, &[mutex_id]).code, 0);
    assert_eq!(
        call(&lv2, &ppu, SYSCALL_LWMUTEX_LOCK, &[mutex_id, 0]).code,
        CellError::EBUSY.code()
    );

    assert_eq!(call(&lv2, &ppu, SYSCALL_LWCOND_SIGNAL_ALL, &[cond_id, mutex_id, 1]).code, 0);
    assert_eq!(call(&lv2, &ppu, SYSCALL_LWCOND_DESTROY, &[cond_id]).code, 0);
    assert_eq!(call(&lv2, &ppu, SYSCALL_LWMUTEX_DESTROY, &[mutex_id]).code, 0);
    assert_eq!(
        call(&lv2, &ppu, SYSCALL_LWMUTEX_DESTROY, &[mutex_id]).code,
        CellError::ESRCH.code()
    );
}

#[test]
fn signal_codes_without_waiters() {
    let (lv2, ppu) = setup();
    let mutex_id = call(&lv2, &ppu, SYSCALL_LWMUTEX_CREATE, &[2, 0, 0, 0]).out.unwrap() as u64;
    let cond_id = call(&lv2, &ppu, SYSCALL_LWCOND_CREATE, &[mutex_id, 0, 0]).out.unwrap() as u64;
    let any = 0xFFFF_FFFF;

    let signal = |target: u64, mode: u64| {
        call(&lv2, &ppu, SYSCALL_LWCOND_SIGNAL, &[cond_id, mutex_id, target, mode]).code
    };
    assert_eq!(signal(any, 1), CellError::EPERM.code());
    assert_eq!(signal(any, 2), 0);
    assert_eq!(signal(any, 3), CellError::ENOENT.code());
    assert_eq!(signal(ppu.id() as u64, 2), CellError::EPERM.code());
    assert_eq!(signal(0x0100_0fff, 2), CellError::ESRCH.code());
}

#[test]
#[should_panic(expected = "Unknown mode")]
fn signal_with_bad_mode_panics() {
    let (lv2, ppu) = setup();
    let mutex_id = call(&lv2, &ppu, SYSCALL_LWMUTEX_CREATE, &[1, 0, 0, 0]).out.unwrap() as u64;
    let cond_id = call(&lv2, &ppu, SYSCALL_LWCOND_CREATE, &[mutex_id, 0, 0]).out.unwrap() as u64;
    call(&lv2, &ppu, SYSCALL_LWCOND_SIGNAL, &[cond_id, mutex_id, 0xFFFF_FFFF, 4]);
}

#[test]
#[should_panic(expected = "Unknown mode")]
fn signal_all_rejects_forced_mode() {
    let (lv2, ppu) = setup();
    let mutex_id = call(&lv2, &ppu, SYSCALL_LWMUTEX_CREATE, &[1, 0, 0, 0]).out.unwrap() as u64;
    let cond_id = call(&lv2, &ppu, SYSCALL_LWCOND_CREATE, &[mutex_id, 0, 0]).out.unwrap() as u64;
    call(&lv2, &ppu, SYSCALL_LWCOND_SIGNAL_ALL, &[cond_id, mutex_id, 3]);
}

#[test]
fn stopped_caller_is_suspended_before_dispatch() {
    let (lv2, ppu) = setup();
    ppu.request_stop();
    let exit = lv2.syscall(&ppu, SYSCALL_LWMUTEX_CREATE, [1, 0, 0, 0, 0, 0]);
    assert_eq!(exit, SyscallExit::Suspended);
    assert!(ppu.state().contains(CpuFlag::AGAIN));
    assert_eq!(ppu.pending().unwrap().num, SYSCALL_LWMUTEX_CREATE);
    assert!(lv2.objects().is_empty());
}

#[test]
fn cell_code_display() {
    assert_eq!(CellCode(0).to_string(), "CELL_OK");
    assert_eq!(CellCode(0x8001_0005).to_string(), "CELL_ESRCH (0x80010005)");
    assert_eq!(CellCode(7).to_string(), "0x7");
    assert_eq!(CellError::ESRCH.to_string(), "No such object");
    assert_eq!("EBUSY".parse::<CellError>(), Ok(CellError::EBUSY));
    assert_eq!(CellError::try_from(0x8001_000B), Ok(CellError::ETIMEDOUT));
    assert!(CellError::try_from(1).is_err());
}
