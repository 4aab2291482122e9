use std::sync::Arc;

use crate::kernel::{Lv2, Lv2Object};
use crate::lwcond::name64;
use crate::syscall::error::{CellError, CellResult, CELL_OK};
use crate::syscall::Flow;
use crate::task::scheduler::{self, AwakeBatch};
use crate::task::{CpuFlag, PpuThread, Protocol, WaitStatus};

use super::LwMutex;

pub fn sys_lwmutex_create(
    lv2: &Lv2,
    protocol: u32,
    control: u32,
    has_name: i32,
    name: u64,
) -> CellResult<u32> {
    log::warn!(
        "_sys_lwmutex_create(protocol={:#x}, control={:#x}, has_name={:#x}, name={:#x} (\"{}\"))",
        protocol,
        control,
        has_name,
        name,
        name64(name)
    );

    let protocol = match Protocol::from_repr(protocol) {
        Some(Protocol::PriorityInherit) => {
            log::warn!("_sys_lwmutex_create(): SYS_SYNC_PRIORITY_INHERIT is not supported, using SYS_SYNC_PRIORITY");
            Protocol::Priority
        }
        Some(protocol) => protocol,
        None => {
            log::error!("_sys_lwmutex_create(): invalid protocol ({:#x})", protocol);
            return Err(CellError::EINVAL);
        }
    };

    let name = if has_name < 0 { name } else { 0 };

    lv2.make_object(|| Lv2Object::LwMutex(Arc::new(LwMutex::new(protocol, control, name))))
        .ok_or(CellError::EAGAIN)
}

/// Destroys an lwmutex once nobody sleeps on it and every lwcond wait bound to it
/// has left. Blocks for the latter.
pub fn sys_lwmutex_destroy(lv2: &Lv2, ppu: &Arc<PpuThread>, lwmutex_id: u32) -> CellResult<Flow<()>> {
    log::warn!("_sys_lwmutex_destroy(lwmutex_id={:#x})", lwmutex_id);

    let mut seen: Option<Arc<LwMutex>> = None;

    loop {
        let withdrawal = lv2
            .withdraw::<LwMutex, CellError>(lwmutex_id, |mutex| {
                // a different object at the same id means ours is already gone
                if let Some(prev) = &seen {
                    if !Arc::ptr_eq(prev, mutex) {
                        return Err(CellError::ESRCH);
                    }
                }

                let mq = mutex.lock();
                if !mq.sq.is_empty() {
                    return Err(CellError::EBUSY);
                }
                if mutex.begin_destroy() != i32::MIN {
                    return Err(CellError::EAGAIN);
                }
                Ok(())
            })
            .ok_or(CellError::ESRCH)?;

        match withdrawal.result {
            Ok(()) => return Ok(Flow::Done(())),
            Err(CellError::EAGAIN) => {}
            Err(err) => return Err(err),
        }

        log::debug!(
            "_sys_lwmutex_destroy(): waiting for {} lwcond waiter(s) of {:#x}",
            withdrawal.object.lwcond_waiters() & i32::MAX,
            lwmutex_id
        );

        if !withdrawal.object.wait_drained(ppu) {
            ppu.state().insert(CpuFlag::AGAIN);
            return Ok(Flow::Again);
        }

        seen = Some(withdrawal.object);
    }
}

pub fn sys_lwmutex_lock(
    lv2: &Lv2,
    ppu: &Arc<PpuThread>,
    lwmutex_id: u32,
    timeout: u64,
) -> CellResult<Flow<WaitStatus>> {
    log::trace!("_sys_lwmutex_lock(lwmutex_id={:#x}, timeout={:#x})", lwmutex_id, timeout);

    ppu.set_gpr3(CELL_OK as u64);

    let (mutex, queued) = lv2
        .check::<LwMutex, _>(lwmutex_id, |mutex| {
            let mut mq = mutex.lock();
            let signaled = std::mem::take(&mut mq.signaled);
            if signaled != 0 {
                if signaled == i32::MIN {
                    ppu.set_gpr3(CellError::EBUSY.code() as u64);
                }
                return (mutex.clone(), false);
            }
            mq.add_waiter(ppu.clone());
            ppu.sleep(timeout);
            (mutex.clone(), true)
        })
        .ok_or(CellError::ESRCH)?;

    if !queued {
        return Ok(Flow::Done(WaitStatus::from_gpr3(ppu.gpr3())));
    }

    loop {
        let state = ppu.state().remove(CpuFlag::SIGNAL);
        if state.contains(CpuFlag::SIGNAL) {
            break;
        }

        if state.intersects(CpuFlag::STOP | CpuFlag::EXIT) {
            let mq = mutex.lock();
            if !scheduler::contains(&mq.sq, ppu) {
                // dequeued, the wake-up is on its way
                drop(mq);
                ppu.wait_on(state);
                continue;
            }
            ppu.state().insert(CpuFlag::AGAIN);
            return Ok(Flow::Again);
        }

        if !ppu.has_deadline() {
            ppu.wait_on(state);
            continue;
        }

        if ppu.wait_timeout() {
            if ppu.is_stopped() {
                continue;
            }
            let mut mq = mutex.lock();
            if scheduler::unqueue(&mut mq.sq, ppu) {
                ppu.set_gpr3(CellError::ETIMEDOUT.code() as u64);
                break;
            }
            drop(mq);
            ppu.clear_deadline();
        }
    }

    Ok(Flow::Done(WaitStatus::from_gpr3(ppu.gpr3())))
}

pub fn sys_lwmutex_trylock(lv2: &Lv2, lwmutex_id: u32) -> CellResult<bool> {
    log::trace!("_sys_lwmutex_trylock(lwmutex_id={:#x})", lwmutex_id);

    lv2.check::<LwMutex, _>(lwmutex_id, |mutex| {
        let mut mq = mutex.lock();
        if mq.signaled & 1 != 0 {
            mq.signaled = 0;
            return true;
        }
        false
    })
    .ok_or(CellError::ESRCH)
}

pub fn sys_lwmutex_unlock(lv2: &Lv2, ppu: &Arc<PpuThread>, lwmutex_id: u32) -> CellResult<Flow<()>> {
    log::trace!("_sys_lwmutex_unlock(lwmutex_id={:#x})", lwmutex_id);
    unlock(lv2, ppu, lwmutex_id, false)
}

/// Unlock that wakes the next waiter without ownership (`CELL_EBUSY`).
pub fn sys_lwmutex_unlock2(lv2: &Lv2, ppu: &Arc<PpuThread>, lwmutex_id: u32) -> CellResult<Flow<()>> {
    log::trace!("_sys_lwmutex_unlock2(lwmutex_id={:#x})", lwmutex_id);
    unlock(lv2, ppu, lwmutex_id, true)
}

fn unlock(lv2: &Lv2, ppu: &Arc<PpuThread>, lwmutex_id: u32, busy: bool) -> CellResult<Flow<()>> {
    let again = lv2
        .check::<LwMutex, _>(lwmutex_id, |mutex| {
            let mut batch = AwakeBatch::new();
            {
                let mut mq = mutex.lock();
                match mq.select() {
                    Some(index) if mq.sq[index].state().contains(CpuFlag::AGAIN) => return true,
                    Some(index) => {
                        if let Some(cpu) = mq.sq.remove(index) {
                            if busy {
                                cpu.set_gpr3(CellError::EBUSY.code() as u64);
                            }
                            batch.push(cpu);
                        }
                    }
                    None => mq.signaled |= if busy { i32::MIN } else { 1 },
                }
            }
            batch.awake_all();
            false
        })
        .ok_or(CellError::ESRCH)?;

    if again {
        ppu.state().insert(CpuFlag::AGAIN);
        return Ok(Flow::Again);
    }
    Ok(Flow::Done(()))
}
