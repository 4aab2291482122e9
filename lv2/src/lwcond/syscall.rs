use std::sync::Arc;

use strum_macros::{Display, FromRepr};

use crate::config::LWCOND_ANY_THREAD;
use crate::kernel::{Lv2, Lv2Object};
use crate::lwmutex::LwMutex;
use crate::syscall::error::{CellError, CellResult, CELL_OK};
use crate::syscall::Flow;
use crate::task::scheduler::{self, AwakeBatch};
use crate::task::{CpuFlag, PpuThread, Protocol, WaitSnapshot, WaitStatus};

use super::{lock_pair, name64, LwCond};

/// What a signalled waiter gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, FromRepr)]
#[repr(u32)]
pub enum SignalMode {
    /// Ownership is handed over: the waiter moves onto the lwmutex queue.
    #[strum(serialize = "owned")]
    Owned = 1,
    /// The waiter wakes with `CELL_EBUSY` and re-locks in user space.
    #[strum(serialize = "unowned")]
    Unowned = 2,
    /// Hand-off through the lwmutex queue even though the signaller does not own
    /// the mutex: the mutex's own policy decides who runs.
    #[strum(serialize = "forced")]
    Forced = 3,
}

impl SignalMode {
    /// Decodes the raw mode argument. Any other value is a guest bug.
    pub fn from_raw(mode: u32) -> Self {
        match Self::from_repr(mode) {
            Some(mode) => mode,
            None => panic!("Unknown mode ({})", mode),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalTarget {
    Any,
    Thread(u32),
}

impl SignalTarget {
    pub fn from_raw(ppu_thread_id: u64) -> Self {
        if ppu_thread_id == LWCOND_ANY_THREAD {
            SignalTarget::Any
        } else {
            SignalTarget::Thread(ppu_thread_id as u32)
        }
    }
}

/// Outcome of a signal that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalStatus {
    Signaled,
    /// Nobody was waiting; unowned signals to any thread are fine with that.
    Idle,
    /// Nobody (or not the named thread) was waiting on an owned signal.
    NotOwner,
    /// Nobody was waiting on a forced signal.
    NoWaiter,
}

impl SignalStatus {
    pub fn code(self) -> u32 {
        match self {
            SignalStatus::Signaled | SignalStatus::Idle => CELL_OK,
            SignalStatus::NotOwner => CellError::EPERM.code(),
            SignalStatus::NoWaiter => CellError::ENOENT.code(),
        }
    }
}

enum Attempt {
    Missing,
    Idle,
    Again,
    Signaled,
}

pub fn sys_lwcond_create(lv2: &Lv2, lwmutex_id: u32, control: u32, name: u64) -> CellResult<u32> {
    log::warn!(
        "_sys_lwcond_create(lwmutex_id={:#x}, control={:#x}, name={:#x} (\"{}\"))",
        lwmutex_id,
        control,
        name,
        name64(name)
    );

    let protocol = lv2
        .check::<LwMutex, _>(lwmutex_id, |mutex| mutex.protocol())
        .ok_or(CellError::ESRCH)?;

    let protocol = match protocol {
        Protocol::Retry => Protocol::Priority,
        protocol => protocol,
    };

    lv2.make_object(|| Lv2Object::LwCond(Arc::new(LwCond::new(name, lwmutex_id, protocol, control))))
        .ok_or(CellError::EAGAIN)
}

pub fn sys_lwcond_destroy(lv2: &Lv2, lwcond_id: u32) -> CellResult<()> {
    log::warn!("_sys_lwcond_destroy(lwcond_id={:#x})", lwcond_id);

    let withdrawal = lv2
        .withdraw::<LwCond, CellError>(lwcond_id, |cond| {
            if cond.waiters() > 0 {
                return Err(CellError::EBUSY);
            }
            Ok(())
        })
        .ok_or(CellError::ESRCH)?;

    withdrawal.result
}

pub fn sys_lwcond_signal(
    lv2: &Lv2,
    ppu: &Arc<PpuThread>,
    lwcond_id: u32,
    lwmutex_id: u32,
    target: SignalTarget,
    mode: SignalMode,
) -> CellResult<Flow<SignalStatus>> {
    log::trace!(
        "_sys_lwcond_signal(lwcond_id={:#x}, lwmutex_id={:#x}, target={:?}, mode={})",
        lwcond_id,
        lwmutex_id,
        target,
        mode
    );

    let attempt = lv2
        .check::<LwCond, _>(lwcond_id, |cond| {
            let cpu = match target {
                SignalTarget::Thread(id) => match lv2.ppu(id) {
                    Some(cpu) => Some(cpu),
                    None => return Attempt::Missing,
                },
                SignalTarget::Any => None,
            };

            let mutex = match mode {
                SignalMode::Unowned => None,
                SignalMode::Owned | SignalMode::Forced => match lv2.get::<LwMutex>(lwmutex_id) {
                    Some(mutex) => Some(mutex),
                    None => return Attempt::Missing,
                },
            };

            if cond.waiters() == 0 {
                return Attempt::Idle;
            }

            signal_one(cond, mutex.as_deref(), cpu.as_ref(), mode)
        })
        .ok_or(CellError::ESRCH)?;

    match attempt {
        Attempt::Missing => Err(CellError::ESRCH),
        Attempt::Again => {
            ppu.state().insert(CpuFlag::AGAIN);
            Ok(Flow::Again)
        }
        Attempt::Signaled => Ok(Flow::Done(SignalStatus::Signaled)),
        Attempt::Idle => Ok(Flow::Done(match (target, mode) {
            (SignalTarget::Any, SignalMode::Unowned) => SignalStatus::Idle,
            (SignalTarget::Any, SignalMode::Forced) => SignalStatus::NoWaiter,
            _ => SignalStatus::NotOwner,
        })),
    }
}

/// Moves or wakes one waiter. Nothing is touched unless the whole hand-off can
/// complete; a candidate caught mid-suspension turns the call into `Again`.
fn signal_one(
    cond: &LwCond,
    mutex: Option<&LwMutex>,
    cpu: Option<&Arc<PpuThread>>,
    mode: SignalMode,
) -> Attempt {
    let mut batch = AwakeBatch::new();

    {
        let (mut cq, mut mq) = match mutex {
            Some(mutex) => {
                let (cq, mq) = lock_pair(cond, mutex);
                (cq, Some(mq))
            }
            None => (cond.lock(), None),
        };

        if let Some(cpu) = cpu {
            if cpu.state().contains(CpuFlag::AGAIN) {
                return Attempt::Again;
            }
        }

        let index = match cpu {
            Some(cpu) => scheduler::position(&cq.sq, cpu),
            None => cond.protocol().scheduler().select(&cq.sq),
        };
        let Some(index) = index else {
            return Attempt::Idle;
        };

        let result = cq.sq[index].clone();
        if result.state().contains(CpuFlag::AGAIN) {
            return Attempt::Again;
        }

        match (mode, mq.as_deref_mut()) {
            (SignalMode::Unowned, _) => {
                result.set_gpr3(CellError::EBUSY.code() as u64);
                batch.push(result);
            }
            (SignalMode::Owned, Some(mq)) => {
                mq.ensure_unsignaled();
                mq.add_waiter(result);
            }
            (SignalMode::Forced, Some(mq)) => {
                mq.ensure_unsignaled();
                if mq.sq.is_empty() {
                    batch.push(result);
                } else {
                    // the mutex policy decides between its own waiters and ours
                    mq.add_waiter(result);
                    if let Some(next) = mq.select() {
                        if mq.sq[next].state().contains(CpuFlag::AGAIN) {
                            mq.sq.pop_back();
                            return Attempt::Again;
                        }
                        if let Some(next) = mq.sq.remove(next) {
                            batch.push(next);
                        }
                    }
                }
            }
            (_, None) => unreachable!("owned and forced signals lock the lwmutex"),
        }

        cq.sq.remove(index);
        cond.sub_waiter_count();
    }

    batch.awake_all();
    Attempt::Signaled
}

/// Wakes every waiter. Owned mode returns how many moved to the lwmutex queue,
/// unowned mode returns 0.
pub fn sys_lwcond_signal_all(
    lv2: &Lv2,
    ppu: &Arc<PpuThread>,
    lwcond_id: u32,
    lwmutex_id: u32,
    mode: SignalMode,
) -> CellResult<Flow<u32>> {
    log::trace!(
        "_sys_lwcond_signal_all(lwcond_id={:#x}, lwmutex_id={:#x}, mode={})",
        lwcond_id,
        lwmutex_id,
        mode
    );

    if mode == SignalMode::Forced {
        panic!("Unknown mode ({})", mode as u32);
    }

    let outcome = lv2
        .check::<LwCond, _>(lwcond_id, |cond| {
            let mutex = match mode {
                SignalMode::Owned => match lv2.get::<LwMutex>(lwmutex_id) {
                    Some(mutex) => Some(mutex),
                    None => return None,
                },
                _ => None,
            };

            if cond.waiters() == 0 {
                return Some(Flow::Done(0));
            }

            let mut batch = AwakeBatch::new();
            let mut moved = 0;
            {
                let (mut cq, mut mq) = match mutex.as_deref() {
                    Some(mutex) => {
                        let (cq, mq) = lock_pair(cond, mutex);
                        (cq, Some(mq))
                    }
                    None => (cond.lock(), None),
                };

                if cq.sq.iter().any(|cpu| cpu.state().contains(CpuFlag::AGAIN)) {
                    return Some(Flow::Again);
                }

                if let Some(mq) = mq.as_deref() {
                    mq.ensure_unsignaled();
                }
                cond.clear_waiter_count();

                let policy = cond.protocol().scheduler();
                while let Some(cpu) = policy.schedule(&mut cq.sq) {
                    match mq.as_deref_mut() {
                        Some(mq) => mq.add_waiter(cpu),
                        None => {
                            cpu.set_gpr3(CellError::EBUSY.code() as u64);
                            batch.push(cpu);
                        }
                    }
                    moved += 1;
                }
            }
            batch.awake_all();

            Some(Flow::Done(if mode == SignalMode::Owned { moved } else { 0 }))
        })
        .flatten()
        .ok_or(CellError::ESRCH)?;

    if let Flow::Again = outcome {
        ppu.state().insert(CpuFlag::AGAIN);
    }
    Ok(outcome)
}

enum Entered {
    Sleeping(Arc<LwCond>, Arc<LwMutex>),
    Again,
}

/// Releases the lwmutex, sleeps on the condition, and comes back either owning
/// the mutex, woken without ownership, or timed out.
pub fn sys_lwcond_queue_wait(
    lv2: &Lv2,
    ppu: &Arc<PpuThread>,
    lwcond_id: u32,
    lwmutex_id: u32,
    timeout: u64,
) -> CellResult<Flow<WaitStatus>> {
    log::trace!(
        "_sys_lwcond_queue_wait(lwcond_id={:#x}, lwmutex_id={:#x}, timeout={:#x})",
        lwcond_id,
        lwmutex_id,
        timeout
    );

    ppu.set_gpr3(CELL_OK as u64);

    let entered = lv2
        .check::<LwCond, _>(lwcond_id, |cond| {
            let mutex = lv2.get::<LwMutex>(lwmutex_id)?;
            Some(enter_wait(cond, mutex, ppu, timeout))
        })
        .flatten()
        .ok_or(CellError::ESRCH)?;

    let (cond, mutex) = match entered {
        Entered::Sleeping(cond, mutex) => (cond, mutex),
        Entered::Again => {
            ppu.state().insert(CpuFlag::AGAIN);
            return Ok(Flow::Again);
        }
    };

    let flow = loop {
        let state = ppu.state().remove(CpuFlag::SIGNAL);
        if state.contains(CpuFlag::SIGNAL) {
            break Flow::Done(());
        }

        if state.intersects(CpuFlag::STOP | CpuFlag::EXIT) {
            let (cq, mq) = lock_pair(&cond, &mutex);
            let cond_sleep = scheduler::contains(&cq.sq, ppu);
            let mutex_sleep = scheduler::contains(&mq.sq, ppu);
            drop((cq, mq));

            if !cond_sleep && !mutex_sleep {
                // dequeued, the wake-up is on its way
                ppu.wait_on(state);
                continue;
            }

            ppu.store_wait_snapshot(WaitSnapshot { mutex_sleep });
            ppu.state().insert(CpuFlag::AGAIN);
            break Flow::Again;
        }

        if !ppu.has_deadline() {
            ppu.wait_on(state);
            continue;
        }

        if ppu.wait_timeout() {
            if ppu.is_stopped() {
                continue;
            }

            let (mut cq, mq) = lock_pair(&cond, &mutex);
            if scheduler::unqueue(&mut cq.sq, ppu) {
                cond.sub_waiter_count();
                ppu.set_gpr3(CellError::ETIMEDOUT.code() as u64);
                break Flow::Done(());
            }

            if scheduler::contains(&mq.sq, ppu) {
                // signalled already: the mutex decides from here, without a timeout
                ppu.sleep(0);
            } else {
                ppu.clear_deadline();
            }
        }
    };

    mutex.leave_lwcond();

    Ok(match flow {
        Flow::Done(()) => Flow::Done(WaitStatus::from_gpr3(ppu.gpr3())),
        Flow::Again => Flow::Again,
    })
}

/// Queues `ppu` on the condition (or straight on the mutex when replaying a
/// thread captured there) and releases the lwmutex to its next waiter.
///
/// A wait snapshot is only taken after the release happened, so a thread that
/// carries one skips it. A thread captured before that point releases again.
fn enter_wait(cond: &Arc<LwCond>, mutex: Arc<LwMutex>, ppu: &Arc<PpuThread>, timeout: u64) -> Entered {
    let snapshot = ppu.take_wait_snapshot();
    let released = snapshot.is_some();
    let mut batch = AwakeBatch::new();

    {
        let (mut cq, mut mq) = lock_pair(cond, &mutex);

        let handoff = if released { None } else { mq.select() };
        if let Some(next) = handoff {
            if mq.sq[next].state().contains(CpuFlag::AGAIN) {
                if let Some(snapshot) = snapshot {
                    ppu.store_wait_snapshot(snapshot);
                }
                return Entered::Again;
            }
        }

        mutex.enter_lwcond();

        if snapshot.map_or(false, |s| s.mutex_sleep) {
            mq.add_waiter(ppu.clone());
        } else {
            cond.add_waiter_count();
            cq.sq.push_back(ppu.clone());
        }

        if !released {
            match handoff.and_then(|next| mq.sq.remove(next)) {
                Some(next) => batch.push(next),
                None => mq.signaled |= 1,
            }
        }

        ppu.sleep(timeout);
    }

    batch.awake_all();
    Entered::Sleeping(cond.clone(), mutex)
}
