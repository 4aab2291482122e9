//! Syscall entry: numbers, dispatch, and the retry loop.
//!
//! A call that cannot finish because another thread is caught mid-suspension
//! returns [`Flow::Again`] without having changed anything. The loop in
//! [`syscall`] re-issues it, or, if the calling thread is itself being stopped,
//! records it as the thread's pending call and unwinds with
//! [`SyscallExit::Suspended`] so it can be replayed after a restore.

pub mod error;
mod lwsync;
pub mod registry;
pub mod syscall_num;

use std::sync::Arc;

use crossbeam_utils::Backoff;

use crate::kernel::Lv2;
use crate::task::{CpuFlag, PpuThread};

use error::{CellError, CELL_OK};

/// Result of one attempt at a syscall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow<T> {
    Done(T),
    /// Nothing was changed; issue the call again.
    Again,
}

impl<T> Flow<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Flow<U> {
        match self {
            Flow::Done(value) => Flow::Done(f(value)),
            Flow::Again => Flow::Again,
        }
    }

    pub fn done(self) -> Option<T> {
        match self {
            Flow::Done(value) => Some(value),
            Flow::Again => None,
        }
    }
}

/// A syscall as the guest issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyscallRequest {
    pub num: usize,
    pub args: [u64; 6],
}

/// What the guest sees when a syscall returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyscallReply {
    /// r3
    pub code: u32,
    /// Value the guest ABI stores through its out-pointer (created ids).
    pub out: Option<u32>,
}

impl SyscallReply {
    pub fn ok() -> Self {
        Self::code(CELL_OK)
    }

    pub fn code(code: u32) -> Self {
        Self { code, out: None }
    }

    pub fn error(err: CellError) -> Self {
        Self::code(err.code())
    }

    pub fn with_out(out: u32) -> Self {
        Self {
            code: CELL_OK,
            out: Some(out),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallExit {
    Returned(SyscallReply),
    /// The thread was stopped; its call is pending for replay.
    Suspended,
}

impl SyscallExit {
    pub fn reply(self) -> Option<SyscallReply> {
        match self {
            SyscallExit::Returned(reply) => Some(reply),
            SyscallExit::Suspended => None,
        }
    }
}

pub fn syscall_dispatch(lv2: &Lv2, ppu: &Arc<PpuThread>, request: SyscallRequest) -> Flow<SyscallReply> {
    log::trace!("syscall_id: {}, args: {:x?}", request.num, request.args);

    match registry::lookup(request.num) {
        Some(entry) => (entry.handler)(lv2, ppu, request.args),
        None => {
            log::error!("unknown syscall {}", request.num);
            Flow::Done(SyscallReply::error(CellError::ENOSYS))
        }
    }
}

/// Runs `request` to completion or suspension.
pub fn syscall(lv2: &Lv2, ppu: &Arc<PpuThread>, request: SyscallRequest) -> SyscallExit {
    let backoff = Backoff::new();

    loop {
        if ppu.is_stopped() {
            return suspend(ppu, request);
        }

        ppu.state().insert(CpuFlag::WAIT);
        let flow = syscall_dispatch(lv2, ppu, request);
        ppu.state().remove(CpuFlag::WAIT);

        match flow {
            Flow::Done(reply) => {
                ppu.set_gpr3(reply.code as u64);
                ppu.finish_replay();
                return SyscallExit::Returned(reply);
            }
            Flow::Again if ppu.is_stopped() => return suspend(ppu, request),
            Flow::Again => {
                ppu.state().remove(CpuFlag::AGAIN);
                backoff.snooze();
            }
        }
    }
}

fn suspend(ppu: &Arc<PpuThread>, request: SyscallRequest) -> SyscallExit {
    log::debug!(
        "{} ({:#x}) suspended in syscall {}",
        ppu.name(),
        ppu.id(),
        request.num
    );
    ppu.state().insert(CpuFlag::AGAIN);
    ppu.set_pending(Some(request));
    ppu.finish_replay();
    SyscallExit::Suspended
}

#[cfg(test)]
mod test;
