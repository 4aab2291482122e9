//! Register-level entry points of the lightweight sync syscalls.
//!
//! Argument layout follows the guest ABI minus the out-pointers: a created id
//! comes back in [`SyscallReply::out`] instead of being stored to guest memory.

use std::sync::Arc;

use crate::kernel::Lv2;
use crate::lwcond::syscall::{
    sys_lwcond_create, sys_lwcond_destroy, sys_lwcond_queue_wait, sys_lwcond_signal,
    sys_lwcond_signal_all, SignalMode, SignalTarget,
};
use crate::lwmutex::syscall::{
    sys_lwmutex_create, sys_lwmutex_destroy, sys_lwmutex_lock, sys_lwmutex_trylock,
    sys_lwmutex_unlock, sys_lwmutex_unlock2,
};
use crate::task::PpuThread;

use super::error::{CellCode, CellError, CellResult};
use super::{Flow, SyscallReply};

fn finish<T>(
    name: &str,
    result: CellResult<Flow<T>>,
    encode: impl FnOnce(T) -> SyscallReply,
) -> Flow<SyscallReply> {
    match result {
        Ok(flow) => flow.map(encode),
        Err(err) => {
            log::error!("{}() failed: {}", name, CellCode(err.code()));
            Flow::Done(SyscallReply::error(err))
        }
    }
}

fn done<T>(result: CellResult<T>) -> CellResult<Flow<T>> {
    result.map(Flow::Done)
}

/// (protocol, control, has_name, name)
pub(super) fn lwmutex_create(lv2: &Lv2, _ppu: &Arc<PpuThread>, args: [u64; 6]) -> Flow<SyscallReply> {
    let result = sys_lwmutex_create(lv2, args[0] as u32, args[1] as u32, args[2] as i32, args[3]);
    finish("_sys_lwmutex_create", done(result), SyscallReply::with_out)
}

/// (lwmutex_id)
pub(super) fn lwmutex_destroy(lv2: &Lv2, ppu: &Arc<PpuThread>, args: [u64; 6]) -> Flow<SyscallReply> {
    let result = sys_lwmutex_destroy(lv2, ppu, args[0] as u32);
    finish("_sys_lwmutex_destroy", result, |()| SyscallReply::ok())
}

/// (lwmutex_id, timeout)
pub(super) fn lwmutex_lock(lv2: &Lv2, ppu: &Arc<PpuThread>, args: [u64; 6]) -> Flow<SyscallReply> {
    let result = sys_lwmutex_lock(lv2, ppu, args[0] as u32, args[1]);
    finish("_sys_lwmutex_lock", result, |status| SyscallReply::code(status.code()))
}

/// (lwmutex_id)
pub(super) fn lwmutex_unlock(lv2: &Lv2, ppu: &Arc<PpuThread>, args: [u64; 6]) -> Flow<SyscallReply> {
    let result = sys_lwmutex_unlock(lv2, ppu, args[0] as u32);
    finish("_sys_lwmutex_unlock", result, |()| SyscallReply::ok())
}

/// (lwmutex_id)
pub(super) fn lwmutex_unlock2(lv2: &Lv2, ppu: &Arc<PpuThread>, args: [u64; 6]) -> Flow<SyscallReply> {
    let result = sys_lwmutex_unlock2(lv2, ppu, args[0] as u32);
    finish("_sys_lwmutex_unlock2", result, |()| SyscallReply::ok())
}

/// (lwmutex_id)
pub(super) fn lwmutex_trylock(lv2: &Lv2, _ppu: &Arc<PpuThread>, args: [u64; 6]) -> Flow<SyscallReply> {
    let result = sys_lwmutex_trylock(lv2, args[0] as u32);
    finish("_sys_lwmutex_trylock", done(result), |acquired| {
        if acquired {
            SyscallReply::ok()
        } else {
            SyscallReply::error(CellError::EBUSY)
        }
    })
}

/// (lwmutex_id, control, name)
pub(super) fn lwcond_create(lv2: &Lv2, _ppu: &Arc<PpuThread>, args: [u64; 6]) -> Flow<SyscallReply> {
    let result = sys_lwcond_create(lv2, args[0] as u32, args[1] as u32, args[2]);
    finish("_sys_lwcond_create", done(result), SyscallReply::with_out)
}

/// (lwcond_id)
pub(super) fn lwcond_destroy(lv2: &Lv2, _ppu: &Arc<PpuThread>, args: [u64; 6]) -> Flow<SyscallReply> {
    let result = sys_lwcond_destroy(lv2, args[0] as u32);
    finish("_sys_lwcond_destroy", done(result), |()| SyscallReply::ok())
}

/// (lwcond_id, lwmutex_id, timeout)
pub(super) fn lwcond_queue_wait(lv2: &Lv2, ppu: &Arc<PpuThread>, args: [u64; 6]) -> Flow<SyscallReply> {
    let result = sys_lwcond_queue_wait(lv2, ppu, args[0] as u32, args[1] as u32, args[2]);
    finish("_sys_lwcond_queue_wait", result, |status| SyscallReply::code(status.code()))
}

/// (lwcond_id, lwmutex_id, ppu_thread_id, mode)
pub(super) fn lwcond_signal(lv2: &Lv2, ppu: &Arc<PpuThread>, args: [u64; 6]) -> Flow<SyscallReply> {
    let target = SignalTarget::from_raw(args[2]);
    let mode = SignalMode::from_raw(args[3] as u32);
    let result = sys_lwcond_signal(lv2, ppu, args[0] as u32, args[1] as u32, target, mode);
    finish("_sys_lwcond_signal", result, |status| SyscallReply::code(status.code()))
}

/// (lwcond_id, lwmutex_id, mode)
pub(super) fn lwcond_signal_all(lv2: &Lv2, ppu: &Arc<PpuThread>, args: [u64; 6]) -> Flow<SyscallReply> {
    let mode = match args[2] as u32 {
        1 => SignalMode::Owned,
        2 => SignalMode::Unowned,
        mode => panic!("Unknown mode ({})", mode),
    };
    let result = sys_lwcond_signal_all(lv2, ppu, args[0] as u32, args[1] as u32, mode);
    finish("_sys_lwcond_signal_all", result, SyscallReply::code)
}
