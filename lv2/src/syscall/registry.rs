//!
//! Module for system call handling infrastructure.
//! Provides the system call table the dispatcher indexes by syscall number.

use std::sync::Arc;

use lazy_static::lazy_static;

use crate::config::SYSCALL_TABLE_SIZE;
use crate::kernel::Lv2;
use crate::task::PpuThread;

use super::lwsync;
use super::syscall_num::Syscall;
use super::{Flow, SyscallReply};

/// Decodes raw register arguments, runs the call, encodes the result.
pub type SyscallHandler = fn(&Lv2, &Arc<PpuThread>, [u64; 6]) -> Flow<SyscallReply>;

/// Structure representing a registered system call entry.
#[derive(Clone, Copy)]
pub struct SyscallRegistry {
    pub syscall: Syscall,
    pub handler: SyscallHandler,
}

const fn entry(syscall: Syscall, handler: SyscallHandler) -> SyscallRegistry {
    SyscallRegistry { syscall, handler }
}

static REGISTRATIONS: &[SyscallRegistry] = &[
    entry(Syscall::LwMutexCreate, lwsync::lwmutex_create),
    entry(Syscall::LwMutexDestroy, lwsync::lwmutex_destroy),
    entry(Syscall::LwMutexLock, lwsync::lwmutex_lock),
    entry(Syscall::LwMutexUnlock, lwsync::lwmutex_unlock),
    entry(Syscall::LwMutexTryLock, lwsync::lwmutex_trylock),
    entry(Syscall::LwMutexUnlock2, lwsync::lwmutex_unlock2),
    entry(Syscall::LwCondCreate, lwsync::lwcond_create),
    entry(Syscall::LwCondDestroy, lwsync::lwcond_destroy),
    entry(Syscall::LwCondQueueWait, lwsync::lwcond_queue_wait),
    entry(Syscall::LwCondSignal, lwsync::lwcond_signal),
    entry(Syscall::LwCondSignalAll, lwsync::lwcond_signal_all),
];

lazy_static! {
    /// Global system call dispatch table, filled from `REGISTRATIONS` on first use.
    pub static ref SYSCALL_TABLE: [Option<SyscallRegistry>; SYSCALL_TABLE_SIZE] = {
        let mut table = [None; SYSCALL_TABLE_SIZE];
        for registry in REGISTRATIONS {
            table[registry.syscall as usize] = Some(*registry);
        }
        table
    };
}

pub fn lookup(num: usize) -> Option<SyscallRegistry> {
    SYSCALL_TABLE.get(num).copied().flatten()
}
