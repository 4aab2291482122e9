use strum_macros::FromRepr;

pub const SYSCALL_LWMUTEX_CREATE: usize = 95;
pub const SYSCALL_LWMUTEX_DESTROY: usize = 96;
pub const SYSCALL_LWMUTEX_LOCK: usize = 97;
pub const SYSCALL_LWMUTEX_UNLOCK: usize = 98;
pub const SYSCALL_LWMUTEX_TRYLOCK: usize = 99;
pub const SYSCALL_LWCOND_CREATE: usize = 107;
pub const SYSCALL_LWCOND_DESTROY: usize = 108;
pub const SYSCALL_LWCOND_QUEUE_WAIT: usize = 109;
pub const SYSCALL_LWCOND_SIGNAL: usize = 115;
pub const SYSCALL_LWCOND_SIGNAL_ALL: usize = 116;
pub const SYSCALL_LWMUTEX_UNLOCK2: usize = 128;

#[derive(Debug, Clone, Copy, FromRepr, PartialEq, Eq)]
#[repr(usize)] // 指定底层类型为 usize
pub enum Syscall {
    LwMutexCreate = SYSCALL_LWMUTEX_CREATE,
    LwMutexDestroy = SYSCALL_LWMUTEX_DESTROY,
    LwMutexLock = SYSCALL_LWMUTEX_LOCK,
    LwMutexUnlock = SYSCALL_LWMUTEX_UNLOCK,
    LwMutexTryLock = SYSCALL_LWMUTEX_TRYLOCK,
    LwCondCreate = SYSCALL_LWCOND_CREATE,
    LwCondDestroy = SYSCALL_LWCOND_DESTROY,
    LwCondQueueWait = SYSCALL_LWCOND_QUEUE_WAIT,
    LwCondSignal = SYSCALL_LWCOND_SIGNAL,
    LwCondSignalAll = SYSCALL_LWCOND_SIGNAL_ALL,
    LwMutexUnlock2 = SYSCALL_LWMUTEX_UNLOCK2,
}

impl Syscall {
    pub fn name(self) -> &'static str {
        match self {
            Syscall::LwMutexCreate => "_sys_lwmutex_create",
            Syscall::LwMutexDestroy => "_sys_lwmutex_destroy",
            Syscall::LwMutexLock => "_sys_lwmutex_lock",
            Syscall::LwMutexUnlock => "_sys_lwmutex_unlock",
            Syscall::LwMutexTryLock => "_sys_lwmutex_trylock",
            Syscall::LwCondCreate => "_sys_lwcond_create",
            Syscall::LwCondDestroy => "_sys_lwcond_destroy",
            Syscall::LwCondQueueWait => "_sys_lwcond_queue_wait",
            Syscall::LwCondSignal => "_sys_lwcond_signal",
            Syscall::LwCondSignalAll => "_sys_lwcond_signal_all",
            Syscall::LwMutexUnlock2 => "_sys_lwmutex_unlock2",
        }
    }
}
