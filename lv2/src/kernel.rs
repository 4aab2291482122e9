use std::sync::Arc;

use crate::config::{
    Lv2Config, LV2_OBJECT_ID_BASE, LV2_OBJECT_ID_COUNT, LV2_OBJECT_ID_STEP, PPU_PRIORITY_MAX,
    PPU_THREAD_ID_BASE, PPU_THREAD_ID_COUNT, PPU_THREAD_ID_STEP,
};
use crate::idm::{IdLayout, IdManager, Withdrawal};
use crate::lwcond::LwCond;
use crate::lwmutex::LwMutex;
use crate::syscall::error::{CellError, CellResult};
use crate::syscall::{self, SyscallExit, SyscallRequest};
use crate::task::PpuThread;

const OBJECT_LAYOUT: IdLayout = IdLayout {
    base: LV2_OBJECT_ID_BASE,
    step: LV2_OBJECT_ID_STEP,
    count: LV2_OBJECT_ID_COUNT,
};

const THREAD_LAYOUT: IdLayout = IdLayout {
    base: PPU_THREAD_ID_BASE,
    step: PPU_THREAD_ID_STEP,
    count: PPU_THREAD_ID_COUNT,
};

/// Anything that lives in the lv2 object registry.
#[derive(Clone)]
pub enum Lv2Object {
    LwMutex(Arc<LwMutex>),
    LwCond(Arc<LwCond>),
}

/// Typed view into [`Lv2Object`].
pub trait Lv2Type: Sized {
    fn downcast(object: &Lv2Object) -> Option<&Arc<Self>>;
}

impl Lv2Type for LwMutex {
    fn downcast(object: &Lv2Object) -> Option<&Arc<Self>> {
        match object {
            Lv2Object::LwMutex(mutex) => Some(mutex),
            _ => None,
        }
    }
}

impl Lv2Type for LwCond {
    fn downcast(object: &Lv2Object) -> Option<&Arc<Self>> {
        match object {
            Lv2Object::LwCond(cond) => Some(cond),
            _ => None,
        }
    }
}

enum Reject<E> {
    WrongType,
    Veto(E),
}

/// One emulated lv2 kernel: its object registry and its guest threads.
pub struct Lv2 {
    config: Lv2Config,
    objects: IdManager<Lv2Object>,
    threads: IdManager<Arc<PpuThread>>,
}

impl Default for Lv2 {
    fn default() -> Self {
        Self::with_config(Lv2Config::default())
    }
}

impl Lv2 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: Lv2Config) -> Self {
        Self {
            config,
            objects: IdManager::new(OBJECT_LAYOUT, config.object_capacity),
            threads: IdManager::new(THREAD_LAYOUT, config.thread_capacity),
        }
    }

    pub fn config(&self) -> Lv2Config {
        self.config
    }

    /// Registers a guest thread. It is not running anything yet.
    pub fn create_ppu(&self, name: &str, priority: u32) -> CellResult<Arc<PpuThread>> {
        if priority > PPU_PRIORITY_MAX {
            return Err(CellError::EINVAL);
        }
        let (_, ppu) = self
            .threads
            .make(|id| Arc::new(PpuThread::new(id, name, priority)))
            .ok_or(CellError::EAGAIN)?;
        log::debug!("created ppu thread {} ({:#x}, prio {})", name, ppu.id(), priority);
        Ok(ppu)
    }

    pub fn ppu(&self, id: u32) -> Option<Arc<PpuThread>> {
        self.threads.get(id)
    }

    pub fn ppus(&self) -> Vec<Arc<PpuThread>> {
        let mut threads = Vec::new();
        self.threads.for_each(|_, ppu| threads.push(ppu.clone()));
        threads
    }

    pub fn lwmutex(&self, id: u32) -> Option<Arc<LwMutex>> {
        self.get::<LwMutex>(id)
    }

    pub fn lwcond(&self, id: u32) -> Option<Arc<LwCond>> {
        self.get::<LwCond>(id)
    }

    /// Asks every guest thread to suspend, as before a savestate capture.
    ///
    /// Blocked syscalls unwind with their pending call recorded; from then on the
    /// instance is only good for [`crate::savestate::save`].
    pub fn stop_all(&self) {
        log::info!("stopping all ppu threads");
        self.threads.for_each(|_, ppu| ppu.request_stop());
    }

    /// Issues a syscall on behalf of `ppu`, retrying it while it asks to be re-run.
    pub fn syscall(&self, ppu: &Arc<PpuThread>, num: usize, args: [u64; 6]) -> SyscallExit {
        syscall::syscall(self, ppu, SyscallRequest { num, args })
    }

    /// Re-issues the syscall a restored thread was captured in.
    pub fn replay(&self, ppu: &Arc<PpuThread>) -> Option<SyscallExit> {
        let exit = ppu
            .take_pending()
            .map(|request| syscall::syscall(self, ppu, request));
        ppu.finish_replay();
        exit
    }

    pub(crate) fn objects(&self) -> &IdManager<Lv2Object> {
        &self.objects
    }

    pub(crate) fn threads(&self) -> &IdManager<Arc<PpuThread>> {
        &self.threads
    }

    pub(crate) fn make_object(&self, f: impl FnOnce() -> Lv2Object) -> Option<u32> {
        self.objects.make(|_| f()).map(|(id, _)| id)
    }

    pub(crate) fn check<T: Lv2Type, R>(&self, id: u32, f: impl FnOnce(&Arc<T>) -> R) -> Option<R> {
        self.objects
            .check(id, |object| T::downcast(object).map(f))
            .flatten()
    }

    pub(crate) fn get<T: Lv2Type>(&self, id: u32) -> Option<Arc<T>> {
        self.check(id, Arc::clone)
    }

    /// Removes a typed object if `pred` approves. `None` if there is no such object.
    pub(crate) fn withdraw<T: Lv2Type, E>(
        &self,
        id: u32,
        pred: impl FnOnce(&Arc<T>) -> Result<(), E>,
    ) -> Option<Withdrawal<Arc<T>, E>> {
        let withdrawal = self.objects.withdraw(id, |object| match T::downcast(object) {
            Some(typed) => pred(typed).map_err(Reject::Veto),
            None => Err(Reject::WrongType),
        })?;
        let object = T::downcast(&withdrawal.object)?.clone();
        match withdrawal.result {
            Ok(()) => Some(Withdrawal { object, result: Ok(()) }),
            Err(Reject::Veto(err)) => Some(Withdrawal { object, result: Err(err) }),
            Err(Reject::WrongType) => None,
        }
    }
}
