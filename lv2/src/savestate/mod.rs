//! Savestates of the lightweight sync objects and the threads sleeping on them.
//!
//! Only a stopped instance is saved: [`Lv2::stop_all`] first, then join every
//! guest thread. Sleep queues are not written out. Instead the threads are
//! listed in queue order, and on restore each one re-issues the syscall it was
//! captured in, one after another, which rebuilds every queue in the same order.
//!
//! Layout (big-endian):
//!
//! ```text
//! magic u32 | version u16
//! object count u32 | { id u32 | tag u8 | object }*
//! thread count u32 | { id u32 | name str | priority u32 | r3 u64 | pending | snapshot }*
//! ```

pub mod serial;

use std::collections::HashSet;
use std::sync::Arc;

use crate::config::{Lv2Config, SAVESTATE_MAGIC, SAVESTATE_VERSION};
use crate::kernel::{Lv2, Lv2Object};
use crate::lwcond::LwCond;
use crate::lwmutex::LwMutex;
use crate::syscall::SyscallRequest;
use crate::task::{CpuFlag, PpuThread, WaitSnapshot};

use serial::{SerialError, SerialReader, SerialWriter};

const TAG_LWMUTEX: u8 = 1;
const TAG_LWCOND: u8 = 2;

const SNAPSHOT_NONE: u8 = 0;
const SNAPSHOT_COND: u8 = 1;
const SNAPSHOT_MUTEX: u8 = 2;

/// A freshly loaded instance and the threads that still have to re-issue their syscall,
/// in the order [`crate::task::resume`] must start them.
pub struct Restored {
    pub lv2: Arc<Lv2>,
    pub suspended: Vec<Arc<PpuThread>>,
}

pub fn save(lv2: &Lv2) -> Vec<u8> {
    let mut ar = SerialWriter::new();
    ar.put_u32(SAVESTATE_MAGIC);
    ar.put_u16(SAVESTATE_VERSION);

    let mut objects = Vec::new();
    lv2.objects()
        .for_each(|id, object| objects.push((id, object.clone())));

    let mut order = Vec::new();
    let mut seen = HashSet::new();
    let mut queue_order = |ids: Vec<u32>| {
        for id in ids {
            if seen.insert(id) {
                order.push(id);
            }
        }
    };

    ar.put_u32(objects.len() as u32);
    for (id, object) in &objects {
        ar.put_u32(*id);
        match object {
            Lv2Object::LwMutex(mutex) => {
                ar.put_u8(TAG_LWMUTEX);
                mutex.save(&mut ar);
                queue_order(mutex.waiter_ids());
            }
            Lv2Object::LwCond(cond) => {
                ar.put_u8(TAG_LWCOND);
                cond.save(&mut ar);
                queue_order(cond.waiter_ids());
            }
        }
    }

    let threads = lv2.ppus();
    queue_order(threads.iter().map(|ppu| ppu.id()).collect());

    ar.put_u32(order.len() as u32);
    for id in order {
        if let Some(ppu) = threads.iter().find(|ppu| ppu.id() == id) {
            save_thread(&mut ar, ppu);
        }
    }

    log::info!("saved {} lv2 object(s), {} thread(s)", objects.len(), threads.len());
    ar.into_bytes()
}

fn save_thread(ar: &mut SerialWriter, ppu: &PpuThread) {
    let pending = ppu.pending();
    if pending.is_none() && ppu.state().contains(CpuFlag::SUSPEND) {
        log::warn!(
            "{} ({:#x}) is asleep without a pending syscall; it will not be requeued",
            ppu.name(),
            ppu.id()
        );
    }

    ar.put_u32(ppu.id());
    ar.put_str(ppu.name());
    ar.put_u32(ppu.priority());
    ar.put_u64(ppu.gpr3());

    ar.put_bool(pending.is_some());
    if let Some(request) = pending {
        ar.put_u64(request.num as u64);
        for arg in request.args {
            ar.put_u64(arg);
        }
    }

    ar.put_u8(match ppu.wait_snapshot() {
        None => SNAPSHOT_NONE,
        Some(WaitSnapshot { mutex_sleep: false }) => SNAPSHOT_COND,
        Some(WaitSnapshot { mutex_sleep: true }) => SNAPSHOT_MUTEX,
    });
}

pub fn load(bytes: &[u8], config: Lv2Config) -> Result<Restored, SerialError> {
    let mut ar = SerialReader::new(bytes);

    let magic = ar.get_u32()?;
    if magic != SAVESTATE_MAGIC {
        return Err(SerialError::BadMagic(magic));
    }
    let version = ar.get_u16()?;
    if version != SAVESTATE_VERSION {
        return Err(SerialError::UnsupportedVersion(version));
    }

    let lv2 = Lv2::with_config(config);

    let objects = ar.get_u32()?;
    for _ in 0..objects {
        let id = ar.get_u32()?;
        let object = match ar.get_u8()? {
            TAG_LWMUTEX => Lv2Object::LwMutex(Arc::new(LwMutex::load(&mut ar)?)),
            TAG_LWCOND => Lv2Object::LwCond(Arc::new(LwCond::load(&mut ar)?)),
            tag => return Err(SerialError::Tag(tag)),
        };
        if !lv2.objects().make_at(id, object) {
            return Err(SerialError::IdUnavailable(id));
        }
    }

    let threads = ar.get_u32()?;
    let mut suspended = Vec::new();
    for _ in 0..threads {
        let ppu = Arc::new(load_thread(&mut ar)?);
        if !lv2.threads().make_at(ppu.id(), ppu.clone()) {
            return Err(SerialError::IdUnavailable(ppu.id()));
        }
        if ppu.pending().is_some() {
            suspended.push(ppu);
        }
    }

    if ar.remaining() != 0 {
        return Err(SerialError::TrailingBytes(ar.remaining()));
    }

    log::info!(
        "restored {} lv2 object(s), {} thread(s), {} to replay",
        objects,
        threads,
        suspended.len()
    );

    Ok(Restored {
        lv2: Arc::new(lv2),
        suspended,
    })
}

fn load_thread(ar: &mut SerialReader<'_>) -> Result<PpuThread, SerialError> {
    let id = ar.get_u32()?;
    let name = ar.get_str()?;
    let priority = ar.get_u32()?;
    let gpr3 = ar.get_u64()?;

    let pending = if ar.get_bool()? {
        let num = ar.get_u64()? as usize;
        let mut args = [0; 6];
        for arg in args.iter_mut() {
            *arg = ar.get_u64()?;
        }
        Some(SyscallRequest { num, args })
    } else {
        None
    };

    let snapshot = match ar.get_u8()? {
        SNAPSHOT_NONE => None,
        SNAPSHOT_COND => Some(WaitSnapshot { mutex_sleep: false }),
        SNAPSHOT_MUTEX => Some(WaitSnapshot { mutex_sleep: true }),
        tag => return Err(SerialError::Tag(tag)),
    };

    Ok(PpuThread::restored(id, &name, priority, gpr3, pending, snapshot))
}

#[cfg(test)]
mod test;
