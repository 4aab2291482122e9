//! Guest threads and the host threads that carry them.
//!
//! Every PPU thread runs on its own host thread, named after the guest thread.
//! [`spawn`] starts a fresh one; [`resume`] brings back the threads of a restored
//! savestate, one at a time, so each lands on its sleep queue in saved order.

pub mod allocator;
pub mod scheduler;
pub mod thread;

use std::sync::Arc;
use std::thread::JoinHandle;

pub use scheduler::{AwakeBatch, Protocol, Scheduler, SleepQueue, WaitStatus};
pub use thread::{CpuFlag, PpuThread, WaitSnapshot};

use crate::kernel::Lv2;
use crate::syscall::error::{CellError, CellResult};
use crate::syscall::SyscallExit;

/// A running guest thread.
pub struct PpuHandle<R> {
    ppu: Arc<PpuThread>,
    inner: JoinHandle<R>,
}

impl<R> PpuHandle<R> {
    pub fn thread(&self) -> &Arc<PpuThread> {
        &self.ppu
    }

    pub fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }

    pub fn join(self) -> std::thread::Result<R> {
        self.inner.join()
    }
}

/// Registers a guest thread and runs `body` for it on a new host thread.
pub fn spawn<F, R>(lv2: &Arc<Lv2>, name: &str, priority: u32, body: F) -> CellResult<PpuHandle<R>>
where
    F: FnOnce(&Lv2, &Arc<PpuThread>) -> R + Send + 'static,
    R: Send + 'static,
{
    let ppu = lv2.create_ppu(name, priority)?;
    start(lv2, ppu, body)
}

fn start<F, R>(lv2: &Arc<Lv2>, ppu: Arc<PpuThread>, body: F) -> CellResult<PpuHandle<R>>
where
    F: FnOnce(&Lv2, &Arc<PpuThread>) -> R + Send + 'static,
    R: Send + 'static,
{
    let inner = {
        let lv2 = lv2.clone();
        let ppu = ppu.clone();
        std::thread::Builder::new()
            .name(ppu.name().to_owned())
            .spawn(move || body(&lv2, &ppu))
    };
    match inner {
        Ok(inner) => Ok(PpuHandle { ppu, inner }),
        Err(err) => {
            log::error!("failed to start host thread for {}: {}", ppu.name(), err);
            Err(CellError::EAGAIN)
        }
    }
}

/// Restarts restored threads in order. Each one re-issues its pending syscall;
/// the next is started only after the previous is back on its queue.
///
/// `body` receives the outcome of the re-issued syscall, or `None` for a thread
/// that was not inside one.
pub fn resume<F, R>(
    lv2: &Arc<Lv2>,
    threads: Vec<Arc<PpuThread>>,
    body: F,
) -> CellResult<Vec<PpuHandle<R>>>
where
    F: Fn(&Lv2, &Arc<PpuThread>, Option<SyscallExit>) -> R + Clone + Send + 'static,
    R: Send + 'static,
{
    let mut handles = Vec::with_capacity(threads.len());
    for ppu in threads {
        log::info!("resuming {} ({:#x})", ppu.name(), ppu.id());
        let body = body.clone();
        let handle = start(lv2, ppu, move |lv2, ppu| {
            let exit = lv2.replay(ppu);
            body(lv2, ppu, exit)
        })?;
        handle.thread().wait_replay_settled();
        handles.push(handle);
    }
    Ok(handles)
}
