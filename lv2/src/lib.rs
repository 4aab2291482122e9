//! LV2 lightweight synchronization core
//!
//! The kernel side of the guest's lightweight mutex (`lwmutex`) and lightweight
//! condition variable (`lwcond`), as an emulator runs them: every guest PPU
//! thread is a host thread, every lv2 object lives in an id registry, and the
//! sleep queues reproduce the console's wake order, ownership hand-off, and
//! timeout races exactly.
//!
//! # Architectural Overview
//! ```text
//! +------------------------------+
//! |  guest threads (host threads) |
//! +------------------------------+
//! |  syscall: dispatch + retry   |
//! +------------------------------+
//! |   lwcond   <-->   lwmutex    |
//! +------------------------------+
//! | task: sleep queues, policies |
//! +------------------------------+
//! |   idm       |   savestate    |
//! +------------------------------+
//! ```
//!
//! A blocked syscall can be unwound at any time with [`Lv2::stop_all`], saved
//! with [`savestate::save`], and replayed on a fresh instance with
//! [`savestate::load`] and [`task::resume`].
//!
//! Set `LOG=TRACE` and call [`io::logging::init`] to see every syscall.

pub mod config;
pub mod idm;
pub mod io;
mod kernel;
pub mod lwcond;
pub mod lwmutex;
pub mod savestate;
pub mod sync;
pub mod syscall;
pub mod task;

pub use kernel::{Lv2, Lv2Object, Lv2Type};
pub use syscall::error::{CellError, CellResult};
pub use syscall::{Flow, SyscallExit, SyscallReply, SyscallRequest};
pub use task::{PpuThread, WaitStatus};
