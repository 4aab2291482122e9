//! Constants and runtime limits of the lv2 core.

use core::time::Duration;

/// First id handed out for lv2 kernel objects (lwmutex, lwcond).
pub const LV2_OBJECT_ID_BASE: u32 = 0x8500_0000;
/// Distance between two object slots; the low bits carry the slot generation.
pub const LV2_OBJECT_ID_STEP: u32 = 0x100;
/// Upper bound on live kernel objects.
pub const LV2_OBJECT_ID_COUNT: usize = 8192;

pub const PPU_THREAD_ID_BASE: u32 = 0x0100_0000;
pub const PPU_THREAD_ID_STEP: u32 = 1;
pub const PPU_THREAD_ID_COUNT: usize = 2048;

/// Lowest scheduling priority a guest thread may request (smaller runs first).
pub const PPU_PRIORITY_MAX: u32 = 3071;

/// Thread id a signaller passes to mean "any waiter".
pub const LWCOND_ANY_THREAD: u64 = 0xFFFF_FFFF;

/// How long a destroying lwmutex sleeps between checks of its lwcond drain.
pub const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Size of the syscall dispatch table.
pub const SYSCALL_TABLE_SIZE: usize = 1024;

/// "LV2S"
pub const SAVESTATE_MAGIC: u32 = 0x4C56_3253;
pub const SAVESTATE_VERSION: u16 = 1;

/// Capacities of one lv2 instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lv2Config {
    pub object_capacity: usize,
    pub thread_capacity: usize,
}

impl Default for Lv2Config {
    fn default() -> Self {
        Self {
            object_capacity: LV2_OBJECT_ID_COUNT,
            thread_capacity: PPU_THREAD_ID_COUNT,
        }
    }
}

impl Lv2Config {
    /// Caps the number of live kernel objects. Clamped to the id space.
    pub fn with_object_capacity(mut self, capacity: usize) -> Self {
        self.object_capacity = capacity.min(LV2_OBJECT_ID_COUNT);
        self
    }

    pub fn with_thread_capacity(mut self, capacity: usize) -> Self {
        self.thread_capacity = capacity.min(PPU_THREAD_ID_COUNT);
        self
    }
}
