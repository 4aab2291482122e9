//! CELL 错误码
//!
//! lv2 syscalls return a 32-bit code in r3: zero for success, `0x8001_xxxx` for
//! failure. Codes such as `CELL_EBUSY` from an lwcond wait are outcomes rather
//! than failures; those travel inside the success value of [`CellResult`].

#![allow(missing_docs)]

use core::fmt;

use strum_macros::{Display, EnumString, FromRepr};

pub const CELL_OK: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, FromRepr)]
#[repr(u32)]
pub enum CellError {
    #[strum(serialize = "EAGAIN", to_string = "Resource temporarily unavailable")]
    EAGAIN = 0x8001_0001,
    #[strum(serialize = "EINVAL", to_string = "Invalid argument")]
    EINVAL = 0x8001_0002,
    #[strum(serialize = "ENOSYS", to_string = "Function not implemented")]
    ENOSYS = 0x8001_0003,
    #[strum(serialize = "ESRCH", to_string = "No such object")]
    ESRCH = 0x8001_0005,
    #[strum(serialize = "ENOENT", to_string = "No such entry")]
    ENOENT = 0x8001_0006,
    #[strum(serialize = "EPERM", to_string = "Operation not permitted")]
    EPERM = 0x8001_0009,
    #[strum(serialize = "EBUSY", to_string = "Object is busy")]
    EBUSY = 0x8001_000A,
    #[strum(serialize = "ETIMEDOUT", to_string = "Timed out")]
    ETIMEDOUT = 0x8001_000B,
}

pub type CellResult<T> = Result<T, CellError>;

impl CellError {
    #[inline]
    pub const fn code(self) -> u32 {
        self as u32
    }
}

// 自动实现 u32 -> CellError
impl TryFrom<u32> for CellError {
    type Error = ();

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        CellError::from_repr(value).ok_or(())
    }
}

impl std::error::Error for CellError {}

/// Prints a raw r3 value the way the debugger shows it.
pub struct CellCode(pub u32);

impl fmt::Display for CellCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == CELL_OK {
            return write!(f, "CELL_OK");
        }
        match CellError::from_repr(self.0) {
            Some(err) => write!(f, "CELL_{:?} ({:#x})", err, self.0),
            None => write!(f, "{:#x}", self.0),
        }
    }
}
