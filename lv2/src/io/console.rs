//! Colored output to the host's stderr.
//!
//! Log records of the emulator core are written through [`color_print`] so that
//! they never interleave with whatever the guest prints on stdout.

use std::fmt;
use std::io::{self, Write};

/// ANSI color codes for terminal output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(unused)]
pub enum Color {
    Black = 30,
    Red = 31,
    Green = 32,
    Yellow = 33,
    Blue = 34,
    Magenta = 35,
    Cyan = 36,
    White = 37,
    BrightBlack = 90,
    BrightRed = 91,
    BrightGreen = 92,
    BrightYellow = 93,
    BrightBlue = 94,
    BrightMagenta = 95,
    BrightCyan = 96,
    BrightWhite = 97,
}

// 核心打印函数
pub fn color_print(color: Color, args: fmt::Arguments) {
    let stderr = io::stderr();
    let mut out = stderr.lock();
    // 颜色转义序列 + 实际内容 + 重置颜色
    let _ = write!(out, "\x1B[{}m{}\x1B[0m", color as u8, args);
}

/// 打印宏
#[macro_export]
macro_rules! color_print {
    ($color:expr, $fmt:literal $(, $($arg:tt)+)?) => {
        $crate::io::console::color_print(
            $color,
            format_args!($fmt $(, $($arg)+)?)
        )
    };
}

/// 带换行的打印宏
#[macro_export]
macro_rules! color_println {
    ($color:expr, $fmt:literal $(, $($arg:tt)+)?) => {
        $crate::io::console::color_print(
            $color,
            format_args!(concat!($fmt, "\n") $(, $($arg)+)?)
        )
    };
}
