//! A logging module that configures and outputs log messages with color coding.
//!
//! [`Lv2Logger`] prints every record in a color picked from its severity and tags it
//! with the name of the host thread that emitted it. Guest threads are spawned with
//! their guest name, so a trace line reads like `[LV2][TRACE][worker#2] ...`.

use log::{self, Level, LevelFilter, Log, Metadata, Record};
use spin::Once;

use crate::color_println;

use super::console::Color;

static LOGGER: Lv2Logger = Lv2Logger;
static INIT: Once<()> = Once::new();

/// # Initialization
/// Installs the logger and picks the level from the `LOG` environment variable,
/// falling back to the value `LOG` had at compile time:
/// - "ERROR" -> `LevelFilter::Error`
/// - "WARN" -> `LevelFilter::Warn`
/// - "INFO" -> `LevelFilter::Info`
/// - "DEBUG" -> `LevelFilter::Debug`
/// - "TRACE" -> `LevelFilter::Trace`
/// - Any other value -> `LevelFilter::Off`
///
/// Safe to call from every test; only the first call does anything. If the host
/// application already installed its own logger, that one is left in place.
pub fn init() {
    INIT.call_once(|| {
        if log::set_logger(&LOGGER).is_ok() {
            log::set_max_level(level_from_env());
        }
    });
}

fn level_from_env() -> LevelFilter {
    let runtime = std::env::var("LOG").ok();
    match runtime.as_deref().or(option_env!("LOG")) {
        Some("ERROR") => LevelFilter::Error,
        Some("WARN") => LevelFilter::Warn,
        Some("INFO") => LevelFilter::Info,
        Some("DEBUG") => LevelFilter::Debug,
        Some("TRACE") => LevelFilter::Trace,
        _ => LevelFilter::Off,
    }
}

struct Lv2Logger;

impl Log for Lv2Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let color = level_to_color(record.level());
        let thread = std::thread::current();

        color_println!(
            color,
            "[LV2][{:>5}][{}] {}",
            record.level(),
            thread.name().unwrap_or("-"),
            record.args(),
        );
    }

    fn flush(&self) {}
}

/// Converts a log level to the corresponding ANSI color code.
fn level_to_color(level: Level) -> Color {
    match level {
        Level::Error => Color::Red,
        Level::Warn => Color::BrightYellow,
        Level::Info => Color::Blue,
        Level::Debug => Color::Green,
        Level::Trace => Color::BrightBlack,
    }
}
