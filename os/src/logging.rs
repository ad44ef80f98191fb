use alloc::{format, string::String, vec::Vec};

use config::log::DMESG_LINES;
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, set_logger, set_max_level};
use spin::Mutex;
use utils::ring::BoundedRing;

/// Kernel message ring, read back with [dmesg].
static DMESG: Mutex<BoundedRing<String>> = Mutex::new(BoundedRing::new(DMESG_LINES));

pub struct Logger;

impl Log for Logger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        kserial_println!(
            "\u{1B}[{}m[{:}] {}\u{1B}[0m",
            level_color(record.level()),
            record.level(),
            record.args(),
        );
        DMESG.lock().push(format_line(record));
    }

    fn flush(&self) {}
}

/// ANSI foreground color of a level.
fn level_color(level: Level) -> u8 {
    match level {
        Level::Error => 31, // Red
        Level::Warn => 93,  // BrightYellow
        Level::Info => 37,  // White
        Level::Debug => 32, // Green
        Level::Trace => 90, // BrightBlack
    }
}

fn format_line(record: &Record) -> String {
    format!("[{:<5}] {}", record.level(), record.args())
}

/// Install [Logger] as the `log` backend and set the maximum level.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    static LOGGER: Logger = Logger;
    set_logger(&LOGGER)?;
    set_max_level(level);
    Ok(())
}

/// Snapshot of the kernel message ring, oldest line first.
pub fn dmesg() -> Vec<String> {
    DMESG.lock().iter().cloned().collect()
}

/// Number of lines pushed out of the ring since boot.
pub fn dmesg_dropped() -> usize {
    DMESG.lock().dropped()
}

/// Improved debug macro,
/// only compiled in debug mode.
#[macro_export]
macro_rules! debug_ex {
    // debug_ex!(target: "my_target", "a {} event", "log")
    (target: $target:expr, $($arg:tt)+) => {
        #[cfg(debug_assertions)]
        {
            $crate::__log::log!(target: $target, $crate::__log::Level::Debug, $($arg)+)
        }
    };

    // debug_ex!("a {} event", "log")
    ($($arg:tt)+) => {
        #[cfg(debug_assertions)]
        {
            $crate::__log::log!($crate::__log::Level::Debug, $($arg)+)
        }
    }
}
