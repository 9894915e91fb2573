//! Kernel logger
//!
//! Formats records into a fixed stack buffer and hands the text to the
//! console installed at bring-up. Works before and without any allocator.

use core::fmt::Write;

use log::{Level, LevelFilter, Metadata, Record};
use spin::Once;

use crate::scheduler::{SchedulerError, SchedulerResult};

/// Output sink of the kernel log, typically a serial port
pub trait Console: Sync {
    fn write_str(&self, s: &str);
}

/// Logger writing to a [`Console`]
pub struct ConsoleLogger {
    console: &'static dyn Console,
    level: LevelFilter,
}

impl ConsoleLogger {
    pub const fn new(console: &'static dyn Console, level: LevelFilter) -> Self {
        Self { console, level }
    }
}

impl log::Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        // Format: [LEVEL] target: message
        let level_str = match record.level() {
            Level::Error => "ERROR",
            Level::Warn => "WARN ",
            Level::Info => "INFO ",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        };

        let mut buf = [0u8; 512];
        let mut writer = BufferWriter::new(&mut buf);
        let _ = writeln!(writer, "[{}] {}: {}", level_str, record.target(), record.args());
        self.console.write_str(writer.as_str());
    }

    fn flush(&self) {}
}

/// Buffer writer for formatting without alloc
///
/// Output past the end of the buffer is dropped, cut at a character
/// boundary. Once a write is cut short every later write is dropped, so the
/// text never skips a fragment.
pub struct BufferWriter<'a> {
    buffer: &'a mut [u8],
    pos: usize,
    /// Set by the first truncated write; later fragments are dropped
    full: bool,
}

impl<'a> BufferWriter<'a> {
    pub fn new(buffer: &'a mut [u8]) -> Self {
        Self {
            buffer,
            pos: 0,
            full: false,
        }
    }

    pub fn as_str(&self) -> &str {
        core::str::from_utf8(&self.buffer[..self.pos]).unwrap_or("")
    }
}

impl Write for BufferWriter<'_> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        if self.full {
            return Ok(());
        }
        let remaining = self.buffer.len() - self.pos;
        let mut to_write = s.len().min(remaining);
        while !s.is_char_boundary(to_write) {
            to_write -= 1;
        }
        self.full = to_write < s.len();

        self.buffer[self.pos..self.pos + to_write].copy_from_slice(&s.as_bytes()[..to_write]);
        self.pos += to_write;
        Ok(())
    }
}

static LOGGER: Once<ConsoleLogger> = Once::new();

/// Install the kernel logger
///
/// Call this very early on the primary core, before the processor pool is
/// built.
pub fn init(console: &'static dyn Console, level: LevelFilter) -> SchedulerResult<()> {
    if LOGGER.is_completed() {
        return Err(SchedulerError::LoggerAlreadyInstalled);
    }
    let logger = LOGGER.call_once(|| ConsoleLogger::new(console, level));
    log::set_logger(logger).map_err(|_| SchedulerError::LoggerAlreadyInstalled)?;
    log::set_max_level(level);
    Ok(())
}
