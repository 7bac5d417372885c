// Licensed under the Apache-2.0 license

//! Diagnostic logging shared by the bus engine and the sensor drivers.
//!
//! Logging is strictly advisory: a logger can drop, truncate or fail to
//! deliver a line and the bus operation that produced it still completes
//! with the same result.

use core::fmt::{self, Write as _};

/// Capacity of a single formatted log line.
pub const LOG_LINE_CAPACITY: usize = 96;

/// Fixed-capacity buffer used to format one log line without allocation.
pub type LogLine = heapless::String<LOG_LINE_CAPACITY>;

pub trait Logger {
    fn debug(&mut self, msg: &str);
    fn error(&mut self, msg: &str);
}

/// Logger that discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpLogger;

impl Logger for NoOpLogger {
    fn debug(&mut self, _msg: &str) {}
    fn error(&mut self, _msg: &str) {}
}

/// Logger writing one line per message to an `embedded_io::Write` sink,
/// typically a UART.
pub struct WriterLogger<W: embedded_io::Write> {
    writer: W,
}

impl<W: embedded_io::Write> WriterLogger<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Give the sink back.
    pub fn release(self) -> W {
        self.writer
    }

    fn emit(&mut self, level: &str, msg: &str) {
        // Delivery failures are swallowed; a broken console must not break the bus.
        let _ = self.writer.write_all(level.as_bytes());
        let _ = self.writer.write_all(msg.as_bytes());
        let _ = self.writer.write_all(b"\r\n");
    }
}

impl<W: embedded_io::Write> Logger for WriterLogger<W> {
    fn debug(&mut self, msg: &str) {
        self.emit("[D] ", msg);
    }

    fn error(&mut self, msg: &str) {
        self.emit("[E] ", msg);
    }
}

/// Format `args` into a [`LogLine`], truncating on overflow.
#[must_use]
pub fn format_line(args: fmt::Arguments<'_>) -> LogLine {
    let mut line = LogLine::new();
    // Overflow keeps the pieces that fit.
    let _ = line.write_fmt(args);
    line
}

/// Format and send a debug line through a [`Logger`].
#[macro_export]
macro_rules! log_debug {
    ($logger:expr, $($arg:tt)*) => {
        $crate::common::Logger::debug(
            &mut $logger,
            $crate::common::format_line(format_args!($($arg)*)).as_str(),
        )
    };
}

/// Format and send an error line through a [`Logger`].
#[macro_export]
macro_rules! log_error {
    ($logger:expr, $($arg:tt)*) => {
        $crate::common::Logger::error(
            &mut $logger,
            $crate::common::format_line(format_args!($($arg)*)).as_str(),
        )
    };
}
