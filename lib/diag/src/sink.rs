//! The tracing sink: warnings and errors go to stderr, trace/debug/info go
//! to stdout, and both respect the TTY flags in [`crate::tty`] to decide
//! whether to wrap the level label in an ANSI color escape.
//!
//! This is deliberately a thin [`log::Log`] implementation rather than the
//! buffering, multi-threaded logger a larger simulator would need: the
//! core only ever logs from the HW thread and from SW threads that are
//! holding the LCT mutex, so there's no contention to amortize.

use std::io::Write;
use std::sync::Once;

use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

struct TracingSink;

static SINK: TracingSink = TracingSink;
static INIT: Once = Once::new();

impl Log for TracingSink {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        match record.level() {
            Level::Error | Level::Warn => {
                let color = crate::tty::stderr_color_enabled();
                let mut stderr = std::io::stderr().lock();
                let _ = writeln!(
                    stderr,
                    "{}",
                    format_line(record.level(), &record.args().to_string(), color)
                );
            }
            Level::Info | Level::Debug | Level::Trace => {
                let color = crate::tty::stdout_color_enabled();
                let mut stdout = std::io::stdout().lock();
                let _ = writeln!(
                    stdout,
                    "{}",
                    format_line(record.level(), &record.args().to_string(), color)
                );
            }
        }
    }

    fn flush(&self) {
        let _ = std::io::stdout().flush();
        let _ = std::io::stderr().flush();
    }
}

fn level_color(level: Level) -> &'static str {
    match level {
        Level::Error => "\x1b[31m",
        Level::Warn => "\x1b[33m",
        Level::Info => "\x1b[32m",
        Level::Debug => "\x1b[36m",
        Level::Trace => "\x1b[90m",
    }
}

const RESET: &str = "\x1b[0m";

fn format_line(level: Level, message: &str, color: bool) -> String {
    if color {
        format!("{}{level}{RESET}: {message}", level_color(level))
    } else {
        format!("{level}: {message}")
    }
}

/// Install the tracing sink as the global `log` logger. Safe to call more
/// than once; only the first call takes effect.
pub fn init(max_level: LevelFilter) -> Result<(), SetLoggerError> {
    let mut result = Ok(());
    INIT.call_once(|| {
        result = log::set_logger(&SINK).map(|()| log::set_max_level(max_level));
    });
    result
}
