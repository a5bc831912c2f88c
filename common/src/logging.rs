//! Structured logging setup shared by the server and client binaries.
//!
//! A single `slog` terminal sink built through `sloggers`, with the
//! macros re-exported under this module so call sites read
//! `logging::debug!(log, ...)`.

pub use slog::{debug, error, info, o, trace, warn, Logger};

use sloggers::terminal::{Destination, TerminalLoggerBuilder};
use sloggers::types::Severity;
use sloggers::Build;

/// Verbosity levels accepted on the command line.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

impl Verbosity {
    fn severity(self) -> Severity {
        match self {
            Verbosity::Quiet => Severity::Warning,
            Verbosity::Normal => Severity::Info,
            Verbosity::Verbose => Severity::Debug,
        }
    }
}

/// Builds the root logger. All other loggers in the process should be
/// derived from this one via `log.new(o!(...))` so structured fields
/// (client id, channel id, ...) stay attached to every line.
pub fn init(verbosity: Verbosity) -> Logger {
    let mut builder = TerminalLoggerBuilder::new();
    builder.level(verbosity.severity());
    builder.destination(Destination::Stderr);

    builder.build().expect("failed to build terminal logger")
}
