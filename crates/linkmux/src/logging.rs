//! Process-wide logging setup.
//!
//! Thin wrappers over `tracing-subscriber`; applications embedding the
//! crate in a larger process can skip these and install their own
//! subscriber instead.

use std::io;
use std::path::Path;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;

/// Install a stderr subscriber at the given maximum level.
///
/// Panics if a global subscriber is already set; call it once, early.
pub fn init(level: Level) {
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();
}

/// Install a subscriber writing to a daily-rotated file under `dir`.
///
/// Returns the appender's flush guard; keep it alive for the life of the
/// process or buffered events are lost on exit.
pub fn init_with_file(level: Level, dir: impl AsRef<Path>, prefix: &str) -> WorkerGuard {
    let appender = tracing_appender::rolling::daily(dir.as_ref(), prefix);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    guard
}
