//! Diagnostic logging setup
//!
//! Everything goes to stderr; stdout carries audio. The host's `-l` level
//! (0..=7) picks the `log` filter, with 0 fully silent.

use log::LevelFilter;

/// Highest accepted `-l` value
pub const MAX_LOG_LEVEL: u8 = 7;

/// Map a host log level to a `log` filter
pub fn level_filter(level: u8) -> LevelFilter {
    match level {
        0 => LevelFilter::Off,
        1 => LevelFilter::Error,
        2 => LevelFilter::Warn,
        3 | 4 => LevelFilter::Info,
        5 | 6 => LevelFilter::Debug,
        7 => LevelFilter::Trace,
        _ => LevelFilter::Off,
    }
}

/// Install the stderr logger
///
/// Safe to call more than once; later calls are ignored.
pub fn init(level: u8) {
    let _ = env_logger::Builder::new()
        .filter_level(level_filter(level))
        .target(env_logger::Target::Stderr)
        .format_timestamp_millis()
        .try_init();
}
