//! Logger initialization and logging macros.
//!
//! For the macros to properly compile, the calling crate must add a dependency
//! to the `log` crate (ie. `log.workspace = true`).

pub use log::{Level, LevelFilter};

use log4rs::{
    append::console::ConsoleAppender,
    config::{Appender, Config, Logger, Root},
    encode::pattern::PatternEncoder,
};
use std::str::FromStr;

pub const DEFAULT_LOGGER_ENV: &str = "RUST_LOG";

/// Console log line pattern, with explicit UTC time zone denoted by the suffix Z
const LOG_LINE_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)}Z [{h({({l}):5.5})}] {m}{n}";

/// Initializes the global logger with a console appender. `filters` is a comma
/// separated list of `module=level` pairs, with a bare `level` setting the root.
pub fn init_logger(filters: &str) {
    let (root_level, loggers) = parse_filters(filters);
    let stdout = ConsoleAppender::builder().encoder(Box::new(PatternEncoder::new(LOG_LINE_PATTERN))).build();
    let config = Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .loggers(loggers)
        .build(Root::builder().appender("stdout").build(root_level))
        .unwrap();
    log4rs::init_config(config).unwrap();
}

/// Tries to init the global logger, but does not panic if it was already set up.
/// Should be used for tests.
pub fn try_init_logger(filters: &str) {
    let (root_level, loggers) = parse_filters(filters);
    let stdout = ConsoleAppender::builder().encoder(Box::new(PatternEncoder::new(LOG_LINE_PATTERN))).build();
    let config = Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .loggers(loggers)
        .build(Root::builder().appender("stdout").build(root_level))
        .unwrap();
    let _ = log4rs::init_config(config);
}

fn parse_filters(filters: &str) -> (LevelFilter, Vec<Logger>) {
    let mut root_level = LevelFilter::Info;
    let mut loggers = Vec::new();
    let expression = if filters.is_empty() { std::env::var(DEFAULT_LOGGER_ENV).unwrap_or_default() } else { filters.to_string() };
    for spec in expression.split(',').map(|x| x.trim()).filter(|x| !x.is_empty()) {
        match spec.split_once('=') {
            Some((module, level)) => {
                if let Ok(level) = LevelFilter::from_str(level) {
                    loggers.push(Logger::builder().build(module.to_string(), level));
                }
            }
            None => {
                if let Ok(level) = LevelFilter::from_str(spec) {
                    root_level = level;
                }
            }
        }
    }
    (root_level, loggers)
}

#[macro_export]
macro_rules! trace {
    ($($t:tt)*) => (log::trace!($($t)*))
}

#[macro_export]
macro_rules! debug {
    ($($t:tt)*) => (log::debug!($($t)*))
}

#[macro_export]
macro_rules! info {
    ($($t:tt)*) => (log::info!($($t)*))
}

#[macro_export]
macro_rules! warn {
    ($($t:tt)*) => (log::warn!($($t)*))
}

#[macro_export]
macro_rules! error {
    ($($t:tt)*) => (log::error!($($t)*))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_filters() {
        let (root, loggers) = parse_filters("debug,norn_consensus=trace,norn_p2p_lib=warn");
        assert_eq!(root, LevelFilter::Debug);
        assert_eq!(loggers.len(), 2);

        let (root, loggers) = parse_filters("");
        assert_eq!(root, LevelFilter::Info);
        assert!(loggers.is_empty() || std::env::var(DEFAULT_LOGGER_ENV).is_ok());
    }
}
