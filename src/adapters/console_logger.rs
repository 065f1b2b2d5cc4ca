//! Host console logger.
//!
//! A minimal [`log::Log`] implementation writing
//! `<unix secs> <LEVEL> <target>: <message>` lines to stderr.  The level
//! comes from `KILN_LOG` (`error`..`trace`, default `info`).

use std::io::Write;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{LevelFilter, Log, Metadata, Record};

/// Environment variable holding the max level.
pub const LEVEL_ENV: &str = "KILN_LOG";

pub struct ConsoleLogger {
    level: LevelFilter,
}

static LOGGER: std::sync::OnceLock<ConsoleLogger> = std::sync::OnceLock::new();

impl ConsoleLogger {
    pub const fn new(level: LevelFilter) -> Self {
        Self { level }
    }

    /// Install as the global logger.  Returns the level in effect; a second
    /// call leaves the first logger in place.
    pub fn init() -> LevelFilter {
        let level = std::env::var(LEVEL_ENV)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(LevelFilter::Info);
        let logger = LOGGER.get_or_init(|| Self::new(level));
        if log::set_logger(logger).is_ok() {
            log::set_max_level(logger.level);
        }
        logger.level
    }
}

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0.0, |d| d.as_secs_f64());
        let mut err = std::io::stderr().lock();
        let _ = writeln!(
            err,
            "{:.3} {:<5} {}: {}",
            now,
            record.level(),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}
