//! Debug logging infrastructure for tikz-render.
//!
//! Controlled by the DEBUG_LEVEL environment variable (or the CLI
//! `--log-level` flag, which takes precedence):
//! - 0 or unset: No debugging
//! - 1: Errors only
//! - 2: Info level (cache hits, strategy outcomes)
//! - 3: Debug level (subprocess and HTTP details)
//! - 4: Trace level (every operation)
//!
//! All output goes to `tikz_render_debug.log` in the system temp directory so
//! stdout stays reserved for command output (locators, SVG).
//!
//! [`init_log_bridge`] routes `log::info!()` and friends to the same file.
//! When `RUST_LOG` is set, records are mirrored to stderr as well.

use parking_lot::Mutex;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

/// Debug level configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DebugLevel {
    Off = 0,
    Error = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl DebugLevel {
    fn from_env() -> Self {
        match std::env::var("DEBUG_LEVEL") {
            Ok(val) => Self::parse(&val).unwrap_or(DebugLevel::Off),
            Err(_) => DebugLevel::Off,
        }
    }

    /// Parse a numeric (`0`-`4`) or named (`off`, `error`, `info`, `debug`,
    /// `trace`) level.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "0" | "off" => Some(DebugLevel::Off),
            "1" | "error" => Some(DebugLevel::Error),
            "2" | "info" | "warn" => Some(DebugLevel::Info),
            "3" | "debug" => Some(DebugLevel::Debug),
            "4" | "trace" => Some(DebugLevel::Trace),
            _ => None,
        }
    }

    fn to_level_filter(self) -> log::LevelFilter {
        match self {
            DebugLevel::Off => log::LevelFilter::Off,
            DebugLevel::Error => log::LevelFilter::Error,
            DebugLevel::Info => log::LevelFilter::Info,
            DebugLevel::Debug => log::LevelFilter::Debug,
            DebugLevel::Trace => log::LevelFilter::Trace,
        }
    }

    fn from_log_level(level: log::Level) -> Self {
        match level {
            log::Level::Error => DebugLevel::Error,
            log::Level::Warn | log::Level::Info => DebugLevel::Info,
            log::Level::Debug => DebugLevel::Debug,
            log::Level::Trace => DebugLevel::Trace,
        }
    }
}

/// Global debug logger
struct DebugLogger {
    level: DebugLevel,
    file: Option<std::fs::File>,
    mirror_stderr: bool,
}

impl DebugLogger {
    fn new(level: DebugLevel) -> Self {
        let mirror_stderr = std::env::var_os("RUST_LOG").is_some();

        if level == DebugLevel::Off {
            return DebugLogger {
                level,
                file: None,
                mirror_stderr,
            };
        }

        let log_path = std::env::temp_dir().join("tikz_render_debug.log");
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&log_path)
            .ok();

        let mut logger = DebugLogger {
            level,
            file,
            mirror_stderr,
        };
        logger.write_raw(&format!(
            "\n{}\ntikz-render debug session started at {} (level={:?})\n{}\n",
            "=".repeat(80),
            get_timestamp(),
            level,
            "=".repeat(80)
        ));
        logger
    }

    fn write_raw(&mut self, msg: &str) {
        if let Some(ref mut file) = self.file {
            let _ = file.write_all(msg.as_bytes());
            let _ = file.flush();
        }
    }

    fn log(&mut self, level: DebugLevel, category: &str, msg: &str) {
        if level <= self.level {
            let level_str = match level {
                DebugLevel::Error => "ERROR",
                DebugLevel::Info => "INFO ",
                DebugLevel::Debug => "DEBUG",
                DebugLevel::Trace => "TRACE",
                DebugLevel::Off => return,
            };
            let line = format!(
                "[{}] [{}] [{}] {}\n",
                get_timestamp(),
                level_str,
                category,
                msg
            );
            if self.mirror_stderr {
                eprint!("{line}");
            }
            self.write_raw(&line);
        }
    }
}

static LOGGER: OnceLock<Mutex<DebugLogger>> = OnceLock::new();

fn get_logger() -> &'static Mutex<DebugLogger> {
    LOGGER.get_or_init(|| Mutex::new(DebugLogger::new(DebugLevel::from_env())))
}

fn get_timestamp() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}.{:06}", now.as_secs(), now.subsec_micros())
}

/// Check if debugging is enabled at given level
pub fn is_enabled(level: DebugLevel) -> bool {
    let logger = get_logger().lock();
    level <= logger.level
}

/// Log a message at specified level
pub fn log(level: DebugLevel, category: &str, msg: &str) {
    let mut logger = get_logger().lock();
    logger.log(level, category, msg);
}

/// Log formatted message
pub fn logf(level: DebugLevel, category: &str, args: fmt::Arguments) {
    if is_enabled(level) {
        log(level, category, &format!("{}", args));
    }
}

/// `log::Log` implementation that forwards records into the debug log file.
struct LogBridge;

impl log::Log for LogBridge {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        is_enabled(DebugLevel::from_log_level(metadata.level()))
    }

    fn log(&self, record: &log::Record) {
        let level = DebugLevel::from_log_level(record.level());
        if is_enabled(level) {
            let category = record.target().rsplit("::").next().unwrap_or("tikz_render");
            log(level, &category.to_ascii_uppercase(), &record.args().to_string());
        }
    }

    fn flush(&self) {}
}

static LOG_BRIDGE: LogBridge = LogBridge;

/// Install the `log` facade bridge.
///
/// `override_level` (from the CLI) wins over `DEBUG_LEVEL`. Calling this more
/// than once keeps the first installation.
pub fn init_log_bridge(override_level: Option<DebugLevel>) {
    let level = override_level.unwrap_or_else(DebugLevel::from_env);
    let _ = LOGGER.set(Mutex::new(DebugLogger::new(level)));
    let effective = get_logger().lock().level;

    if log::set_logger(&LOG_BRIDGE).is_ok() {
        log::set_max_level(effective.to_level_filter());
    }
}

// Convenience macros for logging
#[macro_export]
macro_rules! debug_error {
    ($category:expr, $($arg:tt)*) => {
        $crate::debug::logf($crate::debug::DebugLevel::Error, $category, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! debug_info {
    ($category:expr, $($arg:tt)*) => {
        $crate::debug::logf($crate::debug::DebugLevel::Info, $category, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! debug_log {
    ($category:expr, $($arg:tt)*) => {
        $crate::debug::logf($crate::debug::DebugLevel::Debug, $category, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! debug_trace {
    ($category:expr, $($arg:tt)*) => {
        $crate::debug::logf($crate::debug::DebugLevel::Trace, $category, format_args!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_levels() {
        assert_eq!(DebugLevel::parse("0"), Some(DebugLevel::Off));
        assert_eq!(DebugLevel::parse(" 3 "), Some(DebugLevel::Debug));
        assert_eq!(DebugLevel::parse("TRACE"), Some(DebugLevel::Trace));
        assert_eq!(DebugLevel::parse("warn"), Some(DebugLevel::Info));
        assert_eq!(DebugLevel::parse("loud"), None);
    }

    #[test]
    fn test_level_ordering_matches_verbosity() {
        assert!(DebugLevel::Error < DebugLevel::Info);
        assert!(DebugLevel::Info < DebugLevel::Trace);
        assert_eq!(
            DebugLevel::from_log_level(log::Level::Warn),
            DebugLevel::Info
        );
    }
}
