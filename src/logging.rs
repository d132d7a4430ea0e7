//! Named loggers handed to each component at construction.
//!
//! Output goes through `tracing`; the binary decides where it lands.
//! A [`Logger`] carries its dotted name and a shared level filter, so a
//! component never reaches for a process-wide logger.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{
    Arc,
    atomic::{AtomicU8, Ordering},
};
use tracing::Level;

/// Severity of a log message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    #[serde(alias = "warn")]
    Warning,
    Error,
}

impl LogLevel {
    fn to_u8(self) -> u8 {
        match self {
            LogLevel::Debug => 0,
            LogLevel::Info => 1,
            LogLevel::Warning => 2,
            LogLevel::Error => 3,
        }
    }

    fn from_u8(val: u8) -> Self {
        match val {
            0 => LogLevel::Debug,
            1 => LogLevel::Info,
            2 => LogLevel::Warning,
            _ => LogLevel::Error,
        }
    }

    /// Parse a level name as written in config or the environment.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warning),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warning => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

/// Atomic minimum level shared by every logger derived from the same root.
pub struct LogLevelFilter(AtomicU8);

impl LogLevelFilter {
    pub fn new(level: LogLevel) -> Self {
        Self(AtomicU8::new(level.to_u8()))
    }

    pub fn get(&self) -> LogLevel {
        LogLevel::from_u8(self.0.load(Ordering::Relaxed))
    }

    pub fn set(&self, level: LogLevel) {
        self.0.store(level.to_u8(), Ordering::Relaxed);
    }

    pub fn should_log(&self, level: LogLevel) -> bool {
        level.to_u8() >= self.0.load(Ordering::Relaxed)
    }
}

impl Default for LogLevelFilter {
    fn default() -> Self {
        Self::new(LogLevel::Debug)
    }
}

// tracing needs the level at compile time, so each arm names it literally.
macro_rules! emit {
    ($level:expr, $name:expr, $data:expr, $msg:expr) => {
        match ($name, $data) {
            (Some(name), Some(data)) => {
                tracing::event!($level, logger = %name, data = %data, "{}", $msg)
            }
            (Some(name), None) => tracing::event!($level, logger = %name, "{}", $msg),
            (None, Some(data)) => tracing::event!($level, data = %data, "{}", $msg),
            (None, None) => tracing::event!($level, "{}", $msg),
        }
    };
}

/// Logger handle. Cheap to clone.
#[derive(Clone)]
pub struct Logger {
    level_filter: Arc<LogLevelFilter>,
    name: Option<String>,
}

impl Logger {
    pub fn new() -> Self {
        Self {
            level_filter: Arc::new(LogLevelFilter::default()),
            name: None,
        }
    }

    pub fn with_level_filter(mut self, filter: Arc<LogLevelFilter>) -> Self {
        self.level_filter = filter;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Child logger `parent.child` sharing this logger's filter.
    pub fn named(&self, child: &str) -> Self {
        let name = match &self.name {
            Some(parent) => format!("{parent}.{child}"),
            None => child.to_string(),
        };
        Self {
            level_filter: Arc::clone(&self.level_filter),
            name: Some(name),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn level_filter(&self) -> &Arc<LogLevelFilter> {
        &self.level_filter
    }

    pub fn log(&self, level: LogLevel, message: &str, data: Option<Value>) {
        if !self.level_filter.should_log(level) {
            return;
        }

        let name = self.name.as_deref();
        let data = data.as_ref();
        match level {
            LogLevel::Debug => emit!(Level::DEBUG, name, data, message),
            LogLevel::Info => emit!(Level::INFO, name, data, message),
            LogLevel::Warning => emit!(Level::WARN, name, data, message),
            LogLevel::Error => emit!(Level::ERROR, name, data, message),
        }
    }

    pub fn debug(&self, msg: &str) {
        self.log(LogLevel::Debug, msg, None);
    }

    pub fn info(&self, msg: &str) {
        self.log(LogLevel::Info, msg, None);
    }

    pub fn warning(&self, msg: &str) {
        self.log(LogLevel::Warning, msg, None);
    }

    pub fn error(&self, msg: &str) {
        self.log(LogLevel::Error, msg, None);
    }

    pub fn debug_with(&self, msg: &str, data: Value) {
        self.log(LogLevel::Debug, msg, Some(data));
    }

    pub fn info_with(&self, msg: &str, data: Value) {
        self.log(LogLevel::Info, msg, Some(data));
    }

    pub fn warning_with(&self, msg: &str, data: Value) {
        self.log(LogLevel::Warning, msg, Some(data));
    }

    pub fn error_with(&self, msg: &str, data: Value) {
        self.log(LogLevel::Error, msg, Some(data));
    }

    /// Log `err` as a warning when present; the operation it came from is
    /// abandoned by the caller.
    pub fn warn_error_if<E: std::fmt::Display>(
        &self,
        result: Result<(), E>,
        msg: &str,
        mut data: Value,
    ) {
        if let Err(err) = result {
            if let Value::Object(map) = &mut data {
                map.insert("error".to_string(), Value::String(err.to_string()));
            }
            self.warning_with(msg, data);
        }
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_filter() {
        let filter = LogLevelFilter::new(LogLevel::Warning);

        assert!(!filter.should_log(LogLevel::Debug));
        assert!(!filter.should_log(LogLevel::Info));
        assert!(filter.should_log(LogLevel::Warning));
        assert!(filter.should_log(LogLevel::Error));

        filter.set(LogLevel::Debug);
        assert!(filter.should_log(LogLevel::Debug));
        assert_eq!(filter.get(), LogLevel::Debug);
    }

    #[test]
    fn test_named_children_share_filter() {
        let root = Logger::new()
            .with_level_filter(Arc::new(LogLevelFilter::new(LogLevel::Info)))
            .with_name("mirror_sync");
        let child = root.named("add_mirror_task");

        assert_eq!(child.name(), Some("mirror_sync.add_mirror_task"));
        root.level_filter().set(LogLevel::Error);
        assert_eq!(child.level_filter().get(), LogLevel::Error);

        assert_eq!(Logger::new().named("api").name(), Some("api"));
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(LogLevel::parse("WARN"), Some(LogLevel::Warning));
        assert_eq!(LogLevel::parse(" debug "), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse("verbose"), None);
        assert_eq!(Level::from(LogLevel::Error), Level::ERROR);
    }
}
