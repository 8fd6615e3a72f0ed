//! Scoped module logger.
//!
//! A `Logger` is an immutable value: `child` returns a new logger whose scope
//! is the parent's scope plus one segment, so concurrent jobs never share
//! mutable scope state. Every logger created from the same root writes into
//! one capture buffer, which the CLI prints when a build fails. Each line is
//! also forwarded to `tracing` at debug level.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        };
        f.write_str(s)
    }
}

impl FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(Error::InvalidConfig {
                module: "log".to_string(),
                message: format!("unknown log level: {other}"),
            }),
        }
    }
}

#[derive(Debug, Default)]
struct Capture {
    lines: Mutex<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct Logger {
    scope: Arc<str>,
    level: LogLevel,
    capture: Arc<Capture>,
}

impl Logger {
    pub fn new(scope: &str, level: LogLevel) -> Self {
        Self {
            scope: Arc::from(scope),
            level,
            capture: Arc::default(),
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    /// A logger whose scope is `self.scope + "." + name`.
    /// Empty segments are skipped.
    pub fn child(&self, name: &str) -> Self {
        let scope = match (self.scope.is_empty(), name.is_empty()) {
            (_, true) => self.scope.clone(),
            (true, false) => Arc::from(name),
            (false, false) => Arc::from(format!("{}.{}", self.scope, name)),
        };
        Self {
            scope,
            level: self.level,
            capture: self.capture.clone(),
        }
    }

    pub fn log(&self, level: LogLevel, message: impl fmt::Display) {
        if level < self.level {
            return;
        }
        let line = if self.scope.is_empty() {
            format!("{level} {message}")
        } else {
            format!("{} {level} {message}", self.scope)
        };
        tracing::debug!(scope = %self.scope, "{line}");
        self.capture
            .lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line);
    }

    pub fn debug(&self, message: impl fmt::Display) {
        self.log(LogLevel::Debug, message);
    }

    pub fn info(&self, message: impl fmt::Display) {
        self.log(LogLevel::Info, message);
    }

    pub fn warn(&self, message: impl fmt::Display) {
        self.log(LogLevel::Warn, message);
    }

    pub fn error(&self, message: impl fmt::Display) {
        self.log(LogLevel::Error, message);
    }

    /// Every line captured so far by this logger and its relatives.
    pub fn lines(&self) -> Vec<String> {
        self.capture
            .lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_scopes_join_with_dots() {
        let root = Logger::new("build", LogLevel::Debug);
        let leaf = root.child("linux_amd64").child("gobuild");
        assert_eq!(leaf.scope(), "build.linux_amd64.gobuild");
        assert_eq!(root.scope(), "build");
        assert_eq!(root.child("").scope(), "build");
        assert_eq!(Logger::new("", LogLevel::Info).child("x").scope(), "x");
    }

    #[test]
    fn test_lines_are_shared_and_filtered() {
        let root = Logger::new("build", LogLevel::Info);
        let child = root.child("version");
        child.debug("hidden");
        child.info("bumped to 4");
        root.error("boom");

        assert_eq!(
            root.lines(),
            vec![
                "build.version INFO bumped to 4".to_string(),
                "build ERROR boom".to_string(),
            ]
        );
    }

    #[test]
    fn test_parse_level() {
        assert_eq!("WARN".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!("loud".parse::<LogLevel>().is_err());
    }
}
