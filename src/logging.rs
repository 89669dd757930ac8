//! Debug-level gating for server log output.
//!
//! Every log statement in the request pipeline goes through a [`LogGate`]
//! before it reaches `tracing`. The gate is a pure filter over the configured
//! [`DebugLevel`] and the global quiet flag:
//!
//! ```text
//! none < error < warn < info
//! ```
//!
//! A message of severity `s` is emitted iff `quiet` is false, the level is not
//! `none`, and `s` is at or below the configured level.
//!
//! # Example
//!
//! ```rust
//! use dlc_server::logging::{DebugLevel, LogGate, Severity};
//!
//! let gate = LogGate::new(DebugLevel::Warn, false);
//! assert!(gate.allows(Severity::Error));
//! assert!(gate.allows(Severity::Warn));
//! assert!(!gate.allows(Severity::Info));
//! ```

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Configured verbosity of the server.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum DebugLevel {
    /// Nothing is logged
    None,
    /// Only errors
    Error,
    /// Errors and warnings
    Warn,
    /// Everything
    Info,
}

impl DebugLevel {
    /// Lowercase name as used in configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            DebugLevel::None => "none",
            DebugLevel::Error => "error",
            DebugLevel::Warn => "warn",
            DebugLevel::Info => "info",
        }
    }
}

impl fmt::Display for DebugLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DebugLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(DebugLevel::None),
            "error" => Ok(DebugLevel::Error),
            "warn" => Ok(DebugLevel::Warn),
            "info" => Ok(DebugLevel::Info),
            other => Err(format!(
                "unknown debug level '{}' (expected none, error, warn or info)",
                other
            )),
        }
    }
}

/// Severity of a single log message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Error,
    Warn,
    Info,
}

impl Severity {
    /// The lowest debug level at which this severity is emitted.
    fn minimum_level(self) -> DebugLevel {
        match self {
            Severity::Error => DebugLevel::Error,
            Severity::Warn => DebugLevel::Warn,
            Severity::Info => DebugLevel::Info,
        }
    }
}

/// Filter deciding whether a message of a given severity may be logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogGate {
    level: DebugLevel,
    quiet: bool,
}

impl LogGate {
    /// Create a gate for the given level and quiet flag.
    pub fn new(level: DebugLevel, quiet: bool) -> Self {
        Self { level, quiet }
    }

    /// A gate that suppresses everything.
    pub fn silent() -> Self {
        Self::new(DebugLevel::None, true)
    }

    /// Whether a message of `severity` passes the gate.
    pub fn allows(&self, severity: Severity) -> bool {
        if self.quiet || self.level == DebugLevel::None {
            return false;
        }
        severity.minimum_level() <= self.level
    }
}

// =============================================================================
// Tests
// =============================================================================
