//! Aquabridge Logging
//!
//! One place to install the global `tracing` subscriber. Output goes to
//! stderr so binaries can keep stdout for their actual output. `RUST_LOG`
//! takes precedence over the level passed in.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Invalid log level: {0}")]
    InvalidLevel(String),
    #[error("Failed to install subscriber: {0}")]
    InitError(String),
}

/// Workspace crates that log through `tracing`.
const CRATES: &[&str] = &[
    "aquabridge",
    "aquabridge_core",
    "aquabridge_ipc",
    "aquabridge_keystore",
    "aquabridge_network",
    "aquabridge_settings",
    "default_peers",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn from_verbose(verbose: bool) -> Self {
        if verbose {
            Self::Debug
        } else {
            Self::Info
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }

    /// Default filter directive: our crates at this level, everything else at warn.
    pub fn directive(&self) -> String {
        let level = self.as_str();
        std::iter::once("warn".to_string())
            .chain(CRATES.iter().map(|krate| format!("{}={}", krate, level)))
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl FromStr for LogLevel {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            other => Err(LoggingError::InvalidLevel(other.to_string())),
        }
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn try_init(level: LogLevel) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.directive()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| LoggingError::InitError(e.to_string()))
}
