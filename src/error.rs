//! Custom error types for the crate.
//!
//! This module defines the primary error type, `DetError`, for the detector
//! client library. Using the `thiserror` crate, it provides a centralized and
//! consistent way to handle the different kinds of errors that can occur, from
//! I/O and configuration issues to module-level problems.
//!
//! Library code propagates errors with `?`; the capability traits at the
//! hardware seam use `anyhow::Result` instead, and their errors are folded
//! into `DetError::Module` when they cross back into the typed API.

use thiserror::Error;

/// Convenience alias for results using the library error type.
pub type DetResult<T> = std::result::Result<T, DetError>;

#[derive(Error, Debug)]
pub enum DetError {
    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),

    #[error("Configuration validation error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Module error: {0}")]
    Module(String),

    #[error("Unknown DAC index {0}")]
    UnknownDacIndex(i32),

    #[error("Unknown DAC name '{0}'")]
    UnknownDacName(String),

    #[error("DAC {name} value {value} outside bounds {low}..={high}")]
    DacOutOfRange {
        name: &'static str,
        value: i32,
        low: i32,
        high: i32,
    },

    #[error("Module position {position} out of range (detector has {count} modules)")]
    PositionOutOfRange { position: usize, count: usize },

    #[error("Invalid timer value {value} for {timer}")]
    InvalidTimer { timer: &'static str, value: i64 },

    #[error("Detector is not idle")]
    NotIdle,

    #[error("Settings {0} not supported by this detector type")]
    SettingsNotSupported(String),

    #[error("Modules disagree on {0}, query them individually")]
    Inconsistent(&'static str),

    #[error("Bad raw file: {0}")]
    BadFileFormat(String),
}

impl From<anyhow::Error> for DetError {
    fn from(value: anyhow::Error) -> Self {
        DetError::Module(value.to_string())
    }
}
