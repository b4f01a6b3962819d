//! Error types for the padhook engine.
//!
//! Only setup can fail. Once the engine is running, degraded conditions
//! (missing controller, unknown tokens, failed host reads) resolve to
//! neutral state instead of errors.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading configuration or starting the engine.
#[derive(Debug, Error)]
pub enum PadError {
    /// The configuration file could not be read or written.
    #[error("config file {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for [`crate::config::PadConfig`].
    #[error("config decode error: {0}")]
    ConfigDecode(#[from] toml::de::Error),

    #[error("config encode error: {0}")]
    ConfigEncode(#[from] toml::ser::Error),

    /// Neither the modern nor the legacy controller back-end can be used.
    #[error("no controller backend available")]
    NoBackend,

    /// The polling thread could not be started.
    #[error("failed to spawn polling thread: {0}")]
    Spawn(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PadError>;
