//! Error types for airlock operations.
//!
//! This module defines [`AirlockError`], the primary error type used throughout
//! the application, and a [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - Use `AirlockError` for failure modes with distinct handling (the launch
//!   taxonomy: missing script, unsatisfiable pin, post-load mismatch, ...)
//! - Use `anyhow::Error` (via `AirlockError::Other`) for unexpected errors
//! - Parent-side errors are reported before any child process is spawned;
//!   child-side errors surface through the child's exit code and stderr

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for airlock operations.
#[derive(Debug, Error)]
pub enum AirlockError {
    /// Target script does not exist.
    #[error("Script not found: {path}")]
    ScriptNotFound { path: PathBuf },

    /// A caller-supplied override record lacks an identifying name.
    #[error("Requirement record has no library name: {record}")]
    MissingName { record: String },

    /// No installed library version satisfies the requirement.
    #[error("No installed version of '{name}' satisfies {constraint}")]
    VersionNotFound { name: String, constraint: String },

    /// A loaded library violates a stated version bound.
    #[error("Loaded '{name}' at version {loaded}, which violates {constraint}")]
    VersionMismatch {
        name: String,
        loaded: String,
        constraint: String,
    },

    /// Malformed transport token.
    #[error("Failed to decode execution request: {message}")]
    Decode { message: String },

    /// Request could not be serialized into a transport token.
    #[error("Failed to encode execution request: {message}")]
    Encode { message: String },

    /// Remote install attempt failed.
    #[error("Failed to install '{name}': {message}")]
    Install { name: String, message: String },

    /// The target itself could not be started.
    #[error("Failed to dispatch {target}: {message}")]
    Dispatch { target: String, message: String },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for airlock operations.
pub type Result<T> = std::result::Result<T, AirlockError>;
