//! Unified error types for the burrow workspace.
//!
//! Every fatal launch step maps onto one of these variants so the binary can
//! report the failed operation and the underlying system error before exiting
//! with the dedicated launch-failure status.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum BurrowError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A loader configuration file could not be parsed.
    #[error("config error in {path}: {message}")]
    Config {
        /// File in which the problem was found.
        path: PathBuf,
        /// Description of the problem.
        message: String,
    },

    /// A namespace or identity-map setup step failed.
    #[error("namespace setup failed at {step}: {source}")]
    Namespace {
        /// The setup step that failed (`unshare`, `uid_map`, ...).
        step: &'static str,
        /// Underlying system error.
        source: std::io::Error,
    },

    /// A mount operation failed.
    #[error("mount {source_path} -> {target} failed: {source}")]
    Mount {
        /// What was being mounted.
        source_path: PathBuf,
        /// Where it was being mounted.
        target: PathBuf,
        /// Underlying system error.
        source: std::io::Error,
    },

    /// A step of the final chroot/exec sequence failed.
    #[error("launch step {op} failed: {source}")]
    Launch {
        /// The operation that failed (`getcwd`, `chroot`, `exec`, ...).
        op: &'static str,
        /// Underlying system error.
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, BurrowError>;
