//! Error types for flowmap operations.
//!
//! The engine recovers locally from all expected analysis conditions
//! (unresolved call targets, cyclic call structures); only program
//! loading and cooperative cancellation surface errors to the caller.

use crate::cancel::Cancelled;
use std::path::PathBuf;
use thiserror::Error;

/// Structured error for program loading and graph construction.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A build or analysis pass observed its cancellation token.
    #[error(transparent)]
    Cancelled(#[from] Cancelled),

    /// A source file could not be read.
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A source file could not be parsed.
    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

impl EngineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// True when the error represents cooperative cancellation rather
    /// than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}
