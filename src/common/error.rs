//! Common error types for the disorder pipeline
//!
//! # Design Principles (KISS)
//! - Fatal failures only; per-record parse failures never reach this type
//! - Every variant carries the resource or parameter it concerns
//! - Use thiserror for ergonomic error handling

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::sink::SinkError;

/// Fatal pipeline errors
///
/// Any of these aborts the run. Recoverable per-record problems are
/// represented by [`crate::parser::ParseFailure`] and absorbed by the loader.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Source dataset could not be opened
    #[error("Source unavailable: {}: {source}", .path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Read failure after the source was opened
    #[error("Source read error at line {line}: {source}")]
    SourceRead {
        line: u64,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Sink failure
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    /// Consumer half dropped while the producer was still sending
    #[error("Event channel closed prematurely: consumer dropped")]
    ChannelClosed,

    /// Channel consumer half was already taken
    #[error("Event channel receiver already taken")]
    ReceiverTaken,

    /// Producer task panicked or was aborted
    #[error("Loader task failed: {0}")]
    LoaderTask(#[from] tokio::task::JoinError),
}

impl PipelineError {
    /// Create a source-unavailable error
    pub fn source_unavailable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::SourceUnavailable {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias using PipelineError
pub type PipelineResult<T> = Result<T, PipelineError>;
