//! Error types for playoutlib
//!
//! Defines the core error types used throughout the pipeline.
//! Producer/consumer implementations can extend these with their own
//! error types via the `Other` variant.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("producer error: {0}")]
    Produce(String),

    #[error("mix error: {0}")]
    Mix(String),

    #[error("consumer error: {0}")]
    Consume(String),

    #[error("invalid video format: {0}")]
    Format(String),

    #[error("timecode error: {0}")]
    Timecode(String),

    #[error("channel error: {0}")]
    Channel(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type that uses PipelineError
pub type Result<T> = std::result::Result<T, PipelineError>;
