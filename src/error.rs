use thiserror::Error;

use crate::runner::BatchState;

#[derive(Debug, Error)]
pub enum SkimrunError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Skim error: {0}")]
    Skim(#[from] SkimError),

    #[error("Runner error: {0}")]
    Runner(#[from] RunnerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Failures of the token extractor.
///
/// Blank lines, comment-only input and odd tokens are never errors; only an
/// input stream that was expected to be readable and could not be read is.
#[derive(Debug, Error)]
pub enum SkimError {
    #[error("failed to read input: {0}")]
    Read(#[from] std::io::Error),
}

/// Failures of the bounded parallel runner itself.
///
/// A work item exiting non-zero is not one of these: it only shows up in the
/// batch report.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("concurrency budget must be at least 1")]
    ZeroBudget,

    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid batch transition: {from} -> {to}")]
    InvalidTransition { from: BatchState, to: BatchState },

    #[error("concurrency slots closed")]
    Closed,
}
