//! Structured error types for tick-scope
//!
//! Using thiserror for automatic Display implementation and error chaining.
//!
//! Nothing in the hot instrumentation or sampling path constructs or
//! returns these; they surface at init/shutdown/report boundaries only.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProfilerError {
    #[error("Failed to install the sampling timer: {0}")]
    TimerInstall(String),

    #[error("Sampling source is already installed")]
    AlreadyInstalled,

    #[error("Mismatched probe nesting: expected to close '{expected}', found '{found}'")]
    MismatchedProbe { expected: String, found: String },

    #[error("Profiler was shut down; no further collection is possible")]
    ShutDown,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to write report to {path}: {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize trace data: {0}")]
    SerializationFailed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
