//! Errors - Failure taxonomy for placement, buffers and config IO
//!
//! Every variant is fatal for the session that hit it. Placement is
//! deterministic, so nothing here is retried.

use std::collections::TryReserveError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GrassError {
    /// A temporary or the blade buffer could not be allocated.
    #[error("allocation failed during {stage} ({requested} requested)")]
    Allocation { stage: &'static str, requested: usize },

    /// The query executor returned a result array of the wrong length.
    #[error("query executor returned {actual} results for {expected} queries")]
    ExecutorContract { expected: usize, actual: usize },

    #[error("invalid grass config: {0}")]
    InvalidConfig(String),

    /// Placement is one-shot; a pipeline cannot be run twice.
    #[error("placement pipeline already ran")]
    PipelineSpent,

    /// A placement job ran before the job producing its input.
    #[error("placement job needs {0} before it has been produced")]
    JobOrder(&'static str),

    /// GPU or host buffer operation failed.
    #[error("buffer backend error: {0}")]
    Backend(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GrassError {
    pub(crate) fn allocation(stage: &'static str, requested: usize) -> impl FnOnce(TryReserveError) -> Self {
        move |_| GrassError::Allocation { stage, requested }
    }
}
