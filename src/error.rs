//! Error types for the matching core.
//!
//! Typed errors live at the data-model boundary ([`CoreError`]); orchestration
//! glue (scheduler ticks, test harnesses) uses `anyhow::Result` for `?` and
//! `.context(...)`, the same split the rest of this crate uses.

use thiserror::Error;

/// Errors the matching core can report through the collaborator boundary.
///
/// Mirrors the error-kind taxonomy the scheduler classifies comparisons by:
/// `Input` failures abort a job, `Render`/`ScratchIo` are recoverable and
/// degrade a single score instead, `Store` aborts only the current tick.
#[derive(Debug, Error)]
pub enum CoreError {
    /// File missing/unreadable, or a bad page index. Fatal to the job.
    #[error("input error: {0}")]
    Input(String),

    /// Renderer failed on one page. Non-fatal: the caller degrades the
    /// affected visual score to 0.0 and continues.
    #[error("render error: {0}")]
    Render(String),

    /// Scratch spill write/read failure. Non-fatal: callers fall back to
    /// processing the buffer in memory.
    #[error("scratch io error: {0}")]
    ScratchIo(#[source] std::io::Error),

    /// `ComparisonRepository` failure during a tick or save.
    #[error("store error: {0}")]
    Store(String),

    /// Anything else a worker encounters; persisted as FAILED.
    #[error("unknown error: {0}")]
    Unknown(String),
}

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::ScratchIo(e)
    }
}
