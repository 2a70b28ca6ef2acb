//! Driver error taxonomy / 驱动错误类型

use std::time::Duration;

use thiserror::Error;

use crate::storage::gateway::TimeoutClass;

pub type Result<T, E = DriverError> = std::result::Result<T, E>;

/// Failures surfaced by the adapter layer / 适配层错误
///
/// Paths outside the adapter's roots are not errors: translation returns `None`.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Blank container name / connection string, malformed connection string.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The caller stopped waiting; the backend call may still be running.
    #[error("{class} call timed out after {budget:?}")]
    Timeout { class: TimeoutClass, budget: Duration },

    /// Write without overwrite onto an existing file, or non-recursive delete of a non-empty directory.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("backend error: {0:#}")]
    Backend(#[from] anyhow::Error),

    /// Gateway misuse or runtime failure.
    #[error("runtime error: {0}")]
    Runtime(String),
}

impl DriverError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, DriverError::Timeout { .. })
    }
}
