//! Error types for dialog-core

use thiserror::Error;

/// Errors returned by [`DialogStore`](crate::DialogStore) operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DialogStoreError {
    #[error("Dialog store has not been booted")]
    NotBooted,

    #[error("Dialog store is already booted")]
    AlreadyBooted,

    /// The owning task has stopped
    #[error("Dialog store is closed")]
    Closed,

    #[error("Dialog not found: {call_id}")]
    NotFound { call_id: String },

    /// The Call-ID belongs to a cancelled dialog that has not been deleted yet
    #[error("Call-ID {call_id} is retained by a terminated dialog")]
    CallIdRetained { call_id: String },

    #[error("Invalid dialog: {0}")]
    InvalidDialog(String),
}

impl DialogStoreError {
    pub(crate) fn not_found(call_id: impl Into<String>) -> Self {
        Self::NotFound {
            call_id: call_id.into(),
        }
    }

    /// Rejections that count towards escalation
    pub(crate) fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::CallIdRetained { .. } | Self::InvalidDialog(_)
        )
    }
}

pub type DialogResult<T> = Result<T, DialogStoreError>;

/// Raised on the escalation channel when the owning task keeps failing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreFault {
    /// Consecutive failures that led to this fault
    pub failures: u32,
    pub last_error: String,
}

impl std::fmt::Display for StoreFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "dialog store failed {} times in a row (last: {})",
            self.failures, self.last_error
        )
    }
}
