use chrono::{DateTime, Utc};

use crate::modules::resource::model::ResourceStatus;
use crate::services::mirror::MirrorError;
use crate::services::portal::ApiError;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("transient fetch failure: {0}")]
    TransientFetch(String),
    #[error("remote resource not visible yet")]
    NotFound,
    #[error("illegal status transition: {from:?} -> {to:?}")]
    InvalidStateTransition {
        from: ResourceStatus,
        to: ResourceStatus,
    },
    #[error("mirror write failed: {0}")]
    Storage(#[from] MirrorError),
    #[error("session expired")]
    AuthExpired,
    #[error("reconciliation fetch timed out")]
    Timeout,
    #[error("malformed token: {0}")]
    Token(String),
}

impl SyncError {
    /// Transient errors are swallowed at the fetcher and retried on the next
    /// tick; everything else propagates.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::TransientFetch(_) | Self::NotFound | Self::Timeout | Self::Storage(_)
        )
    }
}

impl From<ApiError> for SyncError {
    fn from(e: ApiError) -> Self {
        match e {
            ApiError::InvalidRefreshToken => Self::AuthExpired,
            other => Self::TransientFetch(other.to_string()),
        }
    }
}

/// What a tick tells the timer controller to do next.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickFlow {
    /// Keep polling at the normal cadence.
    Continue,
    /// Terminal state observed; tear the timer down.
    Stop,
    /// Re-arm a single-shot timer for the computed instant. This is how a
    /// successful token refresh chains the next refresh.
    Reschedule(DateTime<Utc>),
}
