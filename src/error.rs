//! Error taxonomy: per-call fetch errors, per-subject accumulation errors,
//! and run-level errors that carry whatever was already computed.

use crate::model::{ContentId, ReplierSet};
use crate::reconcile::ReconciliationResult;
use thiserror::Error;

/// Failure of a single outbound call.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network failure, timeout, 429 or 5xx. Safe to retry.
    #[error("transient fetch error: {0}")]
    Transient(String),

    /// Credential rejected (401/403). Fatal for the whole run.
    #[error("credential rejected: {0}")]
    Auth(String),

    /// Payload did not contain the expected reply list.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// A cursor was presented for a subject other than the one it was issued for.
    #[error("cursor issued for {issued_for} used with {used_with}")]
    CursorMismatch { issued_for: ContentId, used_with: ContentId },

    /// Any other non-success status.
    #[error("http status {status}: {body}")]
    Http { status: u16, body: String },

    /// The request could not be built (bad endpoint URL, bad header value).
    #[error("request could not be built: {0}")]
    Request(String),

    /// The run was cancelled before this call could be retried.
    #[error("cancelled before the call was retried")]
    Cancelled,
}

impl FetchError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Transient(_))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            return FetchError::Malformed(e.to_string());
        }
        if e.is_builder() {
            return FetchError::Request(e.to_string());
        }
        match e.status() {
            Some(s) if s.as_u16() == 401 || s.as_u16() == 403 => FetchError::Auth(e.to_string()),
            Some(s) if s.as_u16() == 429 || s.is_server_error() => FetchError::Transient(e.to_string()),
            Some(s) => FetchError::Http { status: s.as_u16(), body: e.to_string() },
            None => FetchError::Transient(e.to_string()),
        }
    }
}

/// Failure to accumulate one subject. Every variant that can carry the pages
/// fetched so far does.
#[derive(Debug, Error)]
pub enum AccumulationError {
    #[error("accumulation of {content_id} failed after {} repliers: {source}", .partial.len())]
    Failed {
        content_id: ContentId,
        partial: ReplierSet,
        #[source]
        source: FetchError,
    },

    #[error("pagination of {content_id} exceeded {pages} pages")]
    PaginationExceeded { content_id: ContentId, pages: usize, partial: ReplierSet },

    #[error("accumulation of {content_id} aborted: {source}")]
    Auth {
        content_id: ContentId,
        #[source]
        source: FetchError,
    },

    #[error("accumulation of {content_id} cancelled")]
    Cancelled { content_id: ContentId, partial: ReplierSet },
}

impl AccumulationError {
    /// Errors that must abort the whole run rather than one subject.
    pub fn is_run_level(&self) -> bool {
        matches!(self, AccumulationError::Auth { .. } | AccumulationError::Cancelled { .. })
    }

    pub fn partial(&self) -> Option<&ReplierSet> {
        match self {
            AccumulationError::Failed { partial, .. }
            | AccumulationError::PaginationExceeded { partial, .. }
            | AccumulationError::Cancelled { partial, .. } => Some(partial),
            AccumulationError::Auth { .. } => None,
        }
    }
}

/// A run that could not complete. `partial` holds every subject outcome
/// settled before the abort.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("run aborted, credential rejected: {reason}")]
    Auth { reason: String, partial: ReconciliationResult },

    #[error("run cancelled")]
    Cancelled { partial: ReconciliationResult },

    #[error("{content_id} could not be accumulated")]
    Accumulation {
        content_id: ContentId,
        #[source]
        source: AccumulationError,
    },
}

impl RunError {
    pub fn partial(&self) -> Option<&ReconciliationResult> {
        match self {
            RunError::Auth { partial, .. } | RunError::Cancelled { partial } => Some(partial),
            RunError::Accumulation { .. } => None,
        }
    }
}
