//! Username to pinned content ID. A missing pin and a lookup that keeps
//! failing look the same to callers: skip the subject.

use crate::concurrency::CancelToken;
use crate::error::FetchError;
use crate::fetcher::PinnedLookup;
use crate::gate::{Pause, RateGate};
use crate::model::{ContentId, Username};
use crate::util::with_backoff;

pub struct PinnedResolver<'a> {
    lookup: &'a dyn PinnedLookup,
    gate: &'a RateGate,
    retry_tries: usize,
    retry_delay_ms: u64,
    cancel: CancelToken,
}

impl<'a> PinnedResolver<'a> {
    pub fn new(lookup: &'a dyn PinnedLookup, gate: &'a RateGate, retry_tries: usize, retry_delay_ms: u64) -> Self {
        Self { lookup, gate, retry_tries, retry_delay_ms, cancel: CancelToken::new() }
    }

    /// Stop retrying once `cancel` trips.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// `Ok(None)` for no pinned content and for lookups that failed after
    /// retries. Only a rejected credential or a cancellation is an error.
    pub fn resolve(&self, username: &Username) -> Result<Option<ContentId>, FetchError> {
        let stop = || self.cancel.is_cancelled();
        let out = with_backoff("pinned_lookup", self.retry_tries, self.retry_delay_ms, stop, || {
            self.gate.wait(Pause::Subject);
            self.lookup.pinned_content_id(username)
        });
        match out {
            Ok(Some(id)) => {
                tracing::debug!(%username, pinned = %id, "pinned content resolved");
                Ok(Some(id))
            }
            Ok(None) => {
                tracing::debug!(%username, "no pinned content");
                Ok(None)
            }
            Err(e @ (FetchError::Auth(_) | FetchError::Cancelled)) => Err(e),
            Err(e) => {
                tracing::warn!(%username, error = %e, "pinned lookup failed; skipping subject");
                Ok(None)
            }
        }
    }
}
