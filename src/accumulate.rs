//! Page-by-page accumulation of one thread's repliers until the API hands
//! back no continuation cursor.
//!
//! The loop is an explicit two-state machine: `Fetching(cursor)` issues one
//! paced, retried call and appends the page; `Done` is reachable only from a
//! page whose `next` is `None`. Everything else (page ceiling, a repeated
//! cursor, cancellation, exhausted retries) leaves through an error that
//! carries the records gathered so far.

use crate::concurrency::CancelToken;
use crate::config::ReconOptions;
use crate::error::{AccumulationError, FetchError};
use crate::fetcher::PageFetcher;
use crate::gate::{Pause, RateGate};
use crate::model::{ContentId, ContinuationCursor, Page, ReplierSet};
use crate::progress::ProgressScope;
use crate::util::with_backoff;

#[derive(Debug)]
enum PageState {
    Fetching(Option<ContinuationCursor>),
    Done,
}

/// Knobs for one accumulation, taken from `ReconOptions`.
#[derive(Clone, Copy, Debug)]
pub struct AccumulateCfg {
    pub max_pages: usize,
    pub retry_tries: usize,
    pub retry_delay_ms: u64,
}

impl Default for AccumulateCfg {
    fn default() -> Self {
        Self::from_options(&ReconOptions::default())
    }
}

impl AccumulateCfg {
    pub fn from_options(opts: &ReconOptions) -> Self {
        Self { max_pages: opts.max_pages, retry_tries: opts.retry_tries, retry_delay_ms: opts.retry_delay_ms }
    }
}

pub struct Accumulator<'a> {
    fetcher: &'a dyn PageFetcher,
    gate: &'a RateGate,
    cfg: AccumulateCfg,
    cancel: CancelToken,
    progress: Option<&'a ProgressScope>,
}

impl<'a> Accumulator<'a> {
    pub fn new(fetcher: &'a dyn PageFetcher, gate: &'a RateGate, cfg: AccumulateCfg) -> Self {
        Self { fetcher, gate, cfg, cancel: CancelToken::new(), progress: None }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Tick `progress` once per page applied.
    pub fn with_progress(mut self, progress: &'a ProgressScope) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Fetch every page of `content_id` and return the first-seen ordered set.
    pub fn accumulate(&self, content_id: &ContentId) -> Result<ReplierSet, AccumulationError> {
        let mut set = ReplierSet::new();
        let mut pages = 0usize;
        let mut state = PageState::Fetching(None);

        while let PageState::Fetching(cursor) = state {
            if self.cancel.is_cancelled() {
                tracing::info!(%content_id, pages, repliers = set.len(), "accumulation cancelled");
                return Err(AccumulationError::Cancelled { content_id: content_id.clone(), partial: set });
            }
            if pages >= self.cfg.max_pages {
                tracing::warn!(%content_id, pages, "page ceiling reached before the thread ended");
                return Err(AccumulationError::PaginationExceeded { content_id: content_id.clone(), pages, partial: set });
            }

            let page = match self.fetch_one(content_id, cursor.as_ref()) {
                Ok(p) => p,
                Err(FetchError::Cancelled) => {
                    tracing::info!(%content_id, pages, repliers = set.len(), "accumulation cancelled during retries");
                    return Err(AccumulationError::Cancelled { content_id: content_id.clone(), partial: set });
                }
                Err(source @ FetchError::Auth(_)) => {
                    return Err(AccumulationError::Auth { content_id: content_id.clone(), source });
                }
                Err(FetchError::Malformed(msg)) => {
                    tracing::warn!(%content_id, page = pages + 1, %msg, "malformed page treated as empty and final");
                    Page::default()
                }
                Err(source) => {
                    return Err(AccumulationError::Failed { content_id: content_id.clone(), partial: set, source });
                }
            };
            pages += 1;

            if self.cancel.is_cancelled() {
                // the call finished after cancellation; drop its result
                return Err(AccumulationError::Cancelled { content_id: content_id.clone(), partial: set });
            }

            let added = set.extend_page(page.replies);
            if let Some(p) = self.progress {
                p.inc_items(1);
            }
            tracing::debug!(%content_id, page = pages, added, total = set.len(), more = page.next.is_some(), "page applied");

            state = match page.next {
                None => PageState::Done,
                Some(next) if cursor.as_ref().is_some_and(|c| c.token() == next.token()) => {
                    tracing::warn!(%content_id, pages, token = next.token(), "API returned the cursor it was given");
                    return Err(AccumulationError::PaginationExceeded { content_id: content_id.clone(), pages, partial: set });
                }
                Some(next) => PageState::Fetching(Some(next)),
            };
        }

        tracing::info!(%content_id, pages, repliers = set.len(), "accumulated");
        Ok(set)
    }

    fn fetch_one(&self, content_id: &ContentId, cursor: Option<&ContinuationCursor>) -> Result<Page, FetchError> {
        if let Some(c) = cursor {
            if !c.issued_for(content_id) {
                return Err(FetchError::CursorMismatch { issued_for: c.content_id().clone(), used_with: content_id.clone() });
            }
        }
        let pause = if cursor.is_some() { Pause::Page } else { Pause::Subject };
        let stop = || self.cancel.is_cancelled();
        with_backoff("fetch_page", self.cfg.retry_tries, self.cfg.retry_delay_ms, stop, || {
            self.gate.wait(pause);
            self.fetcher.fetch_page(content_id, cursor)
        })
    }
}
