//! Reconciliation runs: coverage mode (does every baseline member's pinned
//! post have the rest of the baseline among its repliers?) and comparison
//! mode (who replied to the first post but not the second?).
//!
//! Subject-level trouble is recorded as that subject's outcome. Only a
//! rejected credential or a cancellation ends a run early, and then the
//! outcomes already settled travel with the error.

use crate::accumulate::{AccumulateCfg, Accumulator};
use crate::concurrency::{map_subjects_limited, CancelToken};
use crate::config::ReconOptions;
use crate::error::{AccumulationError, FetchError, RunError};
use crate::fetcher::{HttpFetcher, PageFetcher, PinnedLookup};
use crate::gate::{Pacing, RateGate};
use crate::model::{ContentId, ReplierRecord, ReplierSet, Username};
use crate::progress::ProgressScope;
use crate::resolver::PinnedResolver;
use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;

/// What coverage mode concluded for one baseline member.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubjectOutcome {
    NoPinnedContent,
    FullyCovered,
    /// Baseline members absent from the pinned post's repliers, baseline order.
    Missing { usernames: Vec<Username> },
    Failed { reason: String },
}

impl SubjectOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, SubjectOutcome::Failed { .. })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SubjectResult {
    pub subject: Username,
    pub pinned: Option<ContentId>,
    pub outcome: SubjectOutcome,
}

/// Per-subject outcomes of one run, in baseline order. `planned` is the
/// number of subjects the run set out to check, so an aborted run's partial
/// result still knows how big the baseline was.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationResult {
    planned: usize,
    entries: Vec<SubjectResult>,
}

impl ReconciliationResult {
    pub fn planned(&self) -> usize {
        self.planned
    }
    /// True when every planned subject has an outcome.
    pub fn is_complete(&self) -> bool {
        self.entries.len() == self.planned
    }
    pub fn get(&self, subject: &Username) -> Option<&SubjectOutcome> {
        self.entries.iter().find(|e| &e.subject == subject).map(|e| &e.outcome)
    }
    pub fn entries(&self) -> &[SubjectResult] {
        &self.entries
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    pub fn failed(&self) -> impl Iterator<Item = &SubjectResult> {
        self.entries.iter().filter(|e| e.outcome.is_failure())
    }
    pub fn succeeded(&self) -> impl Iterator<Item = &SubjectResult> {
        self.entries.iter().filter(|e| !e.outcome.is_failure())
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct CoverageReport {
    pub baseline: ContentId,
    pub baseline_size: usize,
    pub result: ReconciliationResult,
}

#[derive(Clone, Debug, Serialize)]
pub struct ComparisonReport {
    pub first: ContentId,
    pub second: ContentId,
    pub first_total: usize,
    pub second_total: usize,
    pub unique_to_first: Vec<ReplierRecord>,
}

/// `baseline - repliers`, in baseline order.
pub fn missing_from(baseline: &ReplierSet, repliers: &ReplierSet) -> Vec<Username> {
    baseline.difference(repliers).into_iter().map(|r| r.username.clone()).collect()
}

/// Full records of `first` whose username never replied to `second`.
/// Not symmetric: swapping the arguments answers a different question.
pub fn unique_to_first(first: &ReplierSet, second: &ReplierSet) -> Vec<ReplierRecord> {
    first.difference(second).into_iter().cloned().collect()
}

enum Abort {
    Auth(String),
    Cancelled,
}

/// Entry point for both modes. Owns the outbound collaborators, the shared
/// pacing gate, and the caller's cancellation token.
pub struct Reconciler {
    opts: ReconOptions,
    fetcher: Arc<dyn PageFetcher>,
    lookup: Arc<dyn PinnedLookup>,
    gate: Arc<RateGate>,
    cancel: CancelToken,
}

impl Reconciler {
    /// Production wiring: one HTTP client serves both page and profile calls.
    pub fn new(opts: ReconOptions) -> Result<Self> {
        let http = Arc::new(HttpFetcher::new(&opts)?);
        Ok(Self::with_parts(opts, http.clone(), http))
    }

    pub fn with_parts(opts: ReconOptions, fetcher: Arc<dyn PageFetcher>, lookup: Arc<dyn PinnedLookup>) -> Self {
        let gate = Arc::new(RateGate::new(Pacing::from_options(&opts)));
        Self { opts, fetcher, lookup, gate, cancel: CancelToken::new() }
    }

    /// Replace the pacing gate (e.g. share one gate between reconcilers).
    pub fn with_gate(mut self, gate: Arc<RateGate>) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn gate(&self) -> &RateGate {
        &self.gate
    }

    fn accumulator<'a>(&'a self, cancel: &CancelToken) -> Accumulator<'a> {
        Accumulator::new(self.fetcher.as_ref(), &self.gate, AccumulateCfg::from_options(&self.opts)).with_cancel(cancel.clone())
    }

    fn accumulate_or_abort(&self, id: &ContentId, cancel: &CancelToken, label: &str) -> Result<ReplierSet, RunError> {
        let pb = ProgressScope::spinner(self.opts.progress, label.to_string());
        let out = self.accumulator(cancel).with_progress(&pb).accumulate(id);
        pb.finish(format!("{label}: done"));
        out.map_err(|e| run_error_for(id, e, ReconciliationResult::default()))
    }

    /// Accumulate the baseline post's repliers, then check each of them.
    pub fn run_coverage_check(&self, baseline_id: &ContentId) -> Result<CoverageReport, RunError> {
        let run = self.cancel.child();
        let baseline = self.accumulate_or_abort(baseline_id, &run, &format!("Baseline {baseline_id}"))?;
        tracing::info!(baseline = %baseline_id, members = baseline.len(), "baseline accumulated");
        let result = self.coverage_with_token(&baseline, &run)?;
        Ok(CoverageReport { baseline: baseline_id.clone(), baseline_size: baseline.len(), result })
    }

    /// Coverage loop over an already accumulated baseline.
    pub fn coverage_from_baseline(&self, baseline: &ReplierSet) -> Result<ReconciliationResult, RunError> {
        self.coverage_with_token(baseline, &self.cancel.child())
    }

    fn coverage_with_token(&self, baseline: &ReplierSet, run: &CancelToken) -> Result<ReconciliationResult, RunError> {
        let subjects: Vec<&ReplierRecord> = baseline.iter().collect();
        let pb = ProgressScope::count(self.opts.progress, "Checking pinned posts", subjects.len() as u64);

        let checked = map_subjects_limited(&subjects, self.opts.fan_out, |rec| {
            let r = self.check_subject(&rec.username, baseline, run);
            pb.inc_items(1);
            r
        });

        let mut result = ReconciliationResult { planned: subjects.len(), entries: Vec::with_capacity(subjects.len()) };
        let mut abort: Option<Abort> = None;
        for (rec, outcome) in subjects.iter().zip(checked) {
            match outcome {
                Ok((pinned, outcome)) => {
                    result.entries.push(SubjectResult { subject: rec.username.clone(), pinned, outcome })
                }
                Err(Abort::Auth(reason)) => {
                    if !matches!(abort, Some(Abort::Auth(_))) {
                        abort = Some(Abort::Auth(reason));
                    }
                }
                Err(Abort::Cancelled) => {
                    if abort.is_none() {
                        abort = Some(Abort::Cancelled);
                    }
                }
            }
        }

        let failed = result.failed().count();
        pb.finish(format!("checked {} ({} failed)", result.len(), failed));
        match abort {
            Some(Abort::Auth(reason)) => {
                tracing::error!(%reason, settled = result.len(), "run aborted: credential rejected");
                Err(RunError::Auth { reason, partial: result })
            }
            Some(Abort::Cancelled) => {
                tracing::info!(settled = result.len(), "run cancelled");
                Err(RunError::Cancelled { partial: result })
            }
            None => {
                tracing::info!(subjects = result.len(), failed, "coverage check complete");
                Ok(result)
            }
        }
    }

    fn check_subject(
        &self,
        username: &Username,
        baseline: &ReplierSet,
        run: &CancelToken,
    ) -> Result<(Option<ContentId>, SubjectOutcome), Abort> {
        if run.is_cancelled() {
            return Err(Abort::Cancelled);
        }
        let resolver = PinnedResolver::new(self.lookup.as_ref(), &self.gate, self.opts.retry_tries, self.opts.retry_delay_ms)
            .with_cancel(run.clone());
        let pinned = match resolver.resolve(username) {
            Ok(Some(id)) => id,
            Ok(None) => return Ok((None, SubjectOutcome::NoPinnedContent)),
            Err(FetchError::Cancelled) => return Err(Abort::Cancelled),
            Err(e) => return Err(self.abort_for(e, run)),
        };
        if run.is_cancelled() {
            return Err(Abort::Cancelled);
        }

        match self.accumulator(run).accumulate(&pinned) {
            Ok(repliers) => {
                let missing = missing_from(baseline, &repliers);
                let outcome = if missing.is_empty() {
                    SubjectOutcome::FullyCovered
                } else {
                    SubjectOutcome::Missing { usernames: missing }
                };
                Ok((Some(pinned), outcome))
            }
            Err(AccumulationError::Auth { source, .. }) => Err(self.abort_for(source, run)),
            Err(AccumulationError::Cancelled { .. }) => Err(Abort::Cancelled),
            Err(e) => {
                tracing::warn!(%username, pinned = %pinned, error = %e, "subject failed");
                Ok((Some(pinned), SubjectOutcome::Failed { reason: e.to_string() }))
            }
        }
    }

    fn abort_for(&self, e: FetchError, run: &CancelToken) -> Abort {
        run.cancel();
        Abort::Auth(e.to_string())
    }

    /// Every replier of one post, first-seen order.
    pub fn collect_repliers(&self, content_id: &ContentId) -> Result<ReplierSet, RunError> {
        let run = self.cancel.child();
        let set = self.accumulate_or_abort(content_id, &run, &format!("Replies to {content_id}"))?;
        tracing::info!(%content_id, repliers = set.len(), "repliers collected");
        Ok(set)
    }

    /// Accumulate both posts fully, then keep the first post's repliers
    /// that never replied to the second.
    pub fn run_comparison(&self, first: &ContentId, second: &ContentId) -> Result<ComparisonReport, RunError> {
        let run = self.cancel.child();
        let ids = [first.clone(), second.clone()];
        let sets = map_subjects_limited(&ids, self.opts.fan_out.min(2), |id| {
            let out = self.accumulate_or_abort(id, &run, &format!("Replies to {id}"));
            if matches!(out, Err(RunError::Auth { .. })) {
                run.cancel();
            }
            out
        });

        // an auth failure on one side cancels the other; report the cause
        if let Some(pos) = sets.iter().position(|s| matches!(s, Err(RunError::Auth { .. }))) {
            if let Some(Err(e)) = sets.into_iter().nth(pos) {
                return Err(e);
            }
            return Err(RunError::Cancelled { partial: ReconciliationResult::default() });
        }
        let mut sets = sets.into_iter();
        let (a, b) = match (sets.next(), sets.next()) {
            (Some(a), Some(b)) => (a?, b?),
            _ => return Err(RunError::Cancelled { partial: ReconciliationResult::default() }),
        };

        let unique = unique_to_first(&a, &b);
        tracing::info!(first = %first, second = %second, first_total = a.len(), second_total = b.len(), unique = unique.len(), "comparison complete");
        Ok(ComparisonReport {
            first: first.clone(),
            second: second.clone(),
            first_total: a.len(),
            second_total: b.len(),
            unique_to_first: unique,
        })
    }
}

fn run_error_for(id: &ContentId, e: AccumulationError, partial: ReconciliationResult) -> RunError {
    match e {
        AccumulationError::Auth { source, .. } => RunError::Auth { reason: source.to_string(), partial },
        AccumulationError::Cancelled { .. } => RunError::Cancelled { partial },
        other => RunError::Accumulation { content_id: id.clone(), source: other },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> ReplierSet {
        names.iter().map(|n| ReplierRecord::new(n)).collect()
    }

    #[test]
    fn missing_is_baseline_minus_repliers() {
        let m = missing_from(&set(&["a", "b", "c"]), &set(&["b", "c"]));
        assert_eq!(m, vec![Username::new("a")]);
        assert!(missing_from(&set(&["a", "b", "c"]), &set(&["a", "b", "c", "d"])).is_empty());
    }

    #[test]
    fn comparison_is_asymmetric() {
        let a = set(&["u1", "u2"]);
        let b = set(&["u2", "u3"]);
        let ab: Vec<String> = unique_to_first(&a, &b).into_iter().map(|r| r.username.to_string()).collect();
        let ba: Vec<String> = unique_to_first(&b, &a).into_iter().map(|r| r.username.to_string()).collect();
        assert_eq!(ab, vec!["u1"]);
        assert_eq!(ba, vec!["u3"]);
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let v = serde_json::to_value(SubjectOutcome::Missing { usernames: vec![Username::new("a")] }).unwrap();
        assert_eq!(v, serde_json::json!({"status": "missing", "usernames": ["a"]}));
        let v = serde_json::to_value(SubjectOutcome::NoPinnedContent).unwrap();
        assert_eq!(v, serde_json::json!({"status": "no_pinned_content"}));
    }
}
