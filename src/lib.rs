mod config;
mod error;
mod model;
mod util;

mod fetcher;
mod gate;
mod concurrency;
mod progress;

mod accumulate;
mod resolver;
mod reconcile;

mod engagement;
mod report;

pub use crate::config::ReconOptions;
pub use crate::error::{AccumulationError, FetchError, RunError};
pub use crate::model::{ContentId, ContinuationCursor, Page, ReplierRecord, ReplierSet, Username};

// outbound seams; tests and embedders supply their own implementations
pub use crate::fetcher::{parse_pinned, parse_replies_page, HttpFetcher, PageFetcher, PinnedLookup};

pub use crate::gate::{Pacing, Pause, RateGate};
pub use crate::concurrency::{map_subjects_limited, CancelToken};
pub use crate::progress::ProgressScope;

pub use crate::accumulate::{AccumulateCfg, Accumulator};
pub use crate::resolver::PinnedResolver;
pub use crate::reconcile::{
    missing_from, unique_to_first, ComparisonReport, CoverageReport, ReconciliationResult, Reconciler, SubjectOutcome,
    SubjectResult,
};

pub use crate::engagement::engagement_rate;
pub use crate::report::{
    outcome_cell, render_comparison, render_coverage_tsv, render_repliers, write_comparison, write_coverage,
    write_repliers, write_report, ReplierRow, ReportFormat,
};

pub use crate::util::{init_tracing_once, replace_file_atomic, tmp_path_for, with_backoff};
