//! Report rendering and writing: coverage, comparison, and plain replier lists.
//!
//! Files are written to a sibling `.tmp` path and moved into place once
//! flushed, so a crashed run never leaves a half-written report behind.

use crate::model::{ContentId, ReplierRecord, ReplierSet};
use crate::reconcile::{ComparisonReport, CoverageReport, SubjectOutcome};
use crate::util::{replace_file_atomic, tmp_path_for};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Tsv,
    Json,
}

/// One row of a comparison or replier-list report.
#[derive(Debug, Serialize)]
pub struct ReplierRow<'a> {
    pub username: &'a str,
    pub display_name: &'a str,
    pub profile_url: String,
    pub profile_picture_url: &'a str,
    pub follower_count: u64,
}

impl<'a> From<&'a ReplierRecord> for ReplierRow<'a> {
    fn from(r: &'a ReplierRecord) -> Self {
        Self {
            username: r.username.as_str(),
            display_name: &r.display_name,
            profile_url: r.profile_url(),
            profile_picture_url: &r.profile_picture_url,
            follower_count: r.follower_count,
        }
    }
}

fn timestamp(at: OffsetDateTime) -> Result<String> {
    at.format(&Rfc3339).context("format report timestamp")
}

// tabs and newlines would break the row
fn cell(s: &str) -> String {
    s.replace(['\t', '\n', '\r'], " ")
}

/// `fully_covered`, `no_pinned_content`, `missing:a,b`, `failed:<reason>`.
pub fn outcome_cell(outcome: &SubjectOutcome) -> String {
    match outcome {
        SubjectOutcome::NoPinnedContent => "no_pinned_content".to_string(),
        SubjectOutcome::FullyCovered => "fully_covered".to_string(),
        SubjectOutcome::Missing { usernames } => {
            let names: Vec<String> = usernames.iter().map(|u| cell(u.as_str())).collect();
            format!("missing:{}", names.join(","))
        }
        SubjectOutcome::Failed { reason } => format!("failed:{}", cell(reason)),
    }
}

pub fn render_coverage_tsv(report: &CoverageReport, at: OffsetDateTime) -> Result<String> {
    let mut out = String::new();
    out.push_str(&format!("# generated\t{}\n", timestamp(at)?));
    out.push_str(&format!("# baseline\t{}\t{} members\n", report.baseline, report.baseline_size));
    if !report.result.is_complete() {
        out.push_str(&format!("# partial\t{} of {} subjects settled\n", report.result.len(), report.result.planned()));
    }
    out.push_str("username\toutcome\n");
    for e in report.result.entries() {
        out.push_str(&format!("{}\t{}\n", cell(e.subject.as_str()), outcome_cell(&e.outcome)));
    }
    Ok(out)
}

fn render_rows(rows: &[ReplierRow<'_>], summary: &str, format: ReportFormat, at: OffsetDateTime) -> Result<String> {
    match format {
        ReportFormat::Json => {
            let mut s = serde_json::to_string_pretty(rows).context("serialize replier rows")?;
            s.push('\n');
            Ok(s)
        }
        ReportFormat::Tsv => {
            let mut out = String::new();
            out.push_str(&format!("# generated\t{}\n", timestamp(at)?));
            out.push_str(&format!("# {summary}\t{} users\n", rows.len()));
            out.push_str("username\tdisplay_name\tprofile_url\tprofile_picture_url\tfollower_count\n");
            for r in rows {
                out.push_str(&format!(
                    "{}\t{}\t{}\t{}\t{}\n",
                    cell(r.username),
                    cell(r.display_name),
                    r.profile_url,
                    cell(r.profile_picture_url),
                    r.follower_count
                ));
            }
            Ok(out)
        }
    }
}

pub fn render_comparison(report: &ComparisonReport, format: ReportFormat, at: OffsetDateTime) -> Result<String> {
    let rows: Vec<ReplierRow<'_>> = report.unique_to_first.iter().map(ReplierRow::from).collect();
    let summary = format!(
        "replied to {} ({}) but not to {} ({})",
        report.first, report.first_total, report.second, report.second_total
    );
    render_rows(&rows, &summary, format, at)
}

/// Every replier of one post, first-seen order.
pub fn render_repliers(content_id: &ContentId, repliers: &ReplierSet, format: ReportFormat, at: OffsetDateTime) -> Result<String> {
    let rows: Vec<ReplierRow<'_>> = repliers.iter().map(ReplierRow::from).collect();
    render_rows(&rows, &format!("repliers to {content_id}"), format, at)
}

/// Write `body` to `dest` via a temp file in the same directory.
pub fn write_report(dest: &Path, body: &str) -> Result<()> {
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let tmp = tmp_path_for(dest);
    {
        let f = File::create(&tmp).with_context(|| format!("create {}", tmp.display()))?;
        let mut w = BufWriter::new(f);
        w.write_all(body.as_bytes()).with_context(|| format!("write {}", tmp.display()))?;
        w.flush().with_context(|| format!("flush {}", tmp.display()))?;
    }
    replace_file_atomic(&tmp, dest)?;
    tracing::info!(path = %dest.display(), bytes = body.len(), "report written");
    Ok(())
}

pub fn write_coverage(dest: &Path, report: &CoverageReport) -> Result<()> {
    write_report(dest, &render_coverage_tsv(report, OffsetDateTime::now_utc())?)
}

pub fn write_comparison(dest: &Path, report: &ComparisonReport, format: ReportFormat) -> Result<()> {
    write_report(dest, &render_comparison(report, format, OffsetDateTime::now_utc())?)
}

pub fn write_repliers(dest: &Path, content_id: &ContentId, repliers: &ReplierSet, format: ReportFormat) -> Result<()> {
    write_report(dest, &render_repliers(content_id, repliers, format, OffsetDateTime::now_utc())?)
}
