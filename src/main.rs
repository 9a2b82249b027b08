use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use replyrecon::{
    engagement_rate, init_tracing_once, render_comparison, render_coverage_tsv, render_repliers, write_comparison,
    write_coverage, write_repliers, ContentId, CoverageReport, ReconOptions, Reconciler, ReportFormat, RunError,
};
use std::path::PathBuf;

/// Reply reconciliation against a rate-limited social API.
#[derive(Parser)]
#[command(name = "replyrecon")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Write the report here instead of stdout
    #[arg(long, global = true)]
    out: Option<PathBuf>,

    /// Subjects checked concurrently (overrides RECON_FAN_OUT)
    #[arg(long, global = true)]
    fan_out: Option<usize>,

    /// Disable progress bars
    #[arg(long, global = true)]
    no_progress: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List everyone who replied to a post
    Repliers {
        /// Post ID or status URL
        post: String,
        /// Emit JSON instead of TSV
        #[arg(long)]
        json: bool,
    },

    /// Check that each replier of a post has the others among the repliers of their pinned post
    Coverage {
        /// Post ID or status URL
        post: String,
    },

    /// List users who replied to the first post but not to the second
    Compare {
        first: String,
        second: String,
        /// Emit JSON instead of TSV
        #[arg(long)]
        json: bool,
    },

    /// Engagement rate: summed engagements over impressions, in percent
    Rate {
        /// Comma-separated counts, e.g. 12,3,40
        #[arg(long)]
        engagements: String,
        #[arg(long)]
        impressions: u64,
    },
}

fn options(cli: &Cli) -> Result<ReconOptions> {
    let mut opts = ReconOptions::from_env().context("load configuration")?;
    if let Some(n) = cli.fan_out {
        opts = opts.with_fan_out(n);
    }
    Ok(opts.with_progress(!cli.no_progress))
}

fn emit_coverage(cli: &Cli, report: &CoverageReport) -> Result<()> {
    match &cli.out {
        Some(path) => write_coverage(path, report),
        None => {
            print!("{}", render_coverage_tsv(report, time::OffsetDateTime::now_utc())?);
            Ok(())
        }
    }
}

fn coverage(cli: &Cli, post: &str) -> Result<()> {
    let id = ContentId::parse(post)?;
    let rec = Reconciler::new(options(cli)?)?;
    match rec.run_coverage_check(&id) {
        Ok(report) => {
            let failed = report.result.failed().count();
            emit_coverage(cli, &report)?;
            eprintln!("checked {} subjects, {} failed", report.result.len(), failed);
            Ok(())
        }
        Err(e) => {
            // keep whatever was settled before the abort
            if let RunError::Auth { partial, .. } | RunError::Cancelled { partial } = &e {
                if !partial.is_empty() {
                    let report =
                        CoverageReport { baseline: id.clone(), baseline_size: partial.planned(), result: partial.clone() };
                    emit_coverage(cli, &report)?;
                    eprintln!("run aborted; {} of {} subjects settled and written", partial.len(), partial.planned());
                }
            }
            Err(e).with_context(|| format!("coverage check of {id}"))
        }
    }
}

fn repliers(cli: &Cli, post: &str, json: bool) -> Result<()> {
    let id = ContentId::parse(post)?;
    let rec = Reconciler::new(options(cli)?)?;
    let set = rec.collect_repliers(&id).with_context(|| format!("replies to {id}"))?;
    let format = if json { ReportFormat::Json } else { ReportFormat::Tsv };
    match &cli.out {
        Some(path) => write_repliers(path, &id, &set, format)?,
        None => print!("{}", render_repliers(&id, &set, format, time::OffsetDateTime::now_utc())?),
    }
    eprintln!("{} users replied to {id}", set.len());
    Ok(())
}

fn compare(cli: &Cli, first: &str, second: &str, json: bool) -> Result<()> {
    let a = ContentId::parse(first)?;
    let b = ContentId::parse(second)?;
    let rec = Reconciler::new(options(cli)?)?;
    let report = rec.run_comparison(&a, &b).with_context(|| format!("comparison of {a} against {b}"))?;
    let format = if json { ReportFormat::Json } else { ReportFormat::Tsv };
    match &cli.out {
        Some(path) => write_comparison(path, &report, format)?,
        None => print!("{}", render_comparison(&report, format, time::OffsetDateTime::now_utc())?),
    }
    eprintln!(
        "{} of {} repliers to {a} did not reply to {b}",
        report.unique_to_first.len(),
        report.first_total
    );
    Ok(())
}

fn main() -> Result<()> {
    init_tracing_once();
    let cli = Cli::parse();
    match &cli.command {
        Commands::Repliers { post, json } => repliers(&cli, post, *json),
        Commands::Coverage { post } => coverage(&cli, post),
        Commands::Compare { first, second, json } => compare(&cli, first, second, *json),
        Commands::Rate { engagements, impressions } => {
            let rate = engagement_rate(engagements, *impressions)?;
            println!("{rate:.2}%");
            Ok(())
        }
    }
}
