//! Progress reporting: count bars for subjects checked and pages fetched.

use indicatif::{ProgressBar, ProgressStyle};

fn count_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "{spinner:.green} {msg} {pos}/{len} [{bar:.cyan/blue}] {percent:>3}%  \
         elapsed: {elapsed_precise}  eta: {eta_precise}"
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("█▉▊▋▌▍▎▏  ")
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} {msg} {pos} pages  elapsed: {elapsed_precise}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// A small wrapper around `indicatif` bars. A disabled scope is a hidden bar,
/// so callers never branch on whether progress is on.
/// - `count(..)` for a known number of subjects
/// - `spinner(..)` for open-ended pagination
pub struct ProgressScope {
    pb: ProgressBar,
}

impl ProgressScope {
    pub fn count<T: Into<String>>(enabled: bool, label: T, total: u64) -> Self {
        if !enabled {
            return Self::hidden();
        }
        let pb = ProgressBar::new(total);
        pb.set_style(count_style());
        let label = label.into();
        if !label.is_empty() {
            pb.set_message(label);
        }
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        Self { pb }
    }

    pub fn spinner<T: Into<String>>(enabled: bool, label: T) -> Self {
        if !enabled {
            return Self::hidden();
        }
        let pb = ProgressBar::new_spinner();
        pb.set_style(spinner_style());
        pb.set_message(label.into());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        Self { pb }
    }

    pub fn hidden() -> Self {
        Self { pb: ProgressBar::hidden() }
    }

    #[inline] pub fn inc_items(&self, delta: u64) { self.pb.inc(delta); }
    pub fn finish<T: Into<String>>(&self, msg: T) { self.pb.finish_with_message(msg.into()); }
}
