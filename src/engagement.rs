//! Engagement rate of a post: summed engagement counts over impressions.

use anyhow::{bail, Context, Result};

/// `sum(engagements) / impressions * 100`, rounded to two decimals.
///
/// `engagements` is a comma-separated list of non-negative counts (likes,
/// reposts, replies, ...). Blank entries are ignored; anything else that does
/// not parse is an error, as is a zero impression count.
pub fn engagement_rate(engagements: &str, impressions: u64) -> Result<f64> {
    if impressions == 0 {
        bail!("impressions must be greater than zero");
    }
    let mut total: u64 = 0;
    for (i, raw) in engagements.split(',').enumerate() {
        let s = raw.trim();
        if s.is_empty() {
            continue;
        }
        let n: u64 = s.parse().with_context(|| format!("engagement entry {} is not a count: {s:?}", i + 1))?;
        total = total.saturating_add(n);
    }
    let rate = total as f64 / impressions as f64 * 100.0;
    Ok((rate * 100.0).round() / 100.0)
}
