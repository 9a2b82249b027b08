use anyhow::{anyhow, Context, Result};
use std::fmt;
use std::time::Duration;

pub const DEFAULT_REPLIES_URL: &str = "https://twitter154.p.rapidapi.com/tweet/replies";
pub const DEFAULT_CONTINUATION_URL: &str = "https://twitter154.p.rapidapi.com/tweet/replies/continuation";
pub const DEFAULT_PROFILE_URL: &str = "https://twitter241.p.rapidapi.com/user";

/// User-facing options with sensible defaults and builder chaining.
#[derive(Clone)]
pub struct ReconOptions {
    pub replies_url: String,
    pub continuation_url: String,
    pub profile_url: String,
    pub api_key: String,

    // pacing
    pub page_delay_ms: u64,           // pause before each continuation page
    pub subject_delay_ms: u64,        // pause before each per-subject lookup
    pub fan_out: usize,               // subjects in flight at once; 1 = sequential

    // guards
    pub max_pages: usize,             // ceiling per accumulation
    pub retry_tries: usize,           // attempts per call, including the first
    pub retry_delay_ms: u64,          // linear backoff step
    pub request_timeout_secs: u64,

    pub progress: bool,               // show progress bar
}

impl Default for ReconOptions {
    fn default() -> Self {
        Self {
            replies_url: DEFAULT_REPLIES_URL.to_string(),
            continuation_url: DEFAULT_CONTINUATION_URL.to_string(),
            profile_url: DEFAULT_PROFILE_URL.to_string(),
            api_key: String::new(),

            page_delay_ms: 2000,
            subject_delay_ms: 1000,
            fan_out: 1, // upstream quotas are tight; opt in to concurrency

            max_pages: 500,
            retry_tries: 3,
            retry_delay_ms: 500,
            request_timeout_secs: 30,

            progress: true,
        }
    }
}

// Keep the credential out of logs.
impl fmt::Debug for ReconOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconOptions")
            .field("replies_url", &self.replies_url)
            .field("continuation_url", &self.continuation_url)
            .field("profile_url", &self.profile_url)
            .field("api_key", &if self.api_key.is_empty() { "<unset>" } else { "<redacted>" })
            .field("page_delay_ms", &self.page_delay_ms)
            .field("subject_delay_ms", &self.subject_delay_ms)
            .field("fan_out", &self.fan_out)
            .field("max_pages", &self.max_pages)
            .field("retry_tries", &self.retry_tries)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("progress", &self.progress)
            .finish()
    }
}

fn env_u64(name: &str) -> Result<Option<u64>> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => v
            .trim()
            .parse::<u64>()
            .map(Some)
            .with_context(|| format!("{name} must be a non-negative integer, got {v:?}")),
        _ => Ok(None),
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl ReconOptions {
    /// Defaults overlaid with `RECON_*` environment variables.
    /// `RECON_API_KEY` is required.
    pub fn from_env() -> Result<Self> {
        let mut opts = Self::default();
        opts.api_key = env_string("RECON_API_KEY").ok_or_else(|| anyhow!("RECON_API_KEY is not set"))?;
        if let Some(u) = env_string("RECON_REPLIES_URL") { opts.replies_url = u; }
        if let Some(u) = env_string("RECON_CONTINUATION_URL") { opts.continuation_url = u; }
        if let Some(u) = env_string("RECON_PROFILE_URL") { opts.profile_url = u; }
        if let Some(n) = env_u64("RECON_PAGE_DELAY_MS")? { opts.page_delay_ms = n; }
        if let Some(n) = env_u64("RECON_SUBJECT_DELAY_MS")? { opts.subject_delay_ms = n; }
        if let Some(n) = env_u64("RECON_FAN_OUT")? { opts = opts.with_fan_out(n as usize); }
        if let Some(n) = env_u64("RECON_MAX_PAGES")? { opts = opts.with_max_pages(n as usize); }
        Ok(opts)
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = key.into();
        self
    }
    /// Point all three endpoints at one base (tests, proxies).
    pub fn with_base_url(mut self, base: impl AsRef<str>) -> Self {
        let base = base.as_ref().trim_end_matches('/');
        self.replies_url = format!("{base}/tweet/replies");
        self.continuation_url = format!("{base}/tweet/replies/continuation");
        self.profile_url = format!("{base}/user");
        self
    }
    pub fn with_replies_url(mut self, url: impl Into<String>) -> Self {
        self.replies_url = url.into();
        self
    }
    pub fn with_continuation_url(mut self, url: impl Into<String>) -> Self {
        self.continuation_url = url.into();
        self
    }
    pub fn with_profile_url(mut self, url: impl Into<String>) -> Self {
        self.profile_url = url.into();
        self
    }
    pub fn with_page_delay_ms(mut self, ms: u64) -> Self {
        self.page_delay_ms = ms;
        self
    }
    pub fn with_subject_delay_ms(mut self, ms: u64) -> Self {
        self.subject_delay_ms = ms;
        self
    }
    /// Zero pacing everywhere.
    pub fn unpaced(self) -> Self {
        self.with_page_delay_ms(0).with_subject_delay_ms(0).with_retry_delay_ms(0)
    }
    pub fn with_fan_out(mut self, n: usize) -> Self {
        self.fan_out = n.max(1);
        self
    }
    pub fn with_max_pages(mut self, n: usize) -> Self {
        self.max_pages = n.max(1);
        self
    }
    pub fn with_retry_tries(mut self, n: usize) -> Self {
        self.retry_tries = n.max(1);
        self
    }
    pub fn with_retry_delay_ms(mut self, ms: u64) -> Self {
        self.retry_delay_ms = ms;
        self
    }
    pub fn with_request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs.max(1);
        self
    }
    pub fn with_progress(mut self, yes: bool) -> Self {
        self.progress = yes;
        self
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }
    pub fn subject_delay(&self) -> Duration {
        Duration::from_millis(self.subject_delay_ms)
    }
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_clamp_to_sane_minimums() {
        let o = ReconOptions::default().with_fan_out(0).with_max_pages(0).with_retry_tries(0);
        assert_eq!(o.fan_out, 1);
        assert_eq!(o.max_pages, 1);
        assert_eq!(o.retry_tries, 1);
    }

    #[test]
    fn base_url_sets_all_endpoints() {
        let o = ReconOptions::default().with_base_url("http://127.0.0.1:9000/");
        assert_eq!(o.replies_url, "http://127.0.0.1:9000/tweet/replies");
        assert_eq!(o.continuation_url, "http://127.0.0.1:9000/tweet/replies/continuation");
        assert_eq!(o.profile_url, "http://127.0.0.1:9000/user");
    }

    #[test]
    fn debug_redacts_key() {
        let o = ReconOptions::default().with_api_key("sekrit");
        let s = format!("{o:?}");
        assert!(!s.contains("sekrit"));
        assert!(s.contains("<redacted>"));
    }
}
