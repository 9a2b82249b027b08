use crate::error::FetchError;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::Duration;

static INIT_ONCE: std::sync::Once = std::sync::Once::new();
pub fn init_tracing_once() {
    INIT_ONCE.call_once(|| {
        let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let _ = tracing_subscriber::fmt().with_env_filter(env_filter).with_writer(std::io::stderr).try_init();
    });
}

/// Run `op` up to `tries` times, sleeping `delay_ms * attempt` between
/// attempts, for as long as it fails with a retryable error.
/// Non-retryable errors are returned immediately. Once `stop()` turns true no
/// further attempt is made and `FetchError::Cancelled` is returned.
pub fn with_backoff<T, S, F>(label: &str, tries: usize, delay_ms: u64, stop: S, mut op: F) -> std::result::Result<T, FetchError>
where
    S: Fn() -> bool,
    F: FnMut() -> std::result::Result<T, FetchError>,
{
    let tries = tries.max(1);
    let mut attempt = 0usize;
    loop {
        attempt += 1;
        if attempt > 1 && stop() {
            tracing::debug!(op = label, attempt, "retry abandoned after cancellation");
            return Err(FetchError::Cancelled);
        }
        match op() {
            Ok(v) => {
                if attempt > 1 {
                    tracing::debug!(op = label, attempt, "succeeded after retries");
                }
                return Ok(v);
            }
            Err(e) if e.is_retryable() && attempt < tries => {
                if stop() {
                    tracing::debug!(op = label, attempt, error = %e, "not retrying after cancellation");
                    return Err(FetchError::Cancelled);
                }
                let wait = Duration::from_millis(delay_ms.saturating_mul(attempt as u64));
                tracing::debug!(op = label, attempt, tries, wait_ms = wait.as_millis() as u64, error = %e, "retrying after transient error");
                sleep(wait);
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::warn!(op = label, attempts = attempt, error = %e, "retries exhausted");
                }
                return Err(e);
            }
        }
    }
}

/// Sibling temp path for `dest` (`report.tsv` -> `report.tsv.tmp`).
pub fn tmp_path_for(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    dest.with_file_name(name)
}

/// Move a finished temp file over `dest`. Falls back to copy + remove when
/// rename fails (e.g. across filesystems).
pub fn replace_file_atomic(tmp: &Path, dest: &Path) -> Result<()> {
    if dest.exists() {
        fs::remove_file(dest).with_context(|| format!("remove {}", dest.display()))?;
    }
    if fs::rename(tmp, dest).is_ok() {
        return Ok(());
    }
    fs::copy(tmp, dest).with_context(|| format!("copy {} -> {}", tmp.display(), dest.display()))?;
    fs::remove_file(tmp).with_context(|| format!("remove {}", tmp.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn retries_transient_until_success() {
        let calls = Cell::new(0);
        let out = with_backoff("t", 3, 0, || false, || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 { Err(FetchError::Transient("reset".into())) } else { Ok(7) }
        });
        assert_eq!(out.unwrap(), 7);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn gives_up_after_tries() {
        let calls = Cell::new(0);
        let out: std::result::Result<(), _> = with_backoff("t", 2, 0, || false, || {
            calls.set(calls.get() + 1);
            Err(FetchError::Transient("timeout".into()))
        });
        assert!(matches!(out, Err(FetchError::Transient(_))));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn auth_is_not_retried() {
        let calls = Cell::new(0);
        let out: std::result::Result<(), _> = with_backoff("t", 5, 0, || false, || {
            calls.set(calls.get() + 1);
            Err(FetchError::Auth("403".into()))
        });
        assert!(matches!(out, Err(FetchError::Auth(_))));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn stop_prevents_further_attempts() {
        let calls = Cell::new(0);
        let out: std::result::Result<(), _> = with_backoff("t", 5, 0, || calls.get() >= 2, || {
            calls.set(calls.get() + 1);
            Err(FetchError::Transient("reset".into()))
        });
        assert!(matches!(out, Err(FetchError::Cancelled)));
        assert_eq!(calls.get(), 2);
    }
}
