//! Global pacing gate shared by every outbound call of a run.
//!
//! Callers reserve the next permitted slot under a short lock, then sleep
//! outside it, so concurrent workers queue up behind each other instead of
//! spinning. Spacing is measured from the previous reserved slot, whoever
//! reserved it.

use crate::config::ReconOptions;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::sleep;
use std::time::{Duration, Instant};

/// Which minimum spacing applies to the call about to be made.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pause {
    /// Next page of a thread already being paginated.
    Page,
    /// First call on behalf of a new subject (profile lookup, first page).
    Subject,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Pacing {
    pub page_delay: Duration,
    pub subject_delay: Duration,
}

impl Pacing {
    pub fn from_options(opts: &ReconOptions) -> Self {
        Self { page_delay: opts.page_delay(), subject_delay: opts.subject_delay() }
    }
}

pub struct RateGate {
    pacing: Pacing,
    last_slot: Mutex<Option<Instant>>,
    calls: AtomicU64,
}

impl RateGate {
    pub fn new(pacing: Pacing) -> Self {
        Self { pacing, last_slot: Mutex::new(None), calls: AtomicU64::new(0) }
    }

    /// No spacing at all; calls are only counted.
    pub fn unpaced() -> Self {
        Self::new(Pacing::default())
    }

    pub fn pacing(&self) -> Pacing {
        self.pacing
    }

    /// Block until the caller may issue its call. Returns the granted slot.
    pub fn wait(&self, pause: Pause) -> Instant {
        let spacing = match pause {
            Pause::Page => self.pacing.page_delay,
            Pause::Subject => self.pacing.subject_delay,
        };
        let slot = {
            let mut last = self.last_slot.lock();
            let now = Instant::now();
            let slot = match *last {
                Some(prev) => (prev + spacing).max(now),
                None => now,
            };
            *last = Some(slot);
            slot
        };
        self.calls.fetch_add(1, Ordering::Relaxed);

        let now = Instant::now();
        if slot > now {
            let d = slot - now;
            tracing::trace!(?pause, wait_ms = d.as_millis() as u64, "pacing");
            sleep(d);
        }
        slot
    }

    /// Number of calls admitted so far.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}
