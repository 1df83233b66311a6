//! Verification counters and the recent verdict log
//!
//! Both are pull-based: the gate records, and whoever displays or exports
//! statistics reads a [`Totals`] copy or drains the verdict ring.

use crate::session::{Conclusion, Verdict};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::net::IpAddr;
use std::time::Duration;

/// Verdicts kept for draining before the oldest are dropped
pub const RECENT_VERDICTS: usize = 256;

/// One finished verification
#[derive(Debug, Clone, PartialEq)]
pub struct VerdictEvent {
    pub address: IpAddr,
    pub verdict: Verdict,
    /// Failure reason, `None` for verified sessions
    pub reason: Option<String>,
    pub elapsed: Duration,
}

impl From<&Conclusion> for VerdictEvent {
    fn from(conclusion: &Conclusion) -> Self {
        Self {
            address: conclusion.address,
            verdict: conclusion.verdict,
            reason: conclusion.reason.as_ref().map(ToString::to_string),
            elapsed: conclusion.elapsed,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Totals {
    pub attempted: u64,
    pub verified: u64,
    pub blacklisted: u64,
    pub inconclusive: u64,
    /// Mean verification time of verified sessions, in milliseconds
    pub average_verification_ms: f64,
}

#[derive(Debug, Default)]
struct StatsInner {
    totals: Totals,
    recent: VecDeque<VerdictEvent>,
}

#[derive(Debug, Default)]
pub struct Statistics {
    inner: Mutex<StatsInner>,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_attempt(&self) {
        self.inner.lock().totals.attempted += 1;
    }

    pub fn record(&self, conclusion: &Conclusion) {
        let mut inner = self.inner.lock();
        let totals = &mut inner.totals;

        match conclusion.verdict {
            Verdict::Verified => {
                totals.verified += 1;
                let sample = conclusion.elapsed.as_secs_f64() * 1000.0;
                // Running mean over verified sessions only
                totals.average_verification_ms +=
                    (sample - totals.average_verification_ms) / totals.verified as f64;
            }
            Verdict::Blacklisted => totals.blacklisted += 1,
            Verdict::Inconclusive => totals.inconclusive += 1,
        }

        if inner.recent.len() == RECENT_VERDICTS {
            inner.recent.pop_front();
        }
        inner.recent.push_back(VerdictEvent::from(conclusion));
    }

    pub fn totals(&self) -> Totals {
        self.inner.lock().totals
    }

    /// Takes every buffered verdict, oldest first
    pub fn drain_verdicts(&self) -> Vec<VerdictEvent> {
        self.inner.lock().recent.drain(..).collect()
    }
}
