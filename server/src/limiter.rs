//! Per-address reconnect limiter

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::time::{Duration, Instant};

/// Allows at most `limit` verification attempts per address in any
/// sliding `window`.
#[derive(Debug)]
pub struct AttemptLimiter {
    limit: usize,
    window: Duration,
    attempts: Mutex<HashMap<IpAddr, VecDeque<Instant>>>,
}

impl AttemptLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit: limit.max(1) as usize,
            window,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    /// Records an attempt, or returns false if the address is over its limit.
    pub fn try_acquire(&self, address: IpAddr) -> bool {
        self.try_acquire_at(address, Instant::now())
    }

    pub fn try_acquire_at(&self, address: IpAddr, now: Instant) -> bool {
        let mut attempts = self.attempts.lock();
        let history = attempts.entry(address).or_default();
        Self::prune(history, self.window, now);

        if history.len() >= self.limit {
            return false;
        }
        history.push_back(now);
        true
    }

    /// Forgets addresses without attempts inside the window.
    pub fn purge_at(&self, now: Instant) -> usize {
        let window = self.window;
        let mut attempts = self.attempts.lock();
        let before = attempts.len();
        attempts.retain(|_, history| {
            Self::prune(history, window, now);
            !history.is_empty()
        });
        before - attempts.len()
    }

    pub fn tracked(&self) -> usize {
        self.attempts.lock().len()
    }

    fn prune(history: &mut VecDeque<Instant>, window: Duration, now: Instant) {
        while let Some(oldest) = history.front() {
            if now.saturating_duration_since(*oldest) < window {
                break;
            }
            history.pop_front();
        }
    }
}
