//! Per-connection guards
//!
//! [`IdleGuard`] closes a connection that stops sending bytes.
//! [`TeardownGuard`] makes sure a connection leaves the admission queue
//! and the `connecting` registry on every exit path, including early
//! returns and panics in the connection task.

use crate::gatekeeper::Gatekeeper;
use crate::queue::QueueTicket;
use log::debug;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Read watchdog that fires at most once
#[derive(Debug)]
pub struct IdleGuard {
    idle: Duration,
    last_read: Instant,
    fired: bool,
}

impl IdleGuard {
    pub fn new(idle: Duration, now: Instant) -> Self {
        Self {
            idle,
            last_read: now,
            fired: false,
        }
    }

    pub fn record_read(&mut self, now: Instant) {
        self.last_read = now;
    }

    pub fn deadline(&self) -> Instant {
        self.last_read + self.idle
    }

    /// Returns true exactly once, the first time the idle bound is exceeded.
    pub fn poll(&mut self, now: Instant) -> bool {
        if self.fired || now < self.deadline() {
            return false;
        }
        self.fired = true;
        true
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }

    pub fn idle(&self) -> Duration {
        self.idle
    }
}

/// Removes a connection's traces from the gate when dropped
pub struct TeardownGuard {
    gate: Arc<Gatekeeper>,
    address: IpAddr,
    ticket: Option<QueueTicket>,
    connecting: bool,
}

impl TeardownGuard {
    pub fn new(gate: Arc<Gatekeeper>, address: IpAddr) -> Self {
        Self {
            gate,
            address,
            ticket: None,
            connecting: false,
        }
    }

    pub fn set_ticket(&mut self, ticket: QueueTicket) {
        self.ticket = Some(ticket);
    }

    /// The connection left the queue and opened a session.
    pub fn mark_connecting(&mut self) {
        self.ticket = None;
        self.connecting = true;
    }

    /// The verdict was applied, which already cleared `connecting`.
    pub fn mark_concluded(&mut self) {
        self.ticket = None;
        self.connecting = false;
    }
}

impl Drop for TeardownGuard {
    fn drop(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            if self.gate.queue().cancel(ticket) {
                debug!("{} left the queue before release", self.address);
            } else {
                // Released, so the address was marked connecting
                self.connecting = true;
            }
        }
        if self.connecting && self.gate.connecting().remove(&self.address) {
            debug!("{} torn down mid-verification", self.address);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GateConfig;
    use crate::gatekeeper::Admission;
    use shared::ProtocolVersion;

    #[test]
    fn test_idle_guard_fires_once() {
        let start = Instant::now();
        let mut guard = IdleGuard::new(Duration::from_millis(3500), start);

        assert!(!guard.poll(start + Duration::from_millis(3499)));
        assert!(guard.poll(start + Duration::from_millis(3500)));
        assert!(guard.has_fired());
        assert!(!guard.poll(start + Duration::from_secs(60)));
    }

    #[test]
    fn test_reads_push_the_deadline() {
        let start = Instant::now();
        let mut guard = IdleGuard::new(Duration::from_secs(1), start);

        guard.record_read(start + Duration::from_millis(900));
        assert!(!guard.poll(start + Duration::from_millis(1500)));
        assert_eq!(guard.deadline(), start + Duration::from_millis(1900));
    }

    #[test]
    fn test_teardown_cancels_queue_entry() {
        let gate = Arc::new(Gatekeeper::new(GateConfig::default()));
        let address = IpAddr::from([10, 0, 0, 5]);

        let ticket = match gate.admit(address, ProtocolVersion::V1_12_2, || {
            panic!("resume must not run after teardown")
        }) {
            Admission::Queued(ticket) => ticket,
            other => panic!("Unexpected admission {:?}", other),
        };

        {
            let mut guard = TeardownGuard::new(Arc::clone(&gate), address);
            guard.set_ticket(ticket);
        }

        assert!(!gate.queue().contains(&address));
        assert_eq!(gate.poll_queue(), 0);
    }

    #[test]
    fn test_teardown_clears_connecting() {
        let gate = Arc::new(Gatekeeper::new(GateConfig::default()));
        let address = IpAddr::from([10, 0, 0, 5]);

        {
            let mut guard = TeardownGuard::new(Arc::clone(&gate), address);
            let _session = gate.begin(address, ProtocolVersion::V1_12_2, Instant::now());
            guard.mark_connecting();
            assert!(gate.connecting().contains(&address));
        }

        assert!(!gate.connecting().contains(&address));
        assert!(!gate.is_blacklisted(&address));
        assert!(!gate.is_verified(&address));
    }

    #[test]
    fn test_teardown_after_release_before_session() {
        let gate = Arc::new(Gatekeeper::new(GateConfig::default()));
        let address = IpAddr::from([10, 0, 0, 6]);

        let ticket = match gate.admit(address, ProtocolVersion::V1_12_2, || {}) {
            Admission::Queued(ticket) => ticket,
            other => panic!("Unexpected admission {:?}", other),
        };
        assert_eq!(gate.poll_queue(), 1);
        assert!(gate.connecting().contains(&address));

        {
            let mut guard = TeardownGuard::new(Arc::clone(&gate), address);
            guard.set_ticket(ticket);
        }

        assert!(!gate.connecting().contains(&address));
        assert!(matches!(
            gate.admit(address, ProtocolVersion::V1_12_2, || {}),
            Admission::Queued(_)
        ));
    }

    #[test]
    fn test_concluded_teardown_keeps_newer_entry() {
        let gate = Arc::new(Gatekeeper::new(GateConfig::default()));
        let address = IpAddr::from([10, 0, 0, 7]);

        {
            let mut guard = TeardownGuard::new(Arc::clone(&gate), address);
            let _session = gate.begin(address, ProtocolVersion::V1_12_2, Instant::now());
            guard.mark_connecting();
            gate.connecting().remove(&address);
            guard.mark_concluded();

            // A later connection from the same address is already verifying
            gate.connecting().insert(address);
        }

        assert!(gate.connecting().contains(&address));
    }
}
