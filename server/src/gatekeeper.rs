//! The gate: registries, queue, limiter and statistics behind one facade
//!
//! A connection goes through the gate in three calls:
//! 1. [`Gatekeeper::admit`] decides whether it may wait for verification
//! 2. [`Gatekeeper::begin`] opens its session once the queue releases it
//! 3. [`Gatekeeper::conclude`] applies the session's verdict
//!
//! Everything else is read access for statistics and the admin surface.

use crate::config::{Expiry, GateConfig};
use crate::limiter::AttemptLimiter;
use crate::queue::{AdmissionQueue, QueueTicket};
use crate::registry::{AddressRegistry, RegistryKind};
use crate::session::{Conclusion, SessionLimits, Verdict, VerificationSession};
use crate::stats::{Statistics, Totals, VerdictEvent};
use log::{debug, info, warn};
use parking_lot::Mutex;
use shared::ProtocolVersion;
use std::net::IpAddr;
use std::time::Instant;

/// Result of asking the gate to admit a new login
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Blacklisted,
    /// Passed recently, skips verification
    Verified,
    AlreadyVerifying,
    AlreadyQueued,
    TooFastReconnect,
    UnsupportedVersion,
    Queued(QueueTicket),
}

impl Admission {
    /// Text shown to a client that is turned away
    pub fn rejection_message(&self) -> Option<&'static str> {
        match self {
            Admission::Blacklisted => {
                Some("You are temporarily blocked. Please try again later.")
            }
            Admission::Verified => Some("You are already verified. Please join the main server."),
            Admission::AlreadyVerifying => Some("Your address is already being verified."),
            Admission::AlreadyQueued => Some("Your address is already waiting for verification."),
            Admission::TooFastReconnect => Some("You are reconnecting too fast."),
            Admission::UnsupportedVersion => Some("Your game version is not supported."),
            Admission::Queued(_) => None,
        }
    }
}

/// Point-in-time view of the gate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateSnapshot {
    pub queued: usize,
    pub connecting: usize,
    pub verified: usize,
    pub blacklisted: usize,
    pub totals: Totals,
}

#[derive(Debug)]
pub struct Gatekeeper {
    config: GateConfig,
    connecting: AddressRegistry,
    verified: AddressRegistry,
    blacklisted: AddressRegistry,
    queue: AdmissionQueue,
    limiter: AttemptLimiter,
    stats: Statistics,
    /// Serializes admission decisions against queue releases
    admission: Mutex<()>,
}

impl Gatekeeper {
    pub fn new(config: GateConfig) -> Self {
        let config = config.validated();
        // Sessions are bounded by their own timeout; this only catches leaks
        let connecting_ttl = (config.verification_timeout() + config.read_timeout()).as_secs() + 1;

        Self {
            connecting: AddressRegistry::new(
                "connecting",
                Expiry::Fixed {
                    seconds: connecting_ttl,
                },
            ),
            verified: AddressRegistry::new("verified", config.verified_expiry),
            blacklisted: AddressRegistry::new("blacklisted", config.blacklist_expiry),
            queue: AdmissionQueue::new(),
            limiter: AttemptLimiter::new(config.reconnect_limit, config.reconnect_window()),
            stats: Statistics::new(),
            admission: Mutex::new(()),
            config,
        }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn queue(&self) -> &AdmissionQueue {
        &self.queue
    }

    pub fn connecting(&self) -> &AddressRegistry {
        &self.connecting
    }

    pub fn registry(&self, kind: RegistryKind) -> &AddressRegistry {
        match kind {
            RegistryKind::Connecting => &self.connecting,
            RegistryKind::Verified => &self.verified,
            RegistryKind::Blacklisted => &self.blacklisted,
        }
    }

    /// Decides what happens to a new login.
    ///
    /// Checks run in order: blacklist, verified, connecting, queued,
    /// protocol version, reconnect limit. Only a login passing all of them
    /// is queued, with `resume` run when the queue releases it.
    pub fn admit<F>(&self, address: IpAddr, version: ProtocolVersion, resume: F) -> Admission
    where
        F: FnOnce() + Send + 'static,
    {
        self.admit_at(address, version, resume, Instant::now())
    }

    pub fn admit_at<F>(
        &self,
        address: IpAddr,
        version: ProtocolVersion,
        resume: F,
        now: Instant,
    ) -> Admission
    where
        F: FnOnce() + Send + 'static,
    {
        let _decision = self.admission.lock();
        let admission = if self.blacklisted.contains_at(&address, now) {
            Admission::Blacklisted
        } else if self.verified.contains_at(&address, now) {
            Admission::Verified
        } else if self.connecting.contains_at(&address, now) {
            Admission::AlreadyVerifying
        } else if self.queue.contains(&address) {
            Admission::AlreadyQueued
        } else if !self.config.accepts(version) {
            Admission::UnsupportedVersion
        } else if !self.limiter.try_acquire_at(address, now) {
            Admission::TooFastReconnect
        } else {
            self.queue
                .enqueue_unique(address, resume)
                .map_or(Admission::AlreadyQueued, Admission::Queued)
        };

        debug!("Admission for {} ({}): {:?}", address, version, admission);
        admission
    }

    /// Opens a session for a released connection.
    ///
    /// The release already marked the address as connecting; an address
    /// that was not marked is marked here.
    pub fn begin(&self, address: IpAddr, version: ProtocolVersion, now: Instant) -> VerificationSession {
        if self.connecting.insert_at(address, now) {
            debug!("{} began verifying without a queue release", address);
        }
        self.stats.record_attempt();
        VerificationSession::new(address, version, SessionLimits::from_config(&self.config), now)
    }

    /// Applies a verdict to the registries and records it.
    pub fn conclude(&self, conclusion: &Conclusion) {
        let address = conclusion.address;
        self.connecting.remove(&address);

        match conclusion.verdict {
            Verdict::Verified => {
                self.verified.insert(address);
                info!(
                    "{} verified in {}ms ({})",
                    address,
                    conclusion.elapsed.as_millis(),
                    conclusion.version
                );
            }
            Verdict::Blacklisted => {
                self.blacklisted.insert(address);
                warn!(
                    "{} blacklisted: {}",
                    address,
                    conclusion
                        .reason
                        .as_ref()
                        .map_or_else(|| "unknown".to_string(), ToString::to_string)
                );
            }
            Verdict::Inconclusive => {
                debug!(
                    "{} inconclusive after {}ms: {:?}",
                    address,
                    conclusion.elapsed.as_millis(),
                    conclusion.reason
                );
            }
        }

        self.stats.record(conclusion);
    }

    /// Releases the next batch of queued connections and purges expired
    /// registry entries. Returns the number released.
    ///
    /// Released addresses count as connecting from the moment they leave the
    /// queue, so a second login cannot slip in before the session begins.
    pub fn poll_queue(&self) -> usize {
        let released = {
            let _decision = self.admission.lock();
            let released = self.queue.take(self.config.max_queue_polls);
            for address in released.addresses() {
                self.connecting.insert(address);
            }
            released
        };
        let count = released.run();
        self.purge_expired(Instant::now());
        count
    }

    pub fn purge_expired(&self, now: Instant) -> usize {
        self.connecting.purge_expired_at(now)
            + self.verified.purge_expired_at(now)
            + self.blacklisted.purge_expired_at(now)
            + self.limiter.purge_at(now)
    }

    pub fn is_blacklisted(&self, address: &IpAddr) -> bool {
        self.blacklisted.contains(address)
    }

    pub fn is_verified(&self, address: &IpAddr) -> bool {
        self.verified.contains(address)
    }

    pub fn mark_verified(&self, address: IpAddr) -> bool {
        self.verified.insert(address)
    }

    /// Blacklists an address outside of a session, e.g. for a malformed
    /// handshake.
    pub fn mark_blacklisted(&self, address: IpAddr) -> bool {
        self.blacklisted.insert(address)
    }

    pub fn clear(&self, kind: RegistryKind) -> usize {
        let cleared = self.registry(kind).clear();
        info!("Cleared {} entries from {}", cleared, self.registry(kind).name());
        cleared
    }

    pub fn size(&self, kind: RegistryKind) -> usize {
        self.registry(kind).len()
    }

    pub fn snapshot(&self) -> GateSnapshot {
        GateSnapshot {
            queued: self.queue.len(),
            connecting: self.connecting.len(),
            verified: self.verified.len(),
            blacklisted: self.blacklisted.len(),
            totals: self.stats.totals(),
        }
    }

    pub fn drain_verdicts(&self) -> Vec<VerdictEvent> {
        self.stats.drain_verdicts()
    }
}
