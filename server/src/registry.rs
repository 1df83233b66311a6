//! Address-keyed membership sets with expiry
//!
//! The gate keeps three of these:
//! - `connecting` holds addresses with an open verification session
//! - `verified` holds addresses that passed and may skip verification
//! - `blacklisted` holds addresses that failed and are turned away
//!
//! Each registry owns its lock. Callers only ever see single atomic
//! operations, never the backing map, so no lock is held across calls
//! and no ordering between registries is needed.

use crate::config::Expiry;
use log::debug;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Instant;

/// Membership record for one address
#[derive(Debug, Clone, Copy)]
struct Entry {
    /// When the address was added
    inserted_at: Instant,
    /// Last successful lookup, drives sliding expiry
    touched_at: Instant,
}

impl Entry {
    fn new(now: Instant) -> Self {
        Self {
            inserted_at: now,
            touched_at: now,
        }
    }

    fn is_expired(&self, expiry: Expiry, now: Instant) -> bool {
        let reference = match expiry {
            Expiry::Never => return false,
            Expiry::Fixed { .. } => self.inserted_at,
            Expiry::Sliding { .. } => self.touched_at,
        };
        expiry
            .ttl()
            .map_or(false, |ttl| now.saturating_duration_since(reference) >= ttl)
    }
}

/// A concurrent set of addresses with optional expiry
///
/// Expired entries are dropped lazily on lookup and in bulk by
/// [`AddressRegistry::purge_expired`], which the gate runs on every queue
/// poll cycle.
#[derive(Debug)]
pub struct AddressRegistry {
    name: &'static str,
    expiry: Expiry,
    entries: Mutex<HashMap<IpAddr, Entry>>,
}

impl AddressRegistry {
    pub fn new(name: &'static str, expiry: Expiry) -> Self {
        Self {
            name,
            expiry,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn expiry(&self) -> Expiry {
        self.expiry
    }

    /// Adds an address
    ///
    /// Re-adding a live address is a no-op and returns false. An expired
    /// entry is replaced as if it had never been there.
    pub fn insert(&self, address: IpAddr) -> bool {
        self.insert_at(address, Instant::now())
    }

    pub fn insert_at(&self, address: IpAddr, now: Instant) -> bool {
        let mut entries = self.entries.lock();
        match entries.get(&address) {
            Some(entry) if !entry.is_expired(self.expiry, now) => false,
            _ => {
                entries.insert(address, Entry::new(now));
                debug!("{} += {}", self.name, address);
                true
            }
        }
    }

    /// Removes an address, returning whether it was present
    pub fn remove(&self, address: &IpAddr) -> bool {
        let removed = self.entries.lock().remove(address).is_some();
        if removed {
            debug!("{} -= {}", self.name, address);
        }
        removed
    }

    /// Checks membership
    ///
    /// A hit refreshes sliding expiry. An expired entry is removed and
    /// reported as absent.
    pub fn contains(&self, address: &IpAddr) -> bool {
        self.contains_at(address, Instant::now())
    }

    pub fn contains_at(&self, address: &IpAddr, now: Instant) -> bool {
        let mut entries = self.entries.lock();
        let expired = match entries.get_mut(address) {
            None => return false,
            Some(entry) if entry.is_expired(self.expiry, now) => true,
            Some(entry) => {
                entry.touched_at = now;
                false
            }
        };

        if expired {
            entries.remove(address);
            debug!("{} expired {}", self.name, address);
        }
        !expired
    }

    /// Drops every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    pub fn purge_expired_at(&self, now: Instant) -> usize {
        if self.expiry == Expiry::Never {
            return 0;
        }

        let expiry = self.expiry;
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(expiry, now));
        before - entries.len()
    }

    /// Removes everything, returning the number of entries dropped
    pub fn clear(&self) -> usize {
        let mut entries = self.entries.lock();
        let count = entries.len();
        entries.clear();
        count
    }

    /// Number of entries, including expired ones not yet purged
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// Selects one of the gate's three registries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistryKind {
    Connecting,
    Verified,
    Blacklisted,
}
