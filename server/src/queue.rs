//! Admission queue
//!
//! Connections wait here until the periodic poll releases them. Each entry
//! carries a resume action and a ticket; the ticket (or the address) can
//! cancel an entry that has not been released yet.

use log::debug;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::net::IpAddr;

/// Action run once when an entry is released
pub type ResumeAction = Box<dyn FnOnce() + Send + 'static>;

/// Identifies one queued entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueueTicket(u64);

struct QueueEntry {
    ticket: QueueTicket,
    address: IpAddr,
    resume: ResumeAction,
}

#[derive(Default)]
struct QueueInner {
    entries: VecDeque<QueueEntry>,
    next_ticket: u64,
}

/// Entries taken from the queue whose resume actions have not run yet
pub struct Released {
    entries: Vec<QueueEntry>,
}

impl Released {
    pub fn addresses(&self) -> impl Iterator<Item = IpAddr> + '_ {
        self.entries.iter().map(|entry| entry.address)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Runs every resume action in release order and returns how many ran.
    pub fn run(self) -> usize {
        let count = self.entries.len();
        for entry in self.entries {
            debug!("Releasing {} from the queue", entry.address);
            (entry.resume)();
        }
        count
    }
}

#[derive(Default)]
pub struct AdmissionQueue {
    inner: Mutex<QueueInner>,
}

impl AdmissionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry and returns its ticket.
    pub fn enqueue<F>(&self, address: IpAddr, resume: F) -> QueueTicket
    where
        F: FnOnce() + Send + 'static,
    {
        let mut inner = self.inner.lock();
        Self::push(&mut inner, address, Box::new(resume))
    }

    /// Appends an entry unless `address` is already queued.
    pub fn enqueue_unique<F>(&self, address: IpAddr, resume: F) -> Option<QueueTicket>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut inner = self.inner.lock();
        if inner.entries.iter().any(|entry| entry.address == address) {
            return None;
        }
        Some(Self::push(&mut inner, address, Box::new(resume)))
    }

    fn push(inner: &mut QueueInner, address: IpAddr, resume: ResumeAction) -> QueueTicket {
        let ticket = QueueTicket(inner.next_ticket);
        inner.next_ticket += 1;
        inner.entries.push_back(QueueEntry {
            ticket,
            address,
            resume,
        });
        debug!("Queued {} ({} waiting)", address, inner.entries.len());
        ticket
    }

    /// Releases up to `max` entries in FIFO order and returns how many ran.
    ///
    /// Entries are taken out under the lock; their resume actions run after
    /// it is dropped, so a resume action may use the queue itself. Once an
    /// entry has been taken, `remove` and `cancel` no longer see it and
    /// cannot stop its resume action. That is harmless while resume actions
    /// only wake their own connection; an action with side effects of its
    /// own must tolerate running for a connection that is already gone.
    pub fn poll(&self, max: usize) -> usize {
        self.take(max).run()
    }

    /// Takes up to `max` entries in FIFO order without running them.
    pub fn take(&self, max: usize) -> Released {
        let mut inner = self.inner.lock();
        let count = max.min(inner.entries.len());
        Released {
            entries: inner.entries.drain(..count).collect(),
        }
    }

    /// Drops every pending entry for `address` without running it.
    pub fn remove(&self, address: &IpAddr) -> usize {
        let mut inner = self.inner.lock();
        let before = inner.entries.len();
        inner.entries.retain(|entry| entry.address != *address);
        before - inner.entries.len()
    }

    /// Drops one pending entry. False if it was already released or removed.
    pub fn cancel(&self, ticket: QueueTicket) -> bool {
        let mut inner = self.inner.lock();
        match inner.entries.iter().position(|entry| entry.ticket == ticket) {
            Some(index) => {
                inner.entries.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, address: &IpAddr) -> bool {
        self.inner
            .lock()
            .entries
            .iter()
            .any(|entry| entry.address == *address)
    }

    /// Zero-based place of a ticket in line
    pub fn position(&self, ticket: QueueTicket) -> Option<usize> {
        self.inner
            .lock()
            .entries
            .iter()
            .position(|entry| entry.ticket == ticket)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }
}

impl fmt::Debug for AdmissionQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdmissionQueue")
            .field("len", &self.len())
            .finish()
    }
}
