//! # Login Verification Gate
//!
//! This library implements a gate that stands in front of a game server and
//! decides, for every address that tries to log in, whether it belongs to a
//! genuine game client or to a bot. Addresses that pass are remembered as
//! verified and may join the real server; addresses that misbehave are
//! blacklisted for a while.
//!
//! ## Core Responsibilities
//!
//! ### Admission
//! Every login is checked against the blacklist, the verified set, the
//! addresses currently being verified, the admission queue, the supported
//! protocol range and a reconnect limiter. Only logins passing all checks
//! wait in the queue, which releases a bounded batch per poll interval.
//!
//! ### Verification
//! A released login is placed in a minimal world and sent a keepalive
//! challenge. The session watches what the client sends back: a genuine
//! client echoes the challenge, reports its settings and announces its
//! brand, and never sends anything the world it sees does not allow.
//!
//! ### Bookkeeping
//! Verdicts move addresses between the `connecting`, `verified` and
//! `blacklisted` registries. Registries expire entries lazily, and a
//! teardown guard removes a connection's traces on every exit path.
//!
//! ## Architecture Design
//!
//! ### Task Per Connection
//! Each TCP connection runs in its own task. The verification session is a
//! pure state machine; the task feeds it decoded packets and timer expiries
//! and writes whatever it queues through the [`session::SessionIo`] seam.
//!
//! ### Shared Gate
//! All connection tasks share one [`gatekeeper::Gatekeeper`] behind an
//! `Arc`. Its registries and queue use short critical sections and never
//! hold a lock across an await point or a queued resume action.
//!
//! ## Module Organization
//!
//! ### Config Module (`config`)
//! Tunable timeouts, limits and expiry policies, loadable from JSON.
//!
//! ### Error Module (`error`)
//! Reasons a verification can fail, and which of them blacklist.
//!
//! ### Registry, Queue and Limiter Modules (`registry`, `queue`, `limiter`)
//! The concurrent data structures the gate is built from.
//!
//! ### Session Module (`session`)
//! The verification state machine and its verdicts.
//!
//! ### Connection and Login Modules (`connection`, `login`)
//! The per-connection driver and the login phase it runs before a session.
//!
//! ### Network Module (`network`)
//! The TCP accept loop and the queue pacing task.

pub mod config;
pub mod connection;
pub mod error;
pub mod gatekeeper;
pub mod guard;
pub mod limiter;
pub mod login;
pub mod network;
pub mod queue;
pub mod registry;
pub mod session;
pub mod stats;

pub use config::{Expiry, GateConfig};
pub use connection::{handle_connection, Transport};
pub use error::VerificationError;
pub use gatekeeper::{Admission, GateSnapshot, Gatekeeper};
pub use network::Server;
pub use registry::RegistryKind;
pub use session::{Conclusion, Verdict, VerificationSession};
