//! Verification session state machine
//!
//! A session starts right after login success. It sends a minimal join
//! sequence and a keepalive carrying a random challenge id, then judges
//! every packet the client sends back:
//!
//! ```text
//! AwaitingChallengeEcho --echo--> Observing --settings, brand--> Verified
//!          |                          |
//!          +---- illegal / flood -----+--> Blacklisted
//!          +---- timeout / disconnect +--> Inconclusive
//! ```
//!
//! The session never touches a socket. Outbound packets and the final
//! close go through [`SessionIo`], and every failure is folded into a
//! terminal state before control returns to the caller.

use crate::config::GateConfig;
use crate::error::VerificationError;
use bytes::{Bytes, BytesMut};
use log::debug;
use rand::Rng;
use shared::packets::{read_string, Clientbound, JoinGame, Serverbound};
use shared::ProtocolVersion;
use std::fmt;
use std::net::IpAddr;
use std::time::{Duration, Instant};

pub const VERIFIED_MESSAGE: &str = "Verification successful. Please reconnect.";
pub const BLACKLISTED_MESSAGE: &str = "Verification failed. You are temporarily blocked.";
pub const TIMEOUT_MESSAGE: &str = "Verification timed out. Please reconnect.";

const SPAWN: (i32, i32, i32) = (0, 64, 0);
const LEGACY_BRAND_CHANNEL: &str = "MC|Brand";
const BRAND_CHANNEL: &str = "minecraft:brand";
/// Upper bound on what is read from a brand payload before judging it
const MAX_BRAND_READ: usize = 32_767;

/// Side effects a session asks its connection to carry out
pub trait SessionIo {
    /// Queues one encoded packet payload for the peer.
    fn send(&mut self, payload: &[u8]) -> shared::Result<()>;

    /// Closes the connection once queued packets are flushed.
    fn close(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    Verified,
    Blacklisted,
    Inconclusive,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Verdict::Verified => "verified",
            Verdict::Blacklisted => "blacklisted",
            Verdict::Inconclusive => "inconclusive",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingChallengeEcho,
    Observing,
    Finished(Verdict),
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Finished(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            SessionState::AwaitingChallengeEcho => "awaiting challenge echo",
            SessionState::Observing => "observing",
            SessionState::Finished(_) => "finished",
        }
    }
}

/// Bounds a session enforces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    pub timeout: Duration,
    /// Packets accepted before the session counts as a flood
    pub max_packets: u32,
    /// Exclusive upper bound on the client brand length
    pub max_brand_length: usize,
}

impl SessionLimits {
    pub fn from_config(config: &GateConfig) -> Self {
        Self {
            timeout: config.verification_timeout(),
            max_packets: config.max_login_packets,
            max_brand_length: config.max_brand_length,
        }
    }
}

/// How a session ended
#[derive(Debug, Clone, PartialEq)]
pub struct Conclusion {
    pub address: IpAddr,
    pub version: ProtocolVersion,
    pub verdict: Verdict,
    pub reason: Option<VerificationError>,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    Continue,
    Concluded(Conclusion),
    /// The session had already reached a verdict
    AlreadyFinished,
}

#[derive(Debug)]
pub struct VerificationSession {
    address: IpAddr,
    version: ProtocolVersion,
    limits: SessionLimits,
    started_at: Instant,
    challenge_id: i64,
    teleport_id: u32,
    packets_observed: u32,
    settings_seen: bool,
    brand: Option<String>,
    state: SessionState,
    conclusion: Option<Conclusion>,
}

impl VerificationSession {
    pub fn new(address: IpAddr, version: ProtocolVersion, limits: SessionLimits, now: Instant) -> Self {
        let mut rng = rand::thread_rng();
        // Legacy keepalives carry a VarInt, so stay in positive i32 range there
        let challenge_id = if version.keep_alive_is_long() {
            rng.gen_range(1..=i64::MAX)
        } else {
            i64::from(rng.gen_range(1..=i32::MAX))
        };
        let teleport_id = rng.gen_range(1..=i32::MAX as u32);
        Self::with_ids(address, version, limits, now, challenge_id, teleport_id)
    }

    /// Builds a session with fixed challenge and teleport ids.
    pub fn with_ids(
        address: IpAddr,
        version: ProtocolVersion,
        limits: SessionLimits,
        now: Instant,
        challenge_id: i64,
        teleport_id: u32,
    ) -> Self {
        Self {
            address,
            version,
            limits,
            started_at: now,
            challenge_id,
            teleport_id,
            packets_observed: 0,
            settings_seen: false,
            brand: None,
            state: SessionState::AwaitingChallengeEcho,
            conclusion: None,
        }
    }

    pub fn address(&self) -> IpAddr {
        self.address
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn challenge_id(&self) -> i64 {
        self.challenge_id
    }

    pub fn packets_observed(&self) -> u32 {
        self.packets_observed
    }

    pub fn brand(&self) -> Option<&str> {
        self.brand.as_deref()
    }

    /// The verdict record, once the session has finished
    pub fn conclusion(&self) -> Option<&Conclusion> {
        self.conclusion.as_ref()
    }

    /// Instant after which the session times out
    pub fn deadline(&self) -> Instant {
        self.started_at + self.limits.timeout
    }

    /// Sends the join sequence followed by the challenge keepalive.
    pub fn start(&mut self, now: Instant, io: &mut impl SessionIo) -> Progress {
        let join = [
            Clientbound::JoinGame(JoinGame::verification_world(1)),
            Clientbound::SpawnPosition {
                x: SPAWN.0,
                y: SPAWN.1,
                z: SPAWN.2,
            },
            Clientbound::KeepAlive {
                id: self.challenge_id,
            },
        ];

        for packet in &join {
            if let Err(e) = self.send(io, packet) {
                return self.fail(e.into(), now, io);
            }
        }
        debug!("Sent challenge to {} ({})", self.address, self.version);
        Progress::Continue
    }

    /// Judges one inbound packet.
    pub fn handle(&mut self, packet: Serverbound, now: Instant, io: &mut impl SessionIo) -> Progress {
        if self.is_finished() {
            return Progress::AlreadyFinished;
        }
        if let Some(progress) = self.expire_if_due(now, io) {
            return progress;
        }

        self.packets_observed = self.packets_observed.saturating_add(1);
        let result = if self.packets_observed > self.limits.max_packets {
            Err(VerificationError::TooManyPackets {
                count: self.packets_observed,
                max: self.limits.max_packets,
            })
        } else {
            self.inspect(packet, io)
        };

        match result {
            Err(error) => self.fail(error, now, io),
            Ok(()) if self.state == SessionState::Observing
                && self.settings_seen
                && self.brand.is_some() =>
            {
                self.finish(Verdict::Verified, None, now, io)
            }
            Ok(()) => Progress::Continue,
        }
    }

    /// Ends the session because of an error raised outside of [`handle`].
    ///
    /// [`handle`]: VerificationSession::handle
    pub fn fail(&mut self, error: VerificationError, now: Instant, io: &mut impl SessionIo) -> Progress {
        if self.is_finished() {
            return Progress::AlreadyFinished;
        }
        let verdict = if error.blacklists() {
            Verdict::Blacklisted
        } else {
            Verdict::Inconclusive
        };
        self.finish(verdict, Some(error), now, io)
    }

    /// Times the session out if its deadline has passed.
    pub fn check_timeout(&mut self, now: Instant, io: &mut impl SessionIo) -> Progress {
        if self.is_finished() {
            return Progress::AlreadyFinished;
        }
        self.expire_if_due(now, io).unwrap_or(Progress::Continue)
    }

    fn expire_if_due(&mut self, now: Instant, io: &mut impl SessionIo) -> Option<Progress> {
        if now < self.deadline() {
            return None;
        }
        Some(self.fail(VerificationError::Timeout(self.limits.timeout), now, io))
    }

    fn inspect(&mut self, packet: Serverbound, io: &mut impl SessionIo) -> Result<(), VerificationError> {
        match (self.state, packet) {
            (_, Serverbound::KeepAlive { id }) => self.on_keep_alive(id, io),
            (_, Serverbound::ClientSettings(_)) => self.on_client_settings(),
            (_, Serverbound::PluginMessage { channel, data }) => self.on_plugin_message(&channel, data),
            (_, Serverbound::ResourcePackStatus { .. }) => Ok(()),
            (SessionState::Observing, Serverbound::TeleportConfirm { teleport_id }) => {
                if teleport_id != self.teleport_id {
                    return Err(VerificationError::illegal(format!(
                        "teleport confirm for unknown id {}",
                        teleport_id
                    )));
                }
                Ok(())
            }
            (
                SessionState::Observing,
                Serverbound::PlayerPosition { .. }
                | Serverbound::PlayerPositionRotation { .. }
                | Serverbound::PlayerRotation { .. }
                | Serverbound::PlayerOnGround { .. },
            ) => Ok(()),
            (state, other) => Err(VerificationError::illegal(format!(
                "{} while {}",
                other.name(),
                state.name()
            ))),
        }
    }

    fn on_keep_alive(&mut self, id: i64, io: &mut impl SessionIo) -> Result<(), VerificationError> {
        match self.state {
            SessionState::AwaitingChallengeEcho if id == self.challenge_id => {
                self.state = SessionState::Observing;
                debug!("{} echoed the challenge", self.address);

                let position = Clientbound::PlayerPositionAndLook {
                    x: f64::from(SPAWN.0) + 0.5,
                    y: f64::from(SPAWN.1),
                    z: f64::from(SPAWN.2) + 0.5,
                    yaw: 0.0,
                    pitch: 0.0,
                    teleport_id: self.teleport_id,
                };
                self.send(io, &position)?;
                Ok(())
            }
            SessionState::Observing if id == self.challenge_id => Err(VerificationError::DuplicateEcho),
            _ => Err(VerificationError::ChallengeMismatch { received: id }),
        }
    }

    fn on_client_settings(&mut self) -> Result<(), VerificationError> {
        if self.brand.is_some() {
            return Err(VerificationError::illegal("client settings after brand"));
        }
        self.settings_seen = true;
        Ok(())
    }

    fn on_plugin_message(&mut self, channel: &str, mut data: Bytes) -> Result<(), VerificationError> {
        let expected = self.version.brand_channel();
        if channel != expected {
            if channel == LEGACY_BRAND_CHANNEL || channel == BRAND_CHANNEL {
                return Err(VerificationError::illegal(format!(
                    "brand on {} from {}",
                    channel, self.version
                )));
            }
            return Ok(());
        }

        if !self.settings_seen {
            return Err(VerificationError::illegal("brand before client settings"));
        }
        if self.brand.is_some() {
            return Err(VerificationError::illegal("duplicate brand"));
        }

        let brand = read_string(&mut data, MAX_BRAND_READ)?;
        let length = brand.chars().count();
        if length < 2 || length >= self.limits.max_brand_length {
            return Err(VerificationError::illegal(format!("brand of length {}", length)));
        }
        if brand.chars().any(char::is_control) {
            return Err(VerificationError::illegal("brand contains control characters"));
        }

        debug!("{} announced brand {:?}", self.address, brand);
        self.brand = Some(brand);
        Ok(())
    }

    fn finish(
        &mut self,
        verdict: Verdict,
        reason: Option<VerificationError>,
        now: Instant,
        io: &mut impl SessionIo,
    ) -> Progress {
        self.state = SessionState::Finished(verdict);

        let message = match (verdict, &reason) {
            (Verdict::Verified, _) => Some(VERIFIED_MESSAGE),
            (Verdict::Blacklisted, _) => Some(BLACKLISTED_MESSAGE),
            (Verdict::Inconclusive, Some(VerificationError::Timeout(_))) => Some(TIMEOUT_MESSAGE),
            (Verdict::Inconclusive, _) => None,
        };
        if let Some(message) = message {
            if let Err(e) = self.send(io, &Clientbound::disconnect(message)) {
                debug!("Could not tell {} about the verdict: {}", self.address, e);
            }
        }
        io.close();

        let conclusion = Conclusion {
            address: self.address,
            version: self.version,
            verdict,
            reason,
            elapsed: now.saturating_duration_since(self.started_at),
        };
        self.conclusion = Some(conclusion.clone());
        Progress::Concluded(conclusion)
    }

    fn send(&self, io: &mut impl SessionIo, packet: &Clientbound) -> shared::Result<()> {
        let mut payload = BytesMut::new();
        packet.encode(self.version, &mut payload)?;
        io.send(&payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::packets::{brand_message, ClientSettings};

    const CHALLENGE: i64 = 0x5EED;
    const TELEPORT: u32 = 77;

    #[derive(Default)]
    struct RecordingIo {
        sent: Vec<Bytes>,
        closed: u32,
    }

    impl SessionIo for RecordingIo {
        fn send(&mut self, payload: &[u8]) -> shared::Result<()> {
            self.sent.push(Bytes::copy_from_slice(payload));
            Ok(())
        }

        fn close(&mut self) {
            self.closed += 1;
        }
    }

    impl RecordingIo {
        fn decoded(&self, version: ProtocolVersion) -> Vec<Clientbound> {
            self.sent
                .iter()
                .map(|payload| Clientbound::decode(version, payload.clone()).unwrap())
                .collect()
        }
    }

    fn limits() -> SessionLimits {
        SessionLimits {
            timeout: Duration::from_secs(10),
            max_packets: 128,
            max_brand_length: 64,
        }
    }

    fn started(version: ProtocolVersion) -> (VerificationSession, RecordingIo, Instant) {
        let now = Instant::now();
        let mut session = VerificationSession::with_ids(
            IpAddr::from([10, 0, 0, 5]),
            version,
            limits(),
            now,
            CHALLENGE,
            TELEPORT,
        );
        let mut io = RecordingIo::default();
        assert_eq!(session.start(now, &mut io), Progress::Continue);
        (session, io, now)
    }

    fn concluded(progress: Progress) -> Conclusion {
        match progress {
            Progress::Concluded(conclusion) => conclusion,
            other => panic!("Expected a conclusion, got {:?}", other),
        }
    }

    fn settings() -> Serverbound {
        Serverbound::ClientSettings(ClientSettings::default())
    }

    fn position() -> Serverbound {
        Serverbound::PlayerPosition {
            x: 0.5,
            y: 64.0,
            z: 0.5,
            on_ground: true,
        }
    }

    #[test]
    fn test_start_sends_join_sequence_then_challenge() {
        let (_, io, _) = started(ProtocolVersion::V1_12_2);
        let packets = io.decoded(ProtocolVersion::V1_12_2);

        assert_eq!(packets.len(), 3);
        assert!(matches!(packets[0], Clientbound::JoinGame(_)));
        assert!(matches!(packets[1], Clientbound::SpawnPosition { .. }));
        assert_eq!(packets[2], Clientbound::KeepAlive { id: CHALLENGE });
    }

    #[test]
    fn test_random_challenge_fits_legacy_keep_alive() {
        for _ in 0..100 {
            let session = VerificationSession::new(
                IpAddr::from([10, 0, 0, 5]),
                ProtocolVersion::V1_8,
                limits(),
                Instant::now(),
            );
            assert!(session.challenge_id() > 0);
            assert!(session.challenge_id() <= i64::from(i32::MAX));
        }
    }

    #[test]
    fn test_echo_moves_to_observing_once() {
        let (mut session, mut io, now) = started(ProtocolVersion::V1_12_2);

        let progress = session.handle(Serverbound::KeepAlive { id: CHALLENGE }, now, &mut io);
        assert_eq!(progress, Progress::Continue);
        assert_eq!(session.state(), SessionState::Observing);

        // Position is only sent once the challenge is answered
        let last = io.decoded(ProtocolVersion::V1_12_2).pop().unwrap();
        assert!(matches!(
            last,
            Clientbound::PlayerPositionAndLook { teleport_id: TELEPORT, .. }
        ));

        let conclusion = concluded(session.handle(Serverbound::KeepAlive { id: CHALLENGE }, now, &mut io));
        assert_eq!(conclusion.verdict, Verdict::Blacklisted);
        assert_eq!(conclusion.reason, Some(VerificationError::DuplicateEcho));
    }

    #[test]
    fn test_wrong_echo_is_challenge_mismatch() {
        let (mut session, mut io, now) = started(ProtocolVersion::V1_8);

        let conclusion = concluded(session.handle(Serverbound::KeepAlive { id: 1 }, now, &mut io));
        assert_eq!(conclusion.verdict, Verdict::Blacklisted);
        assert_eq!(
            conclusion.reason,
            Some(VerificationError::ChallengeMismatch { received: 1 })
        );
        assert_eq!(io.closed, 1);
    }

    #[test]
    fn test_movement_before_echo_is_illegal() {
        let (mut session, mut io, now) = started(ProtocolVersion::V1_12_2);

        let conclusion = concluded(session.handle(position(), now, &mut io));
        assert_eq!(conclusion.verdict, Verdict::Blacklisted);
        assert!(matches!(conclusion.reason, Some(VerificationError::IllegalPacket(_))));

        let last = io.decoded(ProtocolVersion::V1_12_2).pop().unwrap();
        assert_eq!(last, Clientbound::disconnect(BLACKLISTED_MESSAGE));
    }

    #[test]
    fn test_chat_is_illegal_in_every_phase() {
        let (mut session, mut io, now) = started(ProtocolVersion::V1_12_2);
        session.handle(Serverbound::KeepAlive { id: CHALLENGE }, now, &mut io);

        let chat = Serverbound::ChatMessage {
            message: "/register abc abc".to_string(),
        };
        let conclusion = concluded(session.handle(chat, now, &mut io));
        assert_eq!(conclusion.verdict, Verdict::Blacklisted);
    }

    #[test]
    fn test_vanilla_order_verifies() {
        let version = ProtocolVersion::V1_12_2;
        let (mut session, mut io, now) = started(version);

        // Settings and brand usually arrive before the echo
        assert_eq!(session.handle(settings(), now, &mut io), Progress::Continue);
        assert_eq!(session.handle(brand_message(version, "vanilla"), now, &mut io), Progress::Continue);
        assert_eq!(session.state(), SessionState::AwaitingChallengeEcho);

        let later = now + Duration::from_millis(120);
        let conclusion = concluded(session.handle(Serverbound::KeepAlive { id: CHALLENGE }, later, &mut io));
        assert_eq!(conclusion.verdict, Verdict::Verified);
        assert_eq!(conclusion.reason, None);
        assert_eq!(conclusion.elapsed, Duration::from_millis(120));
        assert_eq!(session.brand(), Some("vanilla"));
    }

    #[test]
    fn test_verifies_after_echo_too() {
        let version = ProtocolVersion::V1_15_2;
        let (mut session, mut io, now) = started(version);

        session.handle(Serverbound::KeepAlive { id: CHALLENGE }, now, &mut io);
        session.handle(Serverbound::TeleportConfirm { teleport_id: TELEPORT }, now, &mut io);
        session.handle(settings(), now, &mut io);
        let conclusion = concluded(session.handle(brand_message(version, "fabric"), now, &mut io));
        assert_eq!(conclusion.verdict, Verdict::Verified);
    }

    #[test]
    fn test_brand_ordering_rules() {
        let version = ProtocolVersion::V1_14;

        let (mut session, mut io, now) = started(version);
        let conclusion = concluded(session.handle(brand_message(version, "vanilla"), now, &mut io));
        assert_eq!(
            conclusion.reason,
            Some(VerificationError::illegal("brand before client settings"))
        );

        let (mut session, mut io, now) = started(version);
        session.handle(settings(), now, &mut io);
        session.handle(brand_message(version, "vanilla"), now, &mut io);
        let conclusion = concluded(session.handle(settings(), now, &mut io));
        assert_eq!(
            conclusion.reason,
            Some(VerificationError::illegal("client settings after brand"))
        );

        let (mut session, mut io, now) = started(version);
        session.handle(settings(), now, &mut io);
        session.handle(brand_message(version, "vanilla"), now, &mut io);
        let conclusion = concluded(session.handle(brand_message(version, "vanilla"), now, &mut io));
        assert_eq!(conclusion.reason, Some(VerificationError::illegal("duplicate brand")));
    }

    #[test]
    fn test_brand_content_rules() {
        let version = ProtocolVersion::V1_12_2;
        let too_long = "x".repeat(64);
        for brand in ["x", too_long.as_str(), "van\u{7}illa"] {
            let (mut session, mut io, now) = started(version);
            session.handle(settings(), now, &mut io);
            let conclusion = concluded(session.handle(brand_message(version, brand), now, &mut io));
            assert_eq!(conclusion.verdict, Verdict::Blacklisted, "{:?}", brand);
        }
    }

    #[test]
    fn test_brand_channel_must_match_version() {
        let (mut session, mut io, now) = started(ProtocolVersion::V1_13);
        session.handle(settings(), now, &mut io);

        let legacy = brand_message(ProtocolVersion::V1_12_2, "vanilla");
        let conclusion = concluded(session.handle(legacy, now, &mut io));
        assert_eq!(conclusion.verdict, Verdict::Blacklisted);
    }

    #[test]
    fn test_unrelated_plugin_channels_are_ignored() {
        let (mut session, mut io, now) = started(ProtocolVersion::V1_12_2);
        let register = Serverbound::PluginMessage {
            channel: "REGISTER".to_string(),
            data: Bytes::from_static(b"wdl|init"),
        };
        assert_eq!(session.handle(register, now, &mut io), Progress::Continue);
    }

    #[test]
    fn test_wrong_teleport_id_is_illegal() {
        let (mut session, mut io, now) = started(ProtocolVersion::V1_12_2);
        session.handle(Serverbound::KeepAlive { id: CHALLENGE }, now, &mut io);

        let confirm = Serverbound::TeleportConfirm { teleport_id: TELEPORT + 1 };
        let conclusion = concluded(session.handle(confirm, now, &mut io));
        assert_eq!(conclusion.verdict, Verdict::Blacklisted);
    }

    #[test]
    fn test_packet_flood_blacklists() {
        let (mut session, mut io, now) = started(ProtocolVersion::V1_8);
        session.handle(Serverbound::KeepAlive { id: CHALLENGE }, now, &mut io);

        let mut last = Progress::Continue;
        for _ in 0..limits().max_packets {
            last = session.handle(position(), now, &mut io);
            if last != Progress::Continue {
                break;
            }
        }

        let conclusion = concluded(last);
        assert_eq!(conclusion.verdict, Verdict::Blacklisted);
        assert_eq!(
            conclusion.reason,
            Some(VerificationError::TooManyPackets { count: 129, max: 128 })
        );
    }

    #[test]
    fn test_slow_client_times_out_without_blacklist() {
        let (mut session, mut io, now) = started(ProtocolVersion::V1_12_2);
        session.handle(Serverbound::KeepAlive { id: CHALLENGE }, now, &mut io);

        // A few packets spread over the whole window stay far under the ceiling
        for second in 1..10 {
            let at = now + Duration::from_secs(second);
            assert_eq!(session.handle(position(), at, &mut io), Progress::Continue);
        }
        assert_eq!(
            session.check_timeout(now + Duration::from_secs(9), &mut io),
            Progress::Continue
        );

        let conclusion = concluded(session.check_timeout(now + Duration::from_secs(10), &mut io));
        assert_eq!(conclusion.verdict, Verdict::Inconclusive);
        assert_eq!(
            conclusion.reason,
            Some(VerificationError::Timeout(Duration::from_secs(10)))
        );
        let last = io.decoded(ProtocolVersion::V1_12_2).pop().unwrap();
        assert_eq!(last, Clientbound::disconnect(TIMEOUT_MESSAGE));
    }

    #[test]
    fn test_late_packet_times_out() {
        let (mut session, mut io, now) = started(ProtocolVersion::V1_12_2);
        let conclusion = concluded(session.handle(
            Serverbound::KeepAlive { id: CHALLENGE },
            now + Duration::from_secs(11),
            &mut io,
        ));
        assert_eq!(conclusion.verdict, Verdict::Inconclusive);
    }

    #[test]
    fn test_failures_map_to_verdicts() {
        let (mut session, mut io, now) = started(ProtocolVersion::V1_12_2);
        let conclusion = concluded(session.fail(
            VerificationError::TransportDisconnect("reset by peer".to_string()),
            now,
            &mut io,
        ));
        assert_eq!(conclusion.verdict, Verdict::Inconclusive);

        let (mut session, mut io, now) = started(ProtocolVersion::V1_12_2);
        let conclusion = concluded(session.fail(
            VerificationError::CorruptedFrame("bad VarInt".to_string()),
            now,
            &mut io,
        ));
        assert_eq!(conclusion.verdict, Verdict::Blacklisted);
    }

    #[test]
    fn test_terminal_state_ignores_input() {
        let (mut session, mut io, now) = started(ProtocolVersion::V1_12_2);
        session.handle(position(), now, &mut io);
        assert!(session.is_finished());

        assert_eq!(session.handle(position(), now, &mut io), Progress::AlreadyFinished);
        assert_eq!(
            session.fail(VerificationError::DuplicateEcho, now, &mut io),
            Progress::AlreadyFinished
        );
        assert_eq!(session.check_timeout(now + Duration::from_secs(60), &mut io), Progress::AlreadyFinished);
        assert_eq!(io.closed, 1);
    }
}
