//! Per-connection driver
//!
//! Runs one client from handshake to verdict:
//! login, admission, queue wait, then the verification session raced
//! against the idle guard and the session deadline. Generic over the
//! stream so tests can drive it through an in-memory pipe.

use crate::error::VerificationError;
use crate::gatekeeper::{Admission, Gatekeeper};
use crate::guard::{IdleGuard, TeardownGuard};
use crate::login;
use crate::session::{Conclusion, Progress, SessionIo, VerificationSession};
use bytes::{Bytes, BytesMut};
use log::{debug, warn};
use shared::packets::Serverbound;
use shared::{PacketCodec, ProtocolError};
use std::io;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::oneshot;
use tokio::time::{sleep_until, timeout};

/// Bytes a queued client may send before it is dropped
const MAX_QUEUED_BYTES: usize = 4096;

/// A stream with its packet codec and outbound buffer
pub struct Transport<S> {
    stream: S,
    codec: PacketCodec,
    outbound: BytesMut,
    closing: bool,
}

impl<S> Transport<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            codec: PacketCodec::new(),
            outbound: BytesMut::new(),
            closing: false,
        }
    }

    pub fn codec_mut(&mut self) -> &mut PacketCodec {
        &mut self.codec
    }

    /// Reads until one complete packet payload is available.
    ///
    /// Cancel safe: bytes already read stay buffered in the codec.
    pub async fn read_payload(&mut self) -> shared::Result<Bytes> {
        loop {
            if let Some(payload) = self.codec.next_payload()? {
                return Ok(payload);
            }
            if self.fill().await? == 0 {
                return Err(ProtocolError::Io(io::Error::from(io::ErrorKind::UnexpectedEof)));
            }
        }
    }

    /// Reads whatever is available into the codec, 0 on end of stream.
    pub async fn fill(&mut self) -> io::Result<usize> {
        self.stream.read_buf(self.codec.inbound_mut()).await
    }

    pub fn buffered(&mut self) -> usize {
        self.codec.inbound_mut().len()
    }

    /// Frames `payload` into the outbound buffer.
    pub fn queue(&mut self, payload: &[u8]) -> shared::Result<()> {
        self.codec.encode(payload, &mut self.outbound)
    }

    pub async fn flush(&mut self) -> io::Result<()> {
        if !self.outbound.is_empty() {
            self.stream.write_all(&self.outbound).await?;
            self.outbound.clear();
        }
        self.stream.flush().await
    }

    /// Writes bytes as they are, bypassing the codec.
    pub async fn write_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await
    }

    pub fn is_closing(&self) -> bool {
        self.closing
    }

    /// Releases the compression streams and shuts the write half down.
    pub async fn shutdown(&mut self) -> io::Result<()> {
        self.codec.release();
        self.stream.shutdown().await
    }
}

impl<S> SessionIo for Transport<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn send(&mut self, payload: &[u8]) -> shared::Result<()> {
        self.queue(payload)
    }

    fn close(&mut self) {
        self.closing = true;
    }
}

/// Drives one connection to completion.
///
/// Returns the session's conclusion, or `None` if the connection never
/// reached a session (status ping, rejected admission, early disconnect).
pub async fn handle_connection<S>(stream: S, address: IpAddr, gate: Arc<Gatekeeper>) -> Option<Conclusion>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut transport = Transport::new(stream);
    let result = drive(&mut transport, address, &gate).await;

    if let Err(e) = transport.shutdown().await {
        debug!("Shutdown of {} failed: {}", address, e);
    }

    match result {
        Ok(conclusion) => conclusion,
        Err(e) => {
            debug!("Connection from {} ended before verification: {}", address, e);
            None
        }
    }
}

async fn drive<S>(
    transport: &mut Transport<S>,
    address: IpAddr,
    gate: &Arc<Gatekeeper>,
) -> Result<Option<Conclusion>, VerificationError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let request = match timeout(gate.config().read_timeout(), login::read_login(transport)).await {
        Err(_) => {
            debug!("{} sent no login in time", address);
            return Ok(None);
        }
        Ok(Err(e)) => {
            let error = VerificationError::from(e);
            if error.blacklists() {
                warn!("{} blacklisted for a malformed login: {}", address, error);
                gate.mark_blacklisted(address);
            }
            return Err(error);
        }
        Ok(Ok(None)) => {
            debug!("Ignoring status request from {}", address);
            return Ok(None);
        }
        Ok(Ok(Some(request))) => request,
    };
    let version = request.version();

    // Dropped on every path out of here, before the stream is shut down
    let mut guard = TeardownGuard::new(Arc::clone(gate), address);

    let (release_tx, release_rx) = oneshot::channel();
    let admission = gate.admit(address, version, move || {
        let _ = release_tx.send(());
    });

    let ticket = match admission {
        Admission::Queued(ticket) => ticket,
        rejected => {
            let message = rejected
                .rejection_message()
                .unwrap_or("Connection refused.");
            login::reject_login(transport, message).await?;
            return Ok(None);
        }
    };
    guard.set_ticket(ticket);
    debug!(
        "{} ({}) waiting in queue at position {:?}",
        request.username,
        address,
        gate.queue().position(ticket)
    );

    wait_for_release(transport, release_rx).await?;

    let mut session = gate.begin(address, version, Instant::now());
    guard.mark_connecting();

    let conclusion = run_session(transport, &mut session, &request.username, gate).await;
    gate.conclude(&conclusion);
    guard.mark_concluded();
    Ok(Some(conclusion))
}

async fn wait_for_release<S>(
    transport: &mut Transport<S>,
    mut release: oneshot::Receiver<()>,
) -> Result<(), VerificationError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        tokio::select! {
            released = &mut release => {
                return released.map_err(|_| {
                    VerificationError::TransportDisconnect("dropped from the queue".to_string())
                });
            }
            read = transport.fill() => {
                if read? == 0 {
                    return Err(VerificationError::TransportDisconnect(
                        "left the queue".to_string(),
                    ));
                }
                if transport.buffered() > MAX_QUEUED_BYTES {
                    return Err(VerificationError::illegal("data sent while queued"));
                }
            }
        }
    }
}

async fn run_session<S>(
    transport: &mut Transport<S>,
    session: &mut VerificationSession,
    username: &str,
    gate: &Gatekeeper,
) -> Conclusion
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let config = gate.config();

    let mut progress = match login::accept_login(transport, username, config.compression_threshold()).await {
        Ok(()) => match session.start(Instant::now(), transport) {
            // Frames sent while queued
            Progress::Continue => handle_buffered(transport, session, Instant::now()),
            other => other,
        },
        Err(e) => session.fail(e.into(), Instant::now(), transport),
    };
    let mut idle = IdleGuard::new(config.read_timeout(), Instant::now());

    loop {
        if let Err(e) = transport.flush().await {
            if !session.is_finished() {
                progress = session.fail(e.into(), Instant::now(), transport);
            }
        }

        match progress {
            Progress::Concluded(conclusion) => return conclusion,
            Progress::Continue => {}
            Progress::AlreadyFinished => {
                if let Some(conclusion) = session.conclusion() {
                    return conclusion.clone();
                }
            }
        }

        let deadline = idle.deadline().min(session.deadline());
        progress = tokio::select! {
            read = transport.fill() => {
                let now = Instant::now();
                match read {
                    Ok(0) => {
                        let eof = io::Error::from(io::ErrorKind::UnexpectedEof);
                        session.fail(eof.into(), now, transport)
                    }
                    Ok(_) => {
                        // Any byte counts as activity, even mid-frame
                        idle.record_read(now);
                        handle_buffered(transport, session, now)
                    }
                    Err(e) => session.fail(e.into(), now, transport),
                }
            }
            _ = sleep_until(tokio::time::Instant::from_std(deadline)) => {
                let now = Instant::now();
                match session.check_timeout(now, transport) {
                    Progress::Continue if idle.poll(now) => {
                        debug!("{} idle for {:?}", session.address(), idle.idle());
                        session.fail(VerificationError::Timeout(idle.idle()), now, transport)
                    }
                    other => other,
                }
            }
        };
    }
}

/// Feeds every complete buffered frame to the session, stopping at a verdict.
fn handle_buffered<S>(
    transport: &mut Transport<S>,
    session: &mut VerificationSession,
    now: Instant,
) -> Progress
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        let payload = match transport.codec_mut().next_payload() {
            Ok(Some(payload)) => payload,
            Ok(None) => return Progress::Continue,
            Err(e) => return session.fail(e.into(), now, transport),
        };
        let progress = match Serverbound::decode(session.version(), payload) {
            Ok(packet) => session.handle(packet, now, transport),
            Err(e) => session.fail(e.into(), now, transport),
        };
        if !matches!(progress, Progress::Continue) {
            return progress;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GateConfig;
    use shared::packets::{Handshake, LoginClientbound, LoginStart, NextState};
    use shared::ProtocolVersion;
    use tokio::io::duplex;
    use tokio_test::assert_ok;
    use tokio_test::io::Builder;

    fn address() -> IpAddr {
        IpAddr::from([10, 0, 0, 5])
    }

    async fn send_login<S>(client: &mut Transport<S>, next_state: NextState)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut payload = BytesMut::new();
        Handshake {
            protocol_version: ProtocolVersion::V1_12_2,
            server_address: "localhost".to_string(),
            server_port: 25565,
            next_state,
        }
        .encode(&mut payload);
        client.queue(&payload).unwrap();

        payload.clear();
        LoginStart {
            username: "Steve".to_string(),
        }
        .encode(&mut payload);
        client.queue(&payload).unwrap();
        client.flush().await.unwrap();
    }

    #[tokio::test]
    async fn test_frames_split_across_reads() {
        let mock = Builder::new()
            .read(&[0x02, 0x00])
            .read(&[0x2A, 0x01])
            .read(&[0x07])
            .write(&[0x02, 0x01, 0x02])
            .build();
        let mut transport = Transport::new(mock);

        let payload = assert_ok!(transport.read_payload().await);
        assert_eq!(&payload[..], &[0x00, 0x2A]);
        let payload = assert_ok!(transport.read_payload().await);
        assert_eq!(&payload[..], &[0x07]);

        assert_ok!(transport.queue(&[0x01, 0x02]));
        assert_ok!(transport.flush().await);
    }

    #[tokio::test]
    async fn test_read_payload_reports_eof() {
        let (client, server) = duplex(64);
        let mut transport = Transport::new(server);
        drop(client);

        match transport.read_payload().await {
            Err(ProtocolError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("Unexpected result {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_session_close_marks_transport() {
        let (_client, server) = duplex(64);
        let mut transport = Transport::new(server);
        assert!(!transport.is_closing());

        SessionIo::close(&mut transport);
        assert!(transport.is_closing());
    }

    #[tokio::test]
    async fn test_status_ping_ends_without_session() {
        let gate = Arc::new(Gatekeeper::new(GateConfig::default()));
        let (client, server) = duplex(1024);
        let mut client = Transport::new(client);

        send_login(&mut client, NextState::Status).await;
        let conclusion = handle_connection(server, address(), Arc::clone(&gate)).await;

        assert!(conclusion.is_none());
        assert_eq!(gate.snapshot().queued, 0);
    }

    #[tokio::test]
    async fn test_blacklisted_login_is_refused() {
        let gate = Arc::new(Gatekeeper::new(GateConfig::default()));
        gate.mark_blacklisted(address());
        let (client, server) = duplex(1024);
        let mut client = Transport::new(client);

        send_login(&mut client, NextState::Login).await;
        let conclusion = handle_connection(server, address(), Arc::clone(&gate)).await;
        assert!(conclusion.is_none());

        let payload = client.read_payload().await.unwrap();
        assert_eq!(
            LoginClientbound::decode(payload).unwrap(),
            LoginClientbound::disconnect(
                Admission::Blacklisted.rejection_message().unwrap()
            )
        );
        assert_eq!(gate.snapshot().queued, 0);
    }

    #[tokio::test]
    async fn test_malformed_handshake_blacklists() {
        let gate = Arc::new(Gatekeeper::new(GateConfig::default()));
        let (client, server) = duplex(1024);
        let mut client = Transport::new(client);

        // Handshake id followed by a truncated body
        client.queue(&[0x00, 0x05]).unwrap();
        client.flush().await.unwrap();

        assert!(handle_connection(server, address(), Arc::clone(&gate)).await.is_none());
        assert!(gate.is_blacklisted(&address()));
    }

    #[tokio::test]
    async fn test_leaving_the_queue_cleans_up() {
        let gate = Arc::new(Gatekeeper::new(GateConfig::default()));
        let (client, server) = duplex(1024);
        let mut client = Transport::new(client);

        send_login(&mut client, NextState::Login).await;
        let task = tokio::spawn(handle_connection(server, address(), Arc::clone(&gate)));

        while !gate.queue().contains(&address()) {
            tokio::task::yield_now().await;
        }
        drop(client);

        assert!(task.await.unwrap().is_none());
        assert!(!gate.queue().contains(&address()));
        assert!(!gate.connecting().contains(&address()));
        assert!(!gate.is_blacklisted(&address()));
    }
}
