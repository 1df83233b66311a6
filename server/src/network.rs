//! Server network layer accepting TCP logins and pacing the admission queue

use crate::config::GateConfig;
use crate::connection::handle_connection;
use crate::gatekeeper::Gatekeeper;
use log::{debug, error, info};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::{interval, MissedTickBehavior};

/// Gate server owning the listener and the shared [`Gatekeeper`]
pub struct Server {
    listener: TcpListener,
    gate: Arc<Gatekeeper>,
}

impl Server {
    pub async fn new(addr: &str, config: GateConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(addr).await?;
        info!("Server listening on {}", listener.local_addr()?);

        Ok(Server {
            listener,
            gate: Arc::new(Gatekeeper::new(config)),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn gatekeeper(&self) -> Arc<Gatekeeper> {
        Arc::clone(&self.gate)
    }

    /// Spawns task that releases queued logins at a fixed pace
    fn spawn_queue_poller(&self) {
        let gate = Arc::clone(&self.gate);
        let period = gate.config().queue_poll_interval();

        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut ticks: u64 = 0;

            loop {
                ticker.tick().await;
                let released = gate.poll_queue();
                if released > 0 {
                    debug!("Released {} queued logins", released);
                }

                ticks += 1;
                // Periodic summary, roughly once a minute at default pace
                if ticks % summary_every(period) == 0 {
                    let snapshot = gate.snapshot();
                    info!(
                        "Gate: {} queued, {} verifying, {} verified, {} blacklisted ({} attempts, {:.0}ms avg)",
                        snapshot.queued,
                        snapshot.connecting,
                        snapshot.verified,
                        snapshot.blacklisted,
                        snapshot.totals.attempted,
                        snapshot.totals.average_verification_ms
                    );
                }
            }
        });
    }

    /// Accept loop; runs until the listener fails.
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_queue_poller();
        info!("Server started successfully");

        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        debug!("Could not disable Nagle for {}: {}", peer, e);
                    }
                    let gate = Arc::clone(&self.gate);
                    tokio::spawn(async move {
                        handle_connection(stream, peer.ip(), gate).await;
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
    }
}

fn summary_every(period: Duration) -> u64 {
    (60_000 / period.as_millis().max(1) as u64).max(1)
}
