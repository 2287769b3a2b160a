use std::io;
use std::net::SocketAddr;

use log::{debug, error, info, warn};
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::{broadcast, mpsc};

use crate::config::ListenerSettings;
use crate::frame;
use crate::messages::DisplayState;

/// Back-to-back non-transient receive failures before the socket is written off.
const MAX_CONSECUTIVE_ERRORS: u32 = 8;

#[derive(Error, Debug)]
pub enum ListenerError {
    #[error("failed to bind UDP socket on {addr}: {source}")]
    Bind { addr: SocketAddr, source: io::Error },

    #[error("UDP socket is no longer usable: {0}")]
    Receive(#[source] io::Error),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ListenStats {
    pub received: u64,
    pub decoded: u64,
    pub rejected: u64,
    pub dropped: u64,
}

pub struct TelemetryListener {
    socket: UdpSocket,
    buffer_size: usize,
}

impl TelemetryListener {
    pub async fn bind(settings: &ListenerSettings) -> Result<Self, ListenerError> {
        let socket = UdpSocket::bind(settings.bind_addr)
            .await
            .map_err(|source| ListenerError::Bind {
                addr: settings.bind_addr,
                source,
            })?;

        let listener = TelemetryListener {
            socket,
            buffer_size: settings.buffer_size,
        };
        match listener.local_addr() {
            Ok(addr) => info!("Listening for telemetry on {}", addr),
            Err(_) => info!("Listening for telemetry on {}", settings.bind_addr),
        }
        Ok(listener)
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Receives until `shutdown` fires or the presenter goes away.
    ///
    /// Never waits on the presenter: a full delivery channel drops the state.
    pub async fn run(
        self,
        tx: mpsc::Sender<DisplayState>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<ListenStats, ListenerError> {
        // One spare byte so a datagram the OS had to truncate is detectable
        let mut buffer = vec![0u8; self.buffer_size + 1];
        let mut stats = ListenStats::default();
        let mut errors = ErrorBudget::default();

        loop {
            tokio::select! {
                biased;

                _ = shutdown.recv() => {
                    debug!("Shutdown requested, closing telemetry socket");
                    break;
                }
                result = self.socket.recv_from(&mut buffer) => {
                    let (len, src) = match result {
                        Ok(received) => {
                            errors.success();
                            received
                        }
                        Err(err) => {
                            errors.failure(err)?;
                            continue;
                        }
                    };
                    stats.received += 1;

                    if len > self.buffer_size {
                        debug!(
                            "Discarding oversized datagram from {} (over {} bytes)",
                            src, self.buffer_size
                        );
                        stats.rejected += 1;
                        continue;
                    }

                    let state = match frame::decode(&buffer[..len]) {
                        Ok(state) => state,
                        Err(err) => {
                            debug!("Discarding {} byte datagram from {}: {}", len, src, err);
                            stats.rejected += 1;
                            continue;
                        }
                    };
                    stats.decoded += 1;
                    debug!("Received {} frame from {}", state.label(), src);

                    match tx.try_send(state) {
                        Ok(()) => {}
                        Err(mpsc::error::TrySendError::Full(_)) => {
                            warn!("Presenter is behind, dropping {} frame", state.label());
                            stats.dropped += 1;
                        }
                        Err(mpsc::error::TrySendError::Closed(_)) => {
                            info!("Presenter has gone away, stopping listener");
                            break;
                        }
                    }
                }
            }
        }

        Ok(stats)
    }
}

/// Tracks back-to-back receive failures.
///
/// Transient errors are always retried. Anything else is retried until
/// `MAX_CONSECUTIVE_ERRORS` of them arrive without a successful receive.
#[derive(Debug, Default)]
struct ErrorBudget {
    consecutive: u32,
}

impl ErrorBudget {
    fn success(&mut self) {
        self.consecutive = 0;
    }

    fn failure(&mut self, err: io::Error) -> Result<(), ListenerError> {
        if is_transient(&err) {
            warn!("Transient error receiving telemetry: {}", err);
            return Ok(());
        }
        self.consecutive += 1;
        if self.consecutive >= MAX_CONSECUTIVE_ERRORS {
            error!(
                "Giving up on telemetry socket after {} errors",
                self.consecutive
            );
            return Err(ListenerError::Receive(err));
        }
        error!("Error receiving telemetry: {:?}", err);
        Ok(())
    }
}

fn is_transient(err: &io::Error) -> bool {
    // ICMP port-unreachable surfaces as a reset/refused on some platforms
    matches!(
        err.kind(),
        io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionRefused
    )
}
