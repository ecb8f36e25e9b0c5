//! Sync relay: accept loop and per-peer read/write tasks.
//!
//! This module is responsible for:
//!
//! 1. Binding the TCP listener.
//! 2. Accepting client connections and registering each one as a peer.
//! 3. Running two concurrent loops per peer:
//!    - **read**: reads frames, validates them by decoding, and broadcasts
//!      the raw bytes to every *other* peer's outbound queue;
//!    - **write**: drains the peer's own outbound queue onto its socket.
//! 4. Dropping a peer (and only that peer) when either loop ends.
//! 5. Stopping when the `running` flag is cleared.
//!
//! The relay keeps no clipboard state; frames are forwarded byte-for-byte.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use clipsync_core::{decode_frame, read_frame, write_frame, FrameLimits, FramingError};
use thiserror::Error;
use tokio::net::{
    tcp::{OwnedReadHalf, OwnedWriteHalf},
    TcpListener, TcpStream,
};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::application::outbound_queue::{OutboundQueue, SharedFrame, DEFAULT_QUEUE_DEPTH};
use crate::application::peer_registry::{PeerId, PeerRegistry};

/// How long `accept` waits before re-checking the `running` flag.
const ACCEPT_POLL: Duration = Duration::from_millis(200);

/// Errors produced by the relay.
///
/// Only [`RelayError::BindFailed`] is fatal; per-peer errors are logged and
/// end that peer's session.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("bind failed on {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),
}

/// Configuration for the relay.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Address to listen on.
    pub bind_addr: SocketAddr,
    /// Frame size limits applied to every inbound frame.
    pub limits: FrameLimits,
    /// Frames buffered per peer before the oldest is dropped.
    pub queue_depth: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 5563)),
            limits: FrameLimits::default(),
            queue_depth: DEFAULT_QUEUE_DEPTH,
        }
    }
}

/// Shared handle to the relay's peer table.
pub type SharedRegistry = Arc<Mutex<PeerRegistry>>;

/// A bound, not yet running relay.
pub struct SyncRelay {
    listener: TcpListener,
    config: RelayConfig,
    registry: SharedRegistry,
}

impl SyncRelay {
    /// Binds the listener.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::BindFailed`] if the address is in use or not
    /// available to this process.
    pub async fn bind(config: RelayConfig) -> Result<Self, RelayError> {
        let listener = TcpListener::bind(config.bind_addr)
            .await
            .map_err(|source| RelayError::BindFailed {
                addr: config.bind_addr,
                source,
            })?;
        Ok(Self {
            listener,
            config,
            registry: Arc::new(Mutex::new(PeerRegistry::new())),
        })
    }

    /// The address actually bound (useful when binding port 0).
    pub fn local_addr(&self) -> Result<SocketAddr, RelayError> {
        Ok(self.listener.local_addr()?)
    }

    /// Handle to the peer table, e.g. for reporting the peer count.
    pub fn registry(&self) -> SharedRegistry {
        Arc::clone(&self.registry)
    }

    /// Runs the accept loop until `running` is set to `false`.
    ///
    /// On shutdown every peer's queue is closed, which ends its session.
    pub async fn run(self, running: Arc<AtomicBool>) -> Result<(), RelayError> {
        info!("relay listening on {}", self.local_addr()?);
        let limits = self.config.limits;

        while running.load(Ordering::Relaxed) {
            match timeout(ACCEPT_POLL, self.listener.accept()).await {
                Ok(Ok((stream, addr))) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        debug!("could not set TCP_NODELAY for {addr}: {e}");
                    }
                    let queue = Arc::new(OutboundQueue::new(self.config.queue_depth));
                    let id = self
                        .registry
                        .lock()
                        .await
                        .register(addr, Arc::clone(&queue));
                    info!("peer {id} connected");

                    let registry = Arc::clone(&self.registry);
                    tokio::spawn(async move {
                        handle_peer(stream, id, queue, registry, limits).await;
                    });
                }
                Ok(Err(e)) => error!("accept error: {e}"),
                Err(_) => {}
            }
        }

        info!("shutdown flag set; closing all peers");
        self.registry.lock().await.close_all();
        Ok(())
    }
}

/// Services one peer until its connection ends, then unregisters it.
async fn handle_peer(
    stream: TcpStream,
    id: PeerId,
    queue: Arc<OutboundQueue>,
    registry: SharedRegistry,
    limits: FrameLimits,
) {
    let (reader, writer) = stream.into_split();

    let result = tokio::select! {
        r = read_loop(reader, id, &registry, limits) => r,
        r = write_loop(writer, &queue) => r,
    };

    registry.lock().await.remove(&id);
    queue.close();

    match result {
        Ok(()) => info!("peer {id} disconnected"),
        Err(e) => warn!("peer {id} dropped: {e}"),
    }
    if queue.dropped() > 0 {
        info!("peer {id}: {} frames dropped on full queue", queue.dropped());
    }
}

/// Reads frames from one peer and fans them out to the others.
///
/// A frame is forwarded only after it decodes cleanly; any framing error
/// ends the session.
async fn read_loop(
    mut reader: OwnedReadHalf,
    id: PeerId,
    registry: &SharedRegistry,
    limits: FrameLimits,
) -> Result<(), RelayError> {
    while let Some(frame) = read_frame(&mut reader, limits).await? {
        let (snapshot, _) = decode_frame(&frame, limits)?;
        let frame: SharedFrame = frame.into();
        let forwarded = registry.lock().await.broadcast(&id, &frame);
        debug!("forwarded {snapshot} from {id} to {forwarded} peer(s)");
    }
    Ok(())
}

/// Writes queued frames to one peer until its queue is closed.
async fn write_loop(mut writer: OwnedWriteHalf, queue: &OutboundQueue) -> Result<(), RelayError> {
    while let Some(frame) = queue.pop().await {
        write_frame(&mut writer, &frame).await?;
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
