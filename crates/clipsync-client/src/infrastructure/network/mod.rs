//! Network infrastructure for the client: the connection to the relay.
//!
//! Architecture:
//! - [`SyncClient::run`] spawns the change watcher and then loops through
//!   `Disconnected → Connecting → Connected`, reconnecting with exponential
//!   [`Backoff`] until the shared `running` flag is cleared.
//! - While connected, a read loop and a write loop run concurrently on the
//!   two halves of the TCP stream.  The read loop hands accepted snapshots to
//!   the watcher's absorb path; the write loop sends the watcher's latest
//!   local change.
//! - Local changes travel on a `watch` channel, so whatever changed while
//!   the relay was unreachable collapses into the newest value, which is
//!   sent as soon as the next connection is up.

mod backoff;

pub use backoff::Backoff;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clipsync_core::{
    decode_frame, encode_snapshot, read_frame, write_frame, ClipboardContent, ClipboardSnapshot,
    FrameLimits, FramingError, OriginId,
};
use thiserror::Error;
use tokio::{
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpStream,
    },
    sync::{mpsc, watch},
    time::{self, Instant},
};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::application::replay_guard::ReplayGuard;
use crate::application::watch_clipboard::{run_watcher, ChangeWatcher, ClipboardAccess};

/// How often blocking waits re-check the `running` flag.
const SHUTDOWN_POLL: Duration = Duration::from_millis(200);

/// Capacity of the channel carrying remote updates to the watcher.
const REMOTE_QUEUE_DEPTH: usize = 16;

/// Errors that can occur in the client network layer.
#[derive(Debug, Error)]
pub enum ClientNetworkError {
    /// The configured relay address is not of the form `host:port`.
    #[error("invalid relay address {0:?}: expected host:port")]
    InvalidAddress(String),
    /// TCP connection to the relay failed.
    #[error("failed to connect to relay at {addr}: {source}")]
    ConnectFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    /// An I/O error occurred on the established connection.
    #[error("connection I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// A frame could not be read or decoded.
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),
    /// The connection was closed by the relay.
    #[error("connection closed by relay")]
    Closed,
}

/// Configuration for the sync client.
#[derive(Debug, Clone)]
pub struct SyncClientConfig {
    /// Relay address as `host:port`.  Hostnames are resolved on every
    /// connection attempt.
    pub relay_addr: String,
    /// How often the local clipboard is polled.
    pub poll_interval: Duration,
    /// Frame size limits for both directions.
    pub limits: FrameLimits,
    /// First reconnect delay after a connection drops.
    pub initial_backoff: Duration,
    /// Upper bound for the reconnect delay.
    pub max_backoff: Duration,
    /// Give up on a single connection attempt after this long.
    pub connect_timeout: Duration,
}

impl Default for SyncClientConfig {
    fn default() -> Self {
        Self {
            relay_addr: "127.0.0.1:5563".to_string(),
            poll_interval: Duration::from_millis(500),
            limits: FrameLimits::default(),
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// Lifecycle of the client's relay connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Keeps one machine's clipboard in sync through a relay.
pub struct SyncClient {
    config: SyncClientConfig,
    origin: OriginId,
    state_tx: watch::Sender<ConnectionState>,
}

impl SyncClient {
    /// Creates a client with a freshly generated origin id.
    pub fn new(config: SyncClientConfig) -> Self {
        Self::with_origin(config, Uuid::new_v4())
    }

    /// Creates a client that tags its snapshots with `origin`.
    pub fn with_origin(config: SyncClientConfig, origin: OriginId) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            config,
            origin,
            state_tx,
        }
    }

    pub fn origin(&self) -> OriginId {
        self.origin
    }

    pub fn config(&self) -> &SyncClientConfig {
        &self.config
    }

    /// Returns a receiver that observes every connection state change.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Watches `clipboard` and syncs it through the relay until `running`
    /// is cleared.
    ///
    /// Connection failures are never returned; they are logged and retried
    /// with backoff.
    ///
    /// # Errors
    ///
    /// Returns [`ClientNetworkError::InvalidAddress`] if the configured relay
    /// address cannot possibly be connected to.
    pub async fn run<C>(
        &self,
        clipboard: C,
        running: Arc<AtomicBool>,
    ) -> Result<(), ClientNetworkError>
    where
        C: ClipboardAccess + 'static,
    {
        validate_addr(&self.config.relay_addr)?;
        info!("client {} syncing via {}", self.origin, self.config.relay_addr);

        let (local_tx, mut local_rx) = watch::channel(None);
        let (remote_tx, remote_rx) = mpsc::channel(REMOTE_QUEUE_DEPTH);
        let watcher = ChangeWatcher::new(clipboard, self.origin);
        let watcher_task = tokio::spawn(run_watcher(
            watcher,
            self.config.poll_interval,
            local_tx,
            remote_rx,
        ));

        let mut backoff = Backoff::new(self.config.initial_backoff, self.config.max_backoff);
        let mut guard = ReplayGuard::new();
        let mut last_sent = 0u64;

        while running.load(Ordering::Relaxed) {
            self.set_state(ConnectionState::Connecting);
            match self.connect().await {
                Ok(stream) => {
                    backoff.reset();
                    self.set_state(ConnectionState::Connected);
                    info!("connected to relay at {}", self.config.relay_addr);

                    let session = Session {
                        origin: self.origin,
                        limits: self.config.limits,
                        guard: &mut guard,
                        last_sent: &mut last_sent,
                    };
                    match session
                        .serve(stream, &mut local_rx, &remote_tx, &running)
                        .await
                    {
                        Ok(()) => debug!("relay session ended"),
                        Err(e) => warn!("connection to relay lost: {e}"),
                    }
                }
                Err(e) => warn!("{e}"),
            }
            self.set_state(ConnectionState::Disconnected);

            if running.load(Ordering::Relaxed) {
                let delay = backoff.next_delay();
                info!("reconnecting in {delay:?}");
                sleep_while_running(delay, &running).await;
            }
        }

        drop(remote_tx);
        if let Err(e) = watcher_task.await {
            warn!("clipboard watcher task failed: {e}");
        }
        info!("client stopped");
        Ok(())
    }

    async fn connect(&self) -> Result<TcpStream, ClientNetworkError> {
        let addr = &self.config.relay_addr;
        let connect_failed = |source| ClientNetworkError::ConnectFailed {
            addr: addr.clone(),
            source,
        };

        let stream = match time::timeout(self.config.connect_timeout, TcpStream::connect(addr))
            .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(connect_failed(e)),
            Err(_) => {
                return Err(connect_failed(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "connect timed out",
                )))
            }
        };
        stream.set_nodelay(true)?;
        Ok(stream)
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            debug!("connection state {previous:?} -> {state:?}");
        }
    }
}

/// Per-connection view of the state that outlives a single connection.
struct Session<'a> {
    origin: OriginId,
    limits: FrameLimits,
    guard: &'a mut ReplayGuard,
    last_sent: &'a mut u64,
}

impl Session<'_> {
    /// Runs the read and write loops until either ends or `running` clears.
    async fn serve(
        self,
        stream: TcpStream,
        local_rx: &mut watch::Receiver<Option<ClipboardSnapshot>>,
        remote_tx: &mpsc::Sender<ClipboardContent>,
        running: &AtomicBool,
    ) -> Result<(), ClientNetworkError> {
        let (reader, writer) = stream.into_split();
        let Session {
            origin,
            limits,
            guard,
            last_sent,
        } = self;

        let shutdown = async {
            while running.load(Ordering::Relaxed) {
                time::sleep(SHUTDOWN_POLL).await;
            }
        };

        tokio::select! {
            result = read_loop(reader, origin, limits, guard, remote_tx) => result,
            result = write_loop(writer, limits, local_rx, last_sent) => result,
            _ = shutdown => Ok(()),
        }
    }
}

/// Reads frames from the relay and forwards new remote content to the
/// watcher.
async fn read_loop(
    mut reader: OwnedReadHalf,
    origin: OriginId,
    limits: FrameLimits,
    guard: &mut ReplayGuard,
    remote_tx: &mpsc::Sender<ClipboardContent>,
) -> Result<(), ClientNetworkError> {
    loop {
        let Some(frame) = read_frame(&mut reader, limits).await? else {
            return Err(ClientNetworkError::Closed);
        };
        let (snapshot, _) = decode_frame(&frame, limits)?;

        if snapshot.origin == origin {
            trace!("ignoring own snapshot {snapshot}");
            continue;
        }
        if !guard.accept(&snapshot) {
            continue;
        }

        debug!("received {snapshot}");
        if remote_tx.send(snapshot.content).await.is_err() {
            // Watcher is gone; nothing left to apply updates to.
            return Ok(());
        }
    }
}

/// Sends the watcher's newest local snapshot whenever it changes.
///
/// A snapshot that was pending when the previous connection dropped is sent
/// first.  `last_sent` only advances once a frame is fully written.
async fn write_loop(
    mut writer: OwnedWriteHalf,
    limits: FrameLimits,
    local_rx: &mut watch::Receiver<Option<ClipboardSnapshot>>,
    last_sent: &mut u64,
) -> Result<(), ClientNetworkError> {
    loop {
        let pending = local_rx.borrow_and_update().clone();
        if let Some(snapshot) = pending.filter(|s| s.sequence > *last_sent) {
            match encode_snapshot(&snapshot, limits) {
                Ok(frame) => {
                    write_frame(&mut writer, &frame).await?;
                    debug!("sent {snapshot}");
                }
                Err(e) => warn!("not sending {snapshot}: {e}"),
            }
            *last_sent = snapshot.sequence;
        }

        if local_rx.changed().await.is_err() {
            return Ok(());
        }
    }
}

/// Sleeps for `delay`, returning early once `running` is cleared.
async fn sleep_while_running(delay: Duration, running: &AtomicBool) {
    let deadline = Instant::now() + delay;
    while running.load(Ordering::Relaxed) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        time::sleep((deadline - now).min(SHUTDOWN_POLL)).await;
    }
}

/// Rejects addresses that can never be connected to, so a typo fails at
/// startup instead of retrying forever.
fn validate_addr(addr: &str) -> Result<(), ClientNetworkError> {
    let invalid = || ClientNetworkError::InvalidAddress(addr.to_string());
    let (host, port) = addr.rsplit_once(':').ok_or_else(invalid)?;
    if host.is_empty() || port.parse::<u16>().is_err() {
        return Err(invalid());
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::watch_clipboard::ClipboardAccessError;
    use crate::infrastructure::clipboard::mock::MemoryClipboard;
    use tokio::net::TcpListener;

    /// A clipboard whose first read blocks the calling thread, like an X11
    /// selection owner that stops answering.
    struct StuckClipboard {
        first_read: bool,
        stall: Duration,
    }

    impl ClipboardAccess for StuckClipboard {
        fn get(&mut self) -> Result<Option<ClipboardContent>, ClipboardAccessError> {
            if std::mem::take(&mut self.first_read) {
                std::thread::sleep(self.stall);
            }
            Ok(None)
        }

        fn set(&mut self, _content: &ClipboardContent) -> Result<(), ClipboardAccessError> {
            Ok(())
        }
    }

    fn fast_config(relay_addr: String) -> SyncClientConfig {
        SyncClientConfig {
            relay_addr,
            poll_interval: Duration::from_millis(10),
            initial_backoff: Duration::from_millis(20),
            max_backoff: Duration::from_millis(50),
            connect_timeout: Duration::from_secs(1),
            ..Default::default()
        }
    }

    async fn wait_for_state(rx: &mut watch::Receiver<ConnectionState>, state: ConnectionState) {
        time::timeout(Duration::from_secs(5), rx.wait_for(|s| *s == state))
            .await
            .expect("state reached in time")
            .expect("client alive");
    }

    async fn wait_until(mut check: impl FnMut() -> bool) {
        time::timeout(Duration::from_secs(5), async {
            while !check() {
                time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("condition reached in time");
    }

    fn frame(origin: OriginId, sequence: u64, text: &str) -> Vec<u8> {
        let snapshot = ClipboardSnapshot::new(origin, sequence, text.into());
        encode_snapshot(&snapshot, FrameLimits::default()).unwrap()
    }

    #[test]
    fn test_sync_client_config_default_values() {
        // Arrange / Act
        let cfg = SyncClientConfig::default();

        // Assert
        assert_eq!(cfg.relay_addr, "127.0.0.1:5563");
        assert_eq!(cfg.poll_interval, Duration::from_millis(500));
        assert_eq!(cfg.initial_backoff, Duration::from_millis(250));
        assert_eq!(cfg.max_backoff, Duration::from_secs(5));
    }

    #[test]
    fn test_validate_addr_accepts_host_port_forms() {
        assert!(validate_addr("127.0.0.1:5563").is_ok());
        assert!(validate_addr("relay.lan:5563").is_ok());
        assert!(validate_addr("[::1]:5563").is_ok());
    }

    #[test]
    fn test_validate_addr_rejects_missing_or_bad_port() {
        for bad in ["relay.lan", ":5563", "relay.lan:", "relay.lan:99999"] {
            assert!(
                matches!(validate_addr(bad), Err(ClientNetworkError::InvalidAddress(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_run_rejects_invalid_address_immediately() {
        let client = SyncClient::new(fast_config("no-port-here".to_string()));
        let running = Arc::new(AtomicBool::new(true));

        let result = client.run(MemoryClipboard::new(), running).await;

        assert!(matches!(result, Err(ClientNetworkError::InvalidAddress(_))));
    }

    #[tokio::test]
    async fn test_new_client_starts_disconnected() {
        let client = SyncClient::new(SyncClientConfig::default());
        assert_eq!(*client.subscribe_state().borrow(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_local_change_is_sent_to_relay() {
        // Arrange
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let client = Arc::new(SyncClient::new(fast_config(
            listener.local_addr().unwrap().to_string(),
        )));
        let clipboard = MemoryClipboard::new();
        let running = Arc::new(AtomicBool::new(true));
        let task = tokio::spawn({
            let (client, clipboard, running) =
                (Arc::clone(&client), clipboard.clone(), Arc::clone(&running));
            async move { client.run(clipboard, running).await }
        });
        let (mut relay_side, _) = listener.accept().await.unwrap();

        // Act
        clipboard.copy("from this machine");
        let received = time::timeout(
            Duration::from_secs(5),
            read_frame(&mut relay_side, FrameLimits::default()),
        )
        .await
        .unwrap()
        .unwrap()
        .expect("one frame");

        // Assert
        let (snapshot, _) = decode_frame(&received, FrameLimits::default()).unwrap();
        assert_eq!(snapshot.origin, client.origin());
        assert_eq!(snapshot.sequence, 1);
        assert_eq!(snapshot.content, "from this machine".into());

        running.store(false, Ordering::Relaxed);
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_duplicate_and_own_frames_do_not_touch_clipboard() {
        // Arrange
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let client = Arc::new(SyncClient::new(fast_config(
            listener.local_addr().unwrap().to_string(),
        )));
        let clipboard = MemoryClipboard::new();
        let running = Arc::new(AtomicBool::new(true));
        let task = tokio::spawn({
            let (client, clipboard, running) =
                (Arc::clone(&client), clipboard.clone(), Arc::clone(&running));
            async move { client.run(clipboard, running).await }
        });
        let (mut relay_side, _) = listener.accept().await.unwrap();
        let peer = Uuid::new_v4();

        // Act – the same snapshot twice, then an older one, then our own
        write_frame(&mut relay_side, &frame(peer, 5, "remote")).await.unwrap();
        write_frame(&mut relay_side, &frame(peer, 5, "remote")).await.unwrap();
        write_frame(&mut relay_side, &frame(peer, 4, "stale")).await.unwrap();
        write_frame(&mut relay_side, &frame(client.origin(), 9, "mine"))
            .await
            .unwrap();
        wait_until(|| clipboard.content() == Some("remote".into())).await;
        time::sleep(Duration::from_millis(100)).await;

        // Assert
        assert_eq!(clipboard.write_count(), 1);
        assert_eq!(clipboard.content(), Some("remote".into()));

        running.store(false, Ordering::Relaxed);
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_malformed_frame_drops_connection_and_client_reconnects() {
        // Arrange
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let client = Arc::new(SyncClient::new(fast_config(
            listener.local_addr().unwrap().to_string(),
        )));
        let mut state = client.subscribe_state();
        let running = Arc::new(AtomicBool::new(true));
        let task = tokio::spawn({
            let (client, running) = (Arc::clone(&client), Arc::clone(&running));
            async move { client.run(MemoryClipboard::new(), running).await }
        });
        let (mut relay_side, _) = listener.accept().await.unwrap();
        wait_for_state(&mut state, ConnectionState::Connected).await;

        // Act – a frame with an unsupported version byte
        let mut bad = frame(Uuid::new_v4(), 1, "x");
        bad[4] = 0xEE;
        write_frame(&mut relay_side, &bad).await.unwrap();

        // Assert – the client drops the link and dials again
        let reconnect = time::timeout(Duration::from_secs(5), listener.accept()).await;
        assert!(reconnect.is_ok(), "client must reconnect after a framing error");

        running.store(false, Ordering::Relaxed);
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_change_made_while_disconnected_is_sent_after_connect() {
        // Arrange – reserve a port, then close it so the first attempts fail
        let addr = {
            let probe = TcpListener::bind("127.0.0.1:0").await.unwrap();
            probe.local_addr().unwrap()
        };
        let client = Arc::new(SyncClient::new(fast_config(addr.to_string())));
        let clipboard = MemoryClipboard::new();
        let running = Arc::new(AtomicBool::new(true));
        let task = tokio::spawn({
            let (client, clipboard, running) =
                (Arc::clone(&client), clipboard.clone(), Arc::clone(&running));
            async move { client.run(clipboard, running).await }
        });

        // Act – two offline changes; only the newer one matters
        time::sleep(Duration::from_millis(50)).await;
        clipboard.copy("first offline edit");
        time::sleep(Duration::from_millis(50)).await;
        clipboard.copy("second offline edit");
        time::sleep(Duration::from_millis(50)).await;
        let listener = TcpListener::bind(addr).await.unwrap();
        let (mut relay_side, _) = listener.accept().await.unwrap();
        let received = time::timeout(
            Duration::from_secs(5),
            read_frame(&mut relay_side, FrameLimits::default()),
        )
        .await
        .unwrap()
        .unwrap()
        .expect("pending change");

        // Assert
        let (snapshot, _) = decode_frame(&received, FrameLimits::default()).unwrap();
        assert_eq!(snapshot.content, "second offline edit".into());

        running.store(false, Ordering::Relaxed);
        task.await.unwrap().unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_blocked_clipboard_read_does_not_hold_up_connecting() {
        // Arrange
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let client = Arc::new(SyncClient::new(fast_config(
            listener.local_addr().unwrap().to_string(),
        )));
        let mut state = client.subscribe_state();
        let running = Arc::new(AtomicBool::new(true));
        let clipboard = StuckClipboard {
            first_read: true,
            stall: Duration::from_secs(2),
        };
        let started = Instant::now();

        // Act
        let task = tokio::spawn({
            let (client, running) = (Arc::clone(&client), Arc::clone(&running));
            async move { client.run(clipboard, running).await }
        });
        let _relay_side = listener.accept().await.unwrap();
        time::timeout(
            Duration::from_millis(1000),
            state.wait_for(|s| *s == ConnectionState::Connected),
        )
        .await
        .expect("connected while the clipboard read was still blocked")
        .unwrap();

        // Assert
        assert!(started.elapsed() < Duration::from_secs(2));

        running.store(false, Ordering::Relaxed);
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_oversize_local_change_is_skipped_and_connection_kept() {
        // Arrange – a limit that fits short text but not a 4 KiB paste
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let client = Arc::new(SyncClient::new(SyncClientConfig {
            limits: FrameLimits::new(256),
            ..fast_config(listener.local_addr().unwrap().to_string())
        }));
        let mut state = client.subscribe_state();
        let clipboard = MemoryClipboard::new();
        let running = Arc::new(AtomicBool::new(true));
        let task = tokio::spawn({
            let (client, clipboard, running) =
                (Arc::clone(&client), clipboard.clone(), Arc::clone(&running));
            async move { client.run(clipboard, running).await }
        });
        let (mut relay_side, _) = listener.accept().await.unwrap();
        wait_for_state(&mut state, ConnectionState::Connected).await;

        // Act
        clipboard.copy("x".repeat(4096));
        time::sleep(Duration::from_millis(100)).await;
        clipboard.copy("fits");
        let received = time::timeout(
            Duration::from_secs(5),
            read_frame(&mut relay_side, FrameLimits::default()),
        )
        .await
        .unwrap()
        .unwrap()
        .expect("the small change");

        // Assert – the oversize value consumed sequence 1 but was never sent
        let (snapshot, _) = decode_frame(&received, FrameLimits::default()).unwrap();
        assert_eq!(snapshot.content, "fits".into());
        assert_eq!(snapshot.sequence, 2);
        assert_eq!(*state.borrow(), ConnectionState::Connected);
        let redial = time::timeout(Duration::from_millis(200), listener.accept()).await;
        assert!(redial.is_err(), "client must not reconnect");

        running.store(false, Ordering::Relaxed);
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_clearing_running_flag_stops_reconnect_loop() {
        // Arrange – nothing listens on port 1
        let client = SyncClient::new(fast_config("127.0.0.1:1".to_string()));
        let running = Arc::new(AtomicBool::new(true));
        let stopper = Arc::clone(&running);

        // Act
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(100)).await;
            stopper.store(false, Ordering::Relaxed);
        });
        let result = time::timeout(
            Duration::from_secs(5),
            client.run(MemoryClipboard::new(), running),
        )
        .await;

        // Assert
        assert!(result.expect("run must return after shutdown").is_ok());
    }
}
