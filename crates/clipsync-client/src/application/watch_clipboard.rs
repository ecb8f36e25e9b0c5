//! Change watcher: the single authority on what the clipboard currently holds.
//!
//! The watcher polls a [`ClipboardAccess`] implementation on a fixed interval
//! and emits exactly one [`ClipboardSnapshot`] per genuine local change.
//! Updates arriving from the relay go through [`ChangeWatcher::absorb`],
//! which records the value as known in the same step that writes it, so the
//! next poll sees no difference and the update is never echoed back.
//!
//! `poll` and `absorb` both take `&mut self` and are driven one at a time by
//! [`run_watcher`], which moves the watcher onto the blocking pool for each
//! call, so the watcher state needs no lock.

use std::time::Duration;

use clipsync_core::{ClipboardContent, ClipboardSnapshot, OriginId};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Error type for clipboard read/write operations.
///
/// Never fatal: the watcher logs it and tries again on the next cycle.
#[derive(Debug, Error)]
pub enum ClipboardAccessError {
    #[error("clipboard unavailable: {0}")]
    Unavailable(String),
    #[error("failed to read clipboard: {0}")]
    Read(String),
    #[error("failed to write clipboard: {0}")]
    Write(String),
}

/// Platform-agnostic clipboard get/set capability.
///
/// Each backend (system clipboard, Wayland, in-memory) provides an
/// implementation in the infrastructure layer.
#[cfg_attr(test, mockall::automock)]
pub trait ClipboardAccess: Send {
    /// Returns the current clipboard content, or `None` when the clipboard is
    /// empty or holds nothing we can represent.
    fn get(&mut self) -> Result<Option<ClipboardContent>, ClipboardAccessError>;

    /// Replaces the clipboard content.
    fn set(&mut self, content: &ClipboardContent) -> Result<(), ClipboardAccessError>;
}

impl<C: ClipboardAccess + ?Sized> ClipboardAccess for Box<C> {
    fn get(&mut self) -> Result<Option<ClipboardContent>, ClipboardAccessError> {
        (**self).get()
    }

    fn set(&mut self, content: &ClipboardContent) -> Result<(), ClipboardAccessError> {
        (**self).set(content)
    }
}

/// What the watcher believes the clipboard holds.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WatcherState {
    /// Last content seen by a poll or written by an absorb.
    pub last_known: Option<ClipboardContent>,
    /// Sequence number of the last emitted snapshot (0 before the first).
    pub last_sequence: u64,
}

/// Detects local clipboard changes and applies remote ones.
pub struct ChangeWatcher<C: ClipboardAccess> {
    clipboard: C,
    origin: OriginId,
    state: WatcherState,
}

impl<C: ClipboardAccess> ChangeWatcher<C> {
    /// Creates a watcher that tags its snapshots with `origin`.
    pub fn new(clipboard: C, origin: OriginId) -> Self {
        Self {
            clipboard,
            origin,
            state: WatcherState::default(),
        }
    }

    pub fn origin(&self) -> OriginId {
        self.origin
    }

    pub fn state(&self) -> &WatcherState {
        &self.state
    }

    /// Records the clipboard's current content as known without emitting it.
    ///
    /// Called once before the first poll so that whatever a machine happens
    /// to hold at startup does not overwrite every other peer on join.
    pub fn prime(&mut self) {
        match self.clipboard.get() {
            Ok(current) => self.state.last_known = current,
            Err(e) => debug!("could not read clipboard at startup: {e}"),
        }
    }

    /// Reads the clipboard and returns a new snapshot if it changed.
    ///
    /// Read failures and an empty clipboard are treated as "no change".
    pub fn poll(&mut self) -> Option<ClipboardSnapshot> {
        let current = match self.clipboard.get() {
            Ok(Some(content)) => content,
            Ok(None) => return None,
            Err(e) => {
                debug!("skipping poll: {e}");
                return None;
            }
        };

        if self.state.last_known.as_ref() == Some(&current) {
            return None;
        }

        self.state.last_sequence += 1;
        self.state.last_known = Some(current.clone());
        Some(ClipboardSnapshot::new(
            self.origin,
            self.state.last_sequence,
            current,
        ))
    }

    /// Applies a remote update without reporting it as a local change.
    ///
    /// The value becomes `last_known` even when the write fails, so a
    /// flaky clipboard can never turn a remote update into an echo.  The
    /// write is skipped when the clipboard already holds the value.
    ///
    /// # Errors
    ///
    /// Returns [`ClipboardAccessError`] if the clipboard write fails.
    pub fn absorb(&mut self, content: ClipboardContent) -> Result<(), ClipboardAccessError> {
        let already_there = matches!(self.clipboard.get(), Ok(Some(ref c)) if *c == content);
        let written = if already_there {
            Ok(())
        } else {
            self.clipboard.set(&content)
        };
        self.state.last_known = Some(content);
        written
    }
}

/// Drives a watcher: polls on every tick and absorbs remote updates in
/// between.
///
/// Local changes are published on `local_tx`; a `watch` channel keeps only
/// the newest one, which is exactly last-write-wins for a connection that is
/// slow or temporarily down.  Returns when `remote_rx` is closed.
///
/// Clipboard backends make blocking calls (X11 selection round-trips,
/// Wayland pipe reads), so every `prime`, `poll` and `absorb` runs on the
/// blocking pool.  A stuck selection owner then stalls only this task.
pub async fn run_watcher<C>(
    watcher: ChangeWatcher<C>,
    poll_interval: Duration,
    local_tx: watch::Sender<Option<ClipboardSnapshot>>,
    mut remote_rx: mpsc::Receiver<ClipboardContent>,
) where
    C: ClipboardAccess + 'static,
{
    let Some((mut watcher, ())) = on_blocking_pool(watcher, ChangeWatcher::prime).await else {
        return;
    };
    info!("watching clipboard every {poll_interval:?}");

    let mut ticker = interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let Some((w, change)) = on_blocking_pool(watcher, ChangeWatcher::poll).await else {
                    return;
                };
                watcher = w;
                if let Some(snapshot) = change {
                    debug!("local change {snapshot}");
                    local_tx.send_replace(Some(snapshot));
                }
            }
            remote = remote_rx.recv() => match remote {
                Some(content) => {
                    debug!("absorbing remote {content}");
                    let Some((w, written)) =
                        on_blocking_pool(watcher, move |w| w.absorb(content)).await
                    else {
                        return;
                    };
                    watcher = w;
                    if let Err(e) = written {
                        warn!("could not apply remote clipboard update: {e}");
                    }
                }
                None => break,
            },
        }
    }

    debug!("clipboard watcher stopped");
}

/// Runs `op` against the watcher on Tokio's blocking pool and hands the
/// watcher back with the result.  `None` means the operation panicked.
async fn on_blocking_pool<C, T, F>(
    mut watcher: ChangeWatcher<C>,
    op: F,
) -> Option<(ChangeWatcher<C>, T)>
where
    C: ClipboardAccess + 'static,
    T: Send + 'static,
    F: FnOnce(&mut ChangeWatcher<C>) -> T + Send + 'static,
{
    match task::spawn_blocking(move || {
        let out = op(&mut watcher);
        (watcher, out)
    })
    .await
    {
        Ok(pair) => Some(pair),
        Err(e) => {
            error!("clipboard access panicked, stopping watcher: {e}");
            None
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clipboard::mock::MemoryClipboard;
    use uuid::Uuid;

    fn make_watcher() -> (ChangeWatcher<MemoryClipboard>, MemoryClipboard) {
        let clipboard = MemoryClipboard::new();
        let watcher = ChangeWatcher::new(clipboard.clone(), Uuid::new_v4());
        (watcher, clipboard)
    }

    #[test]
    fn test_poll_on_empty_clipboard_emits_nothing() {
        let (mut watcher, _clipboard) = make_watcher();
        assert!(watcher.poll().is_none());
    }

    #[test]
    fn test_poll_emits_once_per_change() {
        // Arrange
        let (mut watcher, clipboard) = make_watcher();
        clipboard.copy("hello");

        // Act
        let first = watcher.poll();
        let second = watcher.poll();

        // Assert
        let snapshot = first.expect("change must be reported");
        assert_eq!(snapshot.content, "hello".into());
        assert_eq!(snapshot.sequence, 1);
        assert_eq!(snapshot.origin, watcher.origin());
        assert!(second.is_none(), "unchanged clipboard must stay silent");
    }

    #[test]
    fn test_sequence_increases_with_each_change() {
        let (mut watcher, clipboard) = make_watcher();

        clipboard.copy("a");
        let a = watcher.poll().unwrap();
        clipboard.copy("b");
        let b = watcher.poll().unwrap();
        clipboard.copy("a");
        let a_again = watcher.poll().unwrap();

        assert_eq!((a.sequence, b.sequence, a_again.sequence), (1, 2, 3));
        assert_eq!(watcher.state().last_sequence, 3);
    }

    #[test]
    fn test_absorb_writes_clipboard_without_emitting() {
        // Arrange
        let (mut watcher, clipboard) = make_watcher();

        // Act
        watcher.absorb("remote".into()).unwrap();

        // Assert
        assert_eq!(clipboard.content(), Some("remote".into()));
        for _ in 0..100 {
            assert!(watcher.poll().is_none(), "absorbed value must never echo");
        }
        assert_eq!(watcher.state().last_sequence, 0);
    }

    #[test]
    fn test_absorb_skips_write_when_clipboard_already_matches() {
        let (mut watcher, clipboard) = make_watcher();
        clipboard.copy("same");
        let writes_before = clipboard.write_count();

        watcher.absorb("same".into()).unwrap();

        assert_eq!(clipboard.write_count(), writes_before);
    }

    #[test]
    fn test_local_change_after_absorb_is_reported() {
        let (mut watcher, clipboard) = make_watcher();
        watcher.absorb("remote".into()).unwrap();

        clipboard.copy("local");

        let snapshot = watcher.poll().expect("genuine change must be reported");
        assert_eq!(snapshot.content, "local".into());
    }

    #[test]
    fn test_prime_suppresses_startup_content() {
        let (mut watcher, clipboard) = make_watcher();
        clipboard.copy("was here before start");

        watcher.prime();

        assert!(watcher.poll().is_none());
    }

    #[test]
    fn test_read_failure_skips_cycle_and_keeps_state() {
        // Arrange
        let mut clipboard = MockClipboardAccess::new();
        clipboard
            .expect_get()
            .times(1)
            .returning(|| Err(ClipboardAccessError::Read("locked by another app".into())));
        let mut watcher = ChangeWatcher::new(clipboard, Uuid::new_v4());

        // Act
        let result = watcher.poll();

        // Assert
        assert!(result.is_none());
        assert_eq!(watcher.state(), &WatcherState::default());
    }

    #[test]
    fn test_failed_absorb_write_still_suppresses_echo() {
        // Arrange – the clipboard rejects the write, then later reports the
        // value anyway (e.g. another process set it)
        let mut clipboard = MockClipboardAccess::new();
        let mut reads = 0;
        clipboard.expect_get().returning(move || {
            reads += 1;
            if reads == 1 {
                Ok(None)
            } else {
                Ok(Some("remote".into()))
            }
        });
        clipboard
            .expect_set()
            .times(1)
            .returning(|_| Err(ClipboardAccessError::Write("denied".into())));
        let mut watcher = ChangeWatcher::new(clipboard, Uuid::new_v4());

        // Act
        let absorbed = watcher.absorb("remote".into());

        // Assert
        assert!(absorbed.is_err());
        assert!(watcher.poll().is_none());
    }

    #[tokio::test]
    async fn test_run_watcher_publishes_changes_and_absorbs_remote() {
        // Arrange
        let clipboard = MemoryClipboard::new();
        let watcher = ChangeWatcher::new(clipboard.clone(), Uuid::new_v4());
        let (local_tx, mut local_rx) = watch::channel(None);
        let (remote_tx, remote_rx) = mpsc::channel(4);
        let task = tokio::spawn(run_watcher(
            watcher,
            Duration::from_millis(10),
            local_tx,
            remote_rx,
        ));

        // Act – a local copy is published
        clipboard.copy("typed locally");
        local_rx.changed().await.unwrap();
        let published = local_rx.borrow_and_update().clone().unwrap();

        // Act – a remote update is written but never published
        remote_tx.send("from peer".into()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        // Assert
        assert_eq!(published.content, "typed locally".into());
        assert_eq!(clipboard.content(), Some("from peer".into()));
        assert!(!local_rx.has_changed().unwrap(), "remote update must not echo");

        drop(remote_tx);
        task.await.unwrap();
    }
}
