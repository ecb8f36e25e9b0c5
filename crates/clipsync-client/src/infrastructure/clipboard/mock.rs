//! In-memory clipboard.
//!
//! [`MemoryClipboard`] stands in for the desktop clipboard in tests and in
//! headless runs.  Clones share the same storage, so a test can hand one
//! clone to a watcher and keep another to simulate the user copying
//! something, then inspect what the watcher wrote.
//!
//! # Failure injection
//!
//! [`MemoryClipboard::fail_reads`] and [`MemoryClipboard::fail_writes`] make
//! every subsequent `get` or `set` return an error, for exercising the
//! "skip the cycle, never crash" paths.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use clipsync_core::ClipboardContent;

use crate::application::watch_clipboard::{ClipboardAccess, ClipboardAccessError};

#[derive(Debug, Default)]
struct Inner {
    content: Option<ClipboardContent>,
    /// Number of successful `set` calls.
    writes: usize,
    fail_reads: bool,
    fail_writes: bool,
}

/// A shareable in-process clipboard.
#[derive(Debug, Clone, Default)]
pub struct MemoryClipboard {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryClipboard {
    /// Creates an empty clipboard.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Simulates the user copying `content`.  Not counted as a write.
    pub fn copy(&self, content: impl Into<ClipboardContent>) {
        self.lock().content = Some(content.into());
    }

    /// Returns what the clipboard currently holds.
    pub fn content(&self) -> Option<ClipboardContent> {
        self.lock().content.clone()
    }

    /// Number of writes made through [`ClipboardAccess::set`].
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }

    pub fn fail_reads(&self, fail: bool) {
        self.lock().fail_reads = fail;
    }

    pub fn fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }
}

impl ClipboardAccess for MemoryClipboard {
    fn get(&mut self) -> Result<Option<ClipboardContent>, ClipboardAccessError> {
        let inner = self.lock();
        if inner.fail_reads {
            return Err(ClipboardAccessError::Read("simulated read failure".into()));
        }
        Ok(inner.content.clone())
    }

    fn set(&mut self, content: &ClipboardContent) -> Result<(), ClipboardAccessError> {
        let mut inner = self.lock();
        if inner.fail_writes {
            return Err(ClipboardAccessError::Write("simulated write failure".into()));
        }
        inner.content = Some(content.clone());
        inner.writes += 1;
        Ok(())
    }
}
