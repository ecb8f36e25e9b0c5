//! Clipboard backends.
//!
//! Every backend implements [`ClipboardAccess`].  The right one is picked at
//! startup with [`open`]; the rest of the client only ever sees the trait.

use crate::application::watch_clipboard::{ClipboardAccess, ClipboardAccessError};

pub mod mock;
pub mod system;

#[cfg(target_os = "linux")]
pub mod wayland;

/// Which clipboard implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClipboardBackend {
    /// The platform clipboard via `arboard` (X11, Windows, macOS, and
    /// Wayland through XWayland).
    #[default]
    System,
    /// The native Wayland data-control protocol (Linux only).
    Wayland,
}

/// Opens the requested backend.
///
/// # Errors
///
/// Returns [`ClipboardAccessError::Unavailable`] when the backend cannot be
/// used on this machine, e.g. no display server or a non-Linux Wayland
/// request.
pub fn open(
    backend: ClipboardBackend,
) -> Result<Box<dyn ClipboardAccess>, ClipboardAccessError> {
    match backend {
        ClipboardBackend::System => Ok(Box::new(system::SystemClipboard::new()?)),
        #[cfg(target_os = "linux")]
        ClipboardBackend::Wayland => Ok(Box::new(wayland::WaylandClipboard::new())),
        #[cfg(not(target_os = "linux"))]
        ClipboardBackend::Wayland => Err(ClipboardAccessError::Unavailable(
            "the Wayland backend is only available on Linux".to_string(),
        )),
    }
}
