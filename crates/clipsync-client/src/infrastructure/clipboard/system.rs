//! System clipboard backend built on `arboard`.
//!
//! Text is preferred over images: when the clipboard offers both (e.g. a
//! selection copied from a browser), the text form is what gets synced.

use std::borrow::Cow;

use clipsync_core::{ClipboardContent, ImageData};
use tracing::trace;

use crate::application::watch_clipboard::{ClipboardAccess, ClipboardAccessError};

/// The desktop clipboard of the current session.
pub struct SystemClipboard {
    clipboard: arboard::Clipboard,
}

impl SystemClipboard {
    /// Connects to the platform clipboard.
    ///
    /// # Errors
    ///
    /// Returns [`ClipboardAccessError::Unavailable`] when there is no
    /// clipboard to talk to (for example, no display server).
    pub fn new() -> Result<Self, ClipboardAccessError> {
        let clipboard =
            arboard::Clipboard::new().map_err(|e| ClipboardAccessError::Unavailable(e.to_string()))?;
        Ok(Self { clipboard })
    }

    fn get_image(&mut self) -> Result<Option<ClipboardContent>, ClipboardAccessError> {
        match self.clipboard.get_image() {
            Ok(image) => Ok(Some(ClipboardContent::Image(from_arboard(image)?))),
            Err(arboard::Error::ContentNotAvailable) => Ok(None),
            Err(e) => Err(ClipboardAccessError::Read(e.to_string())),
        }
    }
}

impl ClipboardAccess for SystemClipboard {
    fn get(&mut self) -> Result<Option<ClipboardContent>, ClipboardAccessError> {
        match self.clipboard.get_text() {
            Ok(text) => Ok(Some(ClipboardContent::Text(text))),
            Err(e) => {
                trace!("text read failed, trying image: {e}");
                self.get_image()
            }
        }
    }

    fn set(&mut self, content: &ClipboardContent) -> Result<(), ClipboardAccessError> {
        let result = match content {
            ClipboardContent::Text(text) => self.clipboard.set_text(text.as_str()),
            ClipboardContent::Image(image) => self.clipboard.set_image(to_arboard(image)?),
        };
        result.map_err(|e| ClipboardAccessError::Write(e.to_string()))
    }
}

fn from_arboard(image: arboard::ImageData<'_>) -> Result<ImageData, ClipboardAccessError> {
    let width = u32::try_from(image.width)
        .map_err(|_| ClipboardAccessError::Read(format!("image width {} too large", image.width)))?;
    let height = u32::try_from(image.height).map_err(|_| {
        ClipboardAccessError::Read(format!("image height {} too large", image.height))
    })?;
    Ok(ImageData {
        width,
        height,
        rgba: image.bytes.into_owned(),
    })
}

fn to_arboard(image: &ImageData) -> Result<arboard::ImageData<'_>, ClipboardAccessError> {
    if !image.is_well_formed() {
        return Err(ClipboardAccessError::Write(format!(
            "malformed {}x{} image with {} bytes",
            image.width,
            image.height,
            image.rgba.len()
        )));
    }
    Ok(arboard::ImageData {
        width: image.width as usize,
        height: image.height as usize,
        bytes: Cow::Borrowed(&image.rgba),
    })
}
