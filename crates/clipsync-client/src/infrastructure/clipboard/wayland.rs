//! Native Wayland clipboard backend (Linux).
//!
//! Talks to the compositor through the data-control protocol via
//! `wl-clipboard-rs`, which works on compositors where `arboard` can only
//! see the XWayland clipboard.  Images are offered by Wayland applications
//! in an encoded format (PNG, JPEG, ...) and are decoded to RGBA with the
//! `image` crate; outgoing images are offered as PNG.

use std::io::Read;

use clipsync_core::{ClipboardContent, ImageData};
use image::ImageEncoder as _;
use tracing::trace;
use wl_clipboard_rs::{copy, paste};

use crate::application::watch_clipboard::{ClipboardAccess, ClipboardAccessError};

/// The regular (Ctrl+C) clipboard of the current Wayland seat.
#[derive(Debug, Default)]
pub struct WaylandClipboard;

impl WaylandClipboard {
    pub fn new() -> Self {
        Self
    }

    fn get_text(&mut self) -> Result<Option<String>, ClipboardAccessError> {
        let Some((bytes, _)) = read_offer(paste::MimeType::Text)? else {
            return Ok(None);
        };
        Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
    }

    fn get_image(&mut self) -> Result<Option<ImageData>, ClipboardAccessError> {
        let Some((bytes, mime)) = read_offer(paste::MimeType::Any)? else {
            return Ok(None);
        };
        let Some(format) = image_format(&mime) else {
            trace!("ignoring clipboard offer of type {mime}");
            return Ok(None);
        };
        decode_image(&bytes, format).map(Some)
    }
}

impl ClipboardAccess for WaylandClipboard {
    fn get(&mut self) -> Result<Option<ClipboardContent>, ClipboardAccessError> {
        match self.get_text() {
            Ok(Some(text)) => return Ok(Some(ClipboardContent::Text(text))),
            Ok(None) => {}
            Err(e) => trace!("text read failed, trying image: {e}"),
        }
        Ok(self.get_image()?.map(ClipboardContent::Image))
    }

    fn set(&mut self, content: &ClipboardContent) -> Result<(), ClipboardAccessError> {
        let (source, mime) = match content {
            ClipboardContent::Text(text) => (
                copy::Source::Bytes(text.as_bytes().into()),
                copy::MimeType::Text,
            ),
            ClipboardContent::Image(image) => (
                copy::Source::Bytes(encode_png(image)?.into()),
                copy::MimeType::Specific("image/png".to_string()),
            ),
        };

        let mut opts = copy::Options::new();
        opts.clipboard(copy::ClipboardType::Regular);
        opts.copy(source, mime)
            .map_err(|e| ClipboardAccessError::Write(e.to_string()))
    }
}

/// Reads the current offer in `mime`.  An empty clipboard or an offer with
/// no matching type is `None`.
fn read_offer(
    mime: paste::MimeType<'_>,
) -> Result<Option<(Vec<u8>, String)>, ClipboardAccessError> {
    let (mut pipe, offered) = match paste::get_contents(
        paste::ClipboardType::Regular,
        paste::Seat::Unspecified,
        mime,
    ) {
        Ok(offer) => offer,
        Err(paste::Error::ClipboardEmpty | paste::Error::NoMimeType) => return Ok(None),
        Err(paste::Error::MissingProtocol { name, version }) => {
            return Err(ClipboardAccessError::Unavailable(format!(
                "compositor lacks {name} v{version}"
            )))
        }
        Err(e) => return Err(ClipboardAccessError::Read(e.to_string())),
    };

    let mut bytes = Vec::new();
    pipe.read_to_end(&mut bytes)
        .map_err(|e| ClipboardAccessError::Read(e.to_string()))?;
    Ok(Some((bytes, offered)))
}

fn image_format(mime: &str) -> Option<image::ImageFormat> {
    match mime {
        "image/png" => Some(image::ImageFormat::Png),
        "image/gif" => Some(image::ImageFormat::Gif),
        "image/webp" => Some(image::ImageFormat::WebP),
        "image/jpg" | "image/jpeg" => Some(image::ImageFormat::Jpeg),
        _ => None,
    }
}

fn decode_image(bytes: &[u8], format: image::ImageFormat) -> Result<ImageData, ClipboardAccessError> {
    let decoded = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| ClipboardAccessError::Read(format!("undecodable image: {e}")))?
        .into_rgba8();
    let (width, height) = decoded.dimensions();
    Ok(ImageData {
        width,
        height,
        rgba: decoded.into_raw(),
    })
}

fn encode_png(image: &ImageData) -> Result<Vec<u8>, ClipboardAccessError> {
    if image.width == 0 || image.height == 0 || !image.is_well_formed() {
        return Err(ClipboardAccessError::Write(format!(
            "refusing to offer malformed {}x{} image",
            image.width, image.height
        )));
    }

    let mut png = Vec::new();
    image::codecs::png::PngEncoder::new(&mut png)
        .write_image(
            &image.rgba,
            image.width,
            image.height,
            image::ExtendedColorType::Rgba8,
        )
        .map_err(|e| ClipboardAccessError::Write(format!("png encoding failed: {e}")))?;
    Ok(png)
}
