//! Transport codec for raster images.
//!
//! Encodes images to standard base64 of a lossless PNG container and
//! reverses it. PNG is lossless, so encode followed by decode reproduces
//! pixel-identical content.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{ImageFormat, RgbImage};

use crate::error::{DaemonError, Result};

/// Encodes an image as base64 PNG.
pub fn encode_image(image: &RgbImage) -> Result<String> {
    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| DaemonError::image_codec(format!("PNG encode failed: {}", e)))?;
    Ok(STANDARD.encode(png))
}

/// Encodes raw bytes as standard base64, for payloads that are already PNG.
pub fn encode_bytes(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decodes a base64 PNG payload back into an image.
pub fn decode_image(payload: &str) -> Result<RgbImage> {
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| DaemonError::image_codec(format!("base64 decode failed: {}", e)))?;
    let image = image::load_from_memory(&bytes)
        .map_err(|e| DaemonError::image_codec(format!("image decode failed: {}", e)))?;
    Ok(image.to_rgb8())
}
