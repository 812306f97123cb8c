//! Image encoding: composite `RgbImage` → PNG → base64.
//!
//! The same PNG bytes feed two consumers: the vision model (as
//! [`ImageData`]) and the caller's result page (as a self-contained data URI).
//! PNG is lossless, which keeps small print in lab tables legible.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::{ImageFormat, RgbImage};
use std::io::Cursor;
use tracing::debug;

/// PNG-encoded composite, base64-wrapped once.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub base64: String,
    pub png_len: usize,
}

impl EncodedImage {
    /// Attachment for a multimodal chat message.
    pub fn to_image_data(&self) -> ImageData {
        ImageData::new(self.base64.clone(), "image/png").with_detail("high")
    }

    /// `data:image/png;base64,…` for inline display.
    pub fn data_uri(&self) -> String {
        format!("data:image/png;base64,{}", self.base64)
    }
}

/// Encode `img` as a base64 PNG.
pub fn encode_png(img: &RgbImage) -> Result<EncodedImage, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;

    let base64 = STANDARD.encode(&buf);
    debug!(
        "Encoded composite → {} bytes PNG, {} bytes base64",
        buf.len(),
        base64.len()
    );

    Ok(EncodedImage {
        base64,
        png_len: buf.len(),
    })
}
