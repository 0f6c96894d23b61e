//! JPEG encoding of annotated frames for JSON transport.

use anyhow::{Result, anyhow};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use image::{RgbImage, codecs::jpeg::JpegEncoder};

use crate::meter::data::EncodedFrame;

pub(crate) fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    if image.width() == 0 || image.height() == 0 {
        return Err(anyhow!("cannot encode an empty {}x{} frame", image.width(), image.height()));
    }
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100))
        .encode_image(image)
        .map_err(|err| anyhow!("JPEG encode failed: {err}"))?;
    Ok(buffer)
}

impl EncodedFrame {
    pub(crate) fn jpeg(bytes: &[u8]) -> Self {
        Self {
            mime: "image/jpeg",
            data: STANDARD.encode(bytes),
        }
    }
}

/// Encode `image` and wrap it for transport.
pub(crate) fn encode_frame(image: &RgbImage, quality: u8) -> Result<EncodedFrame> {
    let _span = tracing::info_span!("encoding.jpeg", width = image.width(), height = image.height()).entered();
    encode_jpeg(image, quality).map(|bytes| EncodedFrame::jpeg(&bytes))
}
