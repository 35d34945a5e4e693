//! PNG image encoding and base64 transport encoding

use crate::error::{PipelineError, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageFormat, RgbImage};

/// Encode an RGB image as PNG
pub fn encode(image: &RgbImage) -> Result<Vec<u8>> {
    let (width, height) = image.dimensions();
    let mut buffer = Vec::new();
    PngEncoder::new(&mut buffer)
        .write_image(image.as_raw(), width, height, ExtendedColorType::Rgb8)
        .map_err(|e| {
            log::error!("PNG encoding of {}x{} image failed: {}", width, height, e);
            PipelineError::EncodingFailure(format!("PNG encoding of {}x{} image: {}", width, height, e))
        })?;
    Ok(buffer)
}

/// Decode PNG bytes back into an RGB image
pub fn decode(bytes: &[u8]) -> Result<RgbImage> {
    let image = image::load_from_memory_with_format(bytes, ImageFormat::Png).map_err(|e| {
        log::error!("PNG decoding of {} bytes failed: {}", bytes.len(), e);
        PipelineError::EncodingFailure(format!("PNG decoding: {}", e))
    })?;
    Ok(image.into_rgb8())
}

/// Standard base64 text for transport
pub fn to_transport(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

pub fn from_transport(text: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(text)
        .map_err(|e| PipelineError::EncodingFailure(format!("invalid base64: {}", e)))
}
