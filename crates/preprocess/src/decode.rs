use crate::PreprocessError;
use common::span;

/// Decoded frame in canonical RGB order, HWC layout.
#[derive(Debug)]
pub struct DecodedImage {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Decode an encoded frame (format is sniffed from the bytes) to RGB8.
pub fn decode_rgb(encoded: &[u8]) -> Result<DecodedImage, PreprocessError> {
    let _s = span!("decode", bytes = encoded.len());

    if encoded.is_empty() {
        return Err(PreprocessError::EmptyInput);
    }

    let rgb = image::load_from_memory(encoded)?.to_rgb8();
    let (width, height) = rgb.dimensions();
    if width == 0 || height == 0 {
        return Err(PreprocessError::InvalidDimensions { width, height });
    }

    tracing::trace!(width, height, encoded_bytes = encoded.len(), "Decoded frame");

    Ok(DecodedImage {
        pixels: rgb.into_raw(),
        width,
        height,
    })
}

#[cfg(test)]
pub(crate) fn encode_png(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    use std::io::Cursor;

    let img = image::RgbImage::from_pixel(width, height, image::Rgb(rgb));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}
