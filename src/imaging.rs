//! Image payload handling: base64 / data-URL decoding, model input tensors,
//! and thumbnails for report embedding.

use base64::Engine;
use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};

/// Side length of the square model input.
pub const MODEL_INPUT_SIZE: u32 = 224;
/// Channels of the model input.
pub const MODEL_INPUT_CHANNELS: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("empty image payload")]
    Empty,

    #[error("could not decode image: {0}")]
    Decode(#[from] image::ImageError),
}

/// Strip an optional `data:<mime>;base64,` header and decode the payload.
pub fn decode_base64_payload(payload: &str) -> Result<Vec<u8>, ImageError> {
    let data = match payload.split_once(',') {
        Some((_, body)) => body,
        None => payload,
    };
    let data = data.trim();
    if data.is_empty() {
        return Err(ImageError::Empty);
    }
    Ok(base64::engine::general_purpose::STANDARD.decode(data)?)
}

/// Decode encoded image bytes (PNG or JPEG).
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, ImageError> {
    if bytes.is_empty() {
        return Err(ImageError::Empty);
    }
    Ok(image::load_from_memory(bytes)?)
}

/// A single 224x224x3 model input, row-major HWC, BGR channel order, raw
/// 0-255 intensities.
#[derive(Debug, Clone)]
pub struct ImageTensor {
    data: Vec<f32>,
}

impl ImageTensor {
    pub const LEN: usize =
        (MODEL_INPUT_SIZE * MODEL_INPUT_SIZE) as usize * MODEL_INPUT_CHANNELS;

    /// Resize (bilinear) to the model input size and lay out as BGR.
    pub fn from_image(image: &DynamicImage) -> Self {
        let resized = image
            .resize_exact(MODEL_INPUT_SIZE, MODEL_INPUT_SIZE, FilterType::Triangle)
            .to_rgb8();
        let mut data = Vec::with_capacity(Self::LEN);
        for pixel in resized.pixels() {
            let [r, g, b] = pixel.0;
            data.extend_from_slice(&[b as f32, g as f32, r as f32]);
        }
        Self { data }
    }

    /// Build from an already laid out buffer. Returns `None` on a length mismatch.
    pub fn from_raw(data: Vec<f32>) -> Option<Self> {
        (data.len() == Self::LEN).then_some(Self { data })
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Value at row `y`, column `x`, channel `c` (0 = B, 1 = G, 2 = R).
    pub fn at(&self, y: usize, x: usize, c: usize) -> f32 {
        let side = MODEL_INPUT_SIZE as usize;
        self.data[(y * side + x) * MODEL_INPUT_CHANNELS + c]
    }
}

/// Decode a base64 payload straight into a model input.
pub fn tensor_from_base64(payload: &str) -> Result<ImageTensor, ImageError> {
    let bytes = decode_base64_payload(payload)?;
    let image = decode_image(&bytes)?;
    Ok(ImageTensor::from_image(&image))
}

/// Downscale for embedding, keeping aspect ratio within `max_side`.
pub fn thumbnail(bytes: &[u8], max_side: u32) -> Result<RgbImage, ImageError> {
    let image = decode_image(bytes)?;
    Ok(image.thumbnail(max_side, max_side).to_rgb8())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{ImageFormat, Rgb};
    use std::io::Cursor;

    /// Encode a solid-colour PNG for tests.
    pub(crate) fn png_bytes(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb(rgb));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    fn data_url(bytes: &[u8]) -> String {
        format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(bytes)
        )
    }

    #[test]
    fn test_decode_with_and_without_data_url_header() {
        let bytes = png_bytes(4, 4, [10, 20, 30]);
        let plain = base64::engine::general_purpose::STANDARD.encode(&bytes);
        assert_eq!(decode_base64_payload(&plain).unwrap(), bytes);
        assert_eq!(decode_base64_payload(&data_url(&bytes)).unwrap(), bytes);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode_base64_payload("data:image/png;base64,!!!not-base64!!!"),
            Err(ImageError::Base64(_))
        ));
        assert!(matches!(
            decode_base64_payload("data:image/png;base64,"),
            Err(ImageError::Empty)
        ));
        assert!(matches!(decode_image(b"not an image"), Err(ImageError::Decode(_))));
    }

    #[test]
    fn test_tensor_shape_and_channel_order() {
        let bytes = png_bytes(32, 16, [200, 100, 50]);
        let tensor = tensor_from_base64(&data_url(&bytes)).unwrap();
        assert_eq!(tensor.as_slice().len(), ImageTensor::LEN);
        assert_eq!(tensor.at(0, 0, 0), 50.0);
        assert_eq!(tensor.at(0, 0, 1), 100.0);
        assert_eq!(tensor.at(223, 223, 2), 200.0);
    }

    #[test]
    fn test_from_raw_checks_length() {
        assert!(ImageTensor::from_raw(vec![0.0; 3]).is_none());
        assert!(ImageTensor::from_raw(vec![0.0; ImageTensor::LEN]).is_some());
    }

    #[test]
    fn test_thumbnail_bounds() {
        let bytes = png_bytes(400, 200, [1, 2, 3]);
        let thumb = thumbnail(&bytes, 128).unwrap();
        assert_eq!(thumb.width(), 128);
        assert_eq!(thumb.height(), 64);
    }
}
