//! Image decoding

use anyhow::{Context, Result};
use imageproc::image::{load_from_memory_with_format, ImageFormat, RgbImage};

use super::ImageType;

/// Decode image bytes of the declared type into 3 channel RGB
pub fn decode(data: &[u8], image_type: ImageType) -> Result<RgbImage> {
    let format = match image_type {
        ImageType::Png => ImageFormat::Png,
        ImageType::Jpeg => ImageFormat::Jpeg,
    };

    load_from_memory_with_format(data, format)
        .map(|img| img.into_rgb8())
        .with_context(|| format!("Failed to decode {image_type} image"))
}
