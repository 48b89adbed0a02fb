//! Image preprocessing: decode, cast, resize and normalize into a model input

mod decode;
mod transform;

pub use decode::decode;
pub use transform::to_tensor;

use anyhow::Result;
use strum::{Display, EnumString};
use tract_tensorflow::prelude::Tensor;

use std::path::Path;

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Display, EnumString, serde::Serialize, serde::Deserialize,
)]
#[strum(ascii_case_insensitive)]
pub enum ImageType {
    #[strum(to_string = "png")]
    Png,
    #[strum(to_string = "jpg", serialize = "jpeg")]
    Jpeg,
}

impl ImageType {
    pub fn parse(name: &str) -> Result<Self> {
        name.parse().map_err(|_| {
            anyhow::anyhow!(
                "Unsupported image type given: {name} Expecting {} or {}",
                ImageType::Png,
                ImageType::Jpeg
            )
        })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| anyhow::anyhow!("No file extension on {}", path.display()))?;
        Self::parse(ext)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Preprocess {
    pub height: u32,
    pub width: u32,
    pub mean: f32,
    pub scale: f32,
}

impl Default for Preprocess {
    fn default() -> Self {
        Self {
            height: 224,
            width: 224,
            mean: 117.0,
            scale: 1.0,
        }
    }
}

impl Preprocess {
    pub fn validate(&self) -> Result<()> {
        if self.height == 0 || self.width == 0 {
            anyhow::bail!(
                "Input size must be non-zero, got {}x{}",
                self.height,
                self.width
            );
        }
        if !self.mean.is_finite() {
            anyhow::bail!("Mean must be finite, got {}", self.mean);
        }
        if self.scale == 0.0 || !self.scale.is_finite() {
            anyhow::bail!("Scale must be finite and non-zero, got {}", self.scale);
        }
        Ok(())
    }

    pub fn input_shape(&self) -> [usize; 4] {
        [1, self.height as usize, self.width as usize, 3]
    }
}

/// Turn encoded image bytes into a normalized `[1, height, width, 3]` tensor
#[tracing::instrument(skip(data), fields(bytes = data.len()))]
pub fn preprocess(data: &[u8], image_type: ImageType, params: &Preprocess) -> Result<Tensor> {
    params.validate()?;
    let img = decode(data, image_type)?;
    if img.width() == 0 || img.height() == 0 {
        anyhow::bail!("Decoded {image_type} image is empty");
    }
    log::debug!("Decoded {}x{} {image_type} image", img.width(), img.height());
    Ok(to_tensor(img, params))
}
