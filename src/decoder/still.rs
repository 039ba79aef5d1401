use anyhow::{Context, Result};
use image::{imageops::FilterType, RgbaImage};
use log::info;
use std::path::Path;

use super::frame_data::FrameData;
use super::FrameSource;

/// A single image file served as every frame.
pub struct StillSource {
    original: RgbaImage,
    frame: FrameData,
}

impl StillSource {
    pub fn open(path: &Path, width: u32, height: u32) -> Result<Self> {
        let original = image::open(path)
            .with_context(|| format!("Failed to open image {}", path.display()))?
            .to_rgba8();
        info!("loaded {} ({}x{})", path.display(), original.width(), original.height());
        Ok(Self::from_image(original, width, height))
    }

    pub fn from_image(original: RgbaImage, width: u32, height: u32) -> Self {
        let frame = Self::scaled(&original, width, height);
        Self { original, frame }
    }

    fn scaled(original: &RgbaImage, width: u32, height: u32) -> FrameData {
        let img = if original.dimensions() == (width, height) || width == 0 || height == 0 {
            original.clone()
        } else {
            image::imageops::resize(original, width, height, FilterType::Triangle)
        };
        let (w, h) = img.dimensions();
        FrameData::new(img.into_raw(), w, h)
    }
}

impl FrameSource for StillSource {
    fn name(&self) -> &str {
        "image"
    }

    fn latest_frame(&mut self) -> Result<Option<&FrameData>> {
        Ok(Some(&self.frame))
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.frame = Self::scaled(&self.original, width, height);
    }
}
