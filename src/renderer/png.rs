use anyhow::{Context, Result};
use image::RgbaImage;
use log::{debug, info};
use std::path::{Path, PathBuf};

use super::{Presenter, SurfaceEvent};
use crate::core::buffer::PixelBuffer;

/// Writes every presented frame as `frame_NNNNN.png` into a directory.
///
/// Images use the backing resolution, so a density-2 buffer produces
/// files twice the logical size.
pub struct PngSequence {
    dir: PathBuf,
    written: u64,
}

impl PngSequence {
    pub fn create(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
        info!("writing frames to {}", dir.display());
        Ok(Self {
            dir: dir.to_path_buf(),
            written: 0,
        })
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn frame_path(&self, index: u64) -> PathBuf {
        self.dir.join(format!("frame_{:05}.png", index))
    }
}

impl Presenter for PngSequence {
    fn present(&mut self, buffer: &PixelBuffer) -> Result<()> {
        let width = buffer.row_stride() as u32;
        let height = buffer.height() * buffer.density();
        let img = RgbaImage::from_raw(width, height, buffer.pixels().to_vec())
            .context("Pixel buffer does not match its dimensions")?;

        let path = self.frame_path(self.written);
        img.save(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        debug!("wrote {}", path.display());

        self.written += 1;
        Ok(())
    }

    fn poll_event(&mut self) -> Result<Option<SurfaceEvent>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("glitchcam-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_writes_numbered_frames() {
        let dir = scratch_dir("png-seq");
        let mut out = PngSequence::create(&dir).unwrap();

        let mut buf = PixelBuffer::new(3, 2);
        buf.fill([10, 20, 30, 255]);
        out.present(&buf).unwrap();
        out.present(&buf).unwrap();

        assert_eq!(out.written(), 2);
        assert!(dir.join("frame_00000.png").exists());
        let img = image::open(dir.join("frame_00001.png")).unwrap().to_rgba8();
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(img.get_pixel(2, 1).0, [10, 20, 30, 255]);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_density_uses_backing_size() {
        let dir = scratch_dir("png-density");
        let mut out = PngSequence::create(&dir).unwrap();

        let buf = PixelBuffer::with_density(4, 3, 2);
        out.present(&buf).unwrap();

        let img = image::open(out.frame_path(0)).unwrap();
        assert_eq!((img.width(), img.height()), (8, 6));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
