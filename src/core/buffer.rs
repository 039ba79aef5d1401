use anyhow::{anyhow, Result};
use fast_image_resize::{images::Image, images::ImageRef, PixelType, ResizeAlg, ResizeOptions, Resizer};

use crate::decoder::frame_data::FrameData;

/// Working RGBA image the glitch passes mutate in place.
///
/// Logical size is `width` x `height`; the backing store holds
/// `density`² samples per logical pixel, and every coordinate lookup goes
/// through [`PixelBuffer::index`], which scales the row stride by `density`.
pub struct PixelBuffer {
    width: u32,
    height: u32,
    density: u32,
    pixels: Vec<u8>,
    generation: u64,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_density(width, height, 1)
    }

    pub fn with_density(width: u32, height: u32, density: u32) -> Self {
        let density = density.max(1);
        let len = (width * density) as usize * (height * density) as usize * 4;
        Self {
            width,
            height,
            density,
            pixels: vec![0; len],
            generation: 0,
        }
    }

    /// Wrap an existing RGBA byte vector (density 1).
    #[cfg(test)]
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(anyhow!(
                "RGBA data length {} does not match {}x{} (expected {})",
                pixels.len(),
                width,
                height,
                expected
            ));
        }
        Ok(Self {
            width,
            height,
            density: 1,
            pixels,
            generation: 0,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn density(&self) -> u32 {
        self.density
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Number of samples in one backing row.
    #[inline(always)]
    pub fn row_stride(&self) -> usize {
        (self.width * self.density) as usize
    }

    /// Byte offset of the red channel of logical pixel (x, y).
    #[inline(always)]
    pub fn index(&self, x: u32, y: u32) -> usize {
        4 * (y as usize * self.row_stride() + x as usize)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    /// Marks the current contents as a finished frame.
    pub fn commit(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[cfg(test)]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = self.index(x, y);
        [self.pixels[i], self.pixels[i + 1], self.pixels[i + 2], self.pixels[i + 3]]
    }

    pub fn set_rgb(&mut self, x: u32, y: u32, rgb: (u8, u8, u8)) {
        let i = self.index(x, y);
        self.pixels[i] = rgb.0;
        self.pixels[i + 1] = rgb.1;
        self.pixels[i + 2] = rgb.2;
    }

    #[cfg(test)]
    pub fn fill(&mut self, rgba: [u8; 4]) {
        for px in self.pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&rgba);
        }
    }

    /// Fill the clipped rectangle with one color, leaving alpha as-is.
    pub fn fill_rect_rgb(&mut self, x: u32, y: u32, w: u32, h: u32, rgb: (u8, u8, u8)) {
        let x_end = x.saturating_add(w).min(self.width);
        let y_end = y.saturating_add(h).min(self.height);

        for py in y.min(self.height)..y_end {
            for px in x.min(self.width)..x_end {
                self.set_rgb(px, py, rgb);
            }
        }
    }

    /// Copy a source frame into the buffer, resampling when the sizes differ.
    pub fn load_frame(&mut self, frame: &FrameData, resizer: &mut Resizer) -> Result<()> {
        if self.is_empty() || frame.width == 0 || frame.height == 0 {
            return Ok(());
        }

        let dst_w = self.width * self.density;
        let dst_h = self.height * self.density;

        if frame.width == dst_w && frame.height == dst_h && frame.buffer.len() == self.pixels.len() {
            self.pixels.copy_from_slice(&frame.buffer);
            return Ok(());
        }

        let src = ImageRef::new(frame.width, frame.height, &frame.buffer, PixelType::U8x4)
            .map_err(|e| anyhow!("invalid source frame {}x{}: {:?}", frame.width, frame.height, e))?;
        let mut dst = Image::from_slice_u8(dst_w, dst_h, &mut self.pixels, PixelType::U8x4)
            .map_err(|e| anyhow!("invalid pixel buffer {}x{}: {:?}", dst_w, dst_h, e))?;

        let options = ResizeOptions::new().resize_alg(ResizeAlg::Nearest);
        resizer
            .resize(&src, &mut dst, &options)
            .map_err(|e| anyhow!("resize {}x{} -> {}x{} failed: {:?}", frame.width, frame.height, dst_w, dst_h, e))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_len_matches_dimensions() {
        let buf = PixelBuffer::new(7, 3);
        assert_eq!(buf.pixels().len(), 7 * 3 * 4);

        let dense = PixelBuffer::with_density(7, 3, 2);
        assert_eq!(dense.pixels().len(), 14 * 6 * 4);
        assert_eq!(dense.row_stride(), 14);
    }

    #[test]
    fn test_index_scales_row_stride_by_density() {
        let buf = PixelBuffer::with_density(10, 10, 2);
        assert_eq!(buf.index(0, 1), 4 * 20);
        assert_eq!(buf.index(3, 2), 4 * (2 * 20 + 3));
    }

    #[test]
    fn test_fill_rect_clips_to_bounds() {
        let mut buf = PixelBuffer::new(4, 4);
        buf.fill([0, 0, 0, 200]);
        buf.fill_rect_rgb(2, 2, 100, 100, (9, 8, 7));

        assert_eq!(buf.pixel(3, 3), [9, 8, 7, 200]);
        assert_eq!(buf.pixel(1, 1), [0, 0, 0, 200]);
        assert_eq!(buf.pixels().len(), 4 * 4 * 4);
    }

    #[test]
    fn test_load_frame_same_size_copies() {
        let mut buf = PixelBuffer::new(2, 1);
        let frame = FrameData::new(vec![1, 2, 3, 4, 5, 6, 7, 8], 2, 1);
        let mut resizer = Resizer::new();
        buf.load_frame(&frame, &mut resizer).unwrap();
        assert_eq!(buf.pixels(), &[1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_load_frame_resamples_uniform_frame() {
        let mut buf = PixelBuffer::new(8, 6);
        let frame = FrameData::new([10u8, 20, 30, 255].repeat(3 * 2), 3, 2);
        let mut resizer = Resizer::new();
        buf.load_frame(&frame, &mut resizer).unwrap();

        for px in buf.pixels().chunks_exact(4) {
            assert_eq!(px, &[10, 20, 30, 255]);
        }
    }

    #[test]
    fn test_from_rgba_rejects_bad_length() {
        assert!(PixelBuffer::from_rgba(2, 2, vec![0; 3]).is_err());
    }
}
