use rayon::prelude::*;

use super::cell::{CellData, RgbColor};
use crate::core::buffer::PixelBuffer;

/// Converts the glitched RGBA buffer into half-block terminal cells.
pub struct FrameProcessor;

impl FrameProcessor {
    /// Cell grid is `width` x `height / 2` (rounded up), in logical pixels.
    #[cfg(test)]
    pub fn process_frame(buffer: &PixelBuffer) -> Vec<CellData> {
        let mut cells = vec![CellData::default(); Self::cell_count(buffer)];
        Self::process_frame_into(buffer, &mut cells);
        cells
    }

    pub fn cell_count(buffer: &PixelBuffer) -> usize {
        buffer.width() as usize * ((buffer.height() as usize + 1) / 2)
    }

    pub fn process_frame_into(buffer: &PixelBuffer, cells: &mut [CellData]) {
        let w = buffer.width() as usize;
        let h = buffer.height() as usize;
        let d = buffer.density();

        if w == 0 || cells.len() != Self::cell_count(buffer) {
            return;
        }

        cells.par_chunks_mut(w).enumerate().for_each(|(cy, row)| {
            let py_top = cy * 2;
            let py_bottom = cy * 2 + 1;

            let get_pixel = |x: usize, y: usize| -> RgbColor {
                if y >= h {
                    return RgbColor(0, 0, 0);
                }
                // one backing sample per logical pixel
                let i = buffer.index(x as u32 * d, y as u32 * d);
                let px = buffer.pixels();
                RgbColor(px[i], px[i + 1], px[i + 2])
            };

            for (cx, cell) in row.iter_mut().enumerate() {
                *cell = CellData {
                    char: '▀',
                    fg: get_pixel(cx, py_top),
                    bg: get_pixel(cx, py_bottom),
                };
            }
        });
    }
}
