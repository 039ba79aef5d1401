use anyhow::Result;
use rayon::prelude::*;

use super::frame_data::FrameData;
use super::FrameSource;

/// Animated test card: drifting color bars over a vertical luma ramp.
pub struct PatternSource {
    frame: FrameData,
    tick: u32,
}

const BARS: [(u8, u8, u8); 7] = [
    (192, 192, 192),
    (192, 192, 0),
    (0, 192, 192),
    (0, 192, 0),
    (192, 0, 192),
    (192, 0, 0),
    (0, 0, 192),
];

impl PatternSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            frame: FrameData::new(vec![0; width as usize * height as usize * 4], width, height),
            tick: 0,
        }
    }

    fn render(&mut self) {
        let w = self.frame.width as usize;
        let h = self.frame.height as usize;
        if w == 0 || h == 0 {
            return;
        }

        let offset = self.tick as usize;
        self.frame.buffer.par_chunks_mut(w * 4).enumerate().for_each(|(y, row)| {
            let shade = 96 + (y * 159 / h.max(1)) as u32;
            for (x, px) in row.chunks_exact_mut(4).enumerate() {
                let bar = ((x + offset) * BARS.len() / w) % BARS.len();
                let (r, g, b) = BARS[bar];
                px[0] = (r as u32 * shade / 255) as u8;
                px[1] = (g as u32 * shade / 255) as u8;
                px[2] = (b as u32 * shade / 255) as u8;
                px[3] = 255;
            }
        });
    }
}

impl FrameSource for PatternSource {
    fn name(&self) -> &str {
        "pattern"
    }

    fn latest_frame(&mut self) -> Result<Option<&FrameData>> {
        self.render();
        self.tick = self.tick.wrapping_add(1);
        Ok(Some(&self.frame))
    }

    fn resize(&mut self, width: u32, height: u32) {
        *self = Self::new(width, height);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_frame_is_complete_and_opaque() {
        let mut source = PatternSource::new(31, 17);
        let frame = source.latest_frame().unwrap().unwrap();
        assert!(frame.is_complete());
        assert!(frame.buffer.chunks_exact(4).all(|px| px[3] == 255));
    }

    #[test]
    fn test_pattern_moves_between_frames() {
        let mut source = PatternSource::new(70, 4);
        let first = source.latest_frame().unwrap().unwrap().buffer.clone();
        let second = source.latest_frame().unwrap().unwrap().buffer.clone();
        assert_ne!(first, second);
    }

    #[test]
    fn test_resize_changes_frame_size() {
        let mut source = PatternSource::new(10, 10);
        source.resize(20, 6);
        let frame = source.latest_frame().unwrap().unwrap();
        assert_eq!((frame.width, frame.height), (20, 6));
        assert!(frame.is_complete());
    }
}
