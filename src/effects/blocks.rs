use rand::Rng;

use super::color::hsb_to_rgb;
use super::{FrameContext, GlitchPass};
use crate::core::buffer::PixelBuffer;

const BLOCK_ATTEMPTS: u32 = 10;

/// Random solid rectangles plus a grid of randomly recolored cells.
pub struct BlockCorruption;

impl BlockCorruption {
    fn overwrite_blocks(buffer: &mut PixelBuffer, ctx: &mut FrameContext) {
        let (w, h) = (buffer.width(), buffer.height());
        let intensity = ctx.params.glitch_intensity;

        for _ in 0..BLOCK_ATTEMPTS {
            if !ctx.chance(intensity) {
                continue;
            }

            let x = ctx.rng.gen_range(0..w);
            let y = ctx.rng.gen_range(0..h);
            let bw = ctx.rng.gen_range(50..200);
            let bh = ctx.rng.gen_range(10..50);

            let color = hsb_to_rgb(
                ctx.rng.gen_range(0.0..100.0),
                ctx.rng.gen_range(50.0..100.0),
                ctx.rng.gen_range(50.0..100.0),
            );

            buffer.fill_rect_rgb(x, y, bw, bh, color);
        }
    }

    fn pixelate_grid(buffer: &mut PixelBuffer, ctx: &mut FrameContext) {
        let (w, h) = (buffer.width(), buffer.height());
        let cell = ctx.params.block_size.max(1);
        let amount = ctx.params.noise_amount;

        for y in (0..h).step_by(cell as usize) {
            for x in (0..w).step_by(cell as usize) {
                if ctx.chance(amount) {
                    let color = hsb_to_rgb(ctx.rng.gen_range(0.0..100.0), 80.0, 100.0);
                    buffer.fill_rect_rgb(x, y, cell, cell, color);
                }
            }
        }
    }
}

impl GlitchPass for BlockCorruption {
    fn name(&self) -> &'static str {
        "block_corruption"
    }

    fn apply(&mut self, buffer: &mut PixelBuffer, ctx: &mut FrameContext) {
        if buffer.is_empty() {
            return;
        }

        Self::overwrite_blocks(buffer, ctx);
        Self::pixelate_grid(buffer, ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::params::EffectParams;
    use crate::effects::noise::Noise1D;
    use crate::effects::GlitchRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn run(buf: &mut PixelBuffer, params: &EffectParams, seed: u64) {
        let mut rng = GlitchRng::seed_from_u64(seed);
        let noise = Noise1D::new(seed);
        let mut ctx = FrameContext { params, frame_count: 0, rng: &mut rng, noise: &noise };
        BlockCorruption.apply(buf, &mut ctx);
    }

    #[test]
    fn test_zero_probabilities_are_noop() {
        let params = EffectParams { glitch_intensity: 0.0, noise_amount: 0.0, ..EffectParams::default() };
        let mut buf = PixelBuffer::new(120, 80);
        buf.fill([1, 2, 3, 4]);
        let before = buf.pixels().to_vec();
        run(&mut buf, &params, 1);
        assert_eq!(buf.pixels(), &before[..]);
    }

    #[test]
    fn test_alpha_preserved_and_len_constant() {
        let params = EffectParams { glitch_intensity: 1.0, noise_amount: 1.0, ..EffectParams::default() };
        for (w, h) in [(1, 1), (7, 3), (333, 41)] {
            let mut buf = PixelBuffer::new(w, h);
            buf.fill([0, 0, 0, 77]);
            run(&mut buf, &params, 5);
            assert_eq!(buf.pixels().len(), (w * h * 4) as usize);
            assert!(buf.pixels().chunks_exact(4).all(|px| px[3] == 77));
        }
    }

    #[test]
    fn test_full_noise_fills_each_grid_cell_with_one_color() {
        let params = EffectParams {
            glitch_intensity: 0.0,
            noise_amount: 1.0,
            block_size: 10,
            ..EffectParams::default()
        };
        let mut buf = PixelBuffer::new(35, 25);
        run(&mut buf, &params, 9);

        for cy in (0..25).step_by(10) {
            for cx in (0..35).step_by(10) {
                let mut colors = HashSet::new();
                for y in cy..(cy + 10).min(25) {
                    for x in cx..(cx + 10).min(35) {
                        let [r, g, b, _] = buf.pixel(x, y);
                        colors.insert((r, g, b));
                    }
                }
                assert_eq!(colors.len(), 1, "cell {},{}", cx, cy);
                let (r, g, b) = *colors.iter().next().unwrap();
                // sat 80, bright 100: the max channel is full
                assert_eq!(r.max(g).max(b), 255);
            }
        }
    }

    #[test]
    fn test_blocks_use_single_bright_color() {
        let params = EffectParams { glitch_intensity: 1.0, noise_amount: 0.0, ..EffectParams::default() };
        let mut buf = PixelBuffer::new(300, 200);
        run(&mut buf, &params, 21);

        let written: Vec<_> = buf
            .pixels()
            .chunks_exact(4)
            .filter(|px| px[..3] != [0, 0, 0])
            .collect();
        assert!(!written.is_empty());
        for px in written {
            // brightness >= 50 means the max channel is at least half
            assert!(px[0].max(px[1]).max(px[2]) >= 127);
        }
    }
}
