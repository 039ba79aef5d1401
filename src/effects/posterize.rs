use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use super::{FrameContext, GlitchPass, GlitchRng};
use crate::core::buffer::PixelBuffer;

const INVERT_CHANCE: f64 = 0.1;

/// Channel quantization with occasional full inversion.
///
/// Rows are processed in parallel; each row seeds its own generator from one
/// value drawn per frame, so output depends only on the pipeline seed.
pub struct Posterize;

impl Posterize {
    #[inline(always)]
    pub fn quantize(value: u8, step: u32) -> u8 {
        ((value as u32 / step) * step) as u8
    }
}

impl GlitchPass for Posterize {
    fn name(&self) -> &'static str {
        "posterize"
    }

    fn apply(&mut self, buffer: &mut PixelBuffer, ctx: &mut FrameContext) {
        let step = ctx.params.posterize_step();
        let invert_chance = if ctx.params.glitch_intensity > 0.0 { INVERT_CHANCE } else { 0.0 };
        let frame_seed: u64 = ctx.rng.gen();
        let row_bytes = (buffer.row_stride() * 4).max(4);

        buffer
            .pixels_mut()
            .par_chunks_mut(row_bytes)
            .enumerate()
            .for_each(|(row, chunk)| {
                let mut rng = GlitchRng::seed_from_u64(frame_seed ^ (row as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15));

                for px in chunk.chunks_exact_mut(4) {
                    px[0] = Self::quantize(px[0], step);
                    px[1] = Self::quantize(px[1], step);
                    px[2] = Self::quantize(px[2], step);

                    if invert_chance > 0.0 && rng.gen::<f64>() < invert_chance {
                        px[0] = 255 - px[0];
                        px[1] = 255 - px[1];
                        px[2] = 255 - px[2];
                    }
                }
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::params::EffectParams;
    use crate::effects::noise::Noise1D;

    fn run(buf: &mut PixelBuffer, params: &EffectParams, seed: u64) {
        let mut rng = GlitchRng::seed_from_u64(seed);
        let noise = Noise1D::new(seed);
        let mut ctx = FrameContext { params, frame_count: 0, rng: &mut rng, noise: &noise };
        Posterize.apply(buf, &mut ctx);
    }

    fn ramp() -> PixelBuffer {
        let data: Vec<u8> = (0..=255u8).flat_map(|v| [v, v.wrapping_add(85), v.wrapping_add(170), 200]).collect();
        PixelBuffer::from_rgba(256, 1, data).unwrap()
    }

    #[test]
    fn test_level_one_is_noop_without_glitch() {
        let params = EffectParams { posterize_level: 1, glitch_intensity: 0.0, ..EffectParams::default() };
        let mut buf = ramp();
        let before = buf.pixels().to_vec();
        run(&mut buf, &params, 1);
        assert_eq!(buf.pixels(), &before[..]);
    }

    #[test]
    fn test_quantized_values_are_multiples_and_not_larger() {
        let params = EffectParams { posterize_level: 7, glitch_intensity: 0.0, ..EffectParams::default() };
        let mut buf = ramp();
        let before = buf.pixels().to_vec();
        run(&mut buf, &params, 1);

        for (px, old) in buf.pixels().chunks_exact(4).zip(before.chunks_exact(4)) {
            for c in 0..3 {
                assert_eq!(px[c] % 7, 0);
                assert!(px[c] <= old[c]);
            }
            assert_eq!(px[3], old[3]);
        }
    }

    #[test]
    fn test_level_four_maps_130_to_128() {
        assert_eq!(Posterize::quantize(130, 4), 128);

        let params = EffectParams { posterize_level: 4, glitch_intensity: 0.0, ..EffectParams::default() };
        let mut buf = PixelBuffer::from_rgba(1, 1, vec![130, 130, 130, 255]).unwrap();
        run(&mut buf, &params, 3);
        assert_eq!(buf.pixel(0, 0), [128, 128, 128, 255]);
    }

    #[test]
    fn test_level_above_255_zeroes_channels() {
        assert_eq!(Posterize::quantize(255, 256), 0);

        let params = EffectParams { posterize_level: 300, glitch_intensity: 0.0, ..EffectParams::default() };
        let mut buf = PixelBuffer::from_rgba(1, 1, vec![255, 200, 100, 255]).unwrap();
        run(&mut buf, &params, 3);
        assert_eq!(buf.pixel(0, 0), [0, 0, 0, 255]);
    }

    #[test]
    fn test_zero_level_treated_as_one() {
        let params = EffectParams { posterize_level: 0, glitch_intensity: 0.0, ..EffectParams::default() };
        let mut buf = ramp();
        let before = buf.pixels().to_vec();
        run(&mut buf, &params, 1);
        assert_eq!(buf.pixels(), &before[..]);
    }

    #[test]
    fn test_inversion_rate_is_about_ten_percent() {
        let params = EffectParams { posterize_level: 1, glitch_intensity: 1.0, ..EffectParams::default() };
        let mut buf = PixelBuffer::new(200, 100);
        buf.fill([0, 0, 0, 255]);
        run(&mut buf, &params, 5);

        let inverted = buf.pixels().chunks_exact(4).filter(|px| px[0] == 255).count();
        let total = 200 * 100;
        assert!(inverted > total / 20 && inverted < total * 3 / 20, "{} of {}", inverted, total);
        assert!(buf.pixels().chunks_exact(4).all(|px| px[3] == 255));
    }

    #[test]
    fn test_same_seed_same_output() {
        let params = EffectParams { posterize_level: 3, glitch_intensity: 1.0, ..EffectParams::default() };
        let mut a = ramp();
        let mut b = ramp();
        run(&mut a, &params, 42);
        run(&mut b, &params, 42);
        assert_eq!(a.pixels(), b.pixels());
    }
}
