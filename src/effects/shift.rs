use log::trace;
use rand::Rng;

use super::{FrameContext, GlitchPass, GlitchRng};
use crate::core::buffer::PixelBuffer;

const MAX_BANDS: u32 = 5;
const BAND_MIN_ROWS: u32 = 20;
const BAND_MAX_ROWS: u32 = 100;

/// Smooth per-frame drift derived from the frame counter.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Drift {
    pub x: f64,
    pub y: f64,
}

/// Band-wise horizontal row displacement with split red/blue reads.
///
/// Each band row gets a single wrapped shift; red and blue are sampled a
/// couple of pixels off the shifted column, independently, which produces
/// the chromatic fringing. With `shift_feedback` the pass reads from the row
/// it is rewriting, so later columns can pick up already shifted samples.
#[derive(Default)]
pub struct ChannelShift {
    last_drift: Drift,
}

impl ChannelShift {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drift computed on the most recent frame. Not applied to the row shift.
    pub fn last_drift(&self) -> Drift {
        self.last_drift
    }

    pub fn drift_at(ctx: &FrameContext) -> Drift {
        let f = ctx.frame_count as f64;
        let amount = ctx.params.rgb_shift_amount;
        Drift {
            x: amount * (ctx.noise.sample(f * 0.05) + (f * 0.2).sin()),
            y: amount * (ctx.noise.sample(f * 0.05 + 1000.0) + (f * 0.2).cos()),
        }
    }

    fn shift_row(buffer: &mut PixelBuffer, y: u32, rng: &mut GlitchRng, feedback: bool, scratch: &mut Vec<u8>) {
        let w = buffer.width() as i64;
        let base = buffer.index(0, y);
        let row_len = w as usize * 4;

        let half = w / 2;
        let shift = if half > 0 { rng.gen_range(-half..half) } else { 0 };

        let pixels = buffer.pixels_mut();
        if !feedback {
            scratch.clear();
            scratch.extend_from_slice(&pixels[base..base + row_len]);
        }

        for x in 0..w {
            let target = (x + shift).rem_euclid(w);
            let red_col = (target + rng.gen_range(-2..2)).rem_euclid(w) as usize;
            let blue_col = (target + rng.gen_range(-2..2)).rem_euclid(w) as usize;
            let target = target as usize;

            let (r, g, b) = if feedback {
                (
                    pixels[base + red_col * 4],
                    pixels[base + target * 4 + 1],
                    pixels[base + blue_col * 4 + 2],
                )
            } else {
                (scratch[red_col * 4], scratch[target * 4 + 1], scratch[blue_col * 4 + 2])
            };

            let dst = base + x as usize * 4;
            pixels[dst] = r;
            pixels[dst + 1] = g;
            pixels[dst + 2] = b;
        }
    }
}

impl GlitchPass for ChannelShift {
    fn name(&self) -> &'static str {
        "channel_shift"
    }

    fn apply(&mut self, buffer: &mut PixelBuffer, ctx: &mut FrameContext) {
        self.last_drift = Self::drift_at(ctx);
        trace!("frame {} drift x={:.2} y={:.2}", ctx.frame_count, self.last_drift.x, self.last_drift.y);

        if buffer.is_empty() {
            return;
        }

        let h = buffer.height();
        let intensity = ctx.params.glitch_intensity;
        let feedback = ctx.params.shift_feedback;
        let mut scratch = Vec::new();

        for _ in 0..MAX_BANDS {
            if !ctx.chance(intensity) {
                continue;
            }

            let start = ctx.rng.gen_range(0..h);
            let rows = ctx.rng.gen_range(BAND_MIN_ROWS..BAND_MAX_ROWS);
            let end = start.saturating_add(rows).min(h);

            for y in start..end {
                Self::shift_row(buffer, y, ctx.rng, feedback, &mut scratch);
            }
        }
    }
}
