use rayon::prelude::*;

use super::color::{hsb_to_rgb, rgb_to_hsb};
use super::{FrameContext, GlitchPass};
use crate::core::buffer::PixelBuffer;

/// Saturation amplification through an HSB round-trip.
pub struct ColorBoost;

impl ColorBoost {
    #[inline(always)]
    pub fn boost_pixel(px: &mut [u8], boost: f64) {
        let mut hsb = rgb_to_hsb(px[0], px[1], px[2]);
        hsb.s = (hsb.s * boost).clamp(0.0, 100.0);

        let (r, g, b) = hsb_to_rgb(hsb.h, hsb.s, hsb.b);
        px[0] = r;
        px[1] = g;
        px[2] = b;
    }
}

impl GlitchPass for ColorBoost {
    fn name(&self) -> &'static str {
        "color_boost"
    }

    fn apply(&mut self, buffer: &mut PixelBuffer, ctx: &mut FrameContext) {
        let boost = ctx.params.saturation_boost;
        let row_bytes = (buffer.row_stride() * 4).max(4);

        buffer.pixels_mut().par_chunks_mut(row_bytes).for_each(|row| {
            for px in row.chunks_exact_mut(4) {
                Self::boost_pixel(px, boost);
            }
        });
    }
}
