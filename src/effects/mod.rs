pub mod blocks;
pub mod boost;
pub mod color;
pub mod noise;
pub mod posterize;
pub mod shift;
pub mod sort;

pub use blocks::BlockCorruption;
pub use boost::ColorBoost;
pub use posterize::Posterize;
pub use shift::ChannelShift;
pub use sort::RowSort;

use rand::Rng;
use rand_xoshiro::Xoshiro256StarStar;

use crate::core::buffer::PixelBuffer;
use crate::core::params::EffectParams;
use self::noise::Noise1D;

/// Random source shared by all passes of one pipeline.
pub type GlitchRng = Xoshiro256StarStar;

/// Per-frame state handed to every pass.
pub struct FrameContext<'a> {
    pub params: &'a EffectParams,
    pub frame_count: u64,
    pub rng: &'a mut GlitchRng,
    pub noise: &'a Noise1D,
}

impl FrameContext<'_> {
    /// True with probability `p`.
    #[inline]
    pub fn chance(&mut self, p: f64) -> bool {
        p > 0.0 && self.rng.gen::<f64>() < p
    }
}

/// One in-place distortion stage of the glitch pipeline.
pub trait GlitchPass: Send {
    fn name(&self) -> &'static str;

    fn apply(&mut self, buffer: &mut PixelBuffer, ctx: &mut FrameContext);
}
