use anyhow::Result;
use fast_image_resize::Resizer;
use log::{debug, info, warn};
use rand::SeedableRng;
use std::time::{Duration, Instant};

use crate::core::buffer::PixelBuffer;
use crate::core::params::EffectParams;
use crate::decoder::frame_data::FrameData;
use crate::effects::noise::Noise1D;
use crate::effects::shift::Drift;
use crate::effects::{BlockCorruption, ChannelShift, ColorBoost, FrameContext, GlitchPass, GlitchRng, Posterize, RowSort};

const FRAME_BUDGET: Duration = Duration::from_millis(16);

/// Owns the working buffer and runs the glitch passes over it once per tick.
pub struct GlitchPipeline {
    params: EffectParams,
    buffer: PixelBuffer,
    frame_count: u64,
    rng: GlitchRng,
    noise: Noise1D,
    resizer: Resizer,
    color_boost: ColorBoost,
    channel_shift: ChannelShift,
    block_corruption: BlockCorruption,
    row_sort: RowSort,
    posterize: Posterize,
}

impl GlitchPipeline {
    pub fn new(params: EffectParams, width: u32, height: u32, density: u32, seed: u64) -> Self {
        let params = params.normalized();
        info!("pipeline {}x{} (density {}) seed {} params {:?}", width, height, density, seed, params);

        Self {
            params,
            buffer: PixelBuffer::with_density(width, height, density),
            frame_count: 0,
            rng: GlitchRng::seed_from_u64(seed),
            noise: Noise1D::new(seed),
            resizer: Resizer::new(),
            color_boost: ColorBoost,
            channel_shift: ChannelShift::new(),
            block_corruption: BlockCorruption,
            row_sort: RowSort::new(),
            posterize: Posterize,
        }
    }

    pub fn buffer(&self) -> &PixelBuffer {
        &self.buffer
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn last_drift(&self) -> Drift {
        self.channel_shift.last_drift()
    }

    /// Reallocate the buffer; previous contents are dropped.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == self.buffer.width() && height == self.buffer.height() {
            return;
        }
        info!("resize {}x{} -> {}x{}", self.buffer.width(), self.buffer.height(), width, height);
        self.buffer = PixelBuffer::with_density(width, height, self.buffer.density());
    }

    /// Load `frame` (if any), glitch it and return the buffer to present.
    ///
    /// Without a frame the previous buffer is returned untouched.
    pub fn tick(&mut self, frame: Option<&FrameData>) -> Result<&PixelBuffer> {
        let frame = match frame {
            Some(f) => f,
            None => {
                debug!("no frame available, keeping previous buffer");
                return Ok(&self.buffer);
            }
        };

        let start = Instant::now();
        self.buffer.load_frame(frame, &mut self.resizer)?;
        self.process();

        let elapsed = start.elapsed();
        if elapsed > FRAME_BUDGET {
            warn!(
                "SLOW FRAME {}: {}us for {}x{}",
                self.frame_count,
                elapsed.as_micros(),
                self.buffer.width(),
                self.buffer.height()
            );
        }

        Ok(&self.buffer)
    }

    /// Run every pass over the current buffer contents.
    pub fn process(&mut self) {
        let mut ctx = FrameContext {
            params: &self.params,
            frame_count: self.frame_count,
            rng: &mut self.rng,
            noise: &self.noise,
        };

        let passes: [&mut dyn GlitchPass; 5] = [
            &mut self.color_boost,
            &mut self.channel_shift,
            &mut self.block_corruption,
            &mut self.row_sort,
            &mut self.posterize,
        ];

        for pass in passes {
            let pass_start = Instant::now();
            pass.apply(&mut self.buffer, &mut ctx);
            debug!("{} took {}us", pass.name(), pass_start.elapsed().as_micros());
        }

        self.buffer.commit();
        self.frame_count += 1;
    }
}
