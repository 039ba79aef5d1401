pub mod cell;
pub mod display;
pub mod png;
pub mod processor;
pub mod quantizer;

use anyhow::Result;

use crate::core::buffer::PixelBuffer;

pub use display::DisplayManager;
pub use display::DisplayMode;
pub use png::PngSequence;

/// Something the presenter reports back to the run loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEvent {
    /// New surface size in pixels.
    Resize(u32, u32),
    Quit,
}

/// Output surface for finished frames.
pub trait Presenter {
    fn present(&mut self, buffer: &PixelBuffer) -> Result<()>;

    /// Non-blocking. `None` when nothing happened since the last call.
    fn poll_event(&mut self) -> Result<Option<SurfaceEvent>>;
}
