pub mod frame_data;
pub mod pattern;
pub mod still;
#[cfg(feature = "camera")]
pub mod camera;

use anyhow::Result;

use self::frame_data::FrameData;

/// Supplies the frame the pipeline copies at the start of each tick.
///
/// Pull model: the caller asks for whatever is newest and never waits.
pub trait FrameSource {
    fn name(&self) -> &str;

    /// Newest available frame, `None` if nothing has arrived yet.
    fn latest_frame(&mut self) -> Result<Option<&FrameData>>;

    /// Ask the source to deliver frames at a new size.
    fn resize(&mut self, width: u32, height: u32);
}
