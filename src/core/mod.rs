pub mod buffer;
pub mod params;
pub mod pipeline;
pub mod player;
