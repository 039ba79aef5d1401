mod core;
mod decoder;
mod effects;
mod logging;
mod renderer;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{info, LevelFilter};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::core::params::{EffectParams, SortMode};
use crate::core::pipeline::GlitchPipeline;
use crate::core::player;
use crate::decoder::pattern::PatternSource;
use crate::decoder::still::StillSource;
use crate::decoder::FrameSource;
use crate::renderer::{DisplayManager, DisplayMode, PngSequence};

#[derive(Parser)]
#[command(author, version, about = "Real-time glitch art for camera, image and test-pattern input", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Minimum level written to the log file
    #[arg(long, global = true, default_value = "info")]
    log_level: LevelFilter,

    #[arg(long, global = true, default_value = "debug.log")]
    log_file: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Glitch a live source into the terminal
    Live {
        #[command(flatten)]
        effects: EffectArgs,
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long, default_value_t = 60)]
        fps: u32,
        #[arg(short, long, value_enum, default_value_t = DisplayMode::Rgb)]
        mode: DisplayMode,
    },
    /// Render a fixed number of glitched frames to a PNG sequence
    Render {
        #[command(flatten)]
        effects: EffectArgs,
        #[command(flatten)]
        source: SourceArgs,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(short, long, default_value_t = 60)]
        frames: u64,
        #[arg(long, default_value_t = 320)]
        width: u32,
        #[arg(long, default_value_t = 240)]
        height: u32,
    },
    /// Print the effective effect parameters as JSON
    Params {
        #[command(flatten)]
        effects: EffectArgs,
    },
}

#[derive(Args, Debug, Clone)]
struct EffectArgs {
    /// JSON parameter file (defaults to <config dir>/glitchcam/params.json)
    #[arg(long)]
    params: Option<PathBuf>,
    #[arg(long)]
    noise: Option<f64>,
    #[arg(long)]
    rgb_shift: Option<f64>,
    #[arg(long)]
    saturation: Option<f64>,
    #[arg(long)]
    posterize: Option<i32>,
    #[arg(long)]
    intensity: Option<f64>,
    #[arg(long)]
    block_size: Option<u32>,
    #[arg(long, value_enum)]
    sort_mode: Option<SortMode>,
    /// Channel shift reads from a snapshot of the row instead of its own output
    #[arg(long, default_value_t = false)]
    no_feedback: bool,
}

impl EffectArgs {
    fn resolve(&self) -> Result<EffectParams> {
        let mut p = EffectParams::resolve(self.params.as_deref())?;
        if let Some(v) = self.noise {
            p.noise_amount = v;
        }
        if let Some(v) = self.rgb_shift {
            p.rgb_shift_amount = v;
        }
        if let Some(v) = self.saturation {
            p.saturation_boost = v;
        }
        if let Some(v) = self.posterize {
            p.posterize_level = v;
        }
        if let Some(v) = self.intensity {
            p.glitch_intensity = v;
        }
        if let Some(v) = self.block_size {
            p.block_size = v;
        }
        if let Some(v) = self.sort_mode {
            p.sort_mode = v;
        }
        if self.no_feedback {
            p.shift_feedback = false;
        }
        Ok(p.normalized())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum SourceKind {
    Pattern,
    Image,
    Camera,
}

#[derive(Args, Debug, Clone)]
struct SourceArgs {
    #[arg(long, value_enum, default_value_t = SourceKind::Pattern)]
    source: SourceKind,
    /// Image file for `--source image`
    #[arg(short, long)]
    input: Option<PathBuf>,
    /// Camera device index for `--source camera`
    #[arg(long, default_value_t = 0)]
    camera: i32,
    /// RNG seed; random when omitted
    #[arg(long)]
    seed: Option<u64>,
    /// Backing pixels per logical pixel along each axis
    #[arg(long, default_value_t = 1)]
    density: u32,
}

impl SourceArgs {
    fn open(&self, width: u32, height: u32) -> Result<Box<dyn FrameSource>> {
        match self.source {
            SourceKind::Pattern => Ok(Box::new(PatternSource::new(width, height))),
            SourceKind::Image => {
                let path = self.input.as_deref().context("--source image needs --input <FILE>")?;
                Ok(Box::new(StillSource::open(path, width, height)?))
            }
            SourceKind::Camera => self.open_camera(width, height),
        }
    }

    #[cfg(feature = "camera")]
    fn open_camera(&self, width: u32, height: u32) -> Result<Box<dyn FrameSource>> {
        Ok(Box::new(crate::decoder::camera::CameraSource::open(self.camera, width, height)?))
    }

    #[cfg(not(feature = "camera"))]
    fn open_camera(&self, _width: u32, _height: u32) -> Result<Box<dyn FrameSource>> {
        bail!("camera {} unavailable: built without the `camera` feature", self.camera)
    }

    fn seed(&self) -> u64 {
        self.seed.unwrap_or_else(rand::random)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init_log(cli.log_level, &cli.log_file)
        .with_context(|| format!("Failed to open log file {}", cli.log_file.display()))?;

    rayon::ThreadPoolBuilder::new()
        .num_threads(num_cpus::get())
        .build_global()
        .context("Failed to build rayon thread pool")?;

    match &cli.command {
        Commands::Live { effects, source, fps, mode } => {
            let params = effects.resolve()?;
            let (width, height) = DisplayManager::surface_pixels()?;
            let mut pipeline = GlitchPipeline::new(params, width, height, source.density.max(1), source.seed());
            let mut frames = source.open(width, height)?;

            let running = Arc::new(AtomicBool::new(true));
            let r = running.clone();
            ctrlc::set_handler(move || {
                r.store(false, Ordering::SeqCst);
            })
            .context("Error registering Ctrl-C handler")?;

            let mut display = DisplayManager::new(*mode)?;
            player::run_live(&mut pipeline, frames.as_mut(), &mut display, *fps, running)?;
        }
        Commands::Render { effects, source, output, frames, width, height } => {
            if *width == 0 || *height == 0 {
                bail!("render size must be non-zero, got {}x{}", width, height);
            }
            let params = effects.resolve()?;
            let mut pipeline = GlitchPipeline::new(params, *width, *height, source.density.max(1), source.seed());
            let mut input = source.open(*width, *height)?;
            let mut out = PngSequence::create(output)?;

            let n = player::run_render(&mut pipeline, input.as_mut(), &mut out, *frames)?;
            info!("{} frames in {}", n, output.display());
            println!("wrote {} frames to {}", out.written(), output.display());
        }
        Commands::Params { effects } => {
            let params = effects.resolve()?;
            println!("{}", serde_json::to_string_pretty(&params)?);
        }
    }

    Ok(())
}
