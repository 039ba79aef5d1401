use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// How the row sort picks its comparison criterion.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SortMode {
    /// One criterion (channel sum or red) per sorted segment.
    PerCall,
    /// Re-roll the criterion on every comparison.
    Scramble,
}

impl Default for SortMode {
    fn default() -> Self {
        SortMode::PerCall
    }
}

/// Effect parameters shared by every pass. Constant for a pipeline's lifetime.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectParams {
    pub noise_amount: f64,
    pub rgb_shift_amount: f64,
    pub saturation_boost: f64,
    pub posterize_level: i32,
    pub glitch_intensity: f64,
    pub block_size: u32,
    /// Channel shift reads pixels it already rewrote in the same pass.
    pub shift_feedback: bool,
    pub sort_mode: SortMode,
}

impl Default for EffectParams {
    fn default() -> Self {
        Self {
            noise_amount: 0.4,
            rgb_shift_amount: 150.0,
            saturation_boost: 5.0,
            posterize_level: 3,
            glitch_intensity: 0.6,
            block_size: 20,
            shift_feedback: true,
            sort_mode: SortMode::PerCall,
        }
    }
}

impl EffectParams {
    /// Parameters that leave a frame untouched.
    #[cfg(test)]
    pub fn identity() -> Self {
        Self {
            noise_amount: 0.0,
            rgb_shift_amount: 0.0,
            saturation_boost: 1.0,
            posterize_level: 1,
            glitch_intensity: 0.0,
            block_size: 1,
            ..Self::default()
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read params file {}", path.display()))?;
        let params: EffectParams = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse params file {}", path.display()))?;
        Ok(params.normalized())
    }

    /// `<config_dir>/glitchcam/params.json`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("glitchcam").join("params.json"))
    }

    /// Explicit file, else the default file if it exists, else built-in defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Clamp every field into the range the passes expect.
    pub fn normalized(mut self) -> Self {
        let defaults = Self::default();

        self.noise_amount = finite_or(self.noise_amount, defaults.noise_amount).clamp(0.0, 1.0);
        self.glitch_intensity = finite_or(self.glitch_intensity, defaults.glitch_intensity).clamp(0.0, 1.0);
        self.rgb_shift_amount = finite_or(self.rgb_shift_amount, defaults.rgb_shift_amount);
        self.saturation_boost = finite_or(self.saturation_boost, defaults.saturation_boost).max(0.0);
        self.posterize_level = self.posterize_level.max(1);
        self.block_size = self.block_size.max(1);
        self
    }

    /// Quantization step, never zero. Steps above 255 quantize every channel to 0.
    #[inline(always)]
    pub fn posterize_step(&self) -> u32 {
        self.posterize_level.max(1) as u32
    }
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}
