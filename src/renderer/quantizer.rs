//! ANSI 256-color palette quantizer
//!
//! Used by the `ansi256` display mode for terminals without truecolor.
//! The lookup table is indexed by 5 bits per channel.

use std::sync::OnceLock;

use super::cell::RgbColor;

static COLOR_LUT: OnceLock<Vec<u8>> = OnceLock::new();

pub struct ColorQuantizer;

impl ColorQuantizer {
    /// Quantize RGB color to nearest ANSI 256-color index
    pub fn quantize(color: RgbColor) -> u8 {
        let lut = COLOR_LUT.get_or_init(Self::build_lut);

        let idx = ((color.0 as usize >> 3) << 10) | ((color.1 as usize >> 3) << 5) | (color.2 as usize >> 3);
        lut[idx]
    }

    fn build_lut() -> Vec<u8> {
        let mut lut = vec![0u8; 32 * 32 * 32];

        for r in 0..32usize {
            for g in 0..32usize {
                for b in 0..32usize {
                    // center of the 8-wide bucket
                    let (cr, cg, cb) = ((r * 8 + 4) as u8, (g * 8 + 4) as u8, (b * 8 + 4) as u8);
                    lut[(r << 10) | (g << 5) | b] = Self::rgb_to_ansi256(cr, cg, cb);
                }
            }
        }

        lut
    }

    /// Convert RGB to ANSI 256 color index
    ///
    /// - 16-231: 6×6×6 color cube
    /// - 232-255: Grayscale
    fn rgb_to_ansi256(r: u8, g: u8, b: u8) -> u8 {
        let gray_threshold = 8;
        if (r as i16 - g as i16).abs() < gray_threshold
            && (r as i16 - b as i16).abs() < gray_threshold
            && (g as i16 - b as i16).abs() < gray_threshold
        {
            let gray = ((r as u16 + g as u16 + b as u16) / 3) as u8;
            if gray < 8 {
                return 16;
            } else if gray > 238 {
                return 231;
            } else {
                return 232 + ((gray as u16 - 8) * 24 / 231) as u8;
            }
        }

        let r6 = (r as u16 * 6 / 256) as u8;
        let g6 = (g as u16 * 6 / 256) as u8;
        let b6 = (b as u16 * 6 / 256) as u8;

        16 + 36 * r6 + 6 * g6 + b6
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantize_black() {
        assert_eq!(ColorQuantizer::quantize(RgbColor(0, 0, 0)), 16);
    }

    #[test]
    fn test_quantize_white() {
        assert_eq!(ColorQuantizer::quantize(RgbColor(255, 255, 255)), 231);
    }

    #[test]
    fn test_quantize_red() {
        assert_eq!(ColorQuantizer::quantize(RgbColor(255, 0, 0)), 16 + 36 * 5);
    }

    #[test]
    fn test_gray_ramp_stays_in_gray_range() {
        for v in (16..=232u8).step_by(8) {
            let idx = ColorQuantizer::quantize(RgbColor(v, v, v));
            assert!((232..=255).contains(&idx), "{} -> {}", v, idx);
        }
    }
}
