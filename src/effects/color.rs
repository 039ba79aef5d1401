//! RGB <-> HSB conversion on the 0..=100 scale used by every pass.

/// Hue, saturation and brightness, each in `[0, 100]`.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Hsb {
    pub h: f64,
    pub s: f64,
    pub b: f64,
}

impl Hsb {
    pub fn new(h: f64, s: f64, b: f64) -> Self {
        Self { h, s, b }
    }
}

pub fn rgb_to_hsb(r: u8, g: u8, b: u8) -> Hsb {
    let r = r as f64 / 255.0;
    let g = g as f64 / 255.0;
    let b = b as f64 / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let d = max - min;

    let s = if max == 0.0 { 0.0 } else { d / max };

    let sector = if d == 0.0 {
        0.0
    } else if max == r {
        (g - b) / d + if g < b { 6.0 } else { 0.0 }
    } else if max == g {
        (b - r) / d + 2.0
    } else {
        (r - g) / d + 4.0
    };
    let h = sector / 6.0;

    Hsb::new(h * 100.0, s * 100.0, max * 100.0)
}

pub fn hsb_to_rgb(h: f64, s: f64, v: f64) -> (u8, u8, u8) {
    let h = h.clamp(0.0, 100.0) / 100.0;
    let s = s.clamp(0.0, 100.0) / 100.0;
    let v = v.clamp(0.0, 100.0) / 100.0;

    let sector = (h * 6.0).floor();
    let f = h * 6.0 - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - f * s);
    let t = v * (1.0 - (1.0 - f) * s);

    let (r, g, b) = match (sector as i64).rem_euclid(6) {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };

    (to_channel(r), to_channel(g), to_channel(b))
}

#[inline(always)]
fn to_channel(x: f64) -> u8 {
    (x * 255.0).round().clamp(0.0, 255.0) as u8
}
