//! Smooth 1-D value noise used for the channel shift drift.

const OCTAVES: u32 = 4;
const FALLOFF: f64 = 0.5;

/// Multi-octave value noise in `[0, 1)`, deterministic for a given seed.
#[derive(Clone, Debug)]
pub struct Noise1D {
    seed: u32,
}

impl Noise1D {
    pub fn new(seed: u64) -> Self {
        Self {
            seed: (seed ^ (seed >> 32)) as u32,
        }
    }

    pub fn sample(&self, x: f64) -> f64 {
        let mut total = 0.0;
        let mut amplitude = 0.5;
        let mut frequency = 1.0;

        for octave in 0..OCTAVES {
            total += self.lattice(x * frequency, octave) * amplitude;
            amplitude *= FALLOFF;
            frequency *= 2.0;
        }

        // 0.5 + 0.25 + 0.125 + 0.0625
        total / 0.9375 * 0.999_999
    }

    fn lattice(&self, x: f64, octave: u32) -> f64 {
        let xi = x.floor();
        let xf = x - xi;
        let xi = xi as i64 as u32;

        let fade = 0.5 * (1.0 - (xf * std::f64::consts::PI).cos());
        let s = self.seed.wrapping_add(octave.wrapping_mul(0x27d4_eb2d));

        let a = hash_unit(xi, s);
        let b = hash_unit(xi.wrapping_add(1), s);
        a + fade * (b - a)
    }
}

#[inline]
fn hash_u32(mut x: u32) -> u32 {
    x = x.wrapping_mul(0x9E37_79B9);
    x ^= x >> 16;
    x = x.wrapping_mul(0x85EB_CA6B);
    x ^= x >> 13;
    x = x.wrapping_mul(0xC2B2_AE35);
    x ^= x >> 16;
    x
}

/// Hash to `[0, 1)`.
#[inline]
fn hash_unit(x: u32, seed: u32) -> f64 {
    let h = hash_u32(x.wrapping_mul(374_761_393).wrapping_add(seed));
    (h & 0x00FF_FFFF) as f64 / 16_777_216.0
}
