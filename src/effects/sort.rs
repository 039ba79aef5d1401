use rand::Rng;
use std::cmp::Ordering;

use super::{FrameContext, GlitchPass, GlitchRng};
use crate::core::buffer::PixelBuffer;
use crate::core::params::SortMode;

const SORTED_ROWS: u32 = 8;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub struct Pixel {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Pixel {
    #[inline(always)]
    fn sum(&self) -> u16 {
        self.r as u16 + self.g as u16 + self.b as u16
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Criterion {
    Sum,
    Red,
}

impl Criterion {
    fn roll(rng: &mut GlitchRng) -> Self {
        if rng.gen_bool(0.5) {
            Criterion::Sum
        } else {
            Criterion::Red
        }
    }

    #[inline(always)]
    fn compare(self, a: &Pixel, b: &Pixel) -> Ordering {
        match self {
            Criterion::Sum => a.sum().cmp(&b.sum()),
            Criterion::Red => a.r.cmp(&b.r),
        }
    }
}

/// Pixel sorting of random row segments.
pub struct RowSort {
    run: Vec<Pixel>,
    merge_tmp: Vec<Pixel>,
}

impl RowSort {
    pub fn new() -> Self {
        Self {
            run: Vec::new(),
            merge_tmp: Vec::new(),
        }
    }

    /// Sort `[start, end)` of row `y` (end clipped to the row) and write it back.
    pub fn sort_segment(&mut self, buffer: &mut PixelBuffer, y: u32, start: u32, end: u32, mode: SortMode, rng: &mut GlitchRng) {
        let end = end.min(buffer.width());
        if start >= end || y >= buffer.height() {
            return;
        }

        let base = buffer.index(start, y);
        let len = (end - start) as usize;
        let pixels = buffer.pixels_mut();
        let segment = &mut pixels[base..base + len * 4];

        self.run.clear();
        self.run.extend(segment.chunks_exact(4).map(|px| Pixel {
            r: px[0],
            g: px[1],
            b: px[2],
            a: px[3],
        }));

        match mode {
            SortMode::PerCall => {
                let criterion = Criterion::roll(rng);
                self.run.sort_unstable_by(|a, b| criterion.compare(a, b));
            }
            SortMode::Scramble => scramble_sort(&mut self.run, &mut self.merge_tmp, rng),
        }

        for (px, p) in segment.chunks_exact_mut(4).zip(self.run.iter()) {
            px[0] = p.r;
            px[1] = p.g;
            px[2] = p.b;
            px[3] = p.a;
        }
    }
}

impl Default for RowSort {
    fn default() -> Self {
        Self::new()
    }
}

/// Bottom-up merge sort that re-rolls the criterion on every comparison.
///
/// The ordering is not a total order, so `slice::sort_by` cannot be used;
/// merging only ever moves elements, which keeps the result a permutation.
fn scramble_sort(run: &mut Vec<Pixel>, tmp: &mut Vec<Pixel>, rng: &mut GlitchRng) {
    let n = run.len();
    tmp.clear();
    tmp.extend_from_slice(run);

    let mut width = 1;
    while width < n {
        let mut lo = 0;
        while lo < n {
            let mid = (lo + width).min(n);
            let hi = (lo + 2 * width).min(n);

            let (mut i, mut j) = (lo, mid);
            for k in lo..hi {
                let take_left = j >= hi || (i < mid && Criterion::roll(rng).compare(&run[i], &run[j]) != Ordering::Greater);
                if take_left {
                    tmp[k] = run[i];
                    i += 1;
                } else {
                    tmp[k] = run[j];
                    j += 1;
                }
            }
            lo = hi;
        }
        std::mem::swap(run, tmp);
        width *= 2;
    }
}

impl GlitchPass for RowSort {
    fn name(&self) -> &'static str {
        "row_sort"
    }

    fn apply(&mut self, buffer: &mut PixelBuffer, ctx: &mut FrameContext) {
        let intensity = ctx.params.glitch_intensity;
        if buffer.is_empty() || !ctx.chance(intensity) {
            return;
        }

        let (w, h) = (buffer.width(), buffer.height());
        let half = w / 2;
        let mode = ctx.params.sort_mode;

        for _ in 0..SORTED_ROWS {
            let y = ctx.rng.gen_range(0..h);
            let start = if half > 0 { ctx.rng.gen_range(0..half) } else { 0 };
            let len = ctx.rng.gen_range(half..w.max(half + 1));
            self.sort_segment(buffer, y, start, start.saturating_add(len), mode, ctx.rng);
        }
    }
}
