//! Cosmetic forward-diffusion simulation (clean image → noise).
//!
//! Each frame blends the final image with fresh per-pixel noise,
//! `alpha = (i + 1) / steps` being the noise fraction of frame `i`. The
//! noise is a two-uniform bell approximation over `[0, 255]`. Output is not
//! reproducible unless the caller seeds the [`Prng`].

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::prng::Prng;

pub const DEFAULT_STEPS: usize = 20;
pub const MIN_STEPS: usize = 5;
pub const MAX_STEPS: usize = 60;

/// Interleaved 8-bit RGBA pixels, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbaImage {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl RgbaImage {
    /// `None` when `data` does not hold exactly `width * height` pixels.
    pub fn from_raw(width: usize, height: usize, data: Vec<u8>) -> Option<Self> {
        let expected = width.checked_mul(height)?.checked_mul(4)?;
        (data.len() == expected).then_some(Self {
            width,
            height,
            data,
        })
    }

    pub fn filled(width: usize, height: usize, rgba: [u8; 4]) -> Self {
        let data = rgba
            .iter()
            .copied()
            .cycle()
            .take(width * height * 4)
            .collect();
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let p = (y * self.width + x) * 4;
        Some([
            self.data[p],
            self.data[p + 1],
            self.data[p + 2],
            self.data[p + 3],
        ])
    }
}

/// Clamp a requested frame count into the supported range. Zero means "use
/// the default".
pub fn clamp_steps(steps: usize) -> usize {
    if steps == 0 {
        DEFAULT_STEPS
    } else {
        steps.clamp(MIN_STEPS, MAX_STEPS)
    }
}

#[inline]
fn noise_channel(rng: &mut Prng) -> f32 {
    ((rng.next_f32_01() + rng.next_f32_01()) * 127.5).floor()
}

#[inline]
fn blend(orig: u8, noise: f32, alpha: f32) -> u8 {
    ((1.0 - alpha) * orig as f32 + alpha * noise)
        .round()
        .clamp(0.0, 255.0) as u8
}

fn noisy_frame(base: &RgbaImage, alpha: f32, rng: &mut Prng) -> RgbaImage {
    let mut data = base.data.clone();
    for px in data.chunks_exact_mut(4) {
        px[0] = blend(px[0], noise_channel(rng), alpha);
        px[1] = blend(px[1], noise_channel(rng), alpha);
        px[2] = blend(px[2], noise_channel(rng), alpha);
        // Alpha channel is left untouched.
    }
    RgbaImage {
        width: base.width,
        height: base.height,
        data,
    }
}

/// Frames from lightly noised to pure noise; the last frame has `alpha = 1`.
pub fn forward_diffusion(base: &RgbaImage, steps: usize, rng: &mut Prng) -> Vec<RgbaImage> {
    let steps = clamp_steps(steps);

    // One independent stream per frame, drawn up front so the frames can be
    // built in any order.
    let streams: Vec<Prng> = (0..steps).map(|_| rng.fork()).collect();

    #[cfg(feature = "parallel")]
    {
        streams
            .into_par_iter()
            .enumerate()
            .map(|(i, mut r)| noisy_frame(base, (i + 1) as f32 / steps as f32, &mut r))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        streams
            .into_iter()
            .enumerate()
            .map(|(i, mut r)| noisy_frame(base, (i + 1) as f32 / steps as f32, &mut r))
            .collect()
    }
}
