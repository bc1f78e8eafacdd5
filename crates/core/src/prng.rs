// Minimal PRNG (no external crates).
//
// This is NOT cryptographically secure.
// It only feeds cosmetic output: simulated noise frames, placeholder encoder
// features and the offline fallback sampler. None of that is meant to be
// reproducible, so the default constructor seeds from the wall clock; tests
// pass an explicit seed.

use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone)]
pub struct Prng {
    state: u64,
}

impl Prng {
    pub fn new(seed: u64) -> Self {
        // Avoid a zero state.
        let seed = if seed == 0 { 0x9E3779B97F4A7C15 } else { seed };
        Self { state: seed }
    }

    /// Seed from the system clock (nanoseconds since the epoch).
    pub fn from_entropy() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        Self::new(nanos ^ 0xA076_1D64_78BD_642F)
    }

    /// Derive an independent stream, e.g. one per frame when synthesising in parallel.
    pub fn fork(&mut self) -> Self {
        Self::new(self.next_u64() ^ 0xE703_7ED1_A0B4_28DB)
    }

    #[inline]
    fn next_u64(&mut self) -> u64 {
        // xorshift64*
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    #[inline]
    pub fn next_f32_01(&mut self) -> f32 {
        // 24 high bits fit an f32 mantissa exactly, so the result stays below 1.
        let x = self.next_u32() >> 8;
        (x as f32) / ((1u32 << 24) as f32)
    }

    #[inline]
    pub fn gen_range_usize(&mut self, low: usize, high: usize) -> usize {
        if high <= low {
            return low;
        }
        let span = (high - low) as u32;
        let v = self.next_u32() % span;
        low + v as usize
    }

    /// Pick `k` distinct indices from `0..n` (partial Fisher-Yates).
    pub fn sample_indices(&mut self, n: usize, k: usize) -> Vec<usize> {
        let mut idx: Vec<usize> = (0..n).collect();
        let k = k.min(n);
        for i in 0..k {
            let j = self.gen_range_usize(i, n);
            idx.swap(i, j);
        }
        idx.truncate(k);
        idx
    }
}
