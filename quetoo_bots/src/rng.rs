// Per-bot pseudo-random number generator.
//
// xoshiro256++ seeded through SplitMix64. Every bot owns one, seeded from
// its entity number and the map, so a replay with the same seed makes the
// same choices: combat style, lock-on delay, wander turns, chase rolls and
// the long-range item shuffle.
//
// Range helpers never panic; an empty range yields its lower bound.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BotRng {
    s: [u64; 4],
}

impl BotRng {
    /// Expand a 64-bit seed into the 256-bit state.
    pub fn new(seed: u64) -> Self {
        let mut seeder = SplitMix(seed);
        Self {
            s: std::array::from_fn(|_| seeder.next_word()),
        }
    }

    pub fn next_u64(&mut self) -> u64 {
        let [s0, s1, s2, s3] = self.s;
        let out = s0.wrapping_add(s3).rotate_left(23).wrapping_add(s0);

        let s2 = s2 ^ s0;
        let s3 = s3 ^ s1;
        self.s = [s0 ^ s3, s1 ^ s2, s2 ^ (s1 << 17), s3.rotate_left(45)];

        out
    }

    /// Uniform in `[0, 1)` from the top 24 bits.
    pub fn next_f32(&mut self) -> f32 {
        (self.next_u64() >> 40) as f32 / (1u64 << 24) as f32
    }

    /// Uniform in `[low, high)`.
    pub fn range_f32(&mut self, low: f32, high: f32) -> f32 {
        if low >= high {
            return low;
        }
        low + self.next_f32() * (high - low)
    }

    /// Uniform in `[low, high)`, without modulo bias.
    pub fn range_u32(&mut self, low: u32, high: u32) -> u32 {
        if low >= high {
            return low;
        }
        let range = u64::from(high - low);
        let threshold = range.wrapping_neg() % range;
        loop {
            let r = self.next_u64();
            if r >= threshold {
                return low + (r % range) as u32;
            }
        }
    }

    /// A fair coin.
    pub fn coin(&mut self) -> bool {
        self.next_u64() >> 63 == 1
    }

    /// `-magnitude` or `+magnitude` with equal probability.
    pub fn signed(&mut self, magnitude: f32) -> f32 {
        if self.coin() { -magnitude } else { magnitude }
    }
}

/// SplitMix64, only used to spread a seed over the xoshiro state.
struct SplitMix(u64);

impl SplitMix {
    fn next_word(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(0x9e37_79b9_7f4a_7c15);
        let z = self.0;
        let z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        let z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^ (z >> 31)
    }
}
