use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Handle of a random source registered with the model.
pub type StreamId = usize;

/// Orchestration surface of a random-number stream.
///
/// The kernel never draws numbers itself; it only drives these operations
/// from the experiment flags (stream reset, substream advancement, and the
/// antithetic choreography). Elements draw via `next_f64`.
pub trait RandomSource {
    /// Next uniform draw in [0, 1). Honors the antithetic flag by
    /// returning the complement 1 − u.
    fn next_f64(&mut self) -> f64;

    /// Rewind to the beginning of the stream (substream 0).
    fn reset_start_stream(&mut self);

    /// Rewind to the beginning of the current substream.
    fn reset_start_substream(&mut self);

    /// Position at the beginning of the next substream.
    fn advance_to_next_substream(&mut self);

    fn advance_substreams(&mut self, count: u64) {
        for _ in 0..count {
            self.advance_to_next_substream();
        }
    }

    fn set_antithetic(&mut self, on: bool);

    fn antithetic(&self) -> bool;
}

// ─── SplitStream ──────────────────────────────────────────────

/// A [`RandomSource`] with deterministically addressable substreams.
///
/// Each (seed, substream) pair reseeds an independent generator, so
/// rewinding a substream reproduces its draws exactly. That is what the
/// antithetic choreography relies on: the even replication of a pair
/// rewinds the substream and complements every draw of the odd one.
pub struct SplitStream {
    seed: u64,
    substream: u64,
    antithetic: bool,
    rng: StdRng,
}

impl SplitStream {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            substream: 0,
            antithetic: false,
            rng: StdRng::seed_from_u64(mix(seed, 0)),
        }
    }

    pub fn substream(&self) -> u64 {
        self.substream
    }

    fn rebuild(&mut self) {
        self.rng = StdRng::seed_from_u64(mix(self.seed, self.substream));
    }
}

impl RandomSource for SplitStream {
    fn next_f64(&mut self) -> f64 {
        let u: f64 = self.rng.gen();
        if self.antithetic {
            1.0 - u
        } else {
            u
        }
    }

    fn reset_start_stream(&mut self) {
        self.substream = 0;
        self.rebuild();
    }

    fn reset_start_substream(&mut self) {
        self.rebuild();
    }

    fn advance_to_next_substream(&mut self) {
        self.substream += 1;
        self.rebuild();
    }

    fn set_antithetic(&mut self, on: bool) {
        self.antithetic = on;
    }

    fn antithetic(&self) -> bool {
        self.antithetic
    }
}

/// SplitMix64-style combination of seed and substream index.
fn mix(seed: u64, substream: u64) -> u64 {
    let mut z = seed ^ substream.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
