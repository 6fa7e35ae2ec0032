//! Deterministic pseudo-random generation with saveable state.
//!
//! [`TauswortheHybrid`] combines three Tausworthe generators with a linear
//! congruential step (L'Ecuyer's hybrid construction). Its whole state is
//! four `u32` words, captured as an [`RngState`] that can be written to a
//! model stream and restored bit-exactly.
//!
//! Transforms never persist a live generator. They capture the state right
//! after seeding and rebuild a fresh generator from it whenever the random
//! matrix has to be regenerated, so an in-memory transform and one reloaded
//! from disk consume exactly the same stream.
//!
//! ## Example
//!
//! ```rust
//! use tabkit_rff::rng::TauswortheHybrid;
//!
//! let mut rng = TauswortheHybrid::from_seed(42);
//! let state = rng.state();
//! let first = rng.next_u32();
//!
//! let mut replay = TauswortheHybrid::from_state(state);
//! assert_eq!(replay.next_u32(), first);
//! ```

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Result, RffError};

/// Number of `u32` words in a generator state.
pub const STATE_WORDS: usize = 4;

/// Seed words below this value are redrawn so every Tausworthe component
/// keeps live bits under its mask.
const MIN_SEED_WORD: u32 = 128;

/// Captured state of a [`TauswortheHybrid`] generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RngState {
    /// The four state words `z1..z4`.
    pub words: [u32; STATE_WORDS],
}

impl RngState {
    /// Write the state as `int32 count (=4)` followed by the four words.
    pub fn save<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_i32::<LittleEndian>(STATE_WORDS as i32)?;
        for word in self.words {
            writer.write_u32::<LittleEndian>(word)?;
        }
        Ok(())
    }

    /// Read a state written by [`RngState::save`].
    pub fn load<R: Read>(reader: &mut R) -> Result<Self> {
        let count = reader.read_i32::<LittleEndian>()?;
        if count != STATE_WORDS as i32 {
            return Err(RffError::decode(format!(
                "generator state has {} words, expected {}",
                count, STATE_WORDS
            )));
        }

        let mut words = [0u32; STATE_WORDS];
        for word in words.iter_mut() {
            *word = reader.read_u32::<LittleEndian>()?;
        }

        // A seeded generator always satisfies these; anything else is corrupt.
        if words[0] < 2 || words[1] < 8 || words[2] < 16 {
            return Err(RffError::decode(format!(
                "generator state {:?} has a dead Tausworthe component",
                words
            )));
        }

        Ok(Self { words })
    }
}

/// Tausworthe-hybrid pseudo-random generator.
#[derive(Debug, Clone)]
pub struct TauswortheHybrid {
    z1: u32,
    z2: u32,
    z3: u32,
    z4: u32,
}

impl TauswortheHybrid {
    /// Create a generator from an explicit seed.
    pub fn from_seed(seed: u32) -> Self {
        let mut expander = SplitMix64::new(u64::from(seed));
        Self::from_source(|| expander.next_u32())
    }

    /// Rebuild a generator from a captured state.
    pub fn from_state(state: RngState) -> Self {
        let [z1, z2, z3, z4] = state.words;
        Self { z1, z2, z3, z4 }
    }

    /// Derive an independent child generator, advancing `self`.
    ///
    /// The child is a deterministic function of the parent's current state,
    /// so replaying the parent replays every child.
    pub fn derive_child(&mut self) -> Self {
        Self::from_source(|| self.next_u32())
    }

    fn from_source<F: FnMut() -> u32>(mut next: F) -> Self {
        let mut seed_word = || loop {
            let u = next();
            if u >= MIN_SEED_WORD {
                return u;
            }
        };
        let z1 = seed_word();
        let z2 = seed_word();
        let z3 = seed_word();
        let z4 = seed_word();
        Self { z1, z2, z3, z4 }
    }

    /// Capture the current state.
    pub fn state(&self) -> RngState {
        RngState {
            words: [self.z1, self.z2, self.z3, self.z4],
        }
    }

    /// Next uniformly distributed `u32`.
    pub fn next_u32(&mut self) -> u32 {
        self.z1 = tausworthe_step(self.z1, 13, 19, 12, 0xFFFF_FFFE);
        self.z2 = tausworthe_step(self.z2, 2, 25, 4, 0xFFFF_FFF8);
        self.z3 = tausworthe_step(self.z3, 3, 11, 17, 0xFFFF_FFF0);
        self.z4 = self.z4.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        self.z1 ^ self.z2 ^ self.z3 ^ self.z4
    }

    /// Next uniformly distributed `u64` (two draws, high word first).
    pub fn next_u64(&mut self) -> u64 {
        let hi = u64::from(self.next_u32());
        let lo = u64::from(self.next_u32());
        (hi << 32) | lo
    }

    /// Uniform `f32` in `[0, 1)` with 24 bits of precision.
    pub fn next_f32(&mut self) -> f32 {
        (self.next_u32() >> 8) as f32 * (1.0 / 16_777_216.0)
    }

    /// Uniform `f64` in `[0, 1)` with 53 bits of precision.
    pub fn next_f64(&mut self) -> f64 {
        let a = u64::from(self.next_u32() >> 5);
        let b = u64::from(self.next_u32() >> 6);
        (a * 67_108_864 + b) as f64 * (1.0 / 9_007_199_254_740_992.0)
    }

    /// Uniform index in `[0, n)`.
    ///
    /// # Panics
    /// Panics if `n == 0`.
    pub fn next_index(&mut self, n: u64) -> u64 {
        assert!(n > 0, "next_index called with an empty range");
        ((u128::from(self.next_u64()) * u128::from(n)) >> 64) as u64
    }
}

#[inline]
fn tausworthe_step(z: u32, s1: u32, s2: u32, s3: u32, mask: u32) -> u32 {
    let b = ((z << s1) ^ z) >> s2;
    ((z & mask) << s3) ^ b
}

/// SplitMix64, used only to spread a 32-bit seed over the four state words.
struct SplitMix64 {
    state: u64,
}

impl SplitMix64 {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }
}
