//! Keyed byte transform
//!
//! No golden ciphertext exists for the device, only the requirement that the
//! transform be deterministic and invertible under the same key. `MixTransform`
//! is a small add-rotate-xor network: each round xors in a round key, rotates
//! left by 3 and adds the round key back.

/// An invertible byte transform keyed by a second byte.
pub trait ByteTransform {
    fn encode(&self, plain: u8, key: u8) -> u8;

    /// Inverse of [`ByteTransform::encode`] under the same key.
    fn decode(&self, cipher: u8, key: u8) -> u8;
}

/// Round constants, cycled every four rounds
const ROUND_CONSTANTS: [u8; 4] = [0x3A, 0xC5, 0x96, 0x6B];

pub const DEFAULT_ROUNDS: u8 = 4;
pub const MAX_ROUNDS: u8 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MixTransform {
    rounds: u8,
}

impl MixTransform {
    pub fn new(rounds: u8) -> Self {
        Self {
            rounds: rounds.clamp(1, MAX_ROUNDS),
        }
    }

    pub fn rounds(&self) -> u8 {
        self.rounds
    }

    fn round_key(key: u8, round: u8) -> u8 {
        key.rotate_left(round as u32) ^ ROUND_CONSTANTS[round as usize % ROUND_CONSTANTS.len()]
    }
}

impl Default for MixTransform {
    fn default() -> Self {
        Self::new(DEFAULT_ROUNDS)
    }
}

impl ByteTransform for MixTransform {
    fn encode(&self, plain: u8, key: u8) -> u8 {
        (0..self.rounds).fold(plain, |x, round| {
            let k = Self::round_key(key, round);
            (x ^ k).rotate_left(3).wrapping_add(k)
        })
    }

    fn decode(&self, cipher: u8, key: u8) -> u8 {
        (0..self.rounds).rev().fold(cipher, |x, round| {
            let k = Self::round_key(key, round);
            x.wrapping_sub(k).rotate_right(3) ^ k
        })
    }
}
