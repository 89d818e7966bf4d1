//! Serial/parallel shift register and 8-bit serial frames

use serde::{Deserialize, Serialize};

use crate::error::{PipeError, PipeResult};

/// Bits per frame; every frame is one byte.
pub const FRAME_BITS: u8 = 8;

/// Order in which the bits of a byte travel on a serial line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BitOrder {
    /// Bit 7 first
    #[default]
    MsbFirst,
    /// Bit 0 first
    LsbFirst,
}

/// 8-bit shift register usable in both directions.
///
/// `push` shifts a serial bit in and hands back the byte every 8th call.
/// `load` + `drain` shift a parallel byte out one bit per call. Both sides
/// share the register, as a single flop chain would.
#[derive(Debug, Clone, Default)]
pub struct BitShiftRegister {
    order: BitOrder,
    value: u8,
    /// Bits shifted in since the last completed byte
    filled: u8,
    /// Bits of the loaded byte not yet shifted out
    remaining: u8,
}

impl BitShiftRegister {
    pub fn new(order: BitOrder) -> Self {
        Self {
            order,
            ..Default::default()
        }
    }

    pub fn order(&self) -> BitOrder {
        self.order
    }

    /// Shift one bit in. Returns the byte once 8 bits have accumulated.
    pub fn push(&mut self, bit: bool) -> Option<u8> {
        let bit = bit as u8;
        self.value = match self.order {
            BitOrder::MsbFirst => (self.value << 1) | bit,
            BitOrder::LsbFirst => (self.value >> 1) | (bit << 7),
        };
        self.remaining = 0;
        self.filled += 1;
        if self.filled == FRAME_BITS {
            self.filled = 0;
            Some(self.value)
        } else {
            None
        }
    }

    /// Load a byte for serial output, discarding any partial input.
    pub fn load(&mut self, byte: u8) {
        self.value = byte;
        self.filled = 0;
        self.remaining = FRAME_BITS;
    }

    /// Shift one bit out, `None` once the loaded byte is exhausted.
    pub fn drain(&mut self) -> Option<bool> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let bit = match self.order {
            BitOrder::MsbFirst => {
                let bit = self.value & 0x80 != 0;
                self.value <<= 1;
                bit
            }
            BitOrder::LsbFirst => {
                let bit = self.value & 0x01 != 0;
                self.value >>= 1;
                bit
            }
        };
        Some(bit)
    }

    pub fn filled(&self) -> u8 {
        self.filled
    }

    pub fn remaining(&self) -> u8 {
        self.remaining
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.order);
    }
}

/// Exactly 8 bits in transmission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialFrame {
    bits: [bool; FRAME_BITS as usize],
    order: BitOrder,
}

impl SerialFrame {
    /// Serialize `byte` in the given order.
    pub fn from_byte(byte: u8, order: BitOrder) -> Self {
        let mut reg = BitShiftRegister::new(order);
        reg.load(byte);
        let mut bits = [false; FRAME_BITS as usize];
        for slot in bits.iter_mut() {
            *slot = reg.drain().unwrap_or(false);
        }
        Self { bits, order }
    }

    /// Take bits as received on the wire. Anything but 8 bits is rejected.
    pub fn from_bits(bits: &[bool], order: BitOrder) -> PipeResult<Self> {
        let bits: [bool; FRAME_BITS as usize] = bits
            .try_into()
            .map_err(|_| PipeError::FrameLength(bits.len()))?;
        Ok(Self { bits, order })
    }

    pub fn to_byte(&self) -> u8 {
        let mut reg = BitShiftRegister::new(self.order);
        self.bits
            .iter()
            .fold(None, |_, &bit| reg.push(bit))
            .unwrap_or_default()
    }

    /// Bits in transmission order
    pub fn bits(&self) -> impl Iterator<Item = bool> + '_ {
        self.bits.iter().copied()
    }

    pub fn order(&self) -> BitOrder {
        self.order
    }
}
