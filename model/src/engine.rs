//! Start-triggered encode engine
//!
//! A one-tick `start` arms the engine; the next 8 ticks each sample one bit of
//! operand A and one of operand B. The 8th sample completes both bytes, runs
//! the transform and latches `done` until the next accepted `start`.
//!
//! ```text
//!   Idle ──start──▶ Capturing(0) ──sample──▶ … ──▶ Capturing(7) ──sample──▶ Done
//!                        ▲                                                   │
//!                        └──────────────────────start────────────────────────┘
//! ```

use crate::shift::{BitOrder, BitShiftRegister, FRAME_BITS};
use crate::transform::{ByteTransform, MixTransform};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineState {
    #[default]
    Idle,
    /// `count` samples taken so far
    Capturing { count: u8 },
    Done,
}

/// One completed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedByte {
    pub operand_a: u8,
    pub operand_b: u8,
    pub value: u8,
}

#[derive(Debug, Clone)]
pub struct EncodeEngine<T = MixTransform> {
    state: EngineState,
    reg_a: BitShiftRegister,
    reg_b: BitShiftRegister,
    result: Option<EncodedByte>,
    transform: T,
    ignored_starts: u64,
}

impl EncodeEngine<MixTransform> {
    pub fn new(order: BitOrder) -> Self {
        Self::with_transform(order, MixTransform::default())
    }
}

impl<T: ByteTransform> EncodeEngine<T> {
    pub fn with_transform(order: BitOrder, transform: T) -> Self {
        Self {
            state: EngineState::Idle,
            reg_a: BitShiftRegister::new(order),
            reg_b: BitShiftRegister::new(order),
            result: None,
            transform,
            ignored_starts: 0,
        }
    }

    /// Advance one tick. Returns the result on the completing tick only.
    pub fn tick(&mut self, start: bool, a_bit: bool, b_bit: bool) -> Option<EncodedByte> {
        match self.state {
            EngineState::Idle | EngineState::Done => {
                if start {
                    log::debug!("engine: start, capturing operands");
                    self.reg_a.reset();
                    self.reg_b.reset();
                    self.state = EngineState::Capturing { count: 0 };
                }
                None
            }
            EngineState::Capturing { count } => {
                if start {
                    // The in-flight capture owns these ticks
                    self.ignored_starts += 1;
                    log::warn!("engine: start ignored while capturing sample {count}");
                }
                let a = self.reg_a.push(a_bit);
                let b = self.reg_b.push(b_bit);
                match (a, b) {
                    (Some(operand_a), Some(operand_b)) => {
                        let encoded = EncodedByte {
                            operand_a,
                            operand_b,
                            value: self.transform.encode(operand_a, operand_b),
                        };
                        log::debug!(
                            "engine: done, A={operand_a:#04x} B={operand_b:#04x} -> {:#04x}",
                            encoded.value
                        );
                        self.result = Some(encoded);
                        self.state = EngineState::Done;
                        Some(encoded)
                    }
                    _ => {
                        debug_assert!(count + 1 < FRAME_BITS);
                        self.state = EngineState::Capturing { count: count + 1 };
                        None
                    }
                }
            }
        }
    }

    /// Abort any capture and forget the last result.
    pub fn reset(&mut self) {
        if let EngineState::Capturing { count } = self.state {
            log::debug!("engine: reset dropped capture after {count} samples");
        }
        self.state = EngineState::Idle;
        self.reg_a.reset();
        self.reg_b.reset();
        self.result = None;
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Latched completion flag
    pub fn done(&self) -> bool {
        self.state == EngineState::Done
    }

    pub fn is_capturing(&self) -> bool {
        matches!(self.state, EngineState::Capturing { .. })
    }

    /// Most recent completed operation, kept across later starts
    pub fn last_result(&self) -> Option<EncodedByte> {
        self.result
    }

    /// Starts seen while a capture was already running
    pub fn ignored_starts(&self) -> u64 {
        self.ignored_starts
    }

    pub fn transform(&self) -> &T {
        &self.transform
    }
}
