//! TinyTapeout pin surface
//!
//! | pin       | bit | signal           |
//! |-----------|-----|------------------|
//! | `ui_in`   | 0   | start            |
//! | `ui_in`   | 1   | operand A bit    |
//! | `ui_in`   | 2   | operand B bit    |
//! | `ui_in`   | 3   | serial in        |
//! | `uo_out`  | 0   | serial out       |
//! | `uo_out`  | 1   | done             |
//! | `uo_out`  | 2   | busy             |
//! | `uo_out`  | 3   | parallel valid   |
//! | `uio_out` | 7:0 | parallel byte    |
//!
//! `rst_n` is active low. `uio_in` is unused.

use crate::config::PipelineConfig;
use crate::pipeline::{Inputs, Outputs, Pipeline};

pub mod ui {
    //! Bit positions in `ui_in`

    pub const START: u8 = 0;
    pub const A_BIT: u8 = 1;
    pub const B_BIT: u8 = 2;
    pub const SERIAL_IN: u8 = 3;
}

pub mod uo {
    //! Bit positions in `uo_out`

    pub const SERIAL_OUT: u8 = 0;
    pub const DONE: u8 = 1;
    pub const BUSY: u8 = 2;
    pub const VALID: u8 = 3;
}

#[inline]
fn bit(byte: u8, index: u8) -> bool {
    (byte >> index) & 1 == 1
}

/// Input pins sampled on a clock edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinInputs {
    pub ui_in: u8,
    pub uio_in: u8,
    pub ena: bool,
    pub rst_n: bool,
}

impl Default for PinInputs {
    /// Powered, enabled, out of reset, all inputs low
    fn default() -> Self {
        Self {
            ui_in: 0,
            uio_in: 0,
            ena: true,
            rst_n: true,
        }
    }
}

impl PinInputs {
    /// `ui_in` value carrying the given operand bits, plus `start` if set
    pub fn operands(start: bool, a_bit: bool, b_bit: bool) -> u8 {
        ((b_bit as u8) << ui::B_BIT) | ((a_bit as u8) << ui::A_BIT) | ((start as u8) << ui::START)
    }
}

impl From<PinInputs> for Inputs {
    fn from(pins: PinInputs) -> Self {
        Inputs {
            reset: !pins.rst_n,
            enable: pins.ena,
            start: bit(pins.ui_in, ui::START),
            a_bit: bit(pins.ui_in, ui::A_BIT),
            b_bit: bit(pins.ui_in, ui::B_BIT),
            serial_in: bit(pins.ui_in, ui::SERIAL_IN),
        }
    }
}

/// Output pins after a clock edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PinOutputs {
    pub uo_out: u8,
    pub uio_out: u8,
    pub uio_oe: u8,
}

impl PinOutputs {
    pub fn serial_out(&self) -> bool {
        bit(self.uo_out, uo::SERIAL_OUT)
    }

    pub fn done(&self) -> bool {
        bit(self.uo_out, uo::DONE)
    }

    pub fn busy(&self) -> bool {
        bit(self.uo_out, uo::BUSY)
    }

    /// The parallel byte, if the device marks it valid
    pub fn parallel_out(&self) -> Option<u8> {
        bit(self.uo_out, uo::VALID).then_some(self.uio_out)
    }
}

impl From<Outputs> for PinOutputs {
    fn from(out: Outputs) -> Self {
        PinOutputs {
            uo_out: ((out.serial_out as u8) << uo::SERIAL_OUT)
                | ((out.done as u8) << uo::DONE)
                | ((out.busy as u8) << uo::BUSY)
                | ((out.parallel_out.is_some() as u8) << uo::VALID),
            uio_out: out.parallel_out.unwrap_or(0),
            uio_oe: 0xFF,
        }
    }
}

/// The pipeline behind its pins.
#[derive(Debug, Clone)]
pub struct Device {
    pipeline: Pipeline,
}

impl Device {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            pipeline: Pipeline::new(config),
        }
    }

    /// One rising clock edge
    pub fn clock(&mut self, pins: PinInputs) -> PinOutputs {
        self.pipeline.tick(pins.into()).into()
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }
}
