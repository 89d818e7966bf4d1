//! Model and bench configuration
//!
//! Loaded from JSON; every field has a default so a partial file works.
//!
//! ```json
//! {
//!   "pipeline": { "mode": { "kind": "pipelined", "pre_filter": false, "post_filter": false },
//!                 "framing": true },
//!   "bench": { "reset_ticks": 10 }
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PipeError, PipeResult};
use crate::shift::BitOrder;
use crate::transform::{DEFAULT_ROUNDS, MAX_ROUNDS};

/// Reset hold range accepted by the device
pub const MIN_RESET_TICKS: u32 = 5;
pub const MAX_RESET_TICKS: u32 = 20;

/// Datapath arrangement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Mode {
    /// operands -> encode -> serial out
    #[default]
    Transform,
    /// operands -> encode -> bit filter -> serial out
    TransformFilter,
    /// serial in -> parallel out, no transform
    Serdes,
    /// operands -> filter -> encode -> decode -> filter -> serial out
    Pipelined { pre_filter: bool, post_filter: bool },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub mode: Mode,
    /// Bit order of `operand_a_bit` / `operand_b_bit`
    pub operand_order: BitOrder,
    /// Bit order of `serial_in_bit` and `serial_out_bit`
    pub serial_order: BitOrder,
    /// Wrap output bytes in `[0x7E, byte]`, strip markers on SERDES input
    pub framing: bool,
    /// Transform rounds
    pub rounds: u8,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            operand_order: BitOrder::MsbFirst,
            serial_order: BitOrder::MsbFirst,
            framing: false,
            rounds: DEFAULT_ROUNDS,
        }
    }
}

impl PipelineConfig {
    pub fn with_mode(mode: Mode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> PipeResult<()> {
        if !(1..=MAX_ROUNDS).contains(&self.rounds) {
            return Err(PipeError::Config(format!(
                "rounds must be 1..={MAX_ROUNDS}, got {}",
                self.rounds
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Ticks `rst_n` is held low
    pub reset_ticks: u32,
    /// Ticks to wait for a result before giving up
    pub settle_bound: u32,
    /// Clock period, only used to timestamp logs
    pub clock_period_us: u32,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            reset_ticks: 10,
            settle_bound: 20,
            clock_period_us: 10, // 100 kHz
        }
    }
}

impl BenchConfig {
    pub fn validate(&self) -> PipeResult<()> {
        if !(MIN_RESET_TICKS..=MAX_RESET_TICKS).contains(&self.reset_ticks) {
            return Err(PipeError::ResetHold {
                ticks: self.reset_ticks,
                min: MIN_RESET_TICKS,
                max: MAX_RESET_TICKS,
            });
        }
        if self.settle_bound == 0 {
            return Err(PipeError::Config("settle_bound must be positive".into()));
        }
        if self.clock_period_us == 0 {
            return Err(PipeError::Config("clock_period_us must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pipeline: PipelineConfig,
    pub bench: BenchConfig,
}

impl Config {
    pub fn from_json(json: &str) -> PipeResult<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> PipeResult<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> PipeResult<()> {
        self.pipeline.validate()?;
        self.bench.validate()
    }
}
