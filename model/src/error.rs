//! Error types for the model and its bench

use std::io;
use thiserror::Error;

/// Result type used throughout the crate
pub type PipeResult<T> = Result<T, PipeError>;

/// Errors surfaced outside the per-tick state machines.
///
/// The state machines themselves never fail: "not ready" and "exhausted" are
/// ordinary control signals. These variants cover the driver side.
#[derive(Error, Debug)]
pub enum PipeError {
    /// A serial frame was built from the wrong number of bits
    #[error("serial frame must hold exactly 8 bits, got {0}")]
    FrameLength(usize),

    /// Polling gave up before the awaited condition held
    #[error("condition not met after {ticks} ticks")]
    Timeout { ticks: u32 },

    /// Reset hold time outside what the device accepts
    #[error("reset must be held for {min}..={max} ticks, got {ticks}")]
    ResetHold { ticks: u32, min: u32, max: u32 },

    /// Configuration rejected by validation
    #[error("configuration error: {0}")]
    Config(String),

    /// Configuration file could not be parsed
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// Configuration file could not be read
    #[error("failed to read configuration: {0}")]
    Io(#[from] io::Error),

    /// The device produced something other than the reference result
    #[error("{what}: got {got:02x?}, expected {expected:#04x}")]
    Mismatch {
        what: String,
        got: Option<u8>,
        expected: u8,
    },

    /// The device endpoint hung up
    #[error("device channel closed")]
    ChannelClosed,
}

impl PipeError {
    /// Check if retrying the operation may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, PipeError::Timeout { .. })
    }
}
