//! Cycle-level model of a bit-serial encode device
//!
//! The device takes two operand bytes serially after a one-tick `start`,
//! transforms them, and shifts the result back out while latching `done`.
//! Optional stages smooth the output bits with a 3-tap moving average, frame
//! output bytes with a `0x7E` marker, or run a filter/encode/decode/filter
//! chain. A separate SERDES mode captures raw serial bytes.
//!
//! Every component advances on an explicit `tick` with its inputs passed in;
//! there is no shared clock or reset state.
//!
//! Framed channels reserve `0x7E`: only 255 data values are unambiguous.
//! See [`framer`].
//!
//! # Example
//!
//! ```rust
//! use bitpipe_model::{BenchConfig, BitOrder, Device, PipelineConfig, Testbench};
//!
//! let device = Device::new(PipelineConfig::default());
//! let mut tb = Testbench::new(device, BenchConfig::default()).unwrap();
//! tb.reset().unwrap();
//! tb.encode(0xC3, 0x5A, BitOrder::MsbFirst).unwrap();
//! tb.wait_done().unwrap();
//! assert!(tb.last().done());
//! ```

pub mod bench;
pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod framer;
pub mod pins;
pub mod pipeline;
pub mod shift;
pub mod transform;

pub use bench::{poll_with_bound, Dut, RemoteDevice, Testbench};
pub use config::{BenchConfig, Config, Mode, PipelineConfig};
pub use engine::{EncodeEngine, EncodedByte, EngineState};
pub use error::{PipeError, PipeResult};
pub use filter::MovingAverageFilter;
pub use framer::{emit_frame, resync, FrameReceiver, FrameSlot, FRAME_MARKER};
pub use pins::{Device, PinInputs, PinOutputs};
pub use pipeline::{Inputs, Outputs, Pipeline, Status};
pub use shift::{BitOrder, BitShiftRegister, SerialFrame};
pub use transform::{ByteTransform, MixTransform};
