//! The composed datapath
//!
//! One call to [`Pipeline::tick`] is one clock edge. Within a tick every stage
//! reads the state left by the previous tick, so a byte settled on tick *t*
//! becomes visible to the next stage (and on the serial output) on tick
//! *t + 1*. The latency a driver has to wait out per mode, counted from the
//! tick that takes the 8th operand sample:
//!
//! | mode              | `done` after | serial byte starts |
//! |-------------------|--------------|--------------------|
//! | transform         | 0 ticks      | +1                 |
//! | transform+filter  | 8 ticks      | +9                 |
//! | pipelined         | 4 ticks      | +5                 |
//!
//! With framing the serial output carries the marker byte first, adding 8
//! ticks before the payload.
//!
//! An accepted `start` drops whatever byte the later stages still hold. The
//! serial output keeps at most one unit waiting behind the one on the wire;
//! a newer unit replaces the waiting one.

use std::collections::VecDeque;

use crate::config::{Mode, PipelineConfig};
use crate::engine::{EncodeEngine, EncodedByte};
use crate::filter::{filter_byte, MovingAverageFilter};
use crate::framer::{emit_frame, FrameReceiver};
use crate::shift::{BitOrder, BitShiftRegister};
use crate::transform::{ByteTransform, MixTransform};

/// Pin-level inputs for one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Inputs {
    pub reset: bool,
    pub enable: bool,
    pub start: bool,
    pub a_bit: bool,
    pub b_bit: bool,
    pub serial_in: bool,
}

/// Registered outputs after a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Outputs {
    pub serial_out: bool,
    pub done: bool,
    pub busy: bool,
    /// `None` until a byte has settled
    pub parallel_out: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Status {
    pub busy: bool,
    pub done: bool,
}

/// Parallel-to-serial output: the unit being shifted out plus one pending.
///
/// A unit is one settled byte, with its marker in front when framing. A new
/// unit arriving while one is pending replaces it.
#[derive(Debug, Clone)]
struct SerialEmitter {
    reg: BitShiftRegister,
    current: VecDeque<u8>,
    pending: Option<Vec<u8>>,
}

impl SerialEmitter {
    fn new(order: BitOrder) -> Self {
        Self {
            reg: BitShiftRegister::new(order),
            current: VecDeque::new(),
            pending: None,
        }
    }

    /// Shift out the next bit, pulling the next byte when the register runs dry.
    fn step(&mut self) -> Option<bool> {
        if self.reg.is_exhausted() {
            if self.current.is_empty() {
                self.current.extend(self.pending.take()?);
            }
            let byte = self.current.pop_front()?;
            self.reg.load(byte);
        }
        self.reg.drain()
    }

    fn enqueue(&mut self, unit: &[u8]) {
        if let Some(dropped) = self.pending.replace(unit.to_vec()) {
            log::debug!("pipeline: serial output busy, dropped {dropped:02x?}");
        }
    }

    fn is_idle(&self) -> bool {
        self.reg.is_exhausted() && self.current.is_empty() && self.pending.is_none()
    }

    fn reset(&mut self) {
        self.reg.reset();
        self.current.clear();
        self.pending = None;
    }
}

/// Serializes an encoded byte through the bit filter and re-collects it.
#[derive(Debug, Clone)]
struct FilterStage {
    source: BitShiftRegister,
    sink: BitShiftRegister,
    filter: MovingAverageFilter,
}

impl FilterStage {
    fn new(order: BitOrder) -> Self {
        Self {
            source: BitShiftRegister::new(order),
            sink: BitShiftRegister::new(order),
            filter: MovingAverageFilter::new(),
        }
    }

    fn load(&mut self, byte: u8) {
        self.source.load(byte);
    }

    /// Filter one bit; returns the filtered byte on its 8th bit.
    fn step(&mut self) -> Option<u8> {
        let bit = self.source.drain()?;
        let filtered = self.filter.step(bit as u8) != 0;
        self.sink.push(filtered)
    }

    fn is_idle(&self) -> bool {
        self.source.is_exhausted()
    }

    /// Drop the byte in flight, keeping the filter history.
    fn flush(&mut self) {
        self.source.reset();
        self.sink.reset();
    }

    fn reset(&mut self) {
        self.source.reset();
        self.sink.reset();
        self.filter.reset();
    }
}

#[derive(Debug, Clone, Copy)]
struct Staged {
    byte: u8,
    key: u8,
}

/// filter -> encode -> decode -> filter, one register per boundary.
#[derive(Debug, Clone)]
struct StageChain {
    regs: [Option<Staged>; 4],
    pre: Option<MovingAverageFilter>,
    post: Option<MovingAverageFilter>,
    order: BitOrder,
    transform: MixTransform,
}

impl StageChain {
    fn new(pre_filter: bool, post_filter: bool, order: BitOrder, transform: MixTransform) -> Self {
        Self {
            regs: [None; 4],
            pre: pre_filter.then(MovingAverageFilter::new),
            post: post_filter.then(MovingAverageFilter::new),
            order,
            transform,
        }
    }

    /// Advance every stage by one register. Returns the byte leaving the last.
    fn step(&mut self, captured: Option<EncodedByte>) -> Option<u8> {
        let order = self.order;
        let transform = self.transform;
        let out = self.regs[3].take().map(|s| s.byte);

        self.regs[3] = self.regs[2].take().map(|s| match self.post.as_mut() {
            Some(f) => Staged {
                byte: filter_byte(f, s.byte, order),
                ..s
            },
            None => s,
        });
        self.regs[2] = self.regs[1].take().map(|s| Staged {
            byte: transform.decode(s.byte, s.key),
            ..s
        });
        self.regs[1] = self.regs[0].take().map(|s| Staged {
            byte: transform.encode(s.byte, s.key),
            ..s
        });
        self.regs[0] = captured.map(|c| {
            let byte = match self.pre.as_mut() {
                Some(f) => filter_byte(f, c.operand_a, order),
                None => c.operand_a,
            };
            Staged {
                byte,
                key: c.operand_b,
            }
        });
        out
    }

    fn is_idle(&self) -> bool {
        self.regs.iter().all(Option::is_none)
    }

    fn flush(&mut self) {
        self.regs = [None; 4];
    }

    fn reset(&mut self) {
        self.regs = [None; 4];
        for f in self.pre.iter_mut().chain(self.post.iter_mut()) {
            f.reset();
        }
    }
}

/// The full device datapath.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    engine: EncodeEngine,
    filter_stage: FilterStage,
    stages: StageChain,
    serdes_in: BitShiftRegister,
    receiver: FrameReceiver,
    emitter: SerialEmitter,
    status: Status,
    serial_out: bool,
    parallel_out: Option<u8>,
    ticks: u64,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let transform = MixTransform::new(config.rounds);
        let (pre, post) = match config.mode {
            Mode::Pipelined {
                pre_filter,
                post_filter,
            } => (pre_filter, post_filter),
            _ => (false, false),
        };
        log::debug!("pipeline: {:?}", config);
        Self {
            engine: EncodeEngine::with_transform(config.operand_order, transform),
            filter_stage: FilterStage::new(config.serial_order),
            stages: StageChain::new(pre, post, config.serial_order, transform),
            serdes_in: BitShiftRegister::new(config.serial_order),
            receiver: FrameReceiver::new(),
            emitter: SerialEmitter::new(config.serial_order),
            status: Status::default(),
            serial_out: false,
            parallel_out: None,
            ticks: 0,
            config,
        }
    }

    /// Advance one clock edge.
    pub fn tick(&mut self, inputs: Inputs) -> Outputs {
        if inputs.reset {
            self.reset();
            return self.outputs();
        }
        if !inputs.enable {
            return self.outputs();
        }
        self.ticks += 1;

        // Output side first: it only sees bytes queued on earlier ticks
        self.serial_out = self.emitter.step().unwrap_or(false);

        match self.config.mode {
            Mode::Serdes => self.tick_serdes(inputs.serial_in),
            mode => self.tick_encode(mode, inputs),
        }

        log::trace!(
            "tick {}: out={} done={} busy={}",
            self.ticks,
            self.serial_out as u8,
            self.status.done as u8,
            self.status.busy as u8
        );
        self.outputs()
    }

    fn tick_encode(&mut self, mode: Mode, inputs: Inputs) {
        if inputs.start && !self.engine.is_capturing() {
            // A byte from the previous operation must not settle into this one
            if !self.stages_idle(mode) {
                log::debug!("pipeline: start abandons the byte in flight");
            }
            self.status.done = false;
            self.filter_stage.flush();
            self.stages.flush();
        }
        let captured = self.engine.tick(inputs.start, inputs.a_bit, inputs.b_bit);

        let settled = match mode {
            Mode::Transform => captured.map(|c| c.value),
            Mode::TransformFilter => {
                let settled = self.filter_stage.step();
                if let Some(c) = captured {
                    self.filter_stage.load(c.value);
                }
                settled
            }
            Mode::Pipelined { .. } => self.stages.step(captured),
            Mode::Serdes => None,
        };

        if let Some(byte) = settled {
            self.settle(byte);
        }
        self.status.busy = self.engine.is_capturing() || !self.stages_idle(mode);
    }

    fn stages_idle(&self, mode: Mode) -> bool {
        match mode {
            Mode::TransformFilter => self.filter_stage.is_idle(),
            Mode::Pipelined { .. } => self.stages.is_idle(),
            Mode::Transform | Mode::Serdes => true,
        }
    }

    fn settle(&mut self, byte: u8) {
        log::debug!("pipeline: settled {byte:#04x} at tick {}", self.ticks);
        self.status.done = true;
        self.parallel_out = Some(byte);
        if self.config.framing {
            self.emitter.enqueue(&emit_frame(byte));
        } else {
            self.emitter.enqueue(&[byte]);
        }
    }

    fn tick_serdes(&mut self, bit: bool) {
        let Some(byte) = self.serdes_in.push(bit) else {
            self.status.busy = self.serdes_in.filled() != 0;
            return;
        };
        self.status.busy = false;
        let payload = if self.config.framing {
            self.receiver.accept(byte)
        } else {
            Some(byte)
        };
        match payload {
            Some(byte) => {
                log::debug!("pipeline: captured {byte:#04x}");
                self.parallel_out = Some(byte);
                self.status.done = true;
            }
            None => log::debug!("pipeline: marker, resyncing"),
        }
    }

    /// Return every stage to its power-on state.
    pub fn reset(&mut self) {
        self.engine.reset();
        self.filter_stage.reset();
        self.stages.reset();
        self.serdes_in.reset();
        self.receiver.reset();
        self.emitter.reset();
        self.status = Status::default();
        self.serial_out = false;
        self.parallel_out = None;
    }

    pub fn outputs(&self) -> Outputs {
        Outputs {
            serial_out: self.serial_out,
            done: self.status.done,
            busy: self.status.busy,
            parallel_out: self.parallel_out,
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn engine(&self) -> &EncodeEngine {
        &self.engine
    }

    /// Whether bytes are still waiting to leave on the serial output
    pub fn is_emitting(&self) -> bool {
        !self.emitter.is_idle()
    }

    /// Enabled ticks since construction
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framer::FRAME_MARKER;
    use crate::shift::SerialFrame;

    const RUN: Inputs = Inputs {
        reset: false,
        enable: true,
        start: false,
        a_bit: false,
        b_bit: false,
        serial_in: false,
    };

    /// Present the operands; returns the outputs of the start tick and of
    /// each sample tick.
    fn drive_all(p: &mut Pipeline, a: u8, b: u8) -> Vec<Outputs> {
        let order = p.config().operand_order;
        let a_bits: Vec<bool> = SerialFrame::from_byte(a, order).bits().collect();
        let b_bits: Vec<bool> = SerialFrame::from_byte(b, order).bits().collect();
        let mut outs = vec![p.tick(Inputs {
            start: true,
            ..RUN
        })];
        for i in 0..8 {
            outs.push(p.tick(Inputs {
                a_bit: a_bits[i],
                b_bit: b_bits[i],
                ..RUN
            }));
        }
        outs
    }

    /// Present the operands; returns outputs after the last sample tick.
    fn drive(p: &mut Pipeline, a: u8, b: u8) -> Outputs {
        drive_all(p, a, b)[8]
    }

    fn collect_serial(p: &mut Pipeline, ticks: usize) -> Vec<bool> {
        (0..ticks).map(|_| p.tick(RUN).serial_out).collect()
    }

    fn to_byte(bits: &[bool], order: BitOrder) -> u8 {
        SerialFrame::from_bits(bits, order).unwrap().to_byte()
    }

    #[test]
    fn test_transform_done_on_last_sample() {
        let mut p = Pipeline::new(PipelineConfig::with_mode(Mode::Transform));
        let out = drive(&mut p, 0xC3, 0x5A);
        assert!(out.done);
        assert!(!out.busy);
        assert_eq!(out.parallel_out, Some(MixTransform::default().encode(0xC3, 0x5A)));
    }

    #[test]
    fn test_transform_serial_output() {
        let mut p = Pipeline::new(PipelineConfig::with_mode(Mode::Transform));
        drive(&mut p, 0xC3, 0x5A);
        let bits = collect_serial(&mut p, 8);
        assert_eq!(to_byte(&bits, BitOrder::MsbFirst), 0x07);
        assert!(!p.is_emitting());
        // line idles low
        assert_eq!(collect_serial(&mut p, 4), vec![false; 4]);
    }

    #[test]
    fn test_framed_serial_output() {
        let mut p = Pipeline::new(PipelineConfig {
            framing: true,
            ..PipelineConfig::with_mode(Mode::Transform)
        });
        drive(&mut p, 0x11, 0x22);
        let bits = collect_serial(&mut p, 16);
        assert_eq!(to_byte(&bits[..8], BitOrder::MsbFirst), FRAME_MARKER);
        assert_eq!(
            to_byte(&bits[8..], BitOrder::MsbFirst),
            MixTransform::default().encode(0x11, 0x22)
        );
    }

    #[test]
    fn test_lsb_first_serial_output() {
        let mut p = Pipeline::new(PipelineConfig {
            serial_order: BitOrder::LsbFirst,
            ..PipelineConfig::with_mode(Mode::Transform)
        });
        drive(&mut p, 0xC3, 0x5A);
        let bits = collect_serial(&mut p, 8);
        // 0x07 leaves bit 0 first
        assert_eq!(&bits[..4], &[true, true, true, false]);
        assert_eq!(to_byte(&bits, BitOrder::LsbFirst), 0x07);
    }

    #[test]
    fn test_transform_filter_latency() {
        let mut p = Pipeline::new(PipelineConfig::with_mode(Mode::TransformFilter));
        let out = drive(&mut p, 0xC3, 0x5A);
        assert!(!out.done);
        assert!(out.busy);
        for _ in 0..7 {
            assert!(!p.tick(RUN).done);
        }
        let out = p.tick(RUN);
        assert!(out.done);

        let mut f = MovingAverageFilter::new();
        let expected = filter_byte(&mut f, 0x07, BitOrder::MsbFirst);
        assert_eq!(out.parallel_out, Some(expected));
    }

    #[test]
    fn test_pipelined_round_trip() {
        let mut p = Pipeline::new(PipelineConfig::with_mode(Mode::Pipelined {
            pre_filter: false,
            post_filter: false,
        }));
        drive(&mut p, 0x3C, 0x99);
        for _ in 0..3 {
            let out = p.tick(RUN);
            assert!(!out.done);
            assert!(out.busy);
        }
        let out = p.tick(RUN);
        assert!(out.done);
        assert_eq!(out.parallel_out, Some(0x3C));
        assert_eq!(to_byte(&collect_serial(&mut p, 8), BitOrder::MsbFirst), 0x3C);
    }

    #[test]
    fn test_pipelined_filters() {
        let mut p = Pipeline::new(PipelineConfig::with_mode(Mode::Pipelined {
            pre_filter: true,
            post_filter: true,
        }));
        drive(&mut p, 0xFF, 0x01);
        for _ in 0..4 {
            p.tick(RUN);
        }
        // pre: 0xFF -> 0x3F, round trip keeps it, post: 0x3F -> 0x0F
        assert_eq!(p.outputs().parallel_out, Some(0x0F));
    }

    #[test]
    fn test_serdes_capture() {
        let mut p = Pipeline::new(PipelineConfig::with_mode(Mode::Serdes));
        let bits = SerialFrame::from_byte(0xAA, BitOrder::MsbFirst);
        let mut out = Outputs::default();
        for bit in bits.bits() {
            out = p.tick(Inputs {
                serial_in: bit,
                ..RUN
            });
        }
        assert_eq!(out.parallel_out, Some(0xAA));
        assert!(out.done);
    }

    #[test]
    fn test_serdes_framing_strips_marker() {
        let mut p = Pipeline::new(PipelineConfig {
            framing: true,
            ..PipelineConfig::with_mode(Mode::Serdes)
        });
        for byte in emit_frame(0x42) {
            for bit in SerialFrame::from_byte(byte, BitOrder::MsbFirst).bits() {
                p.tick(Inputs {
                    serial_in: bit,
                    ..RUN
                });
            }
            if byte == FRAME_MARKER {
                assert_eq!(p.outputs().parallel_out, None);
            }
        }
        assert_eq!(p.outputs().parallel_out, Some(0x42));
    }

    #[test]
    fn test_enable_low_freezes() {
        let mut p = Pipeline::new(PipelineConfig::with_mode(Mode::Transform));
        p.tick(Inputs {
            start: true,
            ..RUN
        });
        let frozen = p.engine().state();
        for _ in 0..20 {
            p.tick(Inputs {
                enable: false,
                a_bit: true,
                ..RUN
            });
        }
        assert_eq!(p.engine().state(), frozen);
        assert_eq!(p.ticks(), 1);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut p = Pipeline::new(PipelineConfig {
            framing: true,
            ..PipelineConfig::with_mode(Mode::Transform)
        });
        drive(&mut p, 0x01, 0x02);
        p.tick(RUN);
        let out = p.tick(Inputs {
            reset: true,
            ..RUN
        });
        assert_eq!(out, Outputs::default());
        assert!(!p.is_emitting());
        assert_eq!(collect_serial(&mut p, 16), vec![false; 16]);
    }

    #[test]
    fn test_new_start_clears_done() {
        let mut p = Pipeline::new(PipelineConfig::with_mode(Mode::Transform));
        drive(&mut p, 0x01, 0x02);
        assert!(p.status().done);
        let out = p.tick(Inputs {
            start: true,
            ..RUN
        });
        assert!(!out.done);
        assert!(out.busy);
    }

    #[test]
    fn test_start_abandons_filter_stage_byte() {
        let mut p = Pipeline::new(PipelineConfig::with_mode(Mode::TransformFilter));
        drive(&mut p, 0xC3, 0x5A);
        // Second start right away: the first byte is still in the filter
        let outs = drive_all(&mut p, 0x11, 0x22);
        assert!(outs.iter().all(|o| !o.done && o.parallel_out.is_none()));
        for _ in 0..7 {
            assert!(!p.tick(RUN).done);
        }
        let out = p.tick(RUN);
        assert!(out.done);

        // The abandoned byte never reached the filter
        let mut f = MovingAverageFilter::new();
        let expected = filter_byte(
            &mut f,
            MixTransform::default().encode(0x11, 0x22),
            BitOrder::MsbFirst,
        );
        assert_eq!(out.parallel_out, Some(expected));
    }

    #[test]
    fn test_start_abandons_staged_byte() {
        let mut p = Pipeline::new(PipelineConfig::with_mode(Mode::Pipelined {
            pre_filter: false,
            post_filter: false,
        }));
        drive(&mut p, 0xC3, 0x5A);
        let outs = drive_all(&mut p, 0x11, 0x22);
        assert_eq!(outs.iter().filter(|o| o.done).count(), 0);
        assert!(outs.iter().all(|o| o.busy));
        for _ in 0..3 {
            assert!(!p.tick(RUN).done);
        }
        let out = p.tick(RUN);
        assert!(out.done);
        assert_eq!(out.parallel_out, Some(0x11));
    }

    #[test]
    fn test_serial_output_is_bounded() {
        let mut p = Pipeline::new(PipelineConfig {
            framing: true,
            ..PipelineConfig::with_mode(Mode::Transform)
        });
        for n in 0..50u8 {
            drive(&mut p, n, 0x5A);
        }
        // At most the unit in flight plus the pending one
        let mut bits = Vec::new();
        while p.is_emitting() {
            bits.push(p.tick(RUN).serial_out);
            assert!(bits.len() <= 32, "serial output lagging");
        }
        let tail = &bits[bits.len() - 16..];
        assert_eq!(to_byte(&tail[..8], BitOrder::MsbFirst), FRAME_MARKER);
        assert_eq!(
            to_byte(&tail[8..], BitOrder::MsbFirst),
            MixTransform::default().encode(49, 0x5A)
        );
    }
}
