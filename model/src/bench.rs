//! Driver side: reset sequencing, operand stimulus and bounded polling
//!
//! Nothing in here is part of the device. The bench talks to a [`Dut`] one
//! clock edge at a time, either in-process ([`Device`]) or through a channel
//! pair to a device running on its own thread ([`RemoteDevice`]).

use std::fmt::Debug;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use crate::config::BenchConfig;
use crate::error::{PipeError, PipeResult};
use crate::framer::resync;
use crate::pins::{ui, Device, PinInputs, PinOutputs};
use crate::shift::{BitOrder, SerialFrame, FRAME_BITS};

/// Call `poll` with attempt numbers `0..=bound` until it reports success.
///
/// Returns the attempt that succeeded, or [`PipeError::Timeout`].
pub fn poll_with_bound<F>(bound: u32, mut poll: F) -> PipeResult<u32>
where
    F: FnMut(u32) -> PipeResult<bool>,
{
    for attempt in 0..=bound {
        if poll(attempt)? {
            return Ok(attempt);
        }
    }
    Err(PipeError::Timeout { ticks: bound })
}

/// Something that can be clocked through its pins.
pub trait Dut {
    fn clock(&mut self, pins: PinInputs) -> PipeResult<PinOutputs>;
}

impl Dut for Device {
    fn clock(&mut self, pins: PinInputs) -> PipeResult<PinOutputs> {
        Ok(Device::clock(self, pins))
    }
}

pub struct Endpoint<S: Debug, R: Debug> {
    tx: Sender<S>,
    rx: Receiver<R>,
    id: String,
}

impl<S: Debug, R: Debug> Endpoint<S, R> {
    pub fn new(tx: Sender<S>, rx: Receiver<R>, id: String) -> Self {
        Self { tx, rx, id }
    }

    pub fn send(&self, msg: S) -> PipeResult<()> {
        log::trace!("{}{msg:?} ->", self.id);
        self.tx.send(msg).map_err(|_| PipeError::ChannelClosed)
    }

    pub fn receive(&self) -> PipeResult<R> {
        let v = self.rx.recv().map_err(|_| PipeError::ChannelClosed)?;
        log::trace!("{} <- {v:?}", self.id);
        Ok(v)
    }
}

#[derive(Debug)]
pub enum Command {
    Clock(PinInputs),
    Stop,
}

/// Serve clock edges until told to stop or the driver hangs up.
pub fn device_server(ep: Endpoint<PinOutputs, Command>, mut device: Device) {
    loop {
        match ep.receive() {
            Ok(Command::Clock(pins)) => {
                if ep.send(device.clock(pins)).is_err() {
                    return;
                }
            }
            Ok(Command::Stop) | Err(_) => return,
        }
    }
}

/// A device running on its own thread.
pub struct RemoteDevice {
    ep: Endpoint<Command, PinOutputs>,
    handle: Option<JoinHandle<()>>,
}

impl RemoteDevice {
    pub fn spawn(device: Device) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (reply_tx, reply_rx) = mpsc::channel();
        let ep = Endpoint::new(cmd_tx, reply_rx, "driver: ".into());
        let server = Endpoint::new(reply_tx, cmd_rx, "\t\tdevice: ".into());
        let handle = thread::spawn(move || device_server(server, device));
        Self {
            ep,
            handle: Some(handle),
        }
    }
}

impl Dut for RemoteDevice {
    fn clock(&mut self, pins: PinInputs) -> PipeResult<PinOutputs> {
        self.ep.send(Command::Clock(pins))?;
        self.ep.receive()
    }
}

impl Drop for RemoteDevice {
    fn drop(&mut self) {
        let _ = self.ep.send(Command::Stop);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Drives a [`Dut`] the way the cocotb bench drives the chip.
pub struct Testbench<D> {
    dut: D,
    config: BenchConfig,
    pins: PinInputs,
    last: PinOutputs,
    ticks: u64,
}

impl<D: Dut> Testbench<D> {
    pub fn new(dut: D, config: BenchConfig) -> PipeResult<Self> {
        config.validate()?;
        Ok(Self {
            dut,
            config,
            pins: PinInputs::default(),
            last: PinOutputs::default(),
            ticks: 0,
        })
    }

    /// One clock edge with the current pins.
    pub fn clock(&mut self) -> PipeResult<PinOutputs> {
        self.last = self.dut.clock(self.pins)?;
        self.ticks += 1;
        Ok(self.last)
    }

    pub fn clock_cycles(&mut self, n: u32) -> PipeResult<PinOutputs> {
        for _ in 0..n {
            self.clock()?;
        }
        Ok(self.last)
    }

    pub fn set_ui(&mut self, ui_in: u8) {
        self.pins.ui_in = ui_in;
    }

    /// Hold reset with `ena` low, then release both.
    pub fn reset(&mut self) -> PipeResult<()> {
        log::info!("Reset");
        self.pins = PinInputs {
            ena: false,
            rst_n: false,
            ..Default::default()
        };
        self.clock_cycles(self.config.reset_ticks)?;
        self.pins.rst_n = true;
        self.pins.ena = true;
        Ok(())
    }

    /// Present one operand pair: bit 7 goes out with `start`, is held for the
    /// first sample tick, then the remaining seven bits follow.
    pub fn encode(&mut self, a: u8, b: u8, order: BitOrder) -> PipeResult<()> {
        let a_bits: Vec<bool> = SerialFrame::from_byte(a, order).bits().collect();
        let b_bits: Vec<bool> = SerialFrame::from_byte(b, order).bits().collect();

        self.set_ui(PinInputs::operands(true, a_bits[0], b_bits[0]));
        self.clock()?;
        for (&a_bit, &b_bit) in a_bits.iter().zip(&b_bits) {
            self.set_ui(PinInputs::operands(false, a_bit, b_bit));
            self.clock()?;
        }
        Ok(())
    }

    /// Clock until `pred` holds on the outputs, at most `bound` edges.
    pub fn wait_for<P>(&mut self, bound: u32, pred: P) -> PipeResult<u32>
    where
        P: Fn(&PinOutputs) -> bool,
    {
        poll_with_bound(bound, |attempt| {
            if attempt > 0 {
                self.clock()?;
            }
            Ok(pred(&self.last))
        })
    }

    /// Wait for `done` within the configured settle bound.
    pub fn wait_done(&mut self) -> PipeResult<u32> {
        let waited = self.wait_for(self.config.settle_bound, PinOutputs::done)?;
        log::info!("done after {waited} settle ticks");
        Ok(waited)
    }

    /// Sample `serial_out` on each of the next `n` edges.
    pub fn read_serial(&mut self, n: usize) -> PipeResult<Vec<bool>> {
        (0..n)
            .map(|_| self.clock().map(|out| out.serial_out()))
            .collect()
    }

    pub fn read_byte(&mut self, order: BitOrder) -> PipeResult<u8> {
        let bits = self.read_serial(FRAME_BITS as usize)?;
        Ok(SerialFrame::from_bits(&bits, order)?.to_byte())
    }

    /// Read one serial byte, skipping a leading frame marker.
    pub fn read_frame(&mut self, order: BitOrder) -> PipeResult<u8> {
        let mut failure = None;
        let bytes = std::iter::from_fn(|| match self.read_byte(order) {
            Ok(byte) => Some(byte),
            Err(e) => {
                failure = Some(e);
                None
            }
        });
        let payload = resync(bytes);
        if let Some(e) = failure {
            return Err(e);
        }
        payload.ok_or(PipeError::Timeout {
            ticks: 2 * FRAME_BITS as u32,
        })
    }

    /// Shift `byte` into `serial_in_bit`, one bit per edge.
    pub fn shift_in(&mut self, byte: u8, order: BitOrder) -> PipeResult<PinOutputs> {
        for bit in SerialFrame::from_byte(byte, order).bits() {
            self.set_ui((bit as u8) << ui::SERIAL_IN);
            self.clock()?;
        }
        Ok(self.last)
    }

    pub fn log_outputs(&self) {
        log::info!(
            "t={}us uo_out = {:08b} uio_out = {:#04x}",
            self.elapsed_us(),
            self.last.uo_out,
            self.last.uio_out
        );
    }

    pub fn last(&self) -> PinOutputs {
        self.last
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn elapsed_us(&self) -> u64 {
        self.ticks * self.config.clock_period_us as u64
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    pub fn dut(&self) -> &D {
        &self.dut
    }
}
