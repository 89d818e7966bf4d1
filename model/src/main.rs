//! Bench for the bit-serial encode device
//!
//! Runs the device on its own thread and drives it through its pins: a reset,
//! then a batch of random operand pairs (or random serial bytes in SERDES
//! mode), checking each result against a software reference.
//!
//! Usage: `bitpipe-model [config.json]`

use bitpipe_model::filter::filter_byte;
use bitpipe_model::{
    emit_frame, BitOrder, ByteTransform, Config, Device, MixTransform, Mode, MovingAverageFilter,
    PipeError, PipeResult, RemoteDevice, Testbench,
};
use rand::Rng;

const OPERATIONS: usize = 10;

fn init_logging() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .filter_module("bitpipe_model", log::LevelFilter::Debug)
        .init();
}

/// What the device should put on the wire for one operand pair
struct Reference {
    mode: Mode,
    transform: MixTransform,
    order: BitOrder,
    first: MovingAverageFilter,
    second: MovingAverageFilter,
}

impl Reference {
    fn new(config: &Config) -> Self {
        Self {
            mode: config.pipeline.mode,
            transform: MixTransform::new(config.pipeline.rounds),
            order: config.pipeline.serial_order,
            first: MovingAverageFilter::new(),
            second: MovingAverageFilter::new(),
        }
    }

    fn predict(&mut self, a: u8, b: u8) -> u8 {
        match self.mode {
            Mode::Transform | Mode::Serdes => self.transform.encode(a, b),
            Mode::TransformFilter => {
                filter_byte(&mut self.first, self.transform.encode(a, b), self.order)
            }
            Mode::Pipelined {
                pre_filter,
                post_filter,
            } => {
                let mut x = a;
                if pre_filter {
                    x = filter_byte(&mut self.first, x, self.order);
                }
                x = self.transform.decode(self.transform.encode(x, b), b);
                if post_filter {
                    x = filter_byte(&mut self.second, x, self.order);
                }
                x
            }
        }
    }
}

fn encode_session(tb: &mut Testbench<RemoteDevice>, config: &Config) -> PipeResult<()> {
    let pipeline = &config.pipeline;
    let mut reference = Reference::new(config);

    for n in 1..=OPERATIONS {
        let a: u8 = rand::thread_rng().gen();
        let b: u8 = rand::thread_rng().gen();
        log::info!("#{n}: A={a:#04x} B={b:#04x}");

        tb.encode(a, b, pipeline.operand_order)?;
        tb.wait_done()?;
        tb.log_outputs();

        let got = if pipeline.framing {
            tb.read_frame(pipeline.serial_order)?
        } else {
            tb.read_byte(pipeline.serial_order)?
        };
        let want = reference.predict(a, b);
        if got != want {
            return Err(PipeError::Mismatch {
                what: format!("operation #{n} serial output"),
                got: Some(got),
                expected: want,
            });
        }
        log::info!("#{n}: serial out {got:#04x} ok");
    }
    Ok(())
}

fn serdes_session(tb: &mut Testbench<RemoteDevice>, config: &Config) -> PipeResult<()> {
    let order = config.pipeline.serial_order;
    for n in 1..=OPERATIONS {
        let byte: u8 = rand::thread_rng().gen();
        let wire: Vec<u8> = if config.pipeline.framing {
            emit_frame(byte).to_vec()
        } else {
            vec![byte]
        };
        // Capture is free-running, so no idle edges between bytes
        for &b in &wire {
            tb.shift_in(b, order)?;
        }
        tb.log_outputs();
        match tb.last().parallel_out() {
            Some(got) if got == byte => log::info!("#{n}: captured {got:#04x} ok"),
            got => {
                return Err(PipeError::Mismatch {
                    what: format!("capture #{n} parallel output"),
                    got,
                    expected: byte,
                })
            }
        }
    }
    Ok(())
}

fn run() -> PipeResult<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    log::info!("Start ({:?})", config.pipeline.mode);

    let device = RemoteDevice::spawn(Device::new(config.pipeline.clone()));
    let mut tb = Testbench::new(device, config.bench.clone())?;
    tb.reset()?;

    log::info!("Test project behavior");
    match config.pipeline.mode {
        Mode::Serdes => serdes_session(&mut tb, &config)?,
        _ => encode_session(&mut tb, &config)?,
    }
    log::info!("{} ticks, {}us simulated", tb.ticks(), tb.elapsed_us());
    Ok(())
}

fn main() {
    init_logging();
    if let Err(e) = run() {
        log::error!("{e}");
        std::process::exit(1);
    }
}
