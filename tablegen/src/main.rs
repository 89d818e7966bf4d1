//! Print the transform table for one key as markdown.
//!
//! Usage: `bitpipe-tablegen [key-hex] [rounds]`

use bitpipe_model::transform::DEFAULT_ROUNDS;
use bitpipe_model::{ByteTransform, FrameSlot, MixTransform};

fn note(h: u8, encoded: u8) -> &'static str {
    match (FrameSlot::classify(h), FrameSlot::classify(encoded)) {
        (FrameSlot::Marker, _) => "reserved: frame marker",
        (_, FrameSlot::Marker) => "encodes to marker value",
        _ => "",
    }
}

fn parse_args() -> Result<(u8, u8), String> {
    let mut args = std::env::args().skip(1);
    let key = match args.next() {
        Some(k) => u8::from_str_radix(k.trim_start_matches("0x"), 16)
            .map_err(|e| format!("bad key {k:?}: {e}"))?,
        None => 0x5A,
    };
    let rounds = match args.next() {
        Some(r) => r.parse().map_err(|e| format!("bad rounds {r:?}: {e}"))?,
        None => DEFAULT_ROUNDS,
    };
    Ok((key, rounds))
}

fn main() {
    let (key, rounds) = match parse_args() {
        Ok(v) => v,
        Err(e) => {
            eprintln!("{e}\nusage: bitpipe-tablegen [key-hex] [rounds]");
            std::process::exit(2);
        }
    };
    let t = MixTransform::new(rounds);

    println!("key {key:#04x}, {} rounds", t.rounds());
    println!();
    println!("| value | encoded | decoded | note                    |");
    println!("|-------|---------|---------|-------------------------|");
    for h in 0..=255u8 {
        let encoded = t.encode(h, key);
        let decoded = t.decode(h, key);
        println!(
            "| {h:#04x}  | {encoded:#04x}    | {decoded:#04x}    | {:<23} |",
            note(h, encoded)
        );
    }
}
