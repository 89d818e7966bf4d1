//! 3-tap moving average over a sample stream
//!
//! Floor division, zero-padded start. The pipeline feeds it single bits, so
//! the output is 1 only after three consecutive 1 inputs.

use crate::shift::{BitOrder, BitShiftRegister};

/// Causal 3-tap moving average.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MovingAverageFilter {
    prev1: u8,
    prev2: u8,
}

impl MovingAverageFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Average `sample` with the two previous samples.
    #[inline]
    pub fn step(&mut self, sample: u8) -> u8 {
        let sum = self.prev2 as u16 + self.prev1 as u16 + sample as u16;
        self.prev2 = self.prev1;
        self.prev1 = sample;
        (sum / 3) as u8
    }

    /// Process a block of samples.
    pub fn process(&mut self, input: &[u8]) -> Vec<u8> {
        input.iter().map(|&x| self.step(x)).collect()
    }

    pub fn reset(&mut self) {
        self.prev1 = 0;
        self.prev2 = 0;
    }
}

/// Run the bits of `byte` through `filter` in `order` and repack them.
pub fn filter_byte(filter: &mut MovingAverageFilter, byte: u8, order: BitOrder) -> u8 {
    let mut source = BitShiftRegister::new(order);
    let mut sink = BitShiftRegister::new(order);
    source.load(byte);
    let mut out = 0;
    while let Some(bit) = source.drain() {
        if let Some(packed) = sink.push(filter.step(bit as u8) != 0) {
            out = packed;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_ones() {
        let mut f = MovingAverageFilter::new();
        assert_eq!(f.process(&[1; 8]), vec![0, 0, 1, 1, 1, 1, 1, 1]);
    }

    #[test]
    fn test_isolated_ones_are_removed() {
        let mut f = MovingAverageFilter::new();
        assert_eq!(f.process(&[1, 0, 1, 0, 1, 1, 0]), vec![0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_wide_samples() {
        let mut f = MovingAverageFilter::new();
        assert_eq!(f.process(&[255, 255, 255, 3]), vec![85, 170, 255, 171]);
    }

    #[test]
    fn test_reset_matches_fresh_filter() {
        let input = [1, 1, 0, 1, 1, 1, 0, 0, 1];
        let mut used = MovingAverageFilter::new();
        used.process(&[1, 1, 1, 1]);
        used.reset();
        assert_eq!(used, MovingAverageFilter::new());
        assert_eq!(used.process(&input), MovingAverageFilter::new().process(&input));
    }

    #[test]
    fn test_filter_byte() {
        let mut f = MovingAverageFilter::new();
        // 11111111 -> 00111111
        assert_eq!(filter_byte(&mut f, 0xFF, BitOrder::MsbFirst), 0x3F);
        // state carries over: the first two bits now see earlier ones
        assert_eq!(filter_byte(&mut f, 0xFF, BitOrder::MsbFirst), 0xFF);

        let mut f = MovingAverageFilter::new();
        // first two bits on the wire are bits 0 and 1
        assert_eq!(filter_byte(&mut f, 0xFF, BitOrder::LsbFirst), 0xFC);
    }
}
