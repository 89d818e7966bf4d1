//! Sync-byte framing
//!
//! Frames on the wire are `[0x7E, payload]`. The marker value is reserved: any
//! byte slot holding `0x7E` is read as a marker, so a framed channel carries
//! only 255 distinct data values. A payload byte of `0x7E` is only delivered
//! correctly when it directly follows a marker; anywhere else it is
//! indistinguishable from one. Consumers get a [`FrameSlot`] rather than a
//! bare byte so that this case has to be handled explicitly.

/// Reserved synchronization byte
pub const FRAME_MARKER: u8 = 0x7E;

/// Classification of one byte slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSlot {
    Marker,
    Data(u8),
}

impl FrameSlot {
    pub fn classify(byte: u8) -> Self {
        if byte == FRAME_MARKER {
            FrameSlot::Marker
        } else {
            FrameSlot::Data(byte)
        }
    }

    pub fn is_marker(&self) -> bool {
        matches!(self, FrameSlot::Marker)
    }
}

/// Wrap a payload byte in a frame.
pub fn emit_frame(byte: u8) -> [u8; 2] {
    [FRAME_MARKER, byte]
}

/// Pull one payload byte from `stream`.
///
/// One leading marker is discarded and the byte after it returned as is. A
/// first byte that is not a marker is returned unchanged. `None` means the
/// stream ran out before a payload arrived.
pub fn resync<I>(stream: I) -> Option<u8>
where
    I: IntoIterator<Item = u8>,
{
    let mut stream = stream.into_iter();
    match FrameSlot::classify(stream.next()?) {
        FrameSlot::Marker => stream.next(),
        FrameSlot::Data(byte) => Some(byte),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum ReceiverState {
    #[default]
    Hunting,
    AwaitingPayload,
}

/// Byte-at-a-time form of [`resync`] for consumers fed one byte per frame
/// completion.
#[derive(Debug, Clone, Default)]
pub struct FrameReceiver {
    state: ReceiverState,
    markers_seen: u64,
}

impl FrameReceiver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept one byte, returning the payload when one is complete.
    pub fn accept(&mut self, byte: u8) -> Option<u8> {
        match (self.state, FrameSlot::classify(byte)) {
            (ReceiverState::AwaitingPayload, _) => {
                self.state = ReceiverState::Hunting;
                Some(byte)
            }
            (ReceiverState::Hunting, FrameSlot::Marker) => {
                self.markers_seen += 1;
                self.state = ReceiverState::AwaitingPayload;
                None
            }
            (ReceiverState::Hunting, FrameSlot::Data(byte)) => Some(byte),
        }
    }

    /// Whether the next byte will be taken as a payload
    pub fn is_synced(&self) -> bool {
        self.state == ReceiverState::AwaitingPayload
    }

    pub fn markers_seen(&self) -> u64 {
        self.markers_seen
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_frame() {
        assert_eq!(emit_frame(0x41), [0x7E, 0x41]);
    }

    #[test]
    fn test_resync_strips_marker() {
        assert_eq!(resync([0x7E, 0x41, 0x42]), Some(0x41));
        assert_eq!(resync(emit_frame(0x00)), Some(0x00));
    }

    #[test]
    fn test_resync_passes_unframed_byte() {
        assert_eq!(resync([0x41, 0x42]), Some(0x41));
    }

    #[test]
    fn test_resync_not_ready() {
        assert_eq!(resync(Vec::<u8>::new()), None);
        assert_eq!(resync([0x7E]), None);
    }

    #[test]
    fn test_marker_payload_after_marker() {
        // A framed 0x7E payload survives because it sits in the payload slot
        assert_eq!(resync(emit_frame(FRAME_MARKER)), Some(FRAME_MARKER));
    }

    #[test]
    fn test_unframed_marker_value_is_misread() {
        // Known limitation: 0x7E sent as plain data is taken for a marker and
        // the byte after it is returned instead.
        assert_eq!(resync([0x7E, 0x41]), Some(0x41));
        assert_eq!(FrameSlot::classify(0x7E), FrameSlot::Marker);

        let mut rx = FrameReceiver::new();
        assert_eq!(rx.accept(0x7E), None);
        assert_eq!(rx.accept(0x41), Some(0x41));
    }

    #[test]
    fn test_receiver_stream() {
        let mut rx = FrameReceiver::new();
        let stream = [0x10, 0x7E, 0x20, 0x7E, 0x7E, 0x30];
        let out: Vec<u8> = stream.iter().filter_map(|&b| rx.accept(b)).collect();
        assert_eq!(out, vec![0x10, 0x20, 0x7E, 0x30]);
        assert_eq!(rx.markers_seen(), 2);
        assert!(!rx.is_synced());
    }
}
