use crate::source::KeyEvent;

/// Size of one count delivery on the wire.
pub(crate) const WIRE_LEN: usize = 4;

/// The running tally of key presses since the last successful delivery.
///
/// Owned exclusively by the counting loop; the input path increments it and
/// the delivery path resets it, never concurrently. Overflow wraps, matching
/// fixed-width unsigned arithmetic.
#[derive(Debug, Default)]
pub(crate) struct Counter(u32);

impl Counter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Add one per press transition. Releases and repeats do not count.
    pub(crate) fn record(&mut self, event: KeyEvent) {
        if event == KeyEvent::Press {
            self.0 = self.0.wrapping_add(1);
        }
    }

    pub(crate) fn value(&self) -> u32 {
        self.0
    }

    pub(crate) fn reset(&mut self) {
        self.0 = 0;
    }

    /// The wire form: exactly [`WIRE_LEN`] bytes, little-endian, so the
    /// format does not depend on the host architecture.
    pub(crate) fn encode(&self) -> [u8; WIRE_LEN] {
        self.0.to_le_bytes()
    }
}
