use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// One captured image, still encoded (JPEG, PNG, ...).
///
/// Frames are moved, never cloned: the capture source owns a frame until it
/// hands it to the controller, and a dropped frame is freed on the spot.
pub struct Frame {
    pub sequence: u64,
    pub timestamp_ns: u64,
    pub data: Vec<u8>,
}

impl Frame {
    /// Build a frame stamped with the current wall-clock time.
    pub fn new(sequence: u64, data: Vec<u8>) -> Self {
        let timestamp_ns = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();

        Self {
            sequence,
            timestamp_ns,
            data,
        }
    }

    pub fn with_timestamp(sequence: u64, timestamp_ns: u64, data: Vec<u8>) -> Self {
        Self {
            sequence,
            timestamp_ns,
            data,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("sequence", &self.sequence)
            .field("timestamp_ns", &self.timestamp_ns)
            .field("bytes", &self.data.len())
            .finish()
    }
}
