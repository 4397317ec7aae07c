//! Live-view frames.

use serde::{Deserialize, Serialize};

/// One downloaded live-view frame.
///
/// The payload is the compressed image exactly as the camera produced it
/// (JPEG on every body we know of); it is never decoded here.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// Sequence number within the live-view run, starting at 0.
    pub sequence: u64,

    /// Number of download attempts it took to get this frame.
    pub attempts: u32,

    /// Raw frame bytes.
    #[serde(skip)]
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(sequence: u64, attempts: u32, data: Vec<u8>) -> Self {
        Self {
            sequence,
            attempts,
            data,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether the payload starts with a JPEG SOI marker.
    pub fn looks_like_jpeg(&self) -> bool {
        self.data.starts_with(&[0xFF, 0xD8])
    }
}
