//! Frame synchronizer
//!
//! RTU responses carry no delimiters, so frame boundaries are recovered by
//! searching the accumulation buffer for the response signature:
//!
//! ```text
//! [slave != 0] [0x03] [0x22] [34 data bytes] [CRC lo] [CRC hi]
//! ```
//!
//! Once a signature is matched the next 39 bytes are treated as one frame and
//! consumed whether or not they pass validation. Bytes inside a rejected
//! frame are never rescanned.

use tracing::{debug, trace};

use crate::buffer::AccumulationBuffer;
use crate::constants::{FC_READ_HOLDING_REGISTERS, FRAME_LEN, RESPONSE_BYTE_COUNT, SIGNATURE_LEN};
use crate::decoder::RawFrame;
use crate::error::FrameError;

/// Counters kept across the lifetime of a synchronizer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Signatures matched and handed to the decoder
    pub frames_matched: u64,
    /// Frames that decoded into a reading
    pub frames_accepted: u64,
    /// Frames dropped on CRC mismatch
    pub crc_failures: u64,
    /// Frames dropped for a slave ID outside the battery range
    pub rejected_slaves: u64,
    /// Bytes discarded while hunting for a signature
    pub noise_bytes: u64,
    /// Bytes evicted by accumulation buffer overflow
    pub evicted_bytes: u64,
}

/// Whether `window` starts with a battery response signature
#[inline]
pub fn is_signature(window: &[u8]) -> bool {
    window.len() >= SIGNATURE_LEN
        && window[0] != 0x00
        && window[1] == FC_READ_HOLDING_REGISTERS
        && window[2] == RESPONSE_BYTE_COUNT
}

/// Offset of the first signature that still has a full frame behind it
pub fn find_signature(data: &[u8]) -> Option<usize> {
    if data.len() < FRAME_LEN {
        return None;
    }
    (0..=data.len() - FRAME_LEN).find(|&idx| is_signature(&data[idx..]))
}

/// Carves candidate frames out of an [`AccumulationBuffer`]
#[derive(Debug, Default)]
pub struct FrameSynchronizer {
    stats: ScanStats,
}

impl FrameSynchronizer {
    /// Create a synchronizer with zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Counters accumulated so far
    pub fn stats(&self) -> ScanStats {
        self.stats
    }

    /// Account for bytes the buffer evicted on append
    pub fn record_eviction(&mut self, evicted: usize) {
        self.stats.evicted_bytes += evicted as u64;
    }

    /// Extract every complete frame currently in `buffer`.
    ///
    /// Each matched frame is passed to `handle`; its outcome only feeds the
    /// counters. On return the buffer holds fewer than [`FRAME_LEN`] bytes:
    /// either the start of a frame still in flight or a tail kept after a
    /// fruitless search. Returns the number of frames handed out.
    pub fn scan<F>(&mut self, buffer: &mut AccumulationBuffer, mut handle: F) -> usize
    where
        F: FnMut(&RawFrame) -> Result<(), FrameError>,
    {
        let mut handled = 0;

        while buffer.len() >= FRAME_LEN {
            let Some(idx) = find_signature(buffer.as_slice()) else {
                // The tail might be the start of a frame still arriving
                let before = buffer.len();
                buffer.retain_tail(FRAME_LEN - 1);
                let dropped = before - buffer.len();
                self.stats.noise_bytes += dropped as u64;
                trace!("No signature in {} bytes, dropped {}", before, dropped);
                break;
            };

            if idx > 0 {
                trace!("Skipping {} noise bytes before signature", idx);
                buffer.compact(idx);
                self.stats.noise_bytes += idx as u64;
            }

            let mut frame: RawFrame = [0u8; FRAME_LEN];
            frame.copy_from_slice(&buffer.as_slice()[..FRAME_LEN]);
            self.stats.frames_matched += 1;
            handled += 1;

            match handle(&frame) {
                Ok(()) => self.stats.frames_accepted += 1,
                Err(e) => {
                    debug!("Dropping frame from slave {}: {}", frame[0], e);
                    match e {
                        FrameError::CrcMismatch { .. } => self.stats.crc_failures += 1,
                        FrameError::InvalidSlaveId(_) => self.stats.rejected_slaves += 1,
                    }
                }
            }

            // Advance past the frame regardless of the outcome
            buffer.compact(FRAME_LEN);
        }

        handled
    }
}
