//! Processing loop
//!
//! [`Sniffer`] owns every piece of mutable state (accumulation buffer,
//! synchronizer, device store, snapshot writer) and threads each chunk read
//! from the byte source through them:
//!
//! ```text
//! read -> buffer -> synchronizer -> CRC/decode -> store -> snapshot (throttled)
//! ```
//!
//! A chunk is always processed to completion before the shutdown token is
//! looked at again, so no reading is ever half applied.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, trace};

use crate::buffer::AccumulationBuffer;
use crate::constants::{BUFFER_CAPACITY, READ_CHUNK_SIZE, SERIAL_TIMEOUT_MS};
use crate::decoder::decode_frame;
use crate::error::{SnifferError, SnifferResult};
use crate::frame::{FrameSynchronizer, ScanStats};
use crate::snapshot::{SnapshotWriter, WriteOutcome};
use crate::store::DeviceStore;

/// Runtime settings of the processing loop
#[derive(Debug, Clone)]
pub struct SnifferConfig {
    /// Snapshot destination
    pub output: PathBuf,
    /// Accumulation buffer capacity
    pub buffer_capacity: usize,
    /// Bytes requested per read
    pub read_chunk_size: usize,
    /// Treat a zero-byte read as end of input (replay files) instead of
    /// "no data yet" (serial lines)
    pub stop_at_eof: bool,
}

impl SnifferConfig {
    /// Defaults for a live serial bus writing to `output`
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            buffer_capacity: BUFFER_CAPACITY,
            read_chunk_size: READ_CHUNK_SIZE,
            stop_at_eof: false,
        }
    }

    /// End the run when the source reports end of input
    pub fn with_stop_at_eof(mut self, stop: bool) -> Self {
        self.stop_at_eof = stop;
        self
    }

    /// Override the accumulation buffer capacity
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }
}

/// Passive bus observer
#[derive(Debug)]
pub struct Sniffer {
    buffer: AccumulationBuffer,
    sync: FrameSynchronizer,
    store: DeviceStore,
    writer: SnapshotWriter,
    read_chunk_size: usize,
    stop_at_eof: bool,
}

impl Sniffer {
    /// Build a sniffer with empty state
    pub fn new(config: SnifferConfig) -> Self {
        Self {
            buffer: AccumulationBuffer::new(config.buffer_capacity),
            sync: FrameSynchronizer::new(),
            store: DeviceStore::new(),
            writer: SnapshotWriter::new(config.output),
            read_chunk_size: config.read_chunk_size.max(1),
            stop_at_eof: config.stop_at_eof,
        }
    }

    /// Latest readings
    pub fn store(&self) -> &DeviceStore {
        &self.store
    }

    /// Synchronizer counters
    pub fn stats(&self) -> ScanStats {
        self.sync.stats()
    }

    /// Snapshot writer
    pub fn writer(&self) -> &SnapshotWriter {
        &self.writer
    }

    /// Bytes waiting for the rest of a frame
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Process one chunk from the byte source.
    ///
    /// Returns the number of readings stored. Empty chunks are a no-op.
    pub fn ingest(&mut self, chunk: &[u8], now: DateTime<Utc>) -> usize {
        if chunk.is_empty() {
            return 0;
        }

        let evicted = self.buffer.append(chunk);
        self.sync.record_eviction(evicted);

        let store = &mut self.store;
        let mut stored = 0;
        self.sync.scan(&mut self.buffer, |frame| {
            let reading = decode_frame(frame, now)?;
            info!(
                "[slave {}] SOC={}% V={:.2} I={:.2} T={}°C cycles={}",
                reading.slave_id,
                reading.soc_pct,
                reading.voltage_v,
                reading.current_a,
                reading.temperature_c,
                reading.cycle_count
            );
            if store.upsert(reading) {
                stored += 1;
            }
            Ok(())
        });

        if self.writer.maybe_write(&self.store, now) == WriteOutcome::Written {
            trace!("Snapshot published");
        }
        stored
    }

    /// Publish the current store now, ignoring the once-per-second throttle.
    pub fn flush(&mut self, now: DateTime<Utc>) -> WriteOutcome {
        self.writer.force_write(&self.store, now)
    }

    /// Read from `source` until it fails, ends (replay mode) or `shutdown`
    /// is cancelled.
    ///
    /// Interrupted reads are retried; any other read error ends the loop and
    /// is returned.
    pub async fn run<R>(&mut self, mut source: R, shutdown: CancellationToken) -> SnifferResult<()>
    where
        R: AsyncRead + Unpin,
    {
        let mut chunk = vec![0u8; self.read_chunk_size];

        loop {
            let read = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested");
                    break;
                }
                read = source.read(&mut chunk) => read,
            };

            match read {
                Ok(0) if self.stop_at_eof => {
                    info!("End of input");
                    // Publish decodes coalesced into the last second
                    self.flush(Utc::now());
                    break;
                }
                Ok(0) => {
                    trace!("No data");
                    tokio::time::sleep(Duration::from_millis(SERIAL_TIMEOUT_MS)).await;
                }
                Ok(n) => {
                    self.ingest(&chunk[..n], Utc::now());
                }
                Err(e) => {
                    let err = SnifferError::from(e);
                    if err.is_retryable() {
                        continue;
                    }
                    error!("Read failed: {}", err);
                    self.log_summary();
                    return Err(err);
                }
            }
        }

        self.log_summary();
        Ok(())
    }

    /// Log the lifetime counters
    pub fn log_summary(&self) {
        let stats = self.sync.stats();
        info!(
            "Frames: matched={} accepted={} crc_failures={} rejected_slaves={}, bytes: noise={} evicted={}, snapshots: written={} failed={}",
            stats.frames_matched,
            stats.frames_accepted,
            stats.crc_failures,
            stats.rejected_slaves,
            stats.noise_bytes,
            stats.evicted_bytes,
            self.writer.writes(),
            self.writer.failures()
        );
    }
}
