//! # Voltage Sniffer - Passive Modbus RTU Battery Monitor
//!
//! **License:** MIT
//!
//! Listens to the RS485 bus between an inverter and its battery modules,
//! picks the battery responses out of the traffic and republishes the latest
//! reading of every module as an atomically replaced JSON snapshot.
//!
//! The sniffer never transmits. It only recognizes read-holding-registers
//! responses that happen to pass by.
//!
//! ## Pipeline
//!
//! | Stage | Module |
//! |-------|--------|
//! | Raw bytes, bounded | [`buffer`] |
//! | Frame boundary recovery | [`frame`] |
//! | CRC-16/MODBUS check | [`crc`] |
//! | Register decoding and scaling | [`decoder`] |
//! | Latest reading per slave | [`store`] |
//! | Throttled atomic JSON export | [`snapshot`] |
//! | Read loop and shutdown | [`sniffer`] |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use voltage_sniffer::{open_serial, Sniffer, SnifferConfig, SnifferResult};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> SnifferResult<()> {
//!     let port = open_serial("/dev/ttyUSB0", 9600)?;
//!     let mut sniffer = Sniffer::new(SnifferConfig::new("/tmp/battery_data.json"));
//!     sniffer.run(port, CancellationToken::new()).await
//! }
//! ```

// ============================================================================
// Core modules
// ============================================================================

/// Error types and result handling
pub mod error;

/// Frame geometry and bus constants
pub mod constants;

/// CRC-16/MODBUS
pub mod crc;

/// Bounded accumulation buffer
pub mod buffer;

/// Frame synchronizer
pub mod frame;

/// Battery response decoding
pub mod decoder;

/// Latest reading per battery
pub mod store;

/// JSON snapshot export
pub mod snapshot;

/// Processing loop
pub mod sniffer;

// ============================================================================
// Process support
// ============================================================================

/// Command line configuration
pub mod config;

/// Logging setup
pub mod logging;

/// PID file bookkeeping
pub mod pidfile;

/// Serial port setup
pub mod serial;

/// Signal handling
pub mod shutdown;

// ============================================================================
// Re-exports for convenience
// ============================================================================

pub use buffer::AccumulationBuffer;
pub use config::{Args, Source};
pub use decoder::{decode_frame, encode_frame, Reading, SlaveId};
pub use error::{FrameError, SnifferError, SnifferResult};
pub use frame::{FrameSynchronizer, ScanStats};
pub use serial::open_serial;
pub use sniffer::{Sniffer, SnifferConfig};
pub use snapshot::{Snapshot, SnapshotWriter, WriteOutcome};
pub use store::DeviceStore;

pub use constants::{FRAME_LEN, MAX_BATTERIES, NUM_REGISTERS};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
