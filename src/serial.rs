//! RS485 adapter setup
//!
//! The bus is only listened to: 8N1, no flow control, nothing is ever
//! written to the port.

use std::time::Duration;

use tokio_serial::{
    ClearBuffer, DataBits, FlowControl, Parity, SerialPort, SerialPortBuilderExt, SerialStream,
    StopBits,
};
use tracing::info;

use crate::constants::SERIAL_TIMEOUT_MS;
use crate::error::SnifferResult;

/// Open `port` at `baud` for passive listening.
///
/// Stale bytes already queued by the driver are flushed so the first scan
/// starts on fresh traffic.
pub fn open_serial(port: &str, baud: u32) -> SnifferResult<SerialStream> {
    let stream = tokio_serial::new(port, baud)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(Duration::from_millis(SERIAL_TIMEOUT_MS))
        .open_native_async()?;

    stream.clear(ClearBuffer::Input)?;
    info!("Opened serial port {} at {} baud (8N1)", port, baud);
    Ok(stream)
}
