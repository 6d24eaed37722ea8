//! Bus and frame constants for the battery response sniffer
//!
//! The battery modules answer the inverter's poll with a fixed-size
//! read-holding-registers response:
//! - Slave ID (1) + Function Code (1) + Byte Count (1) + Data (34) + CRC (2) = 39 bytes
//! - Data carries 17 big-endian 16-bit registers

// ============================================================================
// Frame Geometry
// ============================================================================

/// Number of registers carried by one battery response
pub const NUM_REGISTERS: usize = 17;

/// Byte count field value for a full battery response (17 × 2 = 34 = 0x22)
pub const RESPONSE_BYTE_COUNT: u8 = 0x22;

/// Offset of the first register byte within a frame
pub const DATA_OFFSET: usize = 3;

/// Offset of the CRC (little-endian) within a frame
pub const CRC_OFFSET: usize = DATA_OFFSET + NUM_REGISTERS * 2;

/// Total frame length
///
/// Calculation:
/// - Header: slave(1) + function(1) + byte count(1) = 3 bytes
/// - Register data: 17 × 2 = 34 bytes
/// - CRC: 2 bytes
/// - Total: 3 + 34 + 2 = 39 bytes
pub const FRAME_LEN: usize = CRC_OFFSET + 2;

/// Length of the frame signature (slave, function code, byte count)
pub const SIGNATURE_LEN: usize = 3;

// ============================================================================
// Modbus Function Codes
// ============================================================================

/// Read Holding Registers (FC03), the only response decoded
pub const FC_READ_HOLDING_REGISTERS: u8 = 0x03;

// ============================================================================
// Device Policy
// ============================================================================

/// Highest slave ID accepted into the device store
///
/// The wire allows 1..=247 but the battery stack never exceeds 16 modules,
/// anything above is treated as foreign traffic.
pub const MAX_BATTERIES: u8 = 16;

// ============================================================================
// Buffering
// ============================================================================

/// Accumulation buffer capacity in bytes
pub const BUFFER_CAPACITY: usize = 4096;

/// Size of a single read from the byte source
pub const READ_CHUNK_SIZE: usize = 256;

// ============================================================================
// Serial Line
// ============================================================================

/// Baud rates the sniffer accepts on the command line
pub const SUPPORTED_BAUD_RATES: [u32; 8] = [1200, 2400, 4800, 9600, 19200, 38400, 57600, 115200];

/// Default baud rate of the inverter/battery bus
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Inter-byte read timeout handed to the serial driver (milliseconds)
pub const SERIAL_TIMEOUT_MS: u64 = 100;

/// Default PID file location
pub const DEFAULT_PIDFILE: &str = "/var/run/modbus_sniffer.pid";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_geometry() {
        assert_eq!(FRAME_LEN, 39);
        assert_eq!(CRC_OFFSET, 37);
        assert_eq!(RESPONSE_BYTE_COUNT as usize, NUM_REGISTERS * 2);
    }

    #[test]
    fn test_buffer_holds_many_frames() {
        // The tail kept after a failed scan must always fit
        assert!(BUFFER_CAPACITY > FRAME_LEN * 2);
        assert!(READ_CHUNK_SIZE <= BUFFER_CAPACITY);
    }

    #[test]
    fn test_default_baud_is_supported() {
        assert!(SUPPORTED_BAUD_RATES.contains(&DEFAULT_BAUD_RATE));
    }
}
