//! CRC-16/MODBUS verification
//!
//! Reflected polynomial 0xA001 (0x8005 unreflected), initial value 0xFFFF,
//! bytes processed LSB first. The CRC is transmitted little-endian after the
//! frame body.

use crc::{Crc, CRC_16_MODBUS};

const MODBUS_CRC: Crc<u16> = Crc::<u16>::new(&CRC_16_MODBUS);

/// Compute the CRC-16/MODBUS of `data`.
#[inline]
pub fn crc16(data: &[u8]) -> u16 {
    MODBUS_CRC.checksum(data)
}

/// Read the little-endian CRC trailer of an RTU frame.
///
/// Returns `None` for frames shorter than the trailer itself.
#[inline]
pub fn frame_crc(frame: &[u8]) -> Option<u16> {
    let len = frame.len();
    if len < 2 {
        return None;
    }
    Some(u16::from_le_bytes([frame[len - 2], frame[len - 1]]))
}

/// Split a frame into `(computed, carried)` CRC values.
pub fn crc_pair(frame: &[u8]) -> Option<(u16, u16)> {
    let carried = frame_crc(frame)?;
    Some((crc16(&frame[..frame.len() - 2]), carried))
}
