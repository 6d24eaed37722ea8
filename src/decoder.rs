//! # Battery Response Decoder
//!
//! Maps a validated 39-byte read-holding-registers response to a [`Reading`].
//!
//! ## Register Map
//!
//! | Index | Field | Scale |
//! |-------|-------|-------|
//! | 0 | cycle count | raw |
//! | 2 | state of charge (%) | raw |
//! | 3 | pack voltage (V) | raw / 100 |
//! | 4 | pack current (A) | i16 / 100 |
//! | 5 | temperature (°C) | raw |
//! | 7 | max charge current (A) | raw / 1000 |
//! | 8 | max discharge current (A) | raw / 1000 |
//! | 13 | state of health (%) | raw |
//! | 14 | max charge voltage (V) | raw / 100 |
//!
//! Indices 1, 6, 9-12, 15 and 16 have no known meaning and are only kept
//! in `raw_registers`.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::constants::{
    CRC_OFFSET, DATA_OFFSET, FC_READ_HOLDING_REGISTERS, FRAME_LEN, MAX_BATTERIES, NUM_REGISTERS,
    RESPONSE_BYTE_COUNT,
};
use crate::crc;
use crate::error::FrameError;

/// Modbus slave address of a battery module
pub type SlaveId = u8;

/// Raw register block of one response
pub type Registers = [u16; NUM_REGISTERS];

/// One candidate frame as sliced from the stream
pub type RawFrame = [u8; FRAME_LEN];

mod reg {
    pub const CYCLE_COUNT: usize = 0;
    pub const SOC: usize = 2;
    pub const VOLTAGE: usize = 3;
    pub const CURRENT: usize = 4;
    pub const TEMPERATURE: usize = 5;
    pub const MAX_CHARGE_CURRENT: usize = 7;
    pub const MAX_DISCHARGE_CURRENT: usize = 8;
    pub const SOH: usize = 13;
    pub const MAX_CHARGE_VOLTAGE: usize = 14;
}

mod util {
    use chrono::{DateTime, Utc};
    use serde::ser::Error as _;
    use serde::{Serialize, Serializer};
    use serde_json::value::RawValue;

    pub fn iso8601<S>(t: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        s.collect_str(&t.format("%Y-%m-%dT%H:%M:%SZ"))
    }

    /// Emit `x` as a JSON number with exactly `digits` decimals.
    ///
    /// Rounds the exact binary value, so 0.15 (stored as 0.1499...) gives
    /// `0.1`, and keeps trailing zeros (`51.20`).
    pub fn fixed_decimals<S>(x: f64, digits: usize, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let text = format!("{:.*}", digits, x);
        RawValue::from_string(text)
            .map_err(S::Error::custom)?
            .serialize(s)
    }

    pub fn f64_1_digits<S>(x: &f64, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        fixed_decimals(*x, 1, s)
    }

    pub fn f64_2_digits<S>(x: &f64, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        fixed_decimals(*x, 2, s)
    }
}

pub(crate) use util::iso8601;

/// Latest decoded telemetry of one battery module.
///
/// Field order matches the snapshot schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    /// Capture time
    #[serde(serialize_with = "util::iso8601")]
    pub timestamp: DateTime<Utc>,
    pub slave_id: SlaveId,
    pub soc_pct: u16,
    #[serde(serialize_with = "util::f64_2_digits")]
    pub voltage_v: f64,
    /// Positive while charging, negative while discharging
    #[serde(serialize_with = "util::f64_2_digits")]
    pub current_a: f64,
    pub temperature_c: u16,
    pub cycle_count: u16,
    #[serde(serialize_with = "util::f64_1_digits")]
    pub max_charge_current_a: f64,
    #[serde(serialize_with = "util::f64_1_digits")]
    pub max_discharge_current_a: f64,
    pub soh_pct: u16,
    #[serde(serialize_with = "util::f64_2_digits")]
    pub max_charge_voltage_v: f64,
    /// All 17 registers in receipt order
    pub raw_registers: Registers,
}

impl Reading {
    /// Derive a reading from a raw register block.
    pub fn from_registers(
        slave_id: SlaveId,
        registers: Registers,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            timestamp,
            slave_id,
            soc_pct: registers[reg::SOC],
            voltage_v: f64::from(registers[reg::VOLTAGE]) / 100.0,
            current_a: f64::from(registers[reg::CURRENT] as i16) / 100.0,
            temperature_c: registers[reg::TEMPERATURE],
            cycle_count: registers[reg::CYCLE_COUNT],
            max_charge_current_a: f64::from(registers[reg::MAX_CHARGE_CURRENT]) / 1000.0,
            max_discharge_current_a: f64::from(registers[reg::MAX_DISCHARGE_CURRENT]) / 1000.0,
            soh_pct: registers[reg::SOH],
            max_charge_voltage_v: f64::from(registers[reg::MAX_CHARGE_VOLTAGE]) / 100.0,
            raw_registers: registers,
        }
    }
}

/// Whether `slave_id` belongs to the battery stack
#[inline]
pub fn is_accepted_slave(slave_id: SlaveId) -> bool {
    (1..=MAX_BATTERIES).contains(&slave_id)
}

/// Extract the 17 big-endian registers of a frame
pub fn extract_registers(frame: &RawFrame) -> Registers {
    let mut registers = [0u16; NUM_REGISTERS];
    for (i, chunk) in frame[DATA_OFFSET..CRC_OFFSET].chunks_exact(2).enumerate() {
        registers[i] = u16::from_be_bytes([chunk[0], chunk[1]]);
    }
    registers
}

/// Validate and decode a candidate frame.
///
/// Checks the CRC first, then the slave ID policy. The frame signature is
/// the synchronizer's responsibility and is not re-checked here.
pub fn decode_frame(frame: &RawFrame, timestamp: DateTime<Utc>) -> Result<Reading, FrameError> {
    if let Some((expected, actual)) = crc::crc_pair(frame) {
        if expected != actual {
            return Err(FrameError::CrcMismatch { expected, actual });
        }
    }

    let slave_id = frame[0];
    if !is_accepted_slave(slave_id) {
        return Err(FrameError::InvalidSlaveId(slave_id));
    }

    Ok(Reading::from_registers(
        slave_id,
        extract_registers(frame),
        timestamp,
    ))
}

/// Build a well-formed battery response carrying `registers`.
///
/// Used to produce replay captures and test traffic.
pub fn encode_frame(slave_id: SlaveId, registers: &Registers) -> RawFrame {
    let mut frame = [0u8; FRAME_LEN];
    frame[0] = slave_id;
    frame[1] = FC_READ_HOLDING_REGISTERS;
    frame[2] = RESPONSE_BYTE_COUNT;
    for (i, value) in registers.iter().enumerate() {
        let offset = DATA_OFFSET + i * 2;
        frame[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
    }
    let crc = crc::crc16(&frame[..CRC_OFFSET]);
    frame[CRC_OFFSET..].copy_from_slice(&crc.to_le_bytes());
    frame
}
