//! Latest reading per battery module
//!
//! Last write wins; no history is kept. Entries appear on the first valid
//! frame from a slave and are only ever replaced afterwards.

use std::collections::BTreeMap;

use tracing::debug;

use crate::decoder::{is_accepted_slave, Reading, SlaveId};

/// Most recent [`Reading`] keyed by slave ID, ordered by ID
#[derive(Debug, Clone, Default)]
pub struct DeviceStore {
    readings: BTreeMap<SlaveId, Reading>,
}

impl DeviceStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the reading for its slave.
    ///
    /// Readings from slaves outside the accepted range are dropped and
    /// `false` is returned.
    pub fn upsert(&mut self, reading: Reading) -> bool {
        if !is_accepted_slave(reading.slave_id) {
            debug!("Dropping reading for slave {}", reading.slave_id);
            return false;
        }
        self.readings.insert(reading.slave_id, reading);
        true
    }

    /// Latest reading of `slave_id`, if one has been decoded
    pub fn get(&self, slave_id: SlaveId) -> Option<&Reading> {
        self.readings.get(&slave_id)
    }

    /// Iterate readings in ascending slave order
    pub fn iter(&self) -> impl Iterator<Item = &Reading> {
        self.readings.values()
    }

    /// Borrow the underlying map
    pub fn readings(&self) -> &BTreeMap<SlaveId, Reading> {
        &self.readings
    }

    /// Number of batteries seen so far
    pub fn len(&self) -> usize {
        self.readings.len()
    }

    /// Check if no battery has been decoded yet
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::NUM_REGISTERS;
    use chrono::{TimeZone, Utc};

    fn reading(slave_id: SlaveId, soc: u16) -> Reading {
        let mut regs = [0u16; NUM_REGISTERS];
        regs[2] = soc;
        Reading::from_registers(slave_id, regs, Utc.timestamp_opt(1_700_000_000, 0).unwrap())
    }

    #[test]
    fn test_starts_empty() {
        let store = DeviceStore::new();
        assert!(store.is_empty());
        assert!(store.get(1).is_none());
    }

    #[test]
    fn test_last_write_wins() {
        let mut store = DeviceStore::new();
        assert!(store.upsert(reading(4, 60)));
        assert!(store.upsert(reading(4, 61)));

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(4).unwrap().soc_pct, 61);
    }

    #[test]
    fn test_rejects_out_of_range_slaves() {
        let mut store = DeviceStore::new();
        assert!(!store.upsert(reading(0, 50)));
        assert!(!store.upsert(reading(17, 50)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_iterates_in_slave_order() {
        let mut store = DeviceStore::new();
        for id in [9, 2, 16, 1] {
            store.upsert(reading(id, 50));
        }
        let ids: Vec<SlaveId> = store.iter().map(|r| r.slave_id).collect();
        assert_eq!(ids, vec![1, 2, 9, 16]);
    }
}
