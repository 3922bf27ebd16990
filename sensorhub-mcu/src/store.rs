//! Sensor Data Store
//!
//! Latest reading per `(address, kind)`, written by notification callbacks
//! and by relayed peer data. One mutex guards everything, and no I/O
//! happens while it is held.

use crate::model::{Reading, StoreKey};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

#[derive(Debug)]
struct Inner {
    readings: BTreeMap<StoreKey, Reading>,
    last_write: Instant,
}

#[derive(Debug)]
pub struct SensorStore {
    inner: Mutex<Inner>,
}

impl Default for SensorStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                readings: BTreeMap::new(),
                last_write: Instant::now(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a reading this hub took itself. Always overwrites.
    pub fn upsert_local(&self, reading: Reading) {
        let mut inner = self.lock();
        inner.readings.insert(reading.key(), reading);
        inner.last_write = Instant::now();
    }

    /// Store a reading relayed by a peer hub, unless what we hold is at
    /// least as new. Returns whether the store changed.
    pub fn merge_relayed(&self, reading: Reading) -> bool {
        let mut inner = self.lock();
        let key = reading.key();
        if let Some(existing) = inner.readings.get(&key) {
            if existing.timestamp >= reading.timestamp {
                return false;
            }
        }
        inner.readings.insert(key, reading);
        inner.last_write = Instant::now();
        true
    }

    /// Copy of up to `limit` readings in key order
    pub fn snapshot(&self, limit: usize) -> Vec<Reading> {
        self.lock().readings.values().take(limit).cloned().collect()
    }

    pub fn get(&self, key: &StoreKey) -> Option<Reading> {
        self.lock().readings.get(key).cloned()
    }

    pub fn clear(&self) {
        self.lock().readings.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// When a reading last landed in the store (creation time if never)
    pub fn last_write(&self) -> Instant {
        self.lock().last_write
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DeviceType, MeasureKind};

    fn reading(address: &str, kind: MeasureKind, timestamp: i64, value: f32) -> Reading {
        Reading {
            timestamp,
            address: address.to_string(),
            device_type: DeviceType::FamilyA,
            value,
            kind,
        }
    }

    #[test]
    fn relayed_merge_is_last_writer_wins() {
        let store = SensorStore::new();
        let key = reading("a", MeasureKind::Temperature, 100, 1.0).key();
        store.upsert_local(reading("a", MeasureKind::Temperature, 100, 1.0));

        assert!(!store.merge_relayed(reading("a", MeasureKind::Temperature, 99, 2.0)));
        assert_eq!(store.get(&key).unwrap().value, 1.0);

        // equal timestamps keep what we have
        assert!(!store.merge_relayed(reading("a", MeasureKind::Temperature, 100, 3.0)));
        assert_eq!(store.get(&key).unwrap().value, 1.0);

        assert!(store.merge_relayed(reading("a", MeasureKind::Temperature, 101, 4.0)));
        assert_eq!(store.get(&key).unwrap().value, 4.0);

        store.upsert_local(reading("a", MeasureKind::Temperature, 5, 5.0));
        assert_eq!(store.get(&key).unwrap(), reading("a", MeasureKind::Temperature, 5, 5.0));
    }

    #[test]
    fn kinds_are_separate_keys() {
        let store = SensorStore::new();
        store.upsert_local(reading("a", MeasureKind::Temperature, 1, 20.0));
        store.upsert_local(reading("a", MeasureKind::Humidity, 1, 40.0));
        assert_eq!(store.len(), 2);
        // a relayed value for a new key is always taken
        assert!(store.merge_relayed(reading("b", MeasureKind::Humidity, 0, 1.0)));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn snapshot_is_capped_and_stable() {
        let store = SensorStore::new();
        for i in 0..100 {
            store.upsert_local(reading(&format!("dev-{i:03}"), MeasureKind::Temperature, i, 0.0));
        }
        let first = store.snapshot(64);
        assert_eq!(first.len(), 64);
        assert_eq!(first, store.snapshot(64));
        assert_eq!(first[0].address, "dev-000");
        assert_eq!(first[63].address, "dev-063");
    }

    #[test]
    fn clear_empties() {
        let store = SensorStore::new();
        store.upsert_local(reading("a", MeasureKind::Temperature, 1, 20.0));
        store.clear();
        assert!(store.is_empty());
    }
}
