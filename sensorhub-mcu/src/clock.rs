//! Wall clock abstraction
//!
//! The hub boots without a time source. A relayed packet or the network
//! can set it later; until then readings carry timestamp 0.

use std::sync::{Mutex, PoisonError};
use std::time::Instant;

pub trait Clock: Send + Sync {
    /// Unix seconds, 0 while unset
    fn now(&self) -> i64;

    fn is_set(&self) -> bool;

    fn set(&self, unix_secs: i64);
}

/// Host clock: an offset from a monotonic instant, unset until `set`
#[derive(Debug, Default)]
pub struct OffsetClock {
    anchor: Mutex<Option<(Instant, i64)>>,
}

impl OffsetClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for OffsetClock {
    fn now(&self) -> i64 {
        match *self.anchor.lock().unwrap_or_else(PoisonError::into_inner) {
            Some((at, secs)) => secs + at.elapsed().as_secs() as i64,
            None => 0,
        }
    }

    fn is_set(&self) -> bool {
        self.anchor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn set(&self, unix_secs: i64) {
        *self.anchor.lock().unwrap_or_else(PoisonError::into_inner) =
            Some((Instant::now(), unix_secs));
    }
}
