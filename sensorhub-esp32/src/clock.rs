//! Wall clock backed by the system time, set once from a peer hub

use esp_idf_svc::sys::{settimeofday, timeval};
use log::*;
use sensorhub_mcu::Clock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Default)]
pub struct SystemClock {
    set: AtomicBool,
}

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        if !self.is_set() {
            return 0;
        }
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }

    fn is_set(&self) -> bool {
        self.set.load(Ordering::SeqCst)
    }

    fn set(&self, unix_secs: i64) {
        let tv = timeval {
            tv_sec: unix_secs as _,
            tv_usec: 0,
        };
        // SAFETY: tv is a valid timeval and a null timezone is allowed
        let rc = unsafe { settimeofday(&tv, std::ptr::null()) };
        if rc != 0 {
            warn!("settimeofday failed: {rc}");
            return;
        }
        self.set.store(true, Ordering::SeqCst);
        info!("Clock set to {unix_secs}");
    }
}
