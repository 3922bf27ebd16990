//! Shared hub state
//!
//! Built once at startup and handed to the GATT session, the orchestrator,
//! and the uplink as an `Arc<HubContext>`.

use crate::{
    Clock, HubConfig, HubError, Reading, SensorStore, Target, WifiLinkState, Worklist,
};
use log::*;
use sensorhub_proto::{
    CrossDevicePacket, ProtoError, SensorsListInterDevice, ValuesInterDeviceList,
    MAX_LIST_ENTRIES,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

pub struct HubContext {
    pub config: HubConfig,
    pub store: SensorStore,
    pub worklist: Worklist,
    link_state: Mutex<WifiLinkState>,
    wifi_attempt: AtomicU64,
    registration_token: Mutex<Option<String>>,
    clock: Arc<dyn Clock>,
}

impl HubContext {
    pub fn new(config: HubConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            store: SensorStore::new(),
            worklist: Worklist::new(),
            link_state: Mutex::new(WifiLinkState::default()),
            wifi_attempt: AtomicU64::new(0),
            registration_token: Mutex::new(None),
            clock,
        }
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn link_state(&self) -> WifiLinkState {
        *self.link_state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_link_state(&self, state: WifiLinkState) {
        debug!("WiFi link state -> {state:?}");
        *self.link_state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Start a new connect attempt. Any attempt still running is superseded.
    pub fn begin_wifi_attempt(&self) -> u64 {
        let mut state = self.link_state.lock().unwrap_or_else(PoisonError::into_inner);
        let attempt = self.wifi_attempt.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("WiFi connect attempt {attempt}");
        *state = WifiLinkState::Connecting;
        attempt
    }

    pub fn is_current_wifi_attempt(&self, attempt: u64) -> bool {
        self.wifi_attempt.load(Ordering::SeqCst) == attempt
    }

    /// Record the outcome of an attempt. Returns false, changing nothing,
    /// when a newer attempt has started since.
    pub fn finish_wifi_attempt(&self, attempt: u64, outcome: WifiLinkState) -> bool {
        let mut state = self.link_state.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.is_current_wifi_attempt(attempt) {
            debug!("Dropping outcome {outcome:?} of superseded attempt {attempt}");
            return false;
        }
        debug!("WiFi link state -> {outcome:?}");
        *state = outcome;
        true
    }

    /// Keep a registration nonce for the backend flow, replacing any older one
    pub fn set_registration_token(&self, token: String) {
        *self
            .registration_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(token);
    }

    /// Hand the pending registration nonce out, once
    pub fn take_registration_token(&self) -> Option<String> {
        self.registration_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Apply a packet relayed from a peer hub.
    ///
    /// The whole packet is validated before anything changes, so a bad
    /// entry leaves the worklist and the store as they were.
    pub fn apply_relay(&self, packet: &CrossDevicePacket) -> Result<(), HubError> {
        if let Some(list) = &packet.sensor_list {
            check_list_len("sensor_list", list.sensor_info.len())?;
        }
        if let Some(list) = &packet.values {
            check_list_len("values", list.values.len())?;
        }
        let targets = packet
            .sensor_list
            .iter()
            .flat_map(|list| &list.sensor_info)
            .map(Target::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let readings = packet
            .values
            .iter()
            .flat_map(|list| &list.values)
            .map(Reading::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        if packet.timestamp != 0 && !self.clock.is_set() {
            info!("Adopting peer clock {}", packet.timestamp);
            self.clock.set(packet.timestamp);
        }

        info!(
            "Relay packet: {} sensors, {} values",
            targets.len(),
            readings.len()
        );
        self.worklist.set_devices(&targets);
        let merged = readings
            .into_iter()
            .map(|r| self.store.merge_relayed(r))
            .filter(|changed| *changed)
            .count();
        debug!("Merged {merged} relayed readings");
        Ok(())
    }

    /// Worklist and store snapshot to push to a peer hub
    pub fn relay_packet(&self) -> CrossDevicePacket {
        let sensor_info = self
            .worklist
            .snapshot()
            .iter()
            .take(MAX_LIST_ENTRIES)
            .map(Target::to_relay_info)
            .collect();
        let values = self
            .store
            .snapshot(MAX_LIST_ENTRIES)
            .iter()
            .map(Reading::to_relay_value)
            .collect();
        CrossDevicePacket {
            sensor_list: Some(SensorsListInterDevice { sensor_info }),
            values: Some(ValuesInterDeviceList { values }),
            timestamp: self.clock.now(),
        }
    }
}

fn check_list_len(field: &'static str, len: usize) -> Result<(), ProtoError> {
    if len > MAX_LIST_ENTRIES {
        return Err(ProtoError::TooManyEntries(field, len));
    }
    Ok(())
}
