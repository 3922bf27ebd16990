//! WiFi Abstraction Traits
//!
//! Traits for WiFi operations that MCU-specific crates implement, plus the
//! shared link state and the background connect attempt driven by GATT
//! commands.

use crate::{HubContext, HubError, Storage};
use log::*;
use sensorhub_proto::{
    pack_bssid, wifi_connect_response_info, ConnectedToWifi, ConnectingToWifi, WifiConnectResponseInfo,
    WifiData, WifiTimeout, WifiVector, MAX_LIST_ENTRIES,
};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

/// Longest SSID the radio accepts
pub const MAX_SSID_LEN: usize = 32;

/// WiFi network scan result
#[derive(Debug, Clone)]
pub struct ScanResult {
    pub ssid: String,
    pub bssid: [u8; 6],
    pub channel: u8,
    pub auth_required: bool,
}

impl ScanResult {
    fn to_wire(&self) -> WifiData {
        let mut end = self.ssid.len().min(MAX_SSID_LEN);
        while !self.ssid.is_char_boundary(end) {
            end -= 1;
        }
        WifiData {
            ssid: self.ssid[..end].to_string(),
            bssid: pack_bssid(&self.bssid),
            channel: u32::from(self.channel),
            is_encrypted: self.auth_required,
        }
    }
}

/// Trait for WiFi operations
///
/// MCU-specific crates implement this trait using their WiFi stack.
pub trait Wifi: Send + 'static {
    /// Error type for WiFi operations
    type Error: std::fmt::Display;

    /// Scan for available networks
    fn scan(&mut self) -> Result<Vec<ScanResult>, Self::Error>;

    /// Start associating with a network, returns without waiting for it
    fn begin_connect(&mut self, ssid: &str, password: &str) -> Result<(), Self::Error>;

    /// Check if connected
    fn is_connected(&self) -> bool;
}

/// Outcome of the most recent connect attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WifiLinkState {
    #[default]
    Connecting,
    Connected,
    TimedOut,
}

impl WifiLinkState {
    pub fn to_response(self) -> WifiConnectResponseInfo {
        use wifi_connect_response_info::Type;
        let state = match self {
            WifiLinkState::Connecting => Type::ConnectingToWifi(ConnectingToWifi {}),
            WifiLinkState::Connected => Type::ConnectedToWifi(ConnectedToWifi {}),
            WifiLinkState::TimedOut => Type::Timeout(WifiTimeout {}),
        };
        WifiConnectResponseInfo { r#type: Some(state) }
    }
}

/// Scan and connect on behalf of the GATT session
pub struct WifiControl<W, S> {
    wifi: Arc<Mutex<W>>,
    storage: Arc<Mutex<S>>,
    ctx: Arc<HubContext>,
}

impl<W, S> Clone for WifiControl<W, S> {
    fn clone(&self) -> Self {
        Self {
            wifi: self.wifi.clone(),
            storage: self.storage.clone(),
            ctx: self.ctx.clone(),
        }
    }
}

impl<W: Wifi, S: Storage> WifiControl<W, S> {
    pub fn new(wifi: Arc<Mutex<W>>, storage: Arc<Mutex<S>>, ctx: Arc<HubContext>) -> Self {
        Self { wifi, storage, ctx }
    }

    /// Scan and build the response for `GetWifi`
    pub fn scan_vector(&self) -> Result<WifiVector, HubError> {
        let results = self
            .wifi
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .scan()
            .map_err(|e| HubError::Wifi(e.to_string()))?;
        info!("WiFi scan found {} networks", results.len());
        Ok(WifiVector {
            data: results
                .iter()
                .take(MAX_LIST_ENTRIES)
                .map(ScanResult::to_wire)
                .collect(),
        })
    }

    /// Kick off a connect attempt on its own thread and return at once.
    ///
    /// The thread polls the link `wifi_connect_attempts` times, persists
    /// the credentials on success, and leaves the outcome in the link state.
    /// A newer call supersedes a running attempt: the older thread stops
    /// polling and neither saves nor reports anything.
    pub fn connect_async(&self, ssid: String, password: String) -> std::io::Result<JoinHandle<()>> {
        info!(
            "Connecting to WiFi {} (password {} bytes)",
            ssid,
            password.len()
        );
        let attempt = self.ctx.begin_wifi_attempt();
        let this = self.clone();
        std::thread::Builder::new()
            .name("wifi-connect".into())
            .spawn(move || {
                if let Some(state) = this.connect_blocking(attempt, &ssid, &password) {
                    this.ctx.finish_wifi_attempt(attempt, state);
                }
            })
    }

    /// Returns `None` once the attempt has been superseded
    fn connect_blocking(&self, attempt: u64, ssid: &str, password: &str) -> Option<WifiLinkState> {
        let begun = self
            .wifi
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .begin_connect(ssid, password);
        if let Err(e) = begun {
            warn!("WiFi connect to {ssid} failed to start: {e}");
            return Some(WifiLinkState::TimedOut);
        }

        let config = &self.ctx.config;
        for check in 1..=config.wifi_connect_attempts {
            if !self.ctx.is_current_wifi_attempt(attempt) {
                debug!("WiFi attempt {attempt} for {ssid} superseded");
                return None;
            }
            if self
                .wifi
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .is_connected()
            {
                let mut storage = self.storage.lock().unwrap_or_else(PoisonError::into_inner);
                // a newer attempt may have joined another network meanwhile
                if !self.ctx.is_current_wifi_attempt(attempt) {
                    debug!("WiFi attempt {attempt} for {ssid} superseded");
                    return None;
                }
                info!("WiFi connected to {ssid} after {check} checks");
                if let Err(e) = storage.set_wifi_credentials(ssid, password) {
                    error!("Failed to persist WiFi credentials: {e}");
                }
                return Some(WifiLinkState::Connected);
            }
            std::thread::sleep(config.wifi_connect_backoff());
        }
        warn!("WiFi connect to {ssid} timed out");
        Some(WifiLinkState::TimedOut)
    }
}
