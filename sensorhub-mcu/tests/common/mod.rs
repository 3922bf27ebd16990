//! In-memory stand-ins for the hardware traits.

#![allow(dead_code)]

use sensorhub_mcu::{
    Advertisement, Central, CharacteristicProps, HubConfig, HubContext, Link, NotifyHandler,
    OffsetClock, ScanResult, Storage, Uplink, UplinkStatus, Wifi,
};
use std::cell::Cell;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn fast_config() -> HubConfig {
    HubConfig {
        scan_duration_ms: 0,
        idle_backoff_ms: 1,
        connect_settle_ms: 0,
        dwell_ms: 30,
        dwell_grace_ms: 2_000,
        wifi_connect_backoff_ms: 1,
        ..HubConfig::default()
    }
}

pub fn context(config: HubConfig) -> Arc<HubContext> {
    Arc::new(HubContext::new(config, Arc::new(OffsetClock::new())))
}

#[derive(Default)]
pub struct FakeWifi {
    pub networks: Vec<ScanResult>,
    /// `is_connected` turns true on this poll, never if `None`
    pub connects_after: Option<u32>,
    pub polls: Cell<u32>,
    pub joined: Option<(String, String)>,
    /// Only this password gets a link, any password if `None`
    pub accept_password: Option<String>,
}

impl Wifi for FakeWifi {
    type Error = String;

    fn scan(&mut self) -> Result<Vec<ScanResult>, Self::Error> {
        Ok(self.networks.clone())
    }

    fn begin_connect(&mut self, ssid: &str, password: &str) -> Result<(), Self::Error> {
        self.joined = Some((ssid.to_string(), password.to_string()));
        self.polls.set(0);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.polls.set(self.polls.get() + 1);
        let accepted = match (&self.accept_password, &self.joined) {
            (Some(wanted), Some((_, password))) => wanted == password,
            (Some(_), None) => false,
            (None, _) => true,
        };
        accepted && self.connects_after.is_some_and(|n| self.polls.get() >= n)
    }
}

#[derive(Default)]
pub struct MemStorage {
    pub identity: Option<String>,
    pub credentials: Option<(String, String)>,
}

impl Storage for MemStorage {
    type Error = String;

    fn get_identity(&self) -> Result<Option<String>, Self::Error> {
        Ok(self.identity.clone())
    }

    fn set_identity(&mut self, identity: &str) -> Result<(), Self::Error> {
        self.identity = Some(identity.to_string());
        Ok(())
    }

    fn get_wifi_credentials(&self) -> Result<Option<(String, String)>, Self::Error> {
        Ok(self.credentials.clone())
    }

    fn set_wifi_credentials(&mut self, ssid: &str, password: &str) -> Result<(), Self::Error> {
        self.credentials = Some((ssid.to_string(), password.to_string()));
        Ok(())
    }

    fn get_config(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        Ok(None)
    }
}

/// What a fake peripheral looks like and does
#[derive(Clone, Default)]
pub struct FakeDevice {
    pub address: String,
    pub name: Option<String>,
    pub services: Vec<&'static str>,
    pub characteristics: HashMap<&'static str, CharacteristicProps>,
    /// Delivered to the handler right after subscribing
    pub notifications: HashMap<&'static str, Vec<Vec<u8>>>,
    pub connect_delay: Duration,
}

impl FakeDevice {
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            ..Self::default()
        }
    }

    pub fn service(mut self, uuid: &'static str) -> Self {
        self.services.push(uuid);
        self
    }

    pub fn notify(mut self, uuid: &'static str, payloads: &[&[u8]]) -> Self {
        self.characteristics.insert(
            uuid,
            CharacteristicProps {
                can_notify: true,
                can_read: true,
                ..Default::default()
            },
        );
        self.notifications
            .insert(uuid, payloads.iter().map(|p| p.to_vec()).collect());
        self
    }

    pub fn writable(mut self, uuid: &'static str) -> Self {
        self.characteristics.insert(
            uuid,
            CharacteristicProps {
                can_write: true,
                can_read: true,
                ..Default::default()
            },
        );
        self
    }

    pub fn write_only(mut self, uuid: &'static str) -> Self {
        self.characteristics.insert(
            uuid,
            CharacteristicProps {
                can_write: true,
                ..Default::default()
            },
        );
        self
    }
}

/// Everything a link was asked to do
#[derive(Debug, Default)]
pub struct LinkLog {
    pub mtu: Option<u16>,
    pub writes: Vec<(String, Vec<u8>)>,
    pub subscribed: Vec<String>,
    pub unsubscribed: Vec<String>,
    pub disconnected: bool,
}

pub struct FakeCentral {
    pub devices: Vec<FakeDevice>,
    pub log: Arc<Mutex<LinkLog>>,
}

impl FakeCentral {
    pub fn new(devices: Vec<FakeDevice>) -> Self {
        Self {
            devices,
            log: Arc::new(Mutex::new(LinkLog::default())),
        }
    }
}

impl Central for FakeCentral {
    type Link = FakeLink;
    type Error = String;

    fn scan(&mut self, _: Duration) -> Result<Vec<Advertisement>, Self::Error> {
        Ok(self
            .devices
            .iter()
            .map(|d| Advertisement {
                address: d.address.clone(),
                name: d.name.clone(),
            })
            .collect())
    }

    fn connect(&mut self, address: &str) -> Result<FakeLink, Self::Error> {
        let device = self
            .devices
            .iter()
            .find(|d| d.address == address)
            .cloned()
            .ok_or_else(|| format!("{address} unknown"))?;
        std::thread::sleep(device.connect_delay);
        Ok(FakeLink {
            device,
            log: self.log.clone(),
        })
    }
}

pub struct FakeLink {
    device: FakeDevice,
    log: Arc<Mutex<LinkLog>>,
}

impl Link for FakeLink {
    type Error = String;

    fn set_mtu(&mut self, mtu: u16) -> Result<(), Self::Error> {
        self.log.lock().unwrap().mtu = Some(mtu);
        Ok(())
    }

    fn has_service(&mut self, service: &str) -> Result<bool, Self::Error> {
        Ok(self.device.services.iter().any(|s| *s == service))
    }

    fn characteristic(
        &mut self,
        _: &str,
        characteristic: &str,
    ) -> Result<Option<CharacteristicProps>, Self::Error> {
        Ok(self.device.characteristics.get(characteristic).copied())
    }

    fn write(&mut self, _: &str, characteristic: &str, data: &[u8]) -> Result<(), Self::Error> {
        self.log
            .lock()
            .unwrap()
            .writes
            .push((characteristic.to_string(), data.to_vec()));
        Ok(())
    }

    fn read(&mut self, _: &str, characteristic: &str) -> Result<Vec<u8>, Self::Error> {
        let log = self.log.lock().unwrap();
        Ok(log
            .writes
            .iter()
            .rev()
            .find(|(c, _)| c == characteristic)
            .map(|(_, data)| data.clone())
            .unwrap_or_default())
    }

    fn subscribe(
        &mut self,
        _: &str,
        characteristic: &str,
        mut handler: NotifyHandler,
    ) -> Result<(), Self::Error> {
        self.log
            .lock()
            .unwrap()
            .subscribed
            .push(characteristic.to_string());
        for payload in self
            .device
            .notifications
            .get(characteristic)
            .cloned()
            .unwrap_or_default()
        {
            handler(&payload);
        }
        Ok(())
    }

    fn unsubscribe(&mut self, _: &str, characteristic: &str) -> Result<(), Self::Error> {
        self.log
            .lock()
            .unwrap()
            .unsubscribed
            .push(characteristic.to_string());
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), Self::Error> {
        self.log.lock().unwrap().disconnected = true;
        Ok(())
    }
}

pub struct RecordingUplink {
    pub connected: bool,
    pub status: UplinkStatus,
    pub sent: Mutex<Vec<Vec<u8>>>,
}

impl RecordingUplink {
    pub fn connected() -> Self {
        Self {
            connected: true,
            status: UplinkStatus::Ok,
            sent: Mutex::new(vec![]),
        }
    }

    pub fn failing() -> Self {
        Self {
            status: UplinkStatus::WriteError,
            ..Self::connected()
        }
    }

    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }
}

impl Uplink for RecordingUplink {
    fn send(&self, frame: &[u8]) -> UplinkStatus {
        self.sent.lock().unwrap().push(frame.to_vec());
        self.status
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
