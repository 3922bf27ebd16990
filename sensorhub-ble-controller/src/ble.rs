//! BLE client for sensorhub devices
//!
//! Every command is a `BleSendPacket` behind a 4 byte little-endian length,
//! written to the hub characteristic. Commands that have an answer are
//! drained back by reading the same characteristic: first the length, then
//! chunks until the payload is complete.

use btleplug::api::{Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType};
use btleplug::platform::{Adapter, Manager, Peripheral};
use log::*;
use prost::Message;
use sensorhub_proto::ble::{CHARACTERISTIC_UUID, SERVICE_UUID};
use sensorhub_proto::{
    ble_send_packet, encode_frame, parse_length_prefix, BleSendPacket, CrossDevicePacket, GetWifi,
    GetWifiConnectState, ProtoError, Token, WifiConnectInfo, WifiConnectResponseInfo, WifiVector,
    GATT_CHUNK_LEN, LENGTH_PREFIX_LEN, MAX_FRAME_LEN,
};
use std::time::Duration;
use uuid::Uuid;

/// Hubs advertise as "ESP-" followed by their identity
pub const NAME_PREFIX: &str = "ESP-";

const FIND_SCAN_SECS: u64 = 5;

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("bluetooth: {0}")]
    Ble(#[from] btleplug::Error),
    #[error("no Bluetooth adapter found")]
    NoAdapter,
    #[error("no hub found")]
    NotFound,
    #[error("hub characteristic not found")]
    CharacteristicNotFound,
    #[error(transparent)]
    Proto(#[from] ProtoError),
    #[error("response decode: {0}")]
    Decode(#[from] prost::DecodeError),
    #[error("hub sent an empty read mid-response ({got} of {expected} bytes)")]
    ShortRead { got: usize, expected: usize },
}

/// A discovered BLE device
#[derive(Debug, Clone)]
pub struct HubDevice {
    pub name: String,
    pub address: String,
    pub rssi: Option<i16>,
    pub is_hub: bool,
}

fn parse_uuid(s: &str) -> Uuid {
    Uuid::parse_str(s).unwrap_or_default()
}

/// Get the default Bluetooth adapter
pub async fn get_adapter() -> Result<Adapter, ControllerError> {
    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;
    adapters.into_iter().next().ok_or(ControllerError::NoAdapter)
}

async fn scan_peripherals(
    adapter: &Adapter,
    duration_secs: u64,
) -> Result<Vec<(Peripheral, HubDevice)>, ControllerError> {
    adapter.start_scan(ScanFilter::default()).await?;
    tokio::time::sleep(Duration::from_secs(duration_secs)).await;

    let service = parse_uuid(SERVICE_UUID);
    let mut found = Vec::new();
    for peripheral in adapter.peripherals().await? {
        if let Some(props) = peripheral.properties().await? {
            let name = props.local_name.unwrap_or_else(|| "Unknown".to_string());
            let is_hub = props.services.contains(&service) || name.starts_with(NAME_PREFIX);
            let device = HubDevice {
                address: peripheral.address().to_string(),
                rssi: props.rssi,
                is_hub,
                name,
            };
            found.push((peripheral, device));
        }
    }

    adapter.stop_scan().await?;
    Ok(found)
}

/// Scan for BLE devices. Hubs have `is_hub = true`.
pub async fn scan(duration_secs: u64) -> Result<Vec<HubDevice>, ControllerError> {
    let adapter = get_adapter().await?;
    Ok(scan_peripherals(&adapter, duration_secs)
        .await?
        .into_iter()
        .map(|(_, device)| device)
        .collect())
}

/// Find a hub by name/address pattern, or the first hub seen
pub async fn find_hub(target: Option<&str>) -> Result<Peripheral, ControllerError> {
    let adapter = get_adapter().await?;
    scan_peripherals(&adapter, FIND_SCAN_SECS)
        .await?
        .into_iter()
        .find(|(_, device)| match target {
            Some(t) => device.name.contains(t) || device.address.contains(t),
            None => device.is_hub,
        })
        .map(|(peripheral, device)| {
            info!("Found hub {} ({})", device.name, device.address);
            peripheral
        })
        .ok_or(ControllerError::NotFound)
}

/// Reassembles one drained response from successive reads
#[derive(Debug, Default)]
pub struct ResponseReader {
    expected: Option<usize>,
    payload: Vec<u8>,
}

impl ResponseReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one read. Returns the payload once it is complete.
    pub fn feed(&mut self, read: &[u8]) -> Result<Option<Vec<u8>>, ControllerError> {
        let expected = match self.expected {
            Some(expected) => {
                if read.is_empty() {
                    return Err(ControllerError::ShortRead {
                        got: self.payload.len(),
                        expected,
                    });
                }
                self.payload.extend_from_slice(read);
                expected
            }
            None => {
                let expected = parse_length_prefix(read)?;
                if expected > MAX_FRAME_LEN {
                    return Err(ProtoError::FrameTooLarge(expected).into());
                }
                self.payload.extend_from_slice(&read[LENGTH_PREFIX_LEN..]);
                self.expected = Some(expected);
                expected
            }
        };
        if self.payload.len() >= expected {
            self.payload.truncate(expected);
            return Ok(Some(std::mem::take(&mut self.payload)));
        }
        Ok(None)
    }
}

/// A connected hub
pub struct HubLink {
    peripheral: Peripheral,
    characteristic: Characteristic,
}

impl HubLink {
    pub async fn connect(target: Option<&str>) -> Result<Self, ControllerError> {
        let peripheral = find_hub(target).await?;
        peripheral.connect().await?;
        peripheral.discover_services().await?;

        let uuid = parse_uuid(CHARACTERISTIC_UUID);
        let characteristic = peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == uuid)
            .ok_or(ControllerError::CharacteristicNotFound)?;
        Ok(Self {
            peripheral,
            characteristic,
        })
    }

    /// Write one framed command
    pub async fn send(&self, command: ble_send_packet::Type) -> Result<(), ControllerError> {
        let frame = encode_frame(&BleSendPacket::new(command).encode_to_vec());
        debug!("Sending {} byte frame", frame.len());
        for chunk in frame.chunks(GATT_CHUNK_LEN) {
            self.peripheral
                .write(&self.characteristic, chunk, WriteType::WithResponse)
                .await?;
        }
        Ok(())
    }

    /// Read back the staged response
    pub async fn drain(&self) -> Result<Vec<u8>, ControllerError> {
        let mut reader = ResponseReader::new();
        loop {
            let read = self.peripheral.read(&self.characteristic).await?;
            if let Some(payload) = reader.feed(&read)? {
                debug!("Drained {} byte response", payload.len());
                return Ok(payload);
            }
        }
    }

    pub async fn wifi_list(&self) -> Result<WifiVector, ControllerError> {
        self.send(ble_send_packet::Type::GetWifi(GetWifi {})).await?;
        Ok(WifiVector::decode(self.drain().await?.as_slice())?)
    }

    pub async fn wifi_connect(&self, ssid: &str, password: &str) -> Result<(), ControllerError> {
        self.send(ble_send_packet::Type::WifiConnectInfo(WifiConnectInfo {
            ssid: ssid.to_string(),
            password: password.to_string(),
        }))
        .await
    }

    pub async fn wifi_state(&self) -> Result<WifiConnectResponseInfo, ControllerError> {
        self.send(ble_send_packet::Type::GetWifiConnectState(
            GetWifiConnectState {},
        ))
        .await?;
        Ok(WifiConnectResponseInfo::decode(self.drain().await?.as_slice())?)
    }

    pub async fn register(&self, token: &str) -> Result<(), ControllerError> {
        self.send(ble_send_packet::Type::Token(Token {
            uuid: token.to_string(),
        }))
        .await
    }

    /// Push worklist and readings the way a peer hub would
    pub async fn relay(&self, packet: CrossDevicePacket) -> Result<(), ControllerError> {
        self.send(ble_send_packet::Type::CrossDevicePacket(packet))
            .await
    }

    pub async fn disconnect(&self) -> Result<(), ControllerError> {
        self.peripheral.disconnect().await?;
        Ok(())
    }
}
