//! Backend uplink contract
//!
//! The transport (a websocket on the ESP32) lives outside the core. The core
//! hands it encoded [`FirmwareToBackendPacket`]s and treats a failed write
//! on a connected socket as fatal.

use crate::{HubError, Reading};
use log::*;
use prost::Message;
use sensorhub_proto::FirmwareToBackendPacket;
use std::time::Duration;

/// Poll period while waiting for the uplink to come back
const RECONNECT_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UplinkStatus {
    Ok,
    WriteError,
    NotConnected,
}

pub trait Uplink: Send + Sync + 'static {
    /// Send one encoded frame
    fn send(&self, frame: &[u8]) -> UplinkStatus;

    fn is_connected(&self) -> bool;
}

/// Encode and send a packet. A write error while connected is an error,
/// anything else is reported back as status.
pub fn send_packet<U: Uplink + ?Sized>(
    uplink: &U,
    packet: &FirmwareToBackendPacket,
) -> Result<UplinkStatus, HubError> {
    match uplink.send(&packet.encode_to_vec()) {
        UplinkStatus::WriteError if uplink.is_connected() => {
            error!("Uplink write failed while connected");
            Err(HubError::UplinkWrite)
        }
        status => Ok(status),
    }
}

/// Forward a locally taken reading to the backend
pub fn forward_reading<U: Uplink + ?Sized>(
    uplink: &U,
    reading: &Reading,
) -> Result<UplinkStatus, HubError> {
    let status = send_packet(
        uplink,
        &FirmwareToBackendPacket::sensor_data(reading.to_sensor_data()),
    )?;
    if status != UplinkStatus::Ok {
        debug!("Reading from {} not forwarded: {status:?}", reading.address);
    }
    Ok(status)
}

/// Send one keepalive ping
pub fn send_ping<U: Uplink + ?Sized>(uplink: &U) -> Result<UplinkStatus, HubError> {
    send_packet(uplink, &FirmwareToBackendPacket::ping())
}

/// Ping every `interval` while connected. Only returns on a fatal error.
pub fn run_keepalive<U: Uplink + ?Sized>(uplink: &U, interval: Duration) -> HubError {
    loop {
        while !uplink.is_connected() {
            std::thread::sleep(RECONNECT_POLL);
        }
        debug!("Sending ping");
        if let Err(e) = send_ping(uplink) {
            return e;
        }
        std::thread::sleep(interval);
    }
}
