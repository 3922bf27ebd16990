//! Backend uplink over a WebSocket
//!
//! Outbound frames are binary `FirmwareToBackendPacket`s. Inbound binary
//! frames are handed to a channel for the backend command thread.

use esp_idf_svc::io::EspIOError;
use esp_idf_svc::ws::client::{
    EspWebSocketClient, EspWebSocketClientConfig, FrameType, WebSocketEvent, WebSocketEventType,
};
use esp_idf_svc::sys::EspError;
use log::*;
use sensorhub_mcu::{Uplink, UplinkStatus};
use std::sync::mpsc::Sender;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

pub struct WsUplink {
    client: Mutex<EspWebSocketClient<'static>>,
}

impl WsUplink {
    pub fn connect(url: &str, inbound: Sender<Vec<u8>>) -> Result<Self, EspError> {
        let config = EspWebSocketClientConfig {
            reconnect_timeout_ms: Duration::from_secs(5),
            ..Default::default()
        };
        let client = EspWebSocketClient::new(
            url,
            &config,
            SEND_TIMEOUT,
            move |event: &Result<WebSocketEvent, EspIOError>| match event {
                Ok(event) => match event.event_type {
                    WebSocketEventType::Connected => info!("Uplink connected"),
                    WebSocketEventType::Disconnected => warn!("Uplink disconnected"),
                    WebSocketEventType::Binary(data) => {
                        debug!("Uplink received {} bytes", data.len());
                        let _ = inbound.send(data.to_vec());
                    }
                    _ => {}
                },
                Err(e) => warn!("Uplink error: {e:?}"),
            },
        )?;
        info!("Uplink client started for {url}");
        Ok(Self {
            client: Mutex::new(client),
        })
    }
}

impl Uplink for WsUplink {
    fn send(&self, frame: &[u8]) -> UplinkStatus {
        let mut client = self.client.lock().unwrap_or_else(PoisonError::into_inner);
        if !client.is_connected() {
            return UplinkStatus::NotConnected;
        }
        match client.send(FrameType::Binary(false), frame) {
            Ok(()) => UplinkStatus::Ok,
            Err(e) => {
                error!("Uplink send failed: {e:?}");
                UplinkStatus::WriteError
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.client
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_connected()
    }
}
