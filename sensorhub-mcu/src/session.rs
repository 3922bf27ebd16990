//! GATT protocol session
//!
//! One [`Session`] lives for as long as a central is connected to the hub
//! characteristic. Writes go through [`Session::push`], reads through
//! [`Session::pull`].
//!
//! ```text
//! AwaitingLength --4 bytes--> AwaitingBody --payload--> dispatch
//!   GetWifi              -> DrainStart(scan)
//!   GetWifiConnectState  -> DrainWifiStateStart
//!   everything else      -> AwaitingLength
//! Drain*Start --pull--> length prefix, Draining --pull--> chunks --> AwaitingLength
//! ```

use crate::framing::{FrameReader, LengthPrefix};
use crate::{HubContext, HubError, SequencingError, Storage, Wifi, WifiControl};
use log::*;
use prost::Message;
use sensorhub_proto::{ble_send_packet, length_prefix, BleSendPacket, ProtoError};
use std::sync::Arc;

#[derive(Debug)]
enum Phase {
    AwaitingLength(LengthPrefix),
    AwaitingBody(FrameReader),
    /// Response staged, its length goes out on the next pull
    DrainStart(Vec<u8>),
    /// Link state is read at drain time, not at command time
    DrainWifiStateStart,
    Draining { payload: Vec<u8>, sent: usize },
}

impl Phase {
    fn idle() -> Self {
        Phase::AwaitingLength(LengthPrefix::default())
    }

    fn name(&self) -> &'static str {
        match self {
            Phase::AwaitingLength(_) => "AwaitingLength",
            Phase::AwaitingBody(_) => "AwaitingBody",
            Phase::DrainStart(_) => "DrainStart",
            Phase::DrainWifiStateStart => "DrainWifiStateStart",
            Phase::Draining { .. } => "Draining",
        }
    }
}

pub struct Session<W, S> {
    ctx: Arc<HubContext>,
    wifi: WifiControl<W, S>,
    phase: Phase,
}

impl<W: Wifi, S: Storage> Session<W, S> {
    pub fn new(ctx: Arc<HubContext>, wifi: WifiControl<W, S>) -> Self {
        Self {
            ctx,
            wifi,
            phase: Phase::idle(),
        }
    }

    /// True when no command is partially received and no response is pending
    pub fn is_idle(&self) -> bool {
        matches!(&self.phase, Phase::AwaitingLength(prefix) if prefix.is_empty())
    }

    /// Consume one GATT write completely, dispatching every command it
    /// finishes.
    pub fn push(&mut self, mut data: &[u8]) -> Result<(), HubError> {
        while !data.is_empty() {
            match &mut self.phase {
                Phase::AwaitingLength(prefix) => {
                    let used = prefix.feed(data);
                    data = &data[used..];
                    if let Some(len) = prefix.value() {
                        debug!("Frame of {len} bytes announced");
                        self.phase = Phase::AwaitingBody(FrameReader::new(len)?);
                    }
                }
                Phase::AwaitingBody(reader) => {
                    let used = reader.feed(data);
                    data = &data[used..];
                }
                other => {
                    error!("Write while in {}", other.name());
                    return Err(SequencingError::ResponsePending.into());
                }
            }

            // a zero-length frame completes without consuming body bytes
            if matches!(&self.phase, Phase::AwaitingBody(reader) if reader.is_complete()) {
                if let Phase::AwaitingBody(reader) = std::mem::replace(&mut self.phase, Phase::idle()) {
                    self.dispatch(&reader.into_payload())?;
                }
            }
        }
        Ok(())
    }

    fn dispatch(&mut self, payload: &[u8]) -> Result<(), HubError> {
        let packet = BleSendPacket::decode(payload)?;
        let command = packet.r#type.ok_or(ProtoError::EmptyEnvelope)?;

        self.phase = match command {
            ble_send_packet::Type::GetWifi(_) => {
                info!("Command: GetWifi");
                let networks = self.wifi.scan_vector()?;
                Phase::DrainStart(networks.encode_to_vec())
            }
            ble_send_packet::Type::WifiConnectInfo(info) => {
                info!("Command: WifiConnectInfo");
                self.wifi
                    .connect_async(info.ssid, info.password)
                    .map_err(|e| HubError::Wifi(e.to_string()))?;
                Phase::idle()
            }
            ble_send_packet::Type::GetWifiConnectState(_) => {
                info!("Command: GetWifiConnectState");
                Phase::DrainWifiStateStart
            }
            ble_send_packet::Type::Token(token) => {
                info!("Command: Token");
                self.ctx.set_registration_token(token.uuid);
                Phase::idle()
            }
            ble_send_packet::Type::CrossDevicePacket(relay) => {
                info!("Command: CrossDevicePacket");
                self.ctx.apply_relay(&relay)?;
                Phase::idle()
            }
        };
        debug!("Session phase -> {}", self.phase.name());
        Ok(())
    }

    /// Next chunk of the pending response, at most `max_len` bytes.
    ///
    /// The first pull after a command yields the 4-byte length. `None`
    /// means there is nothing to send. A zero `max_len` mid-drain yields an
    /// empty chunk and leaves the response where it was.
    pub fn pull(&mut self, max_len: usize) -> Result<Option<Vec<u8>>, HubError> {
        match std::mem::replace(&mut self.phase, Phase::idle()) {
            Phase::AwaitingLength(prefix) if prefix.is_empty() => Ok(None),
            phase @ (Phase::AwaitingLength(_) | Phase::AwaitingBody(_)) => {
                error!("Read while in {}", phase.name());
                self.phase = phase;
                Err(SequencingError::DrainMidFrame.into())
            }
            Phase::DrainStart(payload) => Ok(Some(self.start_drain(payload))),
            Phase::DrainWifiStateStart => {
                let state = self.ctx.link_state();
                debug!("Draining WiFi state {state:?}");
                Ok(Some(self.start_drain(state.to_response().encode_to_vec())))
            }
            Phase::Draining { payload, sent } if max_len == 0 => {
                self.phase = Phase::Draining { payload, sent };
                Ok(Some(Vec::new()))
            }
            Phase::Draining { payload, sent } => {
                let end = (sent + max_len).min(payload.len());
                let chunk = payload[sent..end].to_vec();
                if end < payload.len() {
                    self.phase = Phase::Draining { payload, sent: end };
                } else {
                    debug!("Response drained");
                }
                Ok(Some(chunk))
            }
        }
    }

    fn start_drain(&mut self, payload: Vec<u8>) -> Vec<u8> {
        let prefix = length_prefix(payload.len()).to_vec();
        if !payload.is_empty() {
            self.phase = Phase::Draining { payload, sent: 0 };
        }
        prefix
    }
}
