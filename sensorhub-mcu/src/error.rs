//! Hub error taxonomy
//!
//! Everything except [`HubError::Transport`] ends with a device restart.

use crate::model::DeviceType;
use sensorhub_proto::ProtoError;

#[derive(thiserror::Error, Debug)]
pub enum HubError {
    #[error("decode error: {0}")]
    Decode(#[from] ProtoError),
    #[error("protocol sequencing error: {0}")]
    Sequencing(#[from] SequencingError),
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("liveness check failed: {0}")]
    Liveness(#[from] LivenessTrip),
    #[error("uplink write failed while connected")]
    UplinkWrite,
    #[error("storage error: {0}")]
    Storage(String),
    #[error("wifi error: {0}")]
    Wifi(String),
}

impl HubError {
    /// Whether the device has to restart to recover
    pub fn is_fatal(&self) -> bool {
        !matches!(self, HubError::Transport(_))
    }
}

impl From<prost::DecodeError> for HubError {
    fn from(e: prost::DecodeError) -> Self {
        HubError::Decode(e.into())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SequencingError {
    #[error("new command started while a response is still undrained")]
    ResponsePending,
    #[error("drain requested in the middle of an incoming frame")]
    DrainMidFrame,
}

/// Failures talking to a remote peripheral. The cycle ends, the hub carries on.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("connect to {0} failed: {1}")]
    Connect(String, String),
    #[error("no known {0:?} service on the peer")]
    ServiceNotFound(DeviceType),
    #[error("characteristic {0} not found")]
    CharacteristicNotFound(String),
    #[error("characteristic {0} cannot be written")]
    NotWritable(String),
    #[error("characteristic {0} cannot be read")]
    NotReadable(String),
    #[error("ble operation failed: {0}")]
    Ble(String),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LivenessTrip {
    #[error("connection task still running after the dwell period")]
    StuckConnectionTask,
    #[error("no reading stored for {0} seconds")]
    StaleData(u64),
}
