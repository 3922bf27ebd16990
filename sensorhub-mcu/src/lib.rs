//! Sensorhub MCU Library
//!
//! The hub core, free of any particular BLE or WiFi stack.
//!
//! This crate provides:
//! - The GATT command session ([`Session`]) with its framing and drain logic
//! - The shared [`HubContext`]: sensor store, worklist, WiFi link state
//! - The connection [`Orchestrator`] and per-family notification decoders
//! - Traits for the BLE central role, WiFi, persistent storage, clock, and uplink
//!
//! # Example MCU implementations
//! - ESP32: See `sensorhub-esp32`
//!
//! Fatal errors ([`HubError::is_fatal`]) are handed back to the caller,
//! which is expected to restart the device.

pub mod backend;
pub mod central;
pub mod clock;
pub mod config;
pub mod context;
pub mod decode;
pub mod error;
pub mod framing;
pub mod identity;
pub mod model;
pub mod orchestrator;
pub mod session;
pub mod storage;
pub mod store;
pub mod uplink;
pub mod watchdog;
pub mod wifi;
pub mod worklist;

pub use backend::BackendHandler;
pub use central::*;
pub use clock::*;
pub use config::HubConfig;
pub use context::HubContext;
pub use error::*;
pub use model::*;
pub use orchestrator::{CycleOutcome, Orchestrator};
pub use session::Session;
pub use storage::*;
pub use store::SensorStore;
pub use uplink::{Uplink, UplinkStatus};
pub use wifi::*;
pub use worklist::Worklist;
