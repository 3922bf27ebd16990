//! BLE central role traits
//!
//! The orchestrator scans and connects through [`Central`] and talks to one
//! connected peripheral through [`Link`]. MCU-specific crates implement
//! both on their BLE stack. Every call may block for seconds, so they only
//! run on the orchestrator and its connection task.

use std::time::Duration;

/// A device seen during a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    pub address: String,
    pub name: Option<String>,
}

/// Capabilities of a remote characteristic
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CharacteristicProps {
    pub can_read: bool,
    pub can_write: bool,
    pub can_notify: bool,
}

/// Called from the BLE stack for every notification
pub type NotifyHandler = Box<dyn FnMut(&[u8]) + Send + Sync + 'static>;

pub trait Central: Send + 'static {
    type Link: Link;
    type Error: std::fmt::Display;

    /// Scan for `duration` and return everything that advertised
    fn scan(&mut self, duration: Duration) -> Result<Vec<Advertisement>, Self::Error>;

    /// Connect to an address seen in the last scan
    fn connect(&mut self, address: &str) -> Result<Self::Link, Self::Error>;
}

pub trait Link: Send + 'static {
    type Error: std::fmt::Display;

    /// Ask for a larger ATT MTU
    fn set_mtu(&mut self, mtu: u16) -> Result<(), Self::Error>;

    /// Whether the peer exposes `service`
    fn has_service(&mut self, service: &str) -> Result<bool, Self::Error>;

    /// Properties of a characteristic, `None` when it does not exist
    fn characteristic(
        &mut self,
        service: &str,
        characteristic: &str,
    ) -> Result<Option<CharacteristicProps>, Self::Error>;

    /// Write with response
    fn write(&mut self, service: &str, characteristic: &str, data: &[u8]) -> Result<(), Self::Error>;

    fn read(&mut self, service: &str, characteristic: &str) -> Result<Vec<u8>, Self::Error>;

    fn subscribe(
        &mut self,
        service: &str,
        characteristic: &str,
        handler: NotifyHandler,
    ) -> Result<(), Self::Error>;

    fn unsubscribe(&mut self, service: &str, characteristic: &str) -> Result<(), Self::Error>;

    fn disconnect(&mut self) -> Result<(), Self::Error>;
}
