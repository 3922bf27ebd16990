//! Device identity
//!
//! A random UUID created on first boot and kept in storage. It names the
//! hub to the backend and, shortened, in BLE advertisements.

use crate::{HubError, Storage};
use log::*;

/// Longest name the advertisement has room for
pub const ADVERTISED_NAME_LEN: usize = 15;

/// Load the identity, creating and persisting one on first boot
pub fn load_or_create_identity<S: Storage>(storage: &mut S) -> Result<String, HubError> {
    if let Some(id) = storage
        .get_identity()
        .map_err(|e| HubError::Storage(e.to_string()))?
    {
        info!("Loaded device identity {id}");
        return Ok(id);
    }

    let id = uuid::Builder::from_random_bytes(rand::random())
        .into_uuid()
        .to_string();
    storage
        .set_identity(&id)
        .map_err(|e| HubError::Storage(e.to_string()))?;
    info!("Generated new device identity {id}");
    Ok(id)
}

/// BLE advertised name for an identity
pub fn advertised_name(identity: &str) -> String {
    format!("ESP-{identity}")
        .chars()
        .take(ADVERTISED_NAME_LEN)
        .collect()
}
