//! Sensorhub BLE Controller
//!
//! BLE client for provisioning and driving sensorhub devices over their
//! framed GATT command characteristic.
//!
//! # Example
//!
//! ```ignore
//! use sensorhub_ble_controller::ble;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ble::ControllerError> {
//!     // Scan for hubs
//!     for device in ble::scan(5).await?.iter().filter(|d| d.is_hub) {
//!         println!("{} ({})", device.name, device.address);
//!     }
//!
//!     // Ask a hub which networks it can see
//!     let hub = ble::HubLink::connect(None).await?;
//!     for network in hub.wifi_list().await?.data {
//!         println!("{}", network.ssid);
//!     }
//!     hub.disconnect().await?;
//!     Ok(())
//! }
//! ```

pub mod ble;
