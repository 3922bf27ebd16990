//! BLE GATT UUID tables for the hub and the remote sensor families
//!
//! The hub exposes one service with one read/write/indicate characteristic
//! that carries the framed command protocol. Remote sensors are looked up
//! by family, some families publish the same data under several service
//! UUIDs depending on their firmware version.

/// Hub GATT service, advertised by every hub
pub const SERVICE_UUID: &str = "170e6a4c-af9e-4a1f-843e-e4fb5e165c62";

/// Hub command characteristic (read/write/indicate)
pub const CHARACTERISTIC_UUID: &str = "2630acab-7bf5-4dee-97fb-af8d3955c2aa";

/// Environment sensing boards that notify two raw bytes per reading
pub mod family_a {
    /// Tried in order, the first one present on the peer wins
    pub const SERVICE_UUIDS: &[&str] = &[
        "ef680200-9b35-4933-9b10-52ffa9740042",
        "ef680300-9b35-4933-9b10-52ffa9740042",
        "ef680400-9b35-4933-9b10-52ffa9740042",
        "ef680500-9b35-4933-9b10-52ffa9740042",
    ];
    pub const TEMPERATURE_UUID: &str = "ef680201-9b35-4933-9b10-52ffa9740042";
    pub const HUMIDITY_UUID: &str = "ef680203-9b35-4933-9b10-52ffa9740042";
}

/// Sensor tags that notify a little-endian IEEE-754 float
pub mod family_b {
    pub const SERVICE_UUIDS: &[&str] = &["f000aa00-0451-4000-b000-000000000000"];
    pub const DATA_UUID: &str = "f000aa01-0451-4000-b000-000000000000";
    /// Writing [`ENABLE`] here switches the sensor on
    pub const CONFIG_UUID: &str = "f000aa02-0451-4000-b000-000000000000";
    pub const ENABLE: u8 = 0x01;
}

/// UART-over-BLE bridge in front of the custom sensor board
pub mod serial_bridge {
    pub const SERVICE_UUIDS: &[&str] = &["0000ffe0-0000-1000-8000-00805f9b34fb"];
    pub const DATA_UUID: &str = "0000ffe1-0000-1000-8000-00805f9b34fb";
}

/// Other hubs, reached through their own command characteristic
pub mod peer_hub {
    pub const SERVICE_UUIDS: &[&str] = &[super::SERVICE_UUID];
    pub const DATA_UUID: &str = super::CHARACTERISTIC_UUID;
}
