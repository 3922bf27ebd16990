//! Persistent Storage Abstraction Traits
//!
//! Device identity and Wi-Fi credentials survive reboots behind this trait.

/// Trait for persistent storage operations
///
/// MCU-specific crates implement this trait using their storage backend
/// (NVS for ESP32, an in-memory map in tests).
pub trait Storage: Send + 'static {
    /// Error type for storage operations
    type Error: std::fmt::Display;

    /// Get the stable device identity
    fn get_identity(&self) -> Result<Option<String>, Self::Error>;

    /// Save the device identity
    fn set_identity(&mut self, identity: &str) -> Result<(), Self::Error>;

    /// Get WiFi credentials (SSID, password)
    fn get_wifi_credentials(&self) -> Result<Option<(String, String)>, Self::Error>;

    /// Save WiFi credentials
    fn set_wifi_credentials(&mut self, ssid: &str, password: &str) -> Result<(), Self::Error>;

    /// Get the JSON config override, if one was stored
    fn get_config(&self) -> Result<Option<Vec<u8>>, Self::Error>;
}
