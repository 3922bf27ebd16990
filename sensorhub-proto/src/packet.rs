//! GATT command envelope, responses, and the hub-to-hub relay packet
//!
//! Everything written to the hub characteristic is a [`BleSendPacket`]
//! behind a 4 byte little-endian length. Responses ([`WifiVector`],
//! [`WifiConnectResponseInfo`]) are drained back the same way.

/// Device family as it travels on the wire
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum DeviceTypeCode {
    Unspecified = 0,
    FamilyB = 1,
    FamilyA = 2,
    SerialBridge = 3,
    PeerHub = 4,
}

/// Measurement kind as it travels on the wire
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum MeasureTypeCode {
    Unspecified = 0,
    Temperature = 1,
    Humidity = 2,
    Dht22Temperature = 3,
    Dht22Humidity = 4,
    Dht11Temperature = 5,
    Dht11Humidity = 6,
    BridgeTemperature = 7,
}

/// Command envelope written by a phone or a peer hub
#[derive(Clone, PartialEq, prost::Message)]
pub struct BleSendPacket {
    #[prost(oneof = "ble_send_packet::Type", tags = "1, 2, 3, 4, 5")]
    pub r#type: Option<ble_send_packet::Type>,
}

pub mod ble_send_packet {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Type {
        #[prost(message, tag = "1")]
        GetWifi(super::GetWifi),
        #[prost(message, tag = "2")]
        WifiConnectInfo(super::WifiConnectInfo),
        #[prost(message, tag = "3")]
        GetWifiConnectState(super::GetWifiConnectState),
        #[prost(message, tag = "4")]
        Token(super::Token),
        #[prost(message, tag = "5")]
        CrossDevicePacket(super::CrossDevicePacket),
    }
}

impl BleSendPacket {
    pub fn new(command: ble_send_packet::Type) -> Self {
        Self {
            r#type: Some(command),
        }
    }
}

#[derive(Clone, Copy, PartialEq, prost::Message)]
pub struct GetWifi {}

#[derive(Clone, PartialEq, prost::Message)]
pub struct WifiConnectInfo {
    #[prost(string, tag = "1")]
    pub ssid: String,
    #[prost(string, tag = "2")]
    pub password: String,
}

#[derive(Clone, Copy, PartialEq, prost::Message)]
pub struct GetWifiConnectState {}

/// Registration nonce handed over by the companion app
#[derive(Clone, PartialEq, prost::Message)]
pub struct Token {
    #[prost(string, tag = "1")]
    pub uuid: String,
}

/// Worklist and readings relayed from one hub to another
#[derive(Clone, PartialEq, prost::Message)]
pub struct CrossDevicePacket {
    #[prost(message, optional, tag = "1")]
    pub sensor_list: Option<SensorsListInterDevice>,
    #[prost(message, optional, tag = "2")]
    pub values: Option<ValuesInterDeviceList>,
    /// Sender's wall clock, 0 when it has none
    #[prost(int64, tag = "3")]
    pub timestamp: i64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct SensorsListInterDevice {
    #[prost(message, repeated, tag = "1")]
    pub sensor_info: Vec<SensorInfoInterDevice>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct SensorInfoInterDevice {
    #[prost(string, tag = "1")]
    pub address: String,
    #[prost(enumeration = "DeviceTypeCode", tag = "2")]
    pub device_type: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ValuesInterDeviceList {
    #[prost(message, repeated, tag = "1")]
    pub values: Vec<ValuesInterDevice>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ValuesInterDevice {
    #[prost(string, tag = "1")]
    pub address: String,
    #[prost(int64, tag = "2")]
    pub timestamp: i64,
    #[prost(float, tag = "3")]
    pub value: f32,
    #[prost(enumeration = "MeasureTypeCode", tag = "4")]
    pub measure_type: i32,
    #[prost(enumeration = "DeviceTypeCode", tag = "5")]
    pub device_type: i32,
}

/// Response to `GetWifi`
#[derive(Clone, PartialEq, prost::Message)]
pub struct WifiVector {
    #[prost(message, repeated, tag = "1")]
    pub data: Vec<WifiData>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct WifiData {
    #[prost(string, tag = "1")]
    pub ssid: String,
    /// 48-bit BSSID packed little-endian
    #[prost(uint64, tag = "2")]
    pub bssid: u64,
    #[prost(uint32, tag = "3")]
    pub channel: u32,
    #[prost(bool, tag = "4")]
    pub is_encrypted: bool,
}

/// Response to `GetWifiConnectState`
#[derive(Clone, PartialEq, prost::Message)]
pub struct WifiConnectResponseInfo {
    #[prost(oneof = "wifi_connect_response_info::Type", tags = "1, 2, 3")]
    pub r#type: Option<wifi_connect_response_info::Type>,
}

pub mod wifi_connect_response_info {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Type {
        #[prost(message, tag = "1")]
        ConnectingToWifi(super::ConnectingToWifi),
        #[prost(message, tag = "2")]
        ConnectedToWifi(super::ConnectedToWifi),
        #[prost(message, tag = "3")]
        Timeout(super::WifiTimeout),
    }
}

#[derive(Clone, Copy, PartialEq, prost::Message)]
pub struct ConnectingToWifi {}

#[derive(Clone, Copy, PartialEq, prost::Message)]
pub struct ConnectedToWifi {}

#[derive(Clone, Copy, PartialEq, prost::Message)]
pub struct WifiTimeout {}

/// Pack the first six bytes of a BSSID into the wire's u64
pub fn pack_bssid(bssid: &[u8]) -> u64 {
    bssid
        .iter()
        .take(6)
        .enumerate()
        .fold(0u64, |acc, (i, b)| acc | (u64::from(*b) << (8 * i)))
}
