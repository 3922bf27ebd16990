//! Packets exchanged with the cloud backend over the uplink

use crate::packet::{DeviceTypeCode, MeasureTypeCode};

/// Everything the hub sends upstream
#[derive(Clone, PartialEq, prost::Message)]
pub struct FirmwareToBackendPacket {
    #[prost(oneof = "firmware_to_backend_packet::Type", tags = "1, 2, 17")]
    pub r#type: Option<firmware_to_backend_packet::Type>,
}

pub mod firmware_to_backend_packet {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Type {
        #[prost(message, tag = "1")]
        Ping(super::Ping),
        #[prost(message, tag = "2")]
        SensorData(super::SensorData),
        #[prost(message, tag = "17")]
        SensorsList(super::SensorsList),
    }
}

impl FirmwareToBackendPacket {
    pub fn ping() -> Self {
        Self {
            r#type: Some(firmware_to_backend_packet::Type::Ping(Ping {})),
        }
    }

    pub fn sensor_data(data: SensorData) -> Self {
        Self {
            r#type: Some(firmware_to_backend_packet::Type::SensorData(data)),
        }
    }

    pub fn sensors_list(list: SensorsList) -> Self {
        Self {
            r#type: Some(firmware_to_backend_packet::Type::SensorsList(list)),
        }
    }
}

#[derive(Clone, Copy, PartialEq, prost::Message)]
pub struct Ping {}

/// One reading taken by this hub
#[derive(Clone, PartialEq, prost::Message)]
pub struct SensorData {
    #[prost(string, tag = "1")]
    pub address: String,
    #[prost(enumeration = "MeasureTypeCode", tag = "2")]
    pub data_type: i32,
    #[prost(float, tag = "3")]
    pub value: f32,
    #[prost(int64, tag = "4")]
    pub timestamp: i64,
}

/// Devices seen by an on-demand scan
#[derive(Clone, PartialEq, prost::Message)]
pub struct SensorsList {
    #[prost(message, repeated, tag = "1")]
    pub sensor_infos: Vec<SensorInfo>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct SensorInfo {
    #[prost(string, tag = "1")]
    pub address: String,
    #[prost(string, tag = "2")]
    pub name: String,
}

/// Everything the backend sends down
#[derive(Clone, PartialEq, prost::Message)]
pub struct BackendToFirmwarePacket {
    #[prost(oneof = "backend_to_firmware_packet::Type", tags = "2, 3, 4")]
    pub r#type: Option<backend_to_firmware_packet::Type>,
}

pub mod backend_to_firmware_packet {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Type {
        #[prost(message, tag = "2")]
        GetSensorsList(super::GetSensorsList),
        #[prost(message, tag = "3")]
        ClearSensorList(super::ClearSensorList),
        #[prost(message, tag = "4")]
        AddSensor(super::AddSensor),
    }
}

#[derive(Clone, Copy, PartialEq, prost::Message)]
pub struct GetSensorsList {}

#[derive(Clone, Copy, PartialEq, prost::Message)]
pub struct ClearSensorList {}

/// Replaces the hub's worklist
#[derive(Clone, PartialEq, prost::Message)]
pub struct AddSensor {
    #[prost(message, repeated, tag = "1")]
    pub add_sensor_infos: Vec<AddSensorInfo>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct AddSensorInfo {
    #[prost(message, optional, tag = "1")]
    pub sensor_info: Option<SensorInfo>,
    #[prost(enumeration = "DeviceTypeCode", tag = "2")]
    pub device_type: i32,
}
