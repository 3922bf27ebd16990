//! Device families, measurement kinds, and readings

use sensorhub_proto::{
    bounded_address, DeviceTypeCode, MeasureTypeCode, ProtoError, SensorData,
    SensorInfoInterDevice, ValuesInterDevice,
};

/// Remote hardware family, picks the UUID table and the notification decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeviceType {
    /// Four service variants depending on firmware version, 2-byte readings
    FamilyA,
    /// Raw IEEE-754 readings after a config write
    FamilyB,
    /// Microcontroller behind a UART bridge, NUL-terminated text tokens
    SerialBridge,
    /// Another hub running this firmware
    PeerHub,
}

impl DeviceType {
    pub fn code(self) -> DeviceTypeCode {
        match self {
            DeviceType::FamilyA => DeviceTypeCode::FamilyA,
            DeviceType::FamilyB => DeviceTypeCode::FamilyB,
            DeviceType::SerialBridge => DeviceTypeCode::SerialBridge,
            DeviceType::PeerHub => DeviceTypeCode::PeerHub,
        }
    }
}

impl TryFrom<i32> for DeviceType {
    type Error = ProtoError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match DeviceTypeCode::try_from(value) {
            Ok(DeviceTypeCode::FamilyA) => Ok(DeviceType::FamilyA),
            Ok(DeviceTypeCode::FamilyB) => Ok(DeviceType::FamilyB),
            Ok(DeviceTypeCode::SerialBridge) => Ok(DeviceType::SerialBridge),
            Ok(DeviceTypeCode::PeerHub) => Ok(DeviceType::PeerHub),
            Ok(DeviceTypeCode::Unspecified) | Err(_) => Err(ProtoError::UnknownDeviceType(value)),
        }
    }
}

/// What a reading measures. Part of the store key, so one address can
/// hold several readings at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MeasureKind {
    Temperature,
    Humidity,
    Dht22Temperature,
    Dht22Humidity,
    Dht11Temperature,
    Dht11Humidity,
    /// The bridge microcontroller's own die sensor
    BridgeTemperature,
}

impl MeasureKind {
    pub fn code(self) -> MeasureTypeCode {
        match self {
            MeasureKind::Temperature => MeasureTypeCode::Temperature,
            MeasureKind::Humidity => MeasureTypeCode::Humidity,
            MeasureKind::Dht22Temperature => MeasureTypeCode::Dht22Temperature,
            MeasureKind::Dht22Humidity => MeasureTypeCode::Dht22Humidity,
            MeasureKind::Dht11Temperature => MeasureTypeCode::Dht11Temperature,
            MeasureKind::Dht11Humidity => MeasureTypeCode::Dht11Humidity,
            MeasureKind::BridgeTemperature => MeasureTypeCode::BridgeTemperature,
        }
    }

    /// Kind selected by the leading letter of a serial-bridge token
    pub fn from_bridge_letter(letter: u8) -> Option<Self> {
        match letter {
            b'H' => Some(MeasureKind::Dht22Humidity),
            b'T' => Some(MeasureKind::Dht22Temperature),
            b'h' => Some(MeasureKind::Dht11Humidity),
            b't' => Some(MeasureKind::Dht11Temperature),
            b'p' => Some(MeasureKind::BridgeTemperature),
            _ => None,
        }
    }

    pub fn is_temperature(self) -> bool {
        matches!(
            self,
            MeasureKind::Temperature
                | MeasureKind::Dht22Temperature
                | MeasureKind::Dht11Temperature
                | MeasureKind::BridgeTemperature
        )
    }
}

impl TryFrom<i32> for MeasureKind {
    type Error = ProtoError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match MeasureTypeCode::try_from(value) {
            Ok(MeasureTypeCode::Temperature) => Ok(MeasureKind::Temperature),
            Ok(MeasureTypeCode::Humidity) => Ok(MeasureKind::Humidity),
            Ok(MeasureTypeCode::Dht22Temperature) => Ok(MeasureKind::Dht22Temperature),
            Ok(MeasureTypeCode::Dht22Humidity) => Ok(MeasureKind::Dht22Humidity),
            Ok(MeasureTypeCode::Dht11Temperature) => Ok(MeasureKind::Dht11Temperature),
            Ok(MeasureTypeCode::Dht11Humidity) => Ok(MeasureKind::Dht11Humidity),
            Ok(MeasureTypeCode::BridgeTemperature) => Ok(MeasureKind::BridgeTemperature),
            Ok(MeasureTypeCode::Unspecified) | Err(_) => {
                Err(ProtoError::UnknownMeasureType(value))
            }
        }
    }
}

/// Store key: one reading per address and kind
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreKey {
    pub address: String,
    pub kind: MeasureKind,
}

/// A single measurement. Replaced wholesale on update.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    /// Unix seconds, 0 when the clock was unset
    pub timestamp: i64,
    pub address: String,
    pub device_type: DeviceType,
    pub value: f32,
    pub kind: MeasureKind,
}

impl Reading {
    pub fn key(&self) -> StoreKey {
        StoreKey {
            address: self.address.clone(),
            kind: self.kind,
        }
    }

    /// Relay entry with the address cut to the wire field width
    pub fn to_relay_value(&self) -> ValuesInterDevice {
        ValuesInterDevice {
            address: bounded_address(&self.address),
            timestamp: self.timestamp,
            value: self.value,
            measure_type: self.kind.code() as i32,
            device_type: self.device_type.code() as i32,
        }
    }

    pub fn to_sensor_data(&self) -> SensorData {
        SensorData {
            address: bounded_address(&self.address),
            data_type: self.kind.code() as i32,
            value: self.value,
            timestamp: self.timestamp,
        }
    }
}

impl TryFrom<&ValuesInterDevice> for Reading {
    type Error = ProtoError;

    fn try_from(v: &ValuesInterDevice) -> Result<Self, Self::Error> {
        Ok(Reading {
            timestamp: v.timestamp,
            address: bounded_address(&v.address),
            device_type: DeviceType::try_from(v.device_type)?,
            value: v.value,
            kind: MeasureKind::try_from(v.measure_type)?,
        })
    }
}

/// One worklist entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    pub address: String,
    pub device_type: DeviceType,
}

impl Target {
    pub fn new(address: impl Into<String>, device_type: DeviceType) -> Self {
        Self {
            address: address.into(),
            device_type,
        }
    }

    pub fn to_relay_info(&self) -> SensorInfoInterDevice {
        SensorInfoInterDevice {
            address: bounded_address(&self.address),
            device_type: self.device_type.code() as i32,
        }
    }
}

impl TryFrom<&SensorInfoInterDevice> for Target {
    type Error = ProtoError;

    fn try_from(info: &SensorInfoInterDevice) -> Result<Self, Self::Error> {
        Ok(Target::new(
            bounded_address(&info.address),
            DeviceType::try_from(info.device_type)?,
        ))
    }
}
