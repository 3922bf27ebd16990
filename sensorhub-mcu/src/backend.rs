//! Commands arriving from the backend over the uplink

use crate::{
    uplink, Central, DeviceType, HubContext, HubError, Target, TransportError, Uplink,
};
use log::*;
use prost::Message;
use sensorhub_proto::{
    backend_to_firmware_packet, bounded_address, AddSensor, BackendToFirmwarePacket,
    FirmwareToBackendPacket, ProtoError, SensorInfo, SensorsList, MAX_LIST_ENTRIES,
};
use std::sync::{Arc, Mutex, PoisonError};

pub struct BackendHandler<C, U> {
    ctx: Arc<HubContext>,
    central: Arc<Mutex<C>>,
    uplink: Arc<U>,
}

impl<C: Central, U: Uplink> BackendHandler<C, U> {
    pub fn new(ctx: Arc<HubContext>, central: Arc<Mutex<C>>, uplink: Arc<U>) -> Self {
        Self {
            ctx,
            central,
            uplink,
        }
    }

    /// Decode and apply one backend frame
    pub fn handle(&self, frame: &[u8]) -> Result<(), HubError> {
        let packet = BackendToFirmwarePacket::decode(frame)?;
        match packet.r#type.ok_or(ProtoError::EmptyEnvelope)? {
            backend_to_firmware_packet::Type::GetSensorsList(_) => {
                info!("Backend: GetSensorsList");
                self.send_sensors_list()
            }
            backend_to_firmware_packet::Type::ClearSensorList(_) => {
                info!("Backend: ClearSensorList");
                self.ctx.worklist.clear();
                Ok(())
            }
            backend_to_firmware_packet::Type::AddSensor(add) => {
                info!("Backend: AddSensor ({} entries)", add.add_sensor_infos.len());
                self.ctx.worklist.set_devices(&targets(&add)?);
                Ok(())
            }
        }
    }

    /// Scan and report every advertiser, named by address when it has no name
    fn send_sensors_list(&self) -> Result<(), HubError> {
        let seen = self
            .central
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .scan(self.ctx.config.scan_duration())
            .map_err(|e| TransportError::Ble(e.to_string()))?;
        let sensor_infos = seen
            .into_iter()
            .take(MAX_LIST_ENTRIES)
            .map(|ad| SensorInfo {
                name: ad
                    .name
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| ad.address.clone()),
                address: bounded_address(&ad.address),
            })
            .collect();
        let status = uplink::send_packet(
            self.uplink.as_ref(),
            &FirmwareToBackendPacket::sensors_list(SensorsList { sensor_infos }),
        )?;
        debug!("Sensors list sent: {status:?}");
        Ok(())
    }
}

fn targets(add: &AddSensor) -> Result<Vec<Target>, ProtoError> {
    add.add_sensor_infos
        .iter()
        .map(|entry| -> Result<Target, ProtoError> {
            let address = entry
                .sensor_info
                .as_ref()
                .map(|info| bounded_address(&info.address))
                .ok_or(ProtoError::MissingField("sensor_info"))?;
            Ok(Target::new(address, DeviceType::try_from(entry.device_type)?))
        })
        .collect()
}
