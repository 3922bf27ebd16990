//! Hub GATT server
//!
//! One service with one read/write/indicate characteristic. Writes feed the
//! session, reads drain its staged response. A session lives exactly as long
//! as the connection that created it.

use crate::storage::NvsStorage;
use crate::wifi::StationWifi;
use anyhow::anyhow;
use esp32_nimble::utilities::BleUuid;
use esp32_nimble::{BLEAdvertisementData, BLEDevice, NimbleProperties};
use log::*;
use sensorhub_mcu::{HubContext, HubError, Session, WifiControl};
use sensorhub_proto::ble::{CHARACTERISTIC_UUID, SERVICE_UUID};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, PoisonError};

type HubSession = Session<StationWifi, NvsStorage>;

fn uuid(s: &str) -> anyhow::Result<BleUuid> {
    BleUuid::from_uuid128_string(s).map_err(|e| anyhow!("bad uuid {s}: {e:?}"))
}

/// Start advertising as `device_name` and serve the command characteristic.
/// Session errors are fatal and go to `fatal`.
pub fn start_gatt_server(
    device_name: &str,
    ctx: Arc<HubContext>,
    wifi: WifiControl<StationWifi, NvsStorage>,
    fatal: Sender<HubError>,
) -> anyhow::Result<()> {
    let session: Arc<Mutex<Option<HubSession>>> = Arc::new(Mutex::new(None));
    let chunk_len = ctx.config.gatt_chunk_len;

    let ble_device = BLEDevice::take();
    BLEDevice::set_device_name(device_name).map_err(|e| anyhow!("set name: {e:?}"))?;
    let server = ble_device.get_server();

    let on_connect = session.clone();
    server.on_connect(move |server, desc| {
        info!("BLE client connected");
        let _ = server.update_conn_params(desc.conn_handle(), 24, 48, 0, 60);
        *on_connect.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(Session::new(ctx.clone(), wifi.clone()));
    });

    let on_disconnect = session.clone();
    server.on_disconnect(move |_desc, _reason| {
        info!("BLE client disconnected");
        on_disconnect
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    });

    let service = server.create_service(uuid(SERVICE_UUID)?);
    let characteristic = service.lock().create_characteristic(
        uuid(CHARACTERISTIC_UUID)?,
        NimbleProperties::READ | NimbleProperties::WRITE | NimbleProperties::INDICATE,
    );

    let on_write = session.clone();
    let write_fatal = fatal.clone();
    characteristic.lock().on_write(move |args| {
        let mut guard = on_write.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(session) = guard.as_mut() else {
            warn!("Write without a session");
            return;
        };
        if let Err(e) = session.push(args.recv_data()) {
            error!("Session write failed: {e}");
            let _ = write_fatal.send(e);
        }
    });

    let on_read = session;
    characteristic.lock().on_read(move |value, _desc| {
        let mut guard = on_read.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(session) = guard.as_mut() else {
            value.set_value(&[]);
            return;
        };
        match session.pull(chunk_len) {
            Ok(chunk) => value.set_value(&chunk.unwrap_or_default()),
            Err(e) => {
                error!("Session read failed: {e}");
                value.set_value(&[]);
                let _ = fatal.send(e);
            }
        }
    });

    let advertising = ble_device.get_advertising();
    advertising
        .lock()
        .set_data(
            BLEAdvertisementData::new()
                .name(device_name)
                .add_service_uuid(uuid(SERVICE_UUID)?),
        )
        .map_err(|e| anyhow!("advertising data: {e:?}"))?;
    advertising
        .lock()
        .start()
        .map_err(|e| anyhow!("start advertising: {e:?}"))?;
    info!("BLE advertising started as '{device_name}'");
    Ok(())
}
