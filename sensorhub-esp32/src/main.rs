//! Sensorhub firmware for ESP32
//!
//! Serves the hub GATT service to phones and peer hubs, cycles through the
//! configured BLE sensors, and forwards their readings to the backend over
//! WiFi. Any fatal error restarts the device.

mod central;
mod clock;
mod gatt;
mod storage;
mod uplink;
mod wifi;

use esp_idf_svc::{
    eventloop::EspSystemEventLoop, hal::prelude::Peripherals, nvs::EspDefaultNvsPartition,
    wifi::EspWifi,
};
use log::*;
use sensorhub_mcu::{
    identity, uplink as hub_uplink, BackendHandler, HubConfig, HubContext, HubError, Orchestrator,
    Storage, WifiControl,
};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const BACKEND_URL: &str = "ws://sensorhub.local:8080/hub";

/// How often the main loop looks for a registration token
const MAIN_TICK: Duration = Duration::from_secs(1);

fn main() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    info!("Sensorhub v{}", env!("CARGO_PKG_VERSION"));

    let peripherals = Peripherals::take()?;
    let sys_loop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    let mut storage = storage::NvsStorage::open(&nvs)?;
    let device_id = identity::load_or_create_identity(&mut storage)?;
    info!("Device ID: {device_id}");
    let config = load_config(&storage);
    let credentials = storage.get_wifi_credentials()?;

    let ctx = Arc::new(HubContext::new(
        config,
        Arc::new(clock::SystemClock::default()),
    ));

    let wifi = wifi::StationWifi::start(EspWifi::new(peripherals.modem, sys_loop, Some(nvs))?)?;
    let wifi_control = WifiControl::new(
        Arc::new(Mutex::new(wifi)),
        Arc::new(Mutex::new(storage)),
        ctx.clone(),
    );
    match credentials {
        Some((ssid, password)) => {
            info!("Joining saved network {ssid}");
            wifi_control.connect_async(ssid, password)?;
        }
        None => info!("No saved WiFi, waiting for provisioning over BLE"),
    }

    let (fatal_tx, fatal_rx) = mpsc::channel::<HubError>();
    gatt::start_gatt_server(
        &identity::advertised_name(&device_id),
        ctx.clone(),
        wifi_control,
        fatal_tx.clone(),
    )?;

    let (inbound_tx, inbound_rx) = mpsc::channel::<Vec<u8>>();
    let uplink = Arc::new(uplink::WsUplink::connect(
        &format!("{BACKEND_URL}?id={device_id}"),
        inbound_tx,
    )?);
    let central = Arc::new(Mutex::new(central::NimbleCentral));

    let orchestrator = Orchestrator::new(ctx.clone(), central.clone(), uplink.clone());
    let tx = fatal_tx.clone();
    std::thread::Builder::new()
        .name("orchestrator".into())
        .stack_size(16 * 1024)
        .spawn(move || {
            let _ = tx.send(orchestrator.run());
        })?;

    let keepalive_uplink = uplink.clone();
    let interval = ctx.config.keepalive_interval();
    let tx = fatal_tx.clone();
    std::thread::Builder::new()
        .name("keepalive".into())
        .spawn(move || {
            let _ = tx.send(hub_uplink::run_keepalive(keepalive_uplink.as_ref(), interval));
        })?;

    let backend = BackendHandler::new(ctx.clone(), central, uplink);
    let tx = fatal_tx;
    std::thread::Builder::new()
        .name("backend".into())
        .stack_size(16 * 1024)
        .spawn(move || {
            for frame in inbound_rx {
                match backend.handle(&frame) {
                    Ok(()) => {}
                    Err(e) if !e.is_fatal() => warn!("Backend command failed: {e}"),
                    Err(e) => {
                        let _ = tx.send(e);
                        return;
                    }
                }
            }
        })?;

    loop {
        match fatal_rx.recv_timeout(MAIN_TICK) {
            Ok(e) => {
                error!("Fatal: {e}, restarting");
                restart();
            }
            Err(RecvTimeoutError::Disconnected) => {
                error!("All tasks gone, restarting");
                restart();
            }
            Err(RecvTimeoutError::Timeout) => {}
        }
        if let Some(token) = ctx.take_registration_token() {
            info!("=== REGISTRATION ===");
            info!("  device: {device_id}");
            info!("  token:  {token}");
            info!("====================");
        }
    }
}

/// JSON override from NVS, defaults when absent or unreadable
fn load_config(storage: &storage::NvsStorage) -> HubConfig {
    match storage.get_config() {
        Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
            Ok(config) => {
                info!("Loaded config override from NVS");
                config
            }
            Err(e) => {
                warn!("Ignoring bad config in NVS: {e}");
                HubConfig::default()
            }
        },
        Ok(None) => HubConfig::default(),
        Err(e) => {
            warn!("Failed to read config from NVS: {e:?}");
            HubConfig::default()
        }
    }
}

fn restart() -> ! {
    std::thread::sleep(Duration::from_millis(100));
    esp_idf_svc::hal::reset::restart()
}
