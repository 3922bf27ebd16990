//! BLE command-line tool for sensorhub devices
//!
//! Scans for hubs and runs each GATT command against one of them.

use anyhow::Context;
use clap::{Parser, Subcommand};
use sensorhub_ble_controller::ble::{self, HubLink};
use sensorhub_proto::{
    wifi_connect_response_info, CrossDevicePacket, DeviceTypeCode, SensorInfoInterDevice,
    SensorsListInterDevice,
};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Parser)]
#[command(name = "sensorhub-ble")]
#[command(about = "BLE command-line tool for sensorhub devices")]
struct Cli {
    /// Hub name or address to connect to, the first hub seen otherwise
    #[arg(short, long, global = true)]
    device: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan for hubs
    Scan {
        /// Scan duration in seconds
        #[arg(short = 't', long, default_value = "5")]
        duration: u64,
        /// List every advertiser, not only hubs
        #[arg(short, long)]
        all: bool,
    },
    /// List the WiFi networks a hub can see
    WifiList,
    /// Send WiFi credentials to a hub
    WifiConnect {
        /// WiFi credentials file (SSID on line 1, password on line 2)
        #[arg(short, long, default_value = "wifi_credentials.txt")]
        file: String,
    },
    /// Show the hub's WiFi connection state
    WifiState,
    /// Hand a registration token to a hub
    Register { token: String },
    /// Replace a hub's sensor list, the way a peer hub does
    Relay {
        /// ADDRESS=FAMILY, FAMILY one of family-a, family-b, serial-bridge, peer-hub
        #[arg(short, long = "sensor", value_parser = parse_sensor)]
        sensors: Vec<SensorInfoInterDevice>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let target = cli.device.as_deref();

    match cli.command {
        Commands::Scan { duration, all } => scan(duration, all).await,
        Commands::WifiList => {
            let hub = connect(target).await?;
            let networks = hub.wifi_list().await?;
            println!("{} networks:", networks.data.len());
            for network in networks.data {
                let lock = if network.is_encrypted { " [secured]" } else { "" };
                println!(
                    "  {} ({:012x}) ch {}{}",
                    network.ssid, network.bssid, network.channel, lock
                );
            }
            hub.disconnect().await?;
            Ok(())
        }
        Commands::WifiConnect { file } => {
            let (ssid, password) = read_wifi_credentials(&file)?;
            let hub = connect(target).await?;
            println!("Sending WiFi credentials...");
            println!("  SSID: {ssid}");
            hub.wifi_connect(&ssid, &password).await?;
            println!("Sent. Check progress with `sensorhub-ble wifi-state`.");
            hub.disconnect().await?;
            Ok(())
        }
        Commands::WifiState => {
            let hub = connect(target).await?;
            let state = match hub.wifi_state().await?.r#type {
                Some(wifi_connect_response_info::Type::ConnectingToWifi(_)) => "connecting",
                Some(wifi_connect_response_info::Type::ConnectedToWifi(_)) => "connected",
                Some(wifi_connect_response_info::Type::Timeout(_)) => "timed out",
                None => "unknown",
            };
            println!("WiFi: {state}");
            hub.disconnect().await?;
            Ok(())
        }
        Commands::Register { token } => {
            let hub = connect(target).await?;
            hub.register(&token).await?;
            println!("Token sent.");
            hub.disconnect().await?;
            Ok(())
        }
        Commands::Relay { sensors } => {
            let hub = connect(target).await?;
            let count = sensors.len();
            hub.relay(CrossDevicePacket {
                sensor_list: Some(SensorsListInterDevice {
                    sensor_info: sensors,
                }),
                values: None,
                timestamp: unix_now(),
            })
            .await?;
            println!("Relayed {count} sensors.");
            hub.disconnect().await?;
            Ok(())
        }
    }
}

async fn scan(duration: u64, all: bool) -> anyhow::Result<()> {
    println!("Scanning for hubs ({duration} seconds)...");
    let devices: Vec<_> = ble::scan(duration)
        .await?
        .into_iter()
        .filter(|d| all || d.is_hub)
        .collect();

    println!("\nFound {} devices:", devices.len());
    for device in devices {
        let rssi = device
            .rssi
            .map(|r| format!("{r} dBm"))
            .unwrap_or_else(|| "N/A".to_string());
        let marker = if device.is_hub { " [HUB]" } else { "" };
        println!("  {} ({}) RSSI: {}{}", device.name, device.address, rssi, marker);
    }
    Ok(())
}

async fn connect(target: Option<&str>) -> anyhow::Result<HubLink> {
    println!("Connecting...");
    let hub = HubLink::connect(target).await.context("connect to hub")?;
    println!("Connected!");
    Ok(hub)
}

fn read_wifi_credentials(file: &str) -> anyhow::Result<(String, String)> {
    let content = std::fs::read_to_string(file).with_context(|| format!("read {file}"))?;
    let mut lines = content.lines();
    let ssid = lines
        .next()
        .context("missing SSID in credentials file")?
        .trim()
        .to_string();
    let password = lines
        .next()
        .context("missing password in credentials file")?
        .trim()
        .to_string();
    Ok((ssid, password))
}

fn parse_sensor(arg: &str) -> Result<SensorInfoInterDevice, String> {
    let (address, family) = arg
        .rsplit_once('=')
        .ok_or_else(|| format!("expected ADDRESS=FAMILY, got {arg}"))?;
    let device_type = match family {
        "family-a" => DeviceTypeCode::FamilyA,
        "family-b" => DeviceTypeCode::FamilyB,
        "serial-bridge" => DeviceTypeCode::SerialBridge,
        "peer-hub" => DeviceTypeCode::PeerHub,
        other => return Err(format!("unknown family {other}")),
    };
    Ok(SensorInfoInterDevice {
        address: address.to_string(),
        device_type: device_type as i32,
    })
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
