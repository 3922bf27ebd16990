//! Orchestrator cycles against fake peripherals.

mod common;

use common::{context, fast_config, FakeCentral, FakeDevice, RecordingUplink};
use prost::Message;
use sensorhub_mcu::{
    BackendHandler, CycleOutcome, DeviceType, HubConfig, HubError, LivenessTrip, MeasureKind,
    Orchestrator, Target,
};
use sensorhub_proto::ble::{family_a, family_b, peer_hub, serial_bridge};
use sensorhub_proto::{
    backend_to_firmware_packet, ble_send_packet, firmware_to_backend_packet, AddSensor,
    AddSensorInfo, BackendToFirmwarePacket, BleSendPacket, ClearSensorList, DeviceTypeCode,
    FirmwareToBackendPacket, GetSensorsList, SensorInfo,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct Rig {
    ctx: Arc<sensorhub_mcu::HubContext>,
    central: Arc<Mutex<FakeCentral>>,
    uplink: Arc<RecordingUplink>,
    orchestrator: Orchestrator<FakeCentral, RecordingUplink>,
}

fn rig(config: HubConfig, devices: Vec<FakeDevice>, uplink: RecordingUplink) -> Rig {
    let ctx = context(config);
    let central = Arc::new(Mutex::new(FakeCentral::new(devices)));
    let uplink = Arc::new(uplink);
    Rig {
        orchestrator: Orchestrator::new(ctx.clone(), central.clone(), uplink.clone()),
        ctx,
        central,
        uplink,
    }
}

fn family_a_device(address: &str) -> FakeDevice {
    FakeDevice::new(address)
        .service(family_a::SERVICE_UUIDS[2])
        .notify(family_a::TEMPERATURE_UUID, &[&[20, 50]])
        .notify(family_a::HUMIDITY_UUID, &[&[41, 0]])
}

#[test]
fn empty_worklist_idles() {
    let r = rig(fast_config(), vec![], RecordingUplink::connected());
    assert_eq!(r.orchestrator.run_cycle().unwrap(), CycleOutcome::Idle);
}

#[test]
fn absent_target_is_skipped_and_rotated() {
    let r = rig(
        fast_config(),
        vec![family_a_device("aa:00")],
        RecordingUplink::connected(),
    );
    let missing = Target::new("bb:00", DeviceType::FamilyA);
    let present = Target::new("aa:00", DeviceType::FamilyA);
    r.ctx.worklist.set_devices(&[missing.clone(), present.clone()]);

    assert_eq!(
        r.orchestrator.run_cycle().unwrap(),
        CycleOutcome::NotSeen(missing.clone())
    );
    assert_eq!(r.ctx.worklist.snapshot(), vec![present, missing]);
    assert!(r.central.lock().unwrap().log.lock().unwrap().subscribed.is_empty());
}

#[test]
fn family_a_visit_stores_and_forwards() {
    let r = rig(
        fast_config(),
        vec![family_a_device("aa:01")],
        RecordingUplink::connected(),
    );
    let target = Target::new("aa:01", DeviceType::FamilyA);
    r.ctx.worklist.set_devices(&[target.clone()]);

    assert_eq!(r.orchestrator.run_cycle().unwrap(), CycleOutcome::Visited(target));

    let readings = r.ctx.store.snapshot(64);
    assert_eq!(readings.len(), 2);
    let temperature = readings
        .iter()
        .find(|r| r.kind == MeasureKind::Temperature)
        .unwrap();
    assert_eq!(temperature.value, "20.50".parse::<f32>().unwrap());

    let frames = r.uplink.frames();
    assert_eq!(frames.len(), 2);
    let first = FirmwareToBackendPacket::decode(frames[0].as_slice()).unwrap();
    assert!(matches!(
        first.r#type,
        Some(firmware_to_backend_packet::Type::SensorData(ref d)) if d.address == "aa:01"
    ));

    let central = r.central.lock().unwrap();
    let log = central.log.lock().unwrap();
    assert_eq!(log.mtu, Some(517));
    assert_eq!(log.subscribed.len(), 2);
    assert_eq!(log.unsubscribed, log.subscribed);
    assert!(log.disconnected);
}

#[test]
fn family_b_is_enabled_before_subscribing() {
    let device = FakeDevice::new("b0:01")
        .service(family_b::SERVICE_UUIDS[0])
        .writable(family_b::CONFIG_UUID)
        .notify(family_b::DATA_UUID, &[&19.75f32.to_le_bytes()]);
    let r = rig(fast_config(), vec![device], RecordingUplink::connected());
    r.ctx
        .worklist
        .set_devices(&[Target::new("b0:01", DeviceType::FamilyB)]);

    assert!(matches!(
        r.orchestrator.run_cycle().unwrap(),
        CycleOutcome::Visited(_)
    ));
    let central = r.central.lock().unwrap();
    let log = central.log.lock().unwrap();
    assert_eq!(
        log.writes,
        vec![(family_b::CONFIG_UUID.to_string(), vec![family_b::ENABLE])]
    );
    assert_eq!(r.ctx.store.snapshot(1)[0].value, 19.75);
}

#[test]
fn family_b_without_config_is_a_transport_failure() {
    let device = FakeDevice::new("b0:02")
        .service(family_b::SERVICE_UUIDS[0])
        .notify(family_b::DATA_UUID, &[]);
    let r = rig(fast_config(), vec![device], RecordingUplink::connected());
    let target = Target::new("b0:02", DeviceType::FamilyB);
    r.ctx.worklist.set_devices(&[target.clone()]);

    assert_eq!(
        r.orchestrator.run_cycle().unwrap(),
        CycleOutcome::TransportFailed(target)
    );
    assert!(r.central.lock().unwrap().log.lock().unwrap().disconnected);
}

#[test]
fn family_b_config_must_be_readable() {
    let device = FakeDevice::new("b0:03")
        .service(family_b::SERVICE_UUIDS[0])
        .write_only(family_b::CONFIG_UUID)
        .notify(family_b::DATA_UUID, &[&19.75f32.to_le_bytes()]);
    let r = rig(fast_config(), vec![device], RecordingUplink::connected());
    let target = Target::new("b0:03", DeviceType::FamilyB);
    r.ctx.worklist.set_devices(&[target.clone()]);

    assert_eq!(
        r.orchestrator.run_cycle().unwrap(),
        CycleOutcome::TransportFailed(target)
    );
    let central = r.central.lock().unwrap();
    let log = central.log.lock().unwrap();
    assert!(log.writes.is_empty());
    assert!(log.subscribed.is_empty());
    assert!(r.ctx.store.is_empty());
}

#[test]
fn wrong_family_service_is_a_transport_failure() {
    let r = rig(
        fast_config(),
        vec![family_a_device("aa:02")],
        RecordingUplink::connected(),
    );
    let target = Target::new("aa:02", DeviceType::SerialBridge);
    r.ctx.worklist.set_devices(&[target.clone()]);

    assert_eq!(
        r.orchestrator.run_cycle().unwrap(),
        CycleOutcome::TransportFailed(target)
    );
    let central = r.central.lock().unwrap();
    let log = central.log.lock().unwrap();
    assert!(log.subscribed.is_empty());
    assert!(log.disconnected);
}

#[test]
fn serial_bridge_tokens_span_notifications() {
    let device = FakeDevice::new("5e:01")
        .service(serial_bridge::SERVICE_UUIDS[0])
        .notify(serial_bridge::DATA_UUID, &[b"T23", b".5\0h4", b"0\0"]);
    let r = rig(fast_config(), vec![device], RecordingUplink::connected());
    r.ctx
        .worklist
        .set_devices(&[Target::new("5e:01", DeviceType::SerialBridge)]);

    r.orchestrator.run_cycle().unwrap();
    let kinds: Vec<_> = r
        .ctx
        .store
        .snapshot(64)
        .iter()
        .map(|r| (r.kind, r.value))
        .collect();
    assert_eq!(
        kinds,
        vec![
            (MeasureKind::Dht22Temperature, 23.5),
            (MeasureKind::Dht11Humidity, 40.0)
        ]
    );
}

#[test]
fn peer_hub_gets_length_then_relay_packet() {
    let device = FakeDevice::new("hub:02")
        .service(peer_hub::SERVICE_UUIDS[0])
        .writable(peer_hub::DATA_UUID);
    let r = rig(fast_config(), vec![device], RecordingUplink::connected());
    r.ctx.worklist.set_devices(&[
        Target::new("hub:02", DeviceType::PeerHub),
        Target::new("aa:03", DeviceType::FamilyA),
    ]);

    assert!(matches!(
        r.orchestrator.run_cycle().unwrap(),
        CycleOutcome::Visited(_)
    ));

    let central = r.central.lock().unwrap();
    let log = central.log.lock().unwrap();
    assert_eq!(log.writes.len(), 2);
    let (length, payload) = (&log.writes[0].1, &log.writes[1].1);
    assert_eq!(length, &(payload.len() as u32).to_le_bytes().to_vec());

    let packet = BleSendPacket::decode(payload.as_slice()).unwrap();
    let Some(ble_send_packet::Type::CrossDevicePacket(relay)) = packet.r#type else {
        panic!("expected a relay packet");
    };
    let sensors = relay.sensor_list.unwrap().sensor_info;
    assert_eq!(sensors.len(), 2);
    assert!(log.subscribed.is_empty());
}

#[test]
fn stuck_connection_task_trips_liveness() {
    let mut device = family_a_device("aa:04");
    device.connect_delay = Duration::from_millis(500);
    let config = HubConfig {
        dwell_ms: 10,
        dwell_grace_ms: 10,
        ..fast_config()
    };
    let r = rig(config, vec![device], RecordingUplink::connected());
    r.ctx
        .worklist
        .set_devices(&[Target::new("aa:04", DeviceType::FamilyA)]);

    assert!(matches!(
        r.orchestrator.run_cycle(),
        Err(HubError::Liveness(LivenessTrip::StuckConnectionTask))
    ));
}

#[test]
fn silent_sensor_trips_staleness() {
    let device = FakeDevice::new("aa:05")
        .service(family_a::SERVICE_UUIDS[0])
        .notify(family_a::TEMPERATURE_UUID, &[]);
    let config = HubConfig {
        watchdog_window_secs: 0,
        ..fast_config()
    };
    let r = rig(config, vec![device], RecordingUplink::connected());
    r.ctx
        .worklist
        .set_devices(&[Target::new("aa:05", DeviceType::FamilyA)]);

    let err = r.orchestrator.run_cycle().unwrap_err();
    assert!(matches!(err, HubError::Liveness(LivenessTrip::StaleData(_))));
    assert!(err.is_fatal());
}

#[test]
fn uplink_write_error_is_fatal() {
    let r = rig(
        fast_config(),
        vec![family_a_device("aa:06")],
        RecordingUplink::failing(),
    );
    r.ctx
        .worklist
        .set_devices(&[Target::new("aa:06", DeviceType::FamilyA)]);

    assert!(matches!(
        r.orchestrator.run_cycle(),
        Err(HubError::UplinkWrite)
    ));
    // cleanup still ran
    assert!(r.central.lock().unwrap().log.lock().unwrap().disconnected);
}

#[test]
fn run_returns_only_the_fatal_error() {
    let r = rig(
        fast_config(),
        vec![family_a_device("aa:07")],
        RecordingUplink::failing(),
    );
    r.ctx.worklist.set_devices(&[
        Target::new("nowhere", DeviceType::FamilyA),
        Target::new("aa:07", DeviceType::FamilyA),
    ]);
    assert!(matches!(r.orchestrator.run(), HubError::UplinkWrite));
}

fn backend_frame(command: backend_to_firmware_packet::Type) -> Vec<u8> {
    BackendToFirmwarePacket {
        r#type: Some(command),
    }
    .encode_to_vec()
}

#[test]
fn backend_commands_drive_the_worklist() {
    let mut named = family_a_device("aa:08");
    named.name = Some("Thingy".into());
    let r = rig(
        fast_config(),
        vec![named, FakeDevice::new("aa:09")],
        RecordingUplink::connected(),
    );
    let backend = BackendHandler::new(r.ctx.clone(), r.central.clone(), r.uplink.clone());

    backend
        .handle(&backend_frame(backend_to_firmware_packet::Type::AddSensor(
            AddSensor {
                add_sensor_infos: vec![AddSensorInfo {
                    sensor_info: Some(SensorInfo {
                        address: "aa:08".into(),
                        name: "Thingy".into(),
                    }),
                    device_type: DeviceTypeCode::FamilyA as i32,
                }],
            },
        )))
        .unwrap();
    assert_eq!(
        r.ctx.worklist.snapshot(),
        vec![Target::new("aa:08", DeviceType::FamilyA)]
    );

    backend
        .handle(&backend_frame(backend_to_firmware_packet::Type::GetSensorsList(
            GetSensorsList {},
        )))
        .unwrap();
    let reply = FirmwareToBackendPacket::decode(r.uplink.frames()[0].as_slice()).unwrap();
    let Some(firmware_to_backend_packet::Type::SensorsList(list)) = reply.r#type else {
        panic!("expected a sensors list");
    };
    let names: Vec<_> = list.sensor_infos.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["Thingy", "aa:09"]);

    backend
        .handle(&backend_frame(backend_to_firmware_packet::Type::ClearSensorList(
            ClearSensorList {},
        )))
        .unwrap();
    assert!(r.ctx.worklist.is_empty());
}

#[test]
fn backend_rejects_unspecified_family() {
    let r = rig(fast_config(), vec![], RecordingUplink::connected());
    let backend = BackendHandler::new(r.ctx.clone(), r.central.clone(), r.uplink.clone());
    let err = backend
        .handle(&backend_frame(backend_to_firmware_packet::Type::AddSensor(
            AddSensor {
                add_sensor_infos: vec![AddSensorInfo {
                    sensor_info: Some(SensorInfo::default()),
                    device_type: 0,
                }],
            },
        )))
        .unwrap_err();
    assert!(matches!(err, HubError::Decode(_)));
    assert!(r.ctx.worklist.is_empty());
}
