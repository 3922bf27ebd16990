//! Connection Orchestrator
//!
//! Round-robins the worklist. Each cycle scans, and if the target is
//! advertising hands it to a connection task on its own thread with a
//! fixed stack. The task connects, subscribes, dwells, and always cleans
//! up before it reports back. A task that misses its deadline, or a store
//! that stops receiving readings, is a liveness trip and ends the run.

use crate::central::{Central, Link, NotifyHandler};
use crate::decode::{decode_family_a, decode_family_b, SerialBridgeDecoder};
use crate::{
    uplink, watchdog, DeviceType, HubContext, HubError, MeasureKind, Reading, Target,
    TransportError, Uplink,
};
use log::*;
use prost::Message;
use sensorhub_proto::ble::{family_a, family_b, peer_hub, serial_bridge};
use sensorhub_proto::{ble_send_packet, length_prefix, BleSendPacket, ProtoError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Granularity of cancellable sleeps in the connection task
const CANCEL_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Worklist empty
    Idle,
    /// Target not advertising, the normal case for sleepy sensors
    NotSeen(Target),
    Visited(Target),
    TransportFailed(Target),
}

/// Where a family publishes its readings
struct Profile {
    services: &'static [&'static str],
    /// Notify characteristics and the kind they carry, `None` when the
    /// payload names its own kind
    notify: &'static [(&'static str, Option<MeasureKind>)],
}

impl Profile {
    fn of(device_type: DeviceType) -> Self {
        match device_type {
            DeviceType::FamilyA => Profile {
                services: family_a::SERVICE_UUIDS,
                notify: &[
                    (family_a::TEMPERATURE_UUID, Some(MeasureKind::Temperature)),
                    (family_a::HUMIDITY_UUID, Some(MeasureKind::Humidity)),
                ],
            },
            DeviceType::FamilyB => Profile {
                services: family_b::SERVICE_UUIDS,
                notify: &[(family_b::DATA_UUID, Some(MeasureKind::Temperature))],
            },
            DeviceType::SerialBridge => Profile {
                services: serial_bridge::SERVICE_UUIDS,
                notify: &[(serial_bridge::DATA_UUID, None)],
            },
            // peers get data pushed, nothing comes back
            DeviceType::PeerHub => Profile {
                services: peer_hub::SERVICE_UUIDS,
                notify: &[],
            },
        }
    }
}

/// Turns notification bytes into `(kind, value)` pairs
#[derive(Debug)]
pub enum Decoder {
    FamilyA(MeasureKind),
    FamilyB(MeasureKind),
    SerialBridge(SerialBridgeDecoder),
}

impl Decoder {
    fn new(device_type: DeviceType, kind: Option<MeasureKind>) -> Self {
        let kind = kind.unwrap_or(MeasureKind::Temperature);
        match device_type {
            DeviceType::FamilyA => Decoder::FamilyA(kind),
            DeviceType::FamilyB => Decoder::FamilyB(kind),
            DeviceType::SerialBridge | DeviceType::PeerHub => {
                Decoder::SerialBridge(SerialBridgeDecoder::new())
            }
        }
    }

    pub fn decode(&mut self, data: &[u8]) -> Result<Vec<(MeasureKind, f32)>, ProtoError> {
        match self {
            Decoder::FamilyA(kind) => Ok(vec![(*kind, decode_family_a(data)?)]),
            Decoder::FamilyB(kind) => Ok(vec![(*kind, decode_family_b(data)?)]),
            Decoder::SerialBridge(bridge) => bridge.feed(data),
        }
    }
}

/// Decode a notification, store the readings and forward them upstream
pub fn ingest<U: Uplink + ?Sized>(
    decoder: &mut Decoder,
    data: &[u8],
    source: &Target,
    ctx: &HubContext,
    uplink: &U,
) -> Result<usize, HubError> {
    let values = decoder.decode(data)?;
    for &(kind, value) in &values {
        let reading = Reading {
            timestamp: ctx.clock().now(),
            address: source.address.clone(),
            device_type: source.device_type,
            value,
            kind,
        };
        debug!("{} {:?} = {}", source.address, kind, value);
        ctx.store.upsert_local(reading.clone());
        uplink::forward_reading(uplink, &reading)?;
    }
    Ok(values.len())
}

/// Shared between the orchestrator, the connection task and its
/// notification handlers
#[derive(Default)]
struct TaskSignals {
    cancelled: AtomicBool,
    fatal: Mutex<Option<HubError>>,
}

impl TaskSignals {
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    fn record_fatal(&self, error: HubError) {
        let mut fatal = self.fatal.lock().unwrap_or_else(PoisonError::into_inner);
        if fatal.is_none() {
            *fatal = Some(error);
        }
    }

    fn take_fatal(&self) -> Option<HubError> {
        self.fatal.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    fn should_stop(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
            || self.fatal.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    /// Sleep for `duration` unless told to stop. Returns false if stopped early.
    fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.should_stop() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep(CANCEL_POLL.min(deadline - now));
        }
    }
}

fn transport<E: std::fmt::Display>(e: E) -> HubError {
    TransportError::Ble(e.to_string()).into()
}

struct ConnectionTask<L, U> {
    link: L,
    target: Target,
    ctx: Arc<HubContext>,
    uplink: Arc<U>,
    signals: Arc<TaskSignals>,
    subscribed: Vec<(&'static str, &'static str)>,
}

impl<L: Link, U: Uplink> ConnectionTask<L, U> {
    fn run(mut self) -> Result<(), HubError> {
        let result = self.visit();

        for (service, characteristic) in std::mem::take(&mut self.subscribed) {
            if let Err(e) = self.link.unsubscribe(service, characteristic) {
                warn!("Unsubscribe {characteristic} failed: {e}");
            }
        }
        if let Err(e) = self.link.disconnect() {
            warn!("Disconnect from {} failed: {e}", self.target.address);
        }
        info!("Disconnected from {}", self.target.address);

        result?;
        match self.signals.take_fatal() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn visit(&mut self) -> Result<(), HubError> {
        let config = &self.ctx.config;
        if !self.signals.sleep(config.connect_settle()) {
            return Ok(());
        }
        self.link.set_mtu(config.preferred_mtu).map_err(transport)?;

        let profile = Profile::of(self.target.device_type);
        let service = self.resolve_service(profile.services)?;
        match self.target.device_type {
            DeviceType::FamilyB => self.activate(service)?,
            DeviceType::PeerHub => self.push_to_peer(service)?,
            DeviceType::FamilyA | DeviceType::SerialBridge => {}
        }

        for &(characteristic, kind) in profile.notify {
            let notifiable = self
                .link
                .characteristic(service, characteristic)
                .map_err(transport)?
                .is_some_and(|props| props.can_notify);
            if !notifiable {
                warn!("{} has no notifiable {characteristic}", self.target.address);
                continue;
            }
            let handler = self.handler(Decoder::new(self.target.device_type, kind));
            self.link
                .subscribe(service, characteristic, handler)
                .map_err(transport)?;
            info!("Subscribed to {characteristic} on {}", self.target.address);
            self.subscribed.push((service, characteristic));
        }
        if let Some(&(first, _)) = profile.notify.first() {
            if self.subscribed.is_empty() {
                return Err(TransportError::CharacteristicNotFound(first.to_string()).into());
            }
        }

        self.signals.sleep(self.ctx.config.dwell());
        Ok(())
    }

    /// First candidate service the peer has
    fn resolve_service(&mut self, candidates: &[&'static str]) -> Result<&'static str, HubError> {
        for &service in candidates {
            if self.link.has_service(service).map_err(transport)? {
                debug!("{} uses service {service}", self.target.address);
                return Ok(service);
            }
        }
        Err(TransportError::ServiceNotFound(self.target.device_type).into())
    }

    /// Family B sensors stay off until their config characteristic is set
    fn activate(&mut self, service: &str) -> Result<(), HubError> {
        let uuid = family_b::CONFIG_UUID;
        let props = self
            .link
            .characteristic(service, uuid)
            .map_err(transport)?
            .ok_or_else(|| TransportError::CharacteristicNotFound(uuid.to_string()))?;
        if !props.can_write {
            return Err(TransportError::NotWritable(uuid.to_string()).into());
        }
        if !props.can_read {
            return Err(TransportError::NotReadable(uuid.to_string()).into());
        }
        self.link
            .write(service, uuid, &[family_b::ENABLE])
            .map_err(transport)?;
        let state = self.link.read(service, uuid).map_err(transport)?;
        debug!("Family B config now {state:?}");
        Ok(())
    }

    /// Write our worklist and readings into the peer's command characteristic
    fn push_to_peer(&mut self, service: &str) -> Result<(), HubError> {
        let uuid = peer_hub::DATA_UUID;
        let props = self
            .link
            .characteristic(service, uuid)
            .map_err(transport)?
            .ok_or_else(|| TransportError::CharacteristicNotFound(uuid.to_string()))?;
        if !props.can_write {
            return Err(TransportError::NotWritable(uuid.to_string()).into());
        }
        let packet = BleSendPacket::new(ble_send_packet::Type::CrossDevicePacket(
            self.ctx.relay_packet(),
        ));
        let payload = packet.encode_to_vec();
        self.link
            .write(service, uuid, &length_prefix(payload.len()))
            .map_err(transport)?;
        self.link.write(service, uuid, &payload).map_err(transport)?;
        info!(
            "Pushed {} bytes of relay data to {}",
            payload.len(),
            self.target.address
        );
        Ok(())
    }

    fn handler(&self, mut decoder: Decoder) -> NotifyHandler {
        let source = self.target.clone();
        let ctx = self.ctx.clone();
        let uplink = self.uplink.clone();
        let signals = self.signals.clone();
        Box::new(move |data: &[u8]| {
            if let Err(e) = ingest(&mut decoder, data, &source, &ctx, uplink.as_ref()) {
                error!("Notification from {} failed: {e}", source.address);
                signals.record_fatal(e);
            }
        })
    }
}

pub struct Orchestrator<C, U> {
    ctx: Arc<HubContext>,
    central: Arc<Mutex<C>>,
    uplink: Arc<U>,
}

impl<C: Central, U: Uplink> Orchestrator<C, U> {
    pub fn new(ctx: Arc<HubContext>, central: Arc<Mutex<C>>, uplink: Arc<U>) -> Self {
        Self {
            ctx,
            central,
            uplink,
        }
    }

    /// Cycle forever. Only returns with the fatal error that stopped it.
    pub fn run(&self) -> HubError {
        info!("Orchestrator started");
        loop {
            match self.run_cycle() {
                Ok(outcome) => debug!("Cycle done: {outcome:?}"),
                Err(e) if !e.is_fatal() => warn!("Cycle failed: {e}"),
                Err(e) => {
                    error!("Orchestrator stopping: {e}");
                    return e;
                }
            }
        }
    }

    pub fn run_cycle(&self) -> Result<CycleOutcome, HubError> {
        let config = &self.ctx.config;
        let Some(target) = self.ctx.worklist.rotate() else {
            std::thread::sleep(config.idle_backoff());
            return Ok(CycleOutcome::Idle);
        };

        let seen = self
            .central
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .scan(config.scan_duration());
        let seen = match seen {
            Ok(seen) => seen,
            Err(e) => {
                warn!("Scan failed: {e}");
                return Ok(CycleOutcome::TransportFailed(target));
            }
        };
        if !seen
            .iter()
            .any(|ad| ad.address.eq_ignore_ascii_case(&target.address))
        {
            debug!("{} not advertising", target.address);
            return Ok(CycleOutcome::NotSeen(target));
        }

        info!("Found {} ({:?})", target.address, target.device_type);
        let outcome = match self.connect(&target)? {
            Ok(()) => CycleOutcome::Visited(target.clone()),
            Err(e) => {
                warn!("Visit to {} failed: {e}", target.address);
                CycleOutcome::TransportFailed(target.clone())
            }
        };

        if target.device_type != DeviceType::PeerHub {
            watchdog::check_fresh(
                self.ctx.store.last_write(),
                Instant::now(),
                config.watchdog_window(),
            )?;
        }
        Ok(outcome)
    }

    /// Run the connection task and wait for it. Fatal errors and liveness
    /// trips come back as the outer error, transport errors as the inner one.
    fn connect(&self, target: &Target) -> Result<Result<(), HubError>, HubError> {
        let config = &self.ctx.config;
        let signals = Arc::new(TaskSignals::default());
        let (tx, rx) = mpsc::channel();

        let central = self.central.clone();
        let ctx = self.ctx.clone();
        let uplink = self.uplink.clone();
        let task_signals = signals.clone();
        let task_target = target.clone();
        let spawned = std::thread::Builder::new()
            .name("ble-connect".into())
            .stack_size(config.connection_task_stack)
            .spawn(move || {
                let result = connect_and_visit(&central, task_target, ctx, uplink, task_signals);
                // the orchestrator may have given up on us already
                let _ = tx.send(result);
            });
        if let Err(e) = spawned {
            return Ok(Err(transport(format!("spawn connection task: {e}"))));
        }

        let deadline = config.dwell_deadline();
        let finished = rx.recv_timeout(deadline).ok();
        if finished.is_none() {
            signals.cancel();
            error!(
                "Connection task for {} still running after {deadline:?}",
                target.address
            );
        }
        watchdog::check_task_finished(finished.is_some())?;

        match finished.unwrap_or(Ok(())) {
            Err(e) if e.is_fatal() => Err(e),
            result => Ok(result),
        }
    }
}

fn connect_and_visit<C: Central, U: Uplink>(
    central: &Mutex<C>,
    target: Target,
    ctx: Arc<HubContext>,
    uplink: Arc<U>,
    signals: Arc<TaskSignals>,
) -> Result<(), HubError> {
    info!("Connecting to {} ({:?})", target.address, target.device_type);
    let link = central
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .connect(&target.address)
        .map_err(|e| TransportError::Connect(target.address.clone(), e.to_string()))?;
    info!("Connected to {}", target.address);

    ConnectionTask {
        link,
        target,
        ctx,
        uplink,
        signals,
        subscribed: Vec::new(),
    }
    .run()
}
