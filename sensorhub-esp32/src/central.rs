//! BLE central role on NimBLE: scanning and sensor connections
//!
//! NimBLE's client API is async, every call is driven to completion with
//! `block_on` on the calling thread.

use anyhow::anyhow;
use esp32_nimble::utilities::BleUuid;
use esp32_nimble::{BLEAddress, BLEAddressType, BLEClient, BLEDevice, BLERemoteCharacteristic};
use esp_idf_svc::hal::task::block_on;
use log::*;
use sensorhub_mcu::{Advertisement, Central, CharacteristicProps, Link, NotifyHandler};
use std::time::Duration;

fn ble<E: std::fmt::Debug>(e: E) -> anyhow::Error {
    anyhow!("BLE error: {e:?}")
}

fn uuid(s: &str) -> anyhow::Result<BleUuid> {
    BleUuid::from_uuid128_string(s).map_err(|e| anyhow!("bad uuid {s}: {e:?}"))
}

pub struct NimbleCentral;

impl Central for NimbleCentral {
    type Link = NimbleLink;
    type Error = anyhow::Error;

    fn scan(&mut self, duration: Duration) -> Result<Vec<Advertisement>, Self::Error> {
        let device = BLEDevice::take();
        let scan = device.get_scan();
        let mut seen: Vec<Advertisement> = Vec::new();
        block_on(async {
            scan.active_scan(true).interval(100).window(99);
            scan.start(device, duration.as_millis() as i32, |found, data| {
                let address = found.addr().to_string();
                if !seen.iter().any(|ad| ad.address == address) {
                    seen.push(Advertisement {
                        address,
                        name: data.name().map(|n| n.to_string()),
                    });
                }
                None::<()>
            })
            .await
        })
        .map_err(ble)?;
        debug!("Scan saw {} advertisers", seen.len());
        Ok(seen)
    }

    fn connect(&mut self, address: &str) -> Result<NimbleLink, Self::Error> {
        let addr = BLEAddress::from_str(address, BLEAddressType::Public)
            .ok_or_else(|| anyhow!("bad address {address}"))?;
        let mut client = BLEClient::new();
        block_on(client.connect(&addr)).map_err(ble)?;
        Ok(NimbleLink { client })
    }
}

pub struct NimbleLink {
    client: BLEClient,
}

async fn remote<'a>(
    client: &'a mut BLEClient,
    service: &str,
    characteristic: &str,
) -> anyhow::Result<&'a mut BLERemoteCharacteristic> {
    let service = client.get_service(uuid(service)?).await.map_err(ble)?;
    service
        .get_characteristic(uuid(characteristic)?)
        .await
        .map_err(ble)
}

impl Link for NimbleLink {
    type Error = anyhow::Error;

    fn set_mtu(&mut self, mtu: u16) -> Result<(), Self::Error> {
        BLEDevice::take().set_preferred_mtu(mtu).map_err(ble)
    }

    fn has_service(&mut self, service: &str) -> Result<bool, Self::Error> {
        let service = uuid(service)?;
        Ok(block_on(self.client.get_service(service)).is_ok())
    }

    fn characteristic(
        &mut self,
        service: &str,
        characteristic: &str,
    ) -> Result<Option<CharacteristicProps>, Self::Error> {
        block_on(async {
            match remote(&mut self.client, service, characteristic).await {
                Ok(ch) => Ok(Some(CharacteristicProps {
                    can_read: ch.can_read(),
                    can_write: ch.can_write(),
                    can_notify: ch.can_notify(),
                })),
                Err(e) => {
                    debug!("{characteristic}: {e}");
                    Ok(None)
                }
            }
        })
    }

    fn write(&mut self, service: &str, characteristic: &str, data: &[u8]) -> Result<(), Self::Error> {
        block_on(async {
            let ch = remote(&mut self.client, service, characteristic).await?;
            ch.write_value(data, true).await.map_err(ble)
        })
    }

    fn read(&mut self, service: &str, characteristic: &str) -> Result<Vec<u8>, Self::Error> {
        block_on(async {
            let ch = remote(&mut self.client, service, characteristic).await?;
            ch.read_value().await.map_err(ble)
        })
    }

    fn subscribe(
        &mut self,
        service: &str,
        characteristic: &str,
        mut handler: NotifyHandler,
    ) -> Result<(), Self::Error> {
        block_on(async {
            let ch = remote(&mut self.client, service, characteristic).await?;
            ch.on_notify(move |data| handler(data));
            ch.subscribe_notify(false).await.map_err(ble)
        })
    }

    fn unsubscribe(&mut self, service: &str, characteristic: &str) -> Result<(), Self::Error> {
        block_on(async {
            let ch = remote(&mut self.client, service, characteristic).await?;
            ch.unsubscribe().await.map_err(ble)
        })
    }

    fn disconnect(&mut self) -> Result<(), Self::Error> {
        self.client.disconnect().map_err(ble)
    }
}
