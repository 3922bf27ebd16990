//! Station-mode WiFi on top of `EspWifi`

use esp_idf_svc::sys::EspError;
use esp_idf_svc::wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi};
use log::*;
use sensorhub_mcu::{ScanResult, Wifi};

pub struct StationWifi {
    wifi: EspWifi<'static>,
}

impl StationWifi {
    /// Start the driver unassociated so scans work before provisioning
    pub fn start(mut wifi: EspWifi<'static>) -> Result<Self, EspError> {
        wifi.set_configuration(&Configuration::Client(ClientConfiguration::default()))?;
        wifi.start()?;
        info!("WiFi started");
        Ok(Self { wifi })
    }
}

impl Wifi for StationWifi {
    type Error = anyhow::Error;

    fn scan(&mut self) -> Result<Vec<ScanResult>, Self::Error> {
        let found = self.wifi.scan()?;
        debug!("WiFi scan found {} networks", found.len());
        Ok(found
            .into_iter()
            .map(|ap| ScanResult {
                ssid: ap.ssid.to_string(),
                bssid: ap.bssid,
                channel: ap.channel,
                auth_required: !matches!(ap.auth_method, None | Some(AuthMethod::None)),
            })
            .collect())
    }

    fn begin_connect(&mut self, ssid: &str, password: &str) -> Result<(), Self::Error> {
        if self.wifi.is_connected()? {
            self.wifi.disconnect()?;
        }
        let config = Configuration::Client(ClientConfiguration {
            ssid: ssid
                .try_into()
                .map_err(|_| anyhow::anyhow!("ssid too long"))?,
            password: password
                .try_into()
                .map_err(|_| anyhow::anyhow!("password too long"))?,
            ..Default::default()
        });
        self.wifi.set_configuration(&config)?;
        self.wifi.connect()?;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.wifi.is_up().unwrap_or(false)
    }
}
