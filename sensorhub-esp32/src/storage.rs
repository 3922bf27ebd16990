//! Persistent settings in ESP32 NVS (Non-Volatile Storage)

use esp_idf_svc::nvs::{EspNvs, EspNvsPartition, NvsDefault};
use esp_idf_svc::sys::EspError;
use log::*;
use sensorhub_mcu::Storage;

const NVS_NAMESPACE: &str = "sensorhub";
const KEY_IDENTITY: &str = "identity";
const KEY_WIFI_SSID: &str = "wifi_ssid";
const KEY_WIFI_PASS: &str = "wifi_pass";
const KEY_CONFIG: &str = "config";

const CONFIG_BUF_LEN: usize = 1024;

pub struct NvsStorage {
    nvs: EspNvs<NvsDefault>,
}

impl NvsStorage {
    pub fn open(partition: &EspNvsPartition<NvsDefault>) -> Result<Self, EspError> {
        let nvs = EspNvs::new(partition.clone(), NVS_NAMESPACE, true)?;
        Ok(Self { nvs })
    }

    fn get_string(&self, key: &str, buf: &mut [u8]) -> Result<Option<String>, EspError> {
        Ok(self
            .nvs
            .get_str(key, buf)?
            .filter(|s| !s.is_empty())
            .map(str::to_string))
    }
}

impl Storage for NvsStorage {
    type Error = EspError;

    fn get_identity(&self) -> Result<Option<String>, Self::Error> {
        self.get_string(KEY_IDENTITY, &mut [0u8; 64])
    }

    fn set_identity(&mut self, identity: &str) -> Result<(), Self::Error> {
        self.nvs.set_str(KEY_IDENTITY, identity)
    }

    fn get_wifi_credentials(&self) -> Result<Option<(String, String)>, Self::Error> {
        let Some(ssid) = self.get_string(KEY_WIFI_SSID, &mut [0u8; 64])? else {
            return Ok(None);
        };
        let password = self
            .get_string(KEY_WIFI_PASS, &mut [0u8; 128])?
            .unwrap_or_default();
        Ok(Some((ssid, password)))
    }

    fn set_wifi_credentials(&mut self, ssid: &str, password: &str) -> Result<(), Self::Error> {
        self.nvs.set_str(KEY_WIFI_SSID, ssid)?;
        self.nvs.set_str(KEY_WIFI_PASS, password)?;
        info!("WiFi credentials saved to NVS");
        Ok(())
    }

    fn get_config(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut buf = vec![0u8; CONFIG_BUF_LEN];
        Ok(self.nvs.get_blob(KEY_CONFIG, &mut buf)?.map(<[u8]>::to_vec))
    }
}
