use std::time::Duration;

use rumqttc::{MqttOptions, QoS};
use serde::{Deserialize, Serialize};

use super::mqtt_handler::TransportError;

/// Broker connection settings
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    /// Device name, also the MQTT username
    pub device_name: String,
    /// Device password or active key
    pub password: String,
    /// Defaults to `<device_name>_client`
    pub client_id: Option<String>,
    pub keep_alive_secs: u64,
    pub qos: u8,
    pub clean_session: bool,
    /// Capacity of the client request queue and the worker inbox
    pub channel_capacity: usize,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            device_name: "mtsIoAdapter".to_string(),
            password: String::new(),
            client_id: None,
            keep_alive_secs: 30,
            qos: 0,
            clean_session: true,
            channel_capacity: 100,
        }
    }
}

impl MqttConfig {
    pub fn client_id(&self) -> String {
        self.client_id
            .clone()
            .unwrap_or_else(|| format!("{}_client", self.device_name))
    }

    pub fn qos(&self) -> Result<QoS, TransportError> {
        match self.qos {
            0 => Ok(QoS::AtMostOnce),
            1 => Ok(QoS::AtLeastOnce),
            2 => Ok(QoS::ExactlyOnce),
            other => Err(TransportError::Config(format!("invalid qos {}", other))),
        }
    }

    /// Checks the settings and builds the rumqttc options
    pub fn options(&self) -> Result<MqttOptions, TransportError> {
        let client_id = self.client_id();
        if client_id.trim().is_empty() || client_id.starts_with(' ') {
            return Err(TransportError::Config(format!(
                "invalid client id {:?}",
                client_id
            )));
        }
        if self.host.trim().is_empty() {
            return Err(TransportError::Config("broker host is empty".to_string()));
        }
        if self.port == 0 {
            return Err(TransportError::Config("broker port is 0".to_string()));
        }
        if self.channel_capacity == 0 {
            return Err(TransportError::Config("channel capacity is 0".to_string()));
        }
        self.qos()?;

        let mut options = MqttOptions::new(client_id, self.host.clone(), self.port);
        options
            .set_credentials(self.device_name.clone(), self.password.clone())
            .set_keep_alive(Duration::from_secs(self.keep_alive_secs.max(5)))
            .set_clean_session(self.clean_session);

        Ok(options)
    }
}
