use crate::decoder::AtcVoltage;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
    #[error("no MQTT server configured (set `server` in the config file or pass --server)")]
    MissingServer,
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Contents of the JSON parameter file.
///
/// Unknown keys (Wi-Fi credentials, NTP host, OTA repository) are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Params {
    pub server: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub client_id: Option<String>,
    pub topic_prefix: Option<String>,
    pub publish_interval_secs: Option<u64>,
    pub cache_capacity: Option<usize>,
    pub atc_voltage: Option<AtcVoltage>,
    pub decoded_only: Option<bool>,
}

impl Params {
    pub fn from_json(path: &str, json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })
    }

    /// Load the file at `path`. A missing file yields empty params so the
    /// gateway can run from CLI flags alone.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        match std::fs::read_to_string(path) {
            Ok(json) => Self::from_json(&display, &json),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Read {
                path: display,
                source,
            }),
        }
    }
}

/// Values given on the command line; each one beats the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub server: Option<String>,
    pub port: Option<u16>,
    pub topic_prefix: Option<String>,
    pub publish_interval_secs: Option<u64>,
    pub atc_voltage: Option<AtcVoltage>,
    pub decoded_only: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttConfig {
    pub server: String,
    pub port: u16,
    pub client_id: String,
    pub credentials: Option<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub mqtt: MqttConfig,
    pub topic_prefix: String,
    pub publish_interval: Duration,
    pub cache_capacity: usize,
    pub atc_voltage: AtcVoltage,
    /// Only publish advertisements that decoded to a reading.
    pub decoded_only: bool,
}

impl GatewayConfig {
    pub fn resolve(params: Params, cli: Overrides) -> Result<Self, ConfigError> {
        let server = cli
            .server
            .or(params.server)
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::MissingServer)?;

        let publish_interval_secs = cli
            .publish_interval_secs
            .or(params.publish_interval_secs)
            .unwrap_or(1);
        if publish_interval_secs == 0 {
            return Err(ConfigError::Zero("publish_interval_secs"));
        }
        let cache_capacity = params.cache_capacity.unwrap_or(256);
        if cache_capacity == 0 {
            return Err(ConfigError::Zero("cache_capacity"));
        }

        let credentials = match (params.user, params.password) {
            (Some(user), password) if !user.is_empty() => {
                Some((user, password.unwrap_or_default()))
            }
            _ => None,
        };

        Ok(Self {
            mqtt: MqttConfig {
                server,
                port: cli.port.or(params.port).unwrap_or(1883),
                client_id: params.client_id.unwrap_or_else(|| "mitemp-gw".into()),
                credentials,
            },
            topic_prefix: cli
                .topic_prefix
                .or(params.topic_prefix)
                .unwrap_or_else(|| "ble".into()),
            publish_interval: Duration::from_secs(publish_interval_secs),
            cache_capacity,
            atc_voltage: cli.atc_voltage.or(params.atc_voltage).unwrap_or_default(),
            decoded_only: cli.decoded_only || params.decoded_only.unwrap_or(false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARAMS: &str = r#"{
        "ssid": "home",
        "wifi_pw": "secret",
        "server": "mqtt.local",
        "port": 8883,
        "user": "gw",
        "password": "pw",
        "ntp_host": "pool.ntp.org",
        "atc_voltage": "tenths"
    }"#;

    #[test]
    fn file_values_and_defaults() {
        let params = Params::from_json("params.json", PARAMS).unwrap();
        let cfg = GatewayConfig::resolve(params, Overrides::default()).unwrap();
        assert_eq!(cfg.mqtt.server, "mqtt.local");
        assert_eq!(cfg.mqtt.port, 8883);
        assert_eq!(cfg.mqtt.client_id, "mitemp-gw");
        assert_eq!(cfg.mqtt.credentials, Some(("gw".into(), "pw".into())));
        assert_eq!(cfg.topic_prefix, "ble");
        assert_eq!(cfg.publish_interval, Duration::from_secs(1));
        assert_eq!(cfg.cache_capacity, 256);
        assert_eq!(cfg.atc_voltage, AtcVoltage::Tenths);
        assert!(!cfg.decoded_only);
    }

    #[test]
    fn cli_beats_file() {
        let params = Params::from_json("params.json", PARAMS).unwrap();
        let cli = Overrides {
            server: Some("broker".into()),
            port: Some(1884),
            atc_voltage: Some(AtcVoltage::Raw),
            decoded_only: true,
            ..Default::default()
        };
        let cfg = GatewayConfig::resolve(params, cli).unwrap();
        assert_eq!(cfg.mqtt.server, "broker");
        assert_eq!(cfg.mqtt.port, 1884);
        assert_eq!(cfg.atc_voltage, AtcVoltage::Raw);
        assert!(cfg.decoded_only);
    }

    #[test]
    fn server_is_required() {
        let err = GatewayConfig::resolve(Params::default(), Overrides::default()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingServer));
    }

    #[test]
    fn zero_interval_rejected() {
        let cli = Overrides {
            server: Some("broker".into()),
            publish_interval_secs: Some(0),
            ..Default::default()
        };
        let err = GatewayConfig::resolve(Params::default(), cli).unwrap_err();
        assert!(matches!(err, ConfigError::Zero("publish_interval_secs")));
    }

    #[test]
    fn bad_json_is_reported() {
        let err = Params::from_json("params.json", "{ nope").unwrap_err();
        assert!(err.to_string().starts_with("failed to parse params.json"));
    }

    #[test]
    fn missing_file_is_empty() {
        let params = Params::load(Path::new("/nonexistent/params.json")).unwrap();
        assert!(params.server.is_none());
    }
}
