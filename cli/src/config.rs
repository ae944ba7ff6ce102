use dx_keygen::DeviceSecret;
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Default config file, resolved against the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "dxkey.yaml";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Key generator configuration loaded from multiple sources.
///
/// Configuration is loaded in priority order (lowest to highest):
/// 1. Struct defaults
/// 2. dxkey.yaml file (if exists)
/// 3. Environment variables with DXKEY_ prefix
/// 4. Command-line flags, applied with [`Config::apply`]
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub operator: OperatorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Clone, Default, Deserialize, Serialize)]
pub struct DeviceConfig {
    /// Device identifier.
    #[serde(default)]
    pub id: Option<u64>,

    /// Change counter for the next key. Bump it to invalidate earlier keys.
    #[serde(default)]
    pub change_counter: Option<u64>,

    /// Hex-encoded device secret. Never logged.
    #[serde(default, deserialize_with = "deserialize_hex_text")]
    pub secret_hex: Option<String>,
}

impl fmt::Debug for DeviceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceConfig")
            .field("id", &self.id)
            .field("change_counter", &self.change_counter)
            .field(
                "secret_hex",
                &self.secret_hex.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OperatorConfig {
    /// Operator callsign, any case.
    #[serde(default)]
    pub callsign: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

/// Hex text must arrive as a string; a bare number would already have lost
/// its leading zeros.
fn deserialize_hex_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum HexText {
        Text(String),
        Number(serde::de::IgnoredAny),
    }

    match Option::<HexText>::deserialize(deserializer)? {
        None => Ok(None),
        Some(HexText::Text(s)) => Ok(Some(s)),
        Some(HexText::Number(_)) => Err(serde::de::Error::custom(
            "device.secret_hex must be a string; wrap the value in double quotes",
        )),
    }
}

/// Values given on the command line. `None` leaves the loaded value alone.
#[derive(Clone, Default)]
pub struct Overrides {
    pub device_id: Option<u64>,
    pub change_counter: Option<u64>,
    pub callsign: Option<String>,
    pub secret_hex: Option<String>,
    pub log_level: Option<String>,
}

impl fmt::Debug for Overrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Overrides")
            .field("device_id", &self.device_id)
            .field("change_counter", &self.change_counter)
            .field("callsign", &self.callsign)
            .field(
                "secret_hex",
                &self.secret_hex.as_ref().map(|_| "[REDACTED]"),
            )
            .field("log_level", &self.log_level)
            .finish()
    }
}

/// Fully resolved inputs for one key.
#[derive(Debug)]
pub struct KeyRequest {
    pub device_id: u64,
    pub change_counter: u64,
    pub callsign: String,
    pub secret: DeviceSecret,
}

/// Configuration loading and validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Figment(#[from] Box<figment::Error>),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl Config {
    /// Load configuration from the default file and the environment.
    ///
    /// # Errors
    /// Returns an error if configuration cannot be loaded or is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration with a custom YAML file path.
    ///
    /// A missing file is not an error; the other sources still apply.
    ///
    /// # Errors
    /// Returns an error if configuration cannot be loaded or is invalid.
    pub fn load_from(yaml_path: &str) -> Result<Self, ConfigError> {
        let config: Self = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Yaml::file(yaml_path))
            .merge(Env::prefixed("DXKEY_").split("__"))
            .extract()?;

        config.validate()?;
        Ok(config)
    }

    /// Layer command-line values over the loaded configuration.
    ///
    /// # Errors
    /// Returns an error if the merged configuration is invalid.
    pub fn apply(mut self, overrides: Overrides) -> Result<Self, ConfigError> {
        if overrides.device_id.is_some() {
            self.device.id = overrides.device_id;
        }
        if overrides.change_counter.is_some() {
            self.device.change_counter = overrides.change_counter;
        }
        if overrides.callsign.is_some() {
            self.operator.callsign = overrides.callsign;
        }
        if overrides.secret_hex.is_some() {
            self.device.secret_hex = overrides.secret_hex;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }

        self.validate()?;
        Ok(self)
    }

    /// Validate configuration values.
    ///
    /// Device fields may be absent here; [`Config::key_request`] requires them.
    ///
    /// # Errors
    /// Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let level = self.logging.level.to_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "logging.level must be one of {}, got: '{}'",
                LOG_LEVELS.join(", "),
                self.logging.level
            )));
        }

        if let Some(callsign) = &self.operator.callsign {
            if callsign.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "operator.callsign cannot be blank".into(),
                ));
            }
            if !callsign.is_ascii() {
                return Err(ConfigError::Validation(format!(
                    "operator.callsign must be ASCII, got: '{callsign}'"
                )));
            }
        }

        Ok(())
    }

    /// Collect everything needed to generate a key.
    ///
    /// # Errors
    /// Returns a validation error naming the first missing or malformed field.
    pub fn key_request(&self) -> Result<KeyRequest, ConfigError> {
        let device_id = self.device.id.ok_or_else(|| missing("device.id", "DXKEY_DEVICE__ID"))?;
        let change_counter = self
            .device
            .change_counter
            .ok_or_else(|| missing("device.change_counter", "DXKEY_DEVICE__CHANGE_COUNTER"))?;
        let callsign = self
            .operator
            .callsign
            .clone()
            .ok_or_else(|| missing("operator.callsign", "DXKEY_OPERATOR__CALLSIGN"))?;
        let secret_hex = self
            .device
            .secret_hex
            .as_deref()
            .ok_or_else(|| missing("device.secret_hex", "DXKEY_DEVICE__SECRET_HEX"))?;

        let secret = DeviceSecret::from_hex(secret_hex)
            .map_err(|e| ConfigError::Validation(format!("device.secret_hex: {e}")))?;

        Ok(KeyRequest {
            device_id,
            change_counter,
            callsign: callsign.trim().to_string(),
            secret,
        })
    }
}

fn missing(key: &str, env: &str) -> ConfigError {
    ConfigError::Validation(format!(
        "{key} is required. Set {env} environment variable, pass it on the command line, or configure in dxkey.yaml."
    ))
}
