//! Configuration for the winch controller
//!
//! Loaded from a TOML file. The `[winch]` table names the board and load cell
//! the controller depends on; `[safety]` tunes the overload monitor.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Default GPIO pin for the raise (clockwise) channel
pub const DEFAULT_RAISE_PIN: &str = "35";
/// Default GPIO pin for the lower (counter-clockwise) channel
pub const DEFAULT_LOWER_PIN: &str = "37";
/// Default PWM frequency for both channels
pub const DEFAULT_PWM_FREQUENCY_HZ: u32 = 500;
/// Load cell raw value above which a raise is aborted
pub const DEFAULT_MAX_ALLOWABLE_RAW: f64 = 15000.0;
/// Load cell polling interval while raising
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    pub winch: WinchConfig,
    #[serde(default)]
    pub safety: SafetyConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Winch wiring: dependencies and output channels
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WinchConfig {
    /// Name of the board driving the motor outputs (required)
    #[serde(default)]
    pub board: String,

    /// Name of the load cell sensor (required)
    #[serde(default, alias = "sensor-load-cell")]
    pub load_cell_sensor: String,

    /// Pin driven while raising
    #[serde(default = "default_raise_pin")]
    pub raise_pin: String,

    /// Pin driven while lowering
    #[serde(default = "default_lower_pin")]
    pub lower_pin: String,

    /// PWM frequency applied to both pins at construction
    #[serde(default = "default_pwm_frequency_hz")]
    pub pwm_frequency_hz: u32,
}

/// What the monitor does when the load cell cannot be read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorFailurePolicy {
    /// Log and stop monitoring; the winch keeps raising
    #[default]
    FailOpen,
    /// Latch the emergency stop and stop the winch
    FailSafe,
}

/// Overload monitor tuning
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SafetyConfig {
    /// Raw load cell value that trips the emergency stop (strictly greater)
    #[serde(default = "default_max_allowable_raw")]
    pub max_allowable_raw: f64,

    /// Sleep between load cell samples
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Behaviour on sensor read failure
    #[serde(default)]
    pub sensor_failure: SensorFailurePolicy,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_raise_pin() -> String {
    DEFAULT_RAISE_PIN.to_string()
}

fn default_lower_pin() -> String {
    DEFAULT_LOWER_PIN.to_string()
}

fn default_pwm_frequency_hz() -> u32 {
    DEFAULT_PWM_FREQUENCY_HZ
}

fn default_max_allowable_raw() -> f64 {
    DEFAULT_MAX_ALLOWABLE_RAW
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for WinchConfig {
    fn default() -> Self {
        Self {
            board: "board".to_string(),
            load_cell_sensor: "load-cell".to_string(),
            raise_pin: default_raise_pin(),
            lower_pin: default_lower_pin(),
            pwm_frequency_hz: default_pwm_frequency_hz(),
        }
    }
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            max_allowable_raw: default_max_allowable_raw(),
            poll_interval_ms: default_poll_interval_ms(),
            sensor_failure: SensorFailurePolicy::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl SafetyConfig {
    /// Polling interval as a `Duration`
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Config {
    /// Load and validate configuration from a TOML file
    ///
    /// # Example
    /// ```no_run
    /// use winch_motor::config::Config;
    ///
    /// let config = Config::load("winch.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check required fields and value ranges
    pub fn validate(&self) -> Result<()> {
        let winch = &self.winch;
        if winch.board.is_empty() {
            return Err(required("winch.board"));
        }
        if winch.load_cell_sensor.is_empty() {
            return Err(required("winch.load_cell_sensor"));
        }
        if winch.raise_pin.is_empty() {
            return Err(required("winch.raise_pin"));
        }
        if winch.lower_pin.is_empty() {
            return Err(required("winch.lower_pin"));
        }
        if winch.raise_pin == winch.lower_pin {
            return Err(Error::ConfigValidation(format!(
                "winch.raise_pin and winch.lower_pin must differ (both '{}')",
                winch.raise_pin
            )));
        }
        if winch.pwm_frequency_hz == 0 {
            return Err(Error::ConfigValidation(
                "winch.pwm_frequency_hz must be non-zero".to_string(),
            ));
        }

        let safety = &self.safety;
        if !safety.max_allowable_raw.is_finite() || safety.max_allowable_raw <= 0.0 {
            return Err(Error::ConfigValidation(format!(
                "safety.max_allowable_raw must be a positive number, got {}",
                safety.max_allowable_raw
            )));
        }
        if safety.poll_interval_ms == 0 {
            return Err(Error::ConfigValidation(
                "safety.poll_interval_ms must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn required(field: &str) -> Error {
    Error::ConfigValidation(format!("{} is required", field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.winch.raise_pin, "35");
        assert_eq!(config.winch.lower_pin, "37");
        assert_eq!(config.winch.pwm_frequency_hz, 500);
        assert_eq!(config.safety.max_allowable_raw, 15000.0);
        assert_eq!(config.safety.poll_interval(), Duration::from_millis(10));
        assert_eq!(config.safety.sensor_failure, SensorFailurePolicy::FailOpen);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let toml_content = r#"
[winch]
board = "pi"
load_cell_sensor = "scale"
"#;
        let config = Config::from_toml_str(toml_content).unwrap();
        assert_eq!(config.winch.board, "pi");
        assert_eq!(config.winch.load_cell_sensor, "scale");
        assert_eq!(config.winch.raise_pin, DEFAULT_RAISE_PIN);
        assert_eq!(config.safety.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_full_toml_deserialization() {
        let toml_content = r#"
[winch]
board = "pi"
sensor-load-cell = "scale"
raise_pin = "11"
lower_pin = "13"
pwm_frequency_hz = 1000

[safety]
max_allowable_raw = 9000.0
poll_interval_ms = 5
sensor_failure = "fail_safe"

[logging]
level = "debug"
"#;
        let config = Config::from_toml_str(toml_content).unwrap();
        assert_eq!(config.winch.load_cell_sensor, "scale");
        assert_eq!(config.winch.pwm_frequency_hz, 1000);
        assert_eq!(config.safety.max_allowable_raw, 9000.0);
        assert_eq!(config.safety.sensor_failure, SensorFailurePolicy::FailSafe);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_missing_board_fails_validation() {
        let err = Config::from_toml_str("[winch]\nload_cell_sensor = \"scale\"\n").unwrap_err();
        match err {
            Error::ConfigValidation(msg) => assert!(msg.contains("winch.board")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_missing_sensor_fails_validation() {
        let err = Config::from_toml_str("[winch]\nboard = \"pi\"\n").unwrap_err();
        match err {
            Error::ConfigValidation(msg) => assert!(msg.contains("winch.load_cell_sensor")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_range_validation() {
        let mut config = Config::default();
        config.winch.lower_pin = config.winch.raise_pin.clone();
        assert!(matches!(config.validate(), Err(Error::ConfigValidation(_))));

        let mut config = Config::default();
        config.safety.max_allowable_raw = f64::NAN;
        assert!(matches!(config.validate(), Err(Error::ConfigValidation(_))));

        let mut config = Config::default();
        config.safety.poll_interval_ms = 0;
        assert!(matches!(config.validate(), Err(Error::ConfigValidation(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[winch]\nboard = \"pi\"\nload_cell_sensor = \"scale\"").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.winch.board, "pi");
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load(dir.path().join("absent.toml"));
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_toml_serialization_round_trip_keys() {
        let toml_string = toml::to_string_pretty(&Config::default()).unwrap();
        assert!(toml_string.contains("[winch]"));
        assert!(toml_string.contains("[safety]"));
        assert!(toml_string.contains("sensor_failure = \"fail_open\""));
    }
}
