//! Error types for the winch controller

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Winch controller error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Required configuration field missing or out of range
    #[error("Config validation failed: {0}")]
    ConfigValidation(String),

    /// Named board or sensor not present in the dependency set
    #[error("Unable to resolve {kind} '{name}'")]
    DependencyResolution {
        /// Dependency kind ("board" or "sensor")
        kind: &'static str,
        /// Name that was looked up
        name: String,
    },

    /// Raise requested while the emergency stop is latched
    #[error("Safety violation: {0}")]
    SafetyViolation(String),

    /// Load sensor read failed or returned a malformed reading
    #[error("Sensor failure: {0}")]
    SensorFailure(String),

    /// A pin write failed
    #[error("Output failure on pin {pin}: {reason}")]
    OutputFailure {
        /// Pin name
        pin: String,
        /// Driver-reported reason
        reason: String,
    },

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Operation not supported
    #[error("Operation not supported: {0}")]
    NotSupported(&'static str),

    /// Controller has been closed
    #[error("Controller is closed")]
    Closed,

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}
