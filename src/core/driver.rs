//! Capability traits for devices and the motor surface

use crate::core::types::{Properties, Readings, SensorValue};
use crate::error::Result;
use std::collections::HashMap;

/// Board exposing digital and PWM outputs by pin name
///
/// Implementations are shared between the caller threads and the safety
/// monitor, so all methods take `&self`.
pub trait Board: Send + Sync {
    /// Board name used for dependency lookup and logging
    fn name(&self) -> &str;

    /// Drive a pin high or low
    fn set_gpio(&self, pin: &str, high: bool) -> Result<()>;

    /// Set the PWM frequency of a pin
    fn set_pwm_frequency(&self, pin: &str, freq_hz: u32) -> Result<()>;

    /// Set the PWM duty cycle of a pin (0.0 - 1.0)
    fn set_pwm_duty(&self, pin: &str, duty: f64) -> Result<()>;
}

/// Sensor producing named scalar readings
pub trait Sensor: Send + Sync {
    /// Sensor name used for dependency lookup and logging
    fn name(&self) -> &str;

    /// Take one sample
    fn readings(&self) -> Result<Readings>;
}

/// Motor surface consumed by the host
pub trait Motor: Send + Sync {
    /// Run the motor at a signed fraction of full power
    fn set_power(&self, power_pct: f64) -> Result<()>;

    /// Run at `rpm` for a number of revolutions
    fn go_for(&self, rpm: f64, revolutions: f64) -> Result<()>;

    /// Run at `rpm` to an absolute position
    fn go_to(&self, rpm: f64, position_revolutions: f64) -> Result<()>;

    /// Run at a constant speed
    fn set_rpm(&self, rpm: f64) -> Result<()>;

    /// Stop the motor
    fn stop(&self) -> Result<()>;

    /// Whether the motor is currently driven
    fn is_moving(&self) -> bool;

    /// Whether the motor is powered, and at what magnitude
    fn is_powered(&self) -> (bool, f64);

    /// Current position in revolutions
    fn position(&self) -> Result<f64>;

    /// Static capabilities
    fn properties(&self) -> Result<Properties>;

    /// Redefine the current position
    fn reset_zero_position(&self, offset: f64) -> Result<()>;

    /// Model-specific extension commands
    fn do_command(
        &self,
        cmd: &HashMap<String, SensorValue>,
    ) -> Result<HashMap<String, SensorValue>>;
}
