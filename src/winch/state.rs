//! Winch state guarded by the controller lock
//!
//! Every method here issues output commands, so they are only ever called
//! with the state lock held.

use super::gpio;
use super::monitor::MonitorHandle;
use crate::config::{Config, SafetyConfig};
use crate::core::driver::{Board, Sensor};
use std::sync::Arc;

/// Direction the winch is driven in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Stopped,
    Raising,
    Lowering,
}

/// Output wiring and monitor tuning taken from the config
#[derive(Debug, Clone)]
pub(crate) struct WinchSettings {
    pub raise_pin: String,
    pub lower_pin: String,
    pub pwm_frequency_hz: u32,
    pub safety: SafetyConfig,
}

impl From<&Config> for WinchSettings {
    fn from(config: &Config) -> Self {
        Self {
            raise_pin: config.winch.raise_pin.clone(),
            lower_pin: config.winch.lower_pin.clone(),
            pwm_frequency_hz: config.winch.pwm_frequency_hz,
            safety: config.safety.clone(),
        }
    }
}

pub(crate) struct WinchState {
    pub direction: Direction,
    /// Magnitude in [0.0, 1.0]; zero while stopped
    pub power_pct: f64,
    /// Latched by the monitor; blocks raising until a lower command
    pub emergency_stop: bool,
    /// Present only while raising with a live monitor
    pub monitor: Option<MonitorHandle>,
    /// Monitor that halted the winch itself and has not been joined yet
    pub retired: Option<MonitorHandle>,
    pub board: Arc<dyn Board>,
    pub sensor: Arc<dyn Sensor>,
    pub settings: WinchSettings,
}

impl WinchState {
    pub fn new(board: Arc<dyn Board>, sensor: Arc<dyn Sensor>, settings: WinchSettings) -> Self {
        Self {
            direction: Direction::Stopped,
            power_pct: 0.0,
            emergency_stop: false,
            monitor: None,
            retired: None,
            board,
            sensor,
            settings,
        }
    }

    /// Drive both pins low and program their PWM frequency
    pub fn reset_outputs(&self) {
        let board = self.board.as_ref();
        let settings = &self.settings;

        gpio::set_pin(board, &settings.raise_pin, false);
        gpio::set_pin(board, &settings.lower_pin, false);

        gpio::set_pwm_frequency(board, &settings.raise_pin, settings.pwm_frequency_hz);
        gpio::set_pwm_frequency(board, &settings.lower_pin, settings.pwm_frequency_hz);
    }

    /// Cancel and detach the running (or retired) monitor, if any
    ///
    /// The handle is cleared before the caller sees it, so a monitor that
    /// finds its own token cancelled knows it has been replaced.
    pub fn take_monitor(&mut self) -> Option<MonitorHandle> {
        let monitor = self.monitor.take().or_else(|| self.retired.take());
        if let Some(monitor) = &monitor {
            monitor.cancel();
        }
        monitor
    }

    /// Drive the outputs for `direction` at `magnitude` duty
    ///
    /// The idle channel is zeroed first so both are never driven together.
    pub fn drive(&mut self, direction: Direction, magnitude: f64) {
        let board = self.board.as_ref();
        let raise = self.settings.raise_pin.as_str();
        let lower = self.settings.lower_pin.as_str();

        match direction {
            Direction::Stopped => {
                gpio::set_pwm_duty(board, raise, 0.0);
                gpio::set_pwm_duty(board, lower, 0.0);
            }
            Direction::Raising => {
                gpio::set_pwm_duty(board, lower, 0.0);
                gpio::set_pwm_duty(board, raise, magnitude);
            }
            Direction::Lowering => {
                gpio::set_pwm_duty(board, raise, 0.0);
                gpio::set_pwm_duty(board, lower, magnitude);
            }
        }

        self.direction = direction;
        self.power_pct = match direction {
            Direction::Stopped => 0.0,
            _ => magnitude,
        };
    }

    /// Cancel the monitor and zero both outputs
    pub fn halt(&mut self) -> Option<MonitorHandle> {
        let monitor = self.take_monitor();
        self.drive(Direction::Stopped, 0.0);
        monitor
    }
}
