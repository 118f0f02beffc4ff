//! Simulated GPIO/PWM board

use crate::core::driver::Board;
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

/// One command received by the board
#[derive(Debug, Clone, PartialEq)]
pub enum PinCommand {
    Gpio { pin: String, high: bool },
    PwmFrequency { pin: String, freq_hz: u32 },
    PwmDuty { pin: String, duty: f64 },
}

#[derive(Default)]
struct SimBoardInner {
    history: Vec<PinCommand>,
    duty: HashMap<String, f64>,
    failing: HashSet<String>,
}

/// Board that records commands instead of driving hardware
pub struct SimBoard {
    name: String,
    inner: Mutex<SimBoardInner>,
}

impl SimBoard {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            inner: Mutex::new(SimBoardInner::default()),
        }
    }

    /// Make every command to `pin` fail (or succeed again)
    pub fn set_pin_failing(&self, pin: &str, failing: bool) {
        let mut inner = self.inner.lock();
        if failing {
            inner.failing.insert(pin.to_string());
        } else {
            inner.failing.remove(pin);
        }
    }

    /// Last duty cycle written to `pin` (0.0 if never written)
    pub fn duty(&self, pin: &str) -> f64 {
        self.inner.lock().duty.get(pin).copied().unwrap_or(0.0)
    }

    /// All commands received so far
    pub fn history(&self) -> Vec<PinCommand> {
        self.inner.lock().history.clone()
    }

    /// Number of commands received so far
    pub fn command_count(&self) -> usize {
        self.inner.lock().history.len()
    }

    fn apply(&self, cmd: PinCommand) -> Result<()> {
        let mut inner = self.inner.lock();
        let pin = match &cmd {
            PinCommand::Gpio { pin, .. }
            | PinCommand::PwmFrequency { pin, .. }
            | PinCommand::PwmDuty { pin, .. } => pin.clone(),
        };
        if inner.failing.contains(&pin) {
            return Err(Error::OutputFailure {
                pin,
                reason: format!("simulated fault on {}", self.name),
            });
        }

        log::trace!("{}: {:?}", self.name, cmd);
        if let PinCommand::PwmDuty { duty, .. } = cmd {
            inner.duty.insert(pin, duty);
        }
        inner.history.push(cmd);
        Ok(())
    }
}

impl Board for SimBoard {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_gpio(&self, pin: &str, high: bool) -> Result<()> {
        self.apply(PinCommand::Gpio {
            pin: pin.to_string(),
            high,
        })
    }

    fn set_pwm_frequency(&self, pin: &str, freq_hz: u32) -> Result<()> {
        self.apply(PinCommand::PwmFrequency {
            pin: pin.to_string(),
            freq_hz,
        })
    }

    fn set_pwm_duty(&self, pin: &str, duty: f64) -> Result<()> {
        self.apply(PinCommand::PwmDuty {
            pin: pin.to_string(),
            duty,
        })
    }
}
