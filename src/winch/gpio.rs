//! Output helpers for the winch pins
//!
//! A failed write is logged and the caller carries on: one stuck pin must not
//! abort a stop sequence halfway through.

use crate::core::driver::Board;

pub(crate) fn set_pin(board: &dyn Board, pin: &str, high: bool) {
    if let Err(e) = board.set_gpio(pin, high) {
        log::error!(
            "{}: failed to drive pin {} {}: {}",
            board.name(),
            pin,
            if high { "high" } else { "low" },
            e
        );
    }
}

pub(crate) fn set_pwm_frequency(board: &dyn Board, pin: &str, freq_hz: u32) {
    if let Err(e) = board.set_pwm_frequency(pin, freq_hz) {
        log::error!(
            "{}: failed to set PWM frequency {}Hz on pin {}: {}",
            board.name(),
            freq_hz,
            pin,
            e
        );
    }
}

pub(crate) fn set_pwm_duty(board: &dyn Board, pin: &str, duty: f64) {
    if let Err(e) = board.set_pwm_duty(pin, duty) {
        log::error!(
            "{}: failed to set PWM duty {:.3} on pin {}: {}",
            board.name(),
            duty,
            pin,
            e
        );
    }
}
