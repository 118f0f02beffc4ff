//! Winch motor controller with load-cell overload protection
//!
//! A [`WinchMotor`] drives a winch up or down through two PWM channels on a
//! [`Board`](crate::core::driver::Board). While raising, a background safety monitor
//! polls a load cell [`Sensor`](crate::core::driver::Sensor) and latches an
//! emergency stop when the load exceeds the configured limit.
//!
//! ```no_run
//! use winch_motor::{Config, WinchMotor, devices::mock::sim_dependencies};
//!
//! let config = Config::default();
//! let (deps, _board, _load_cell) = sim_dependencies(&config);
//! let winch = WinchMotor::new("winch", &config, &deps)?;
//! winch.set_power(0.5)?;
//! winch.stop()?;
//! # Ok::<(), winch_motor::Error>(())
//! ```

pub mod config;
pub mod console;
pub mod core;
pub mod devices;
pub mod error;
pub mod winch;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
pub use winch::{Direction, MonitorExit, MonitorStats, WinchMotor};
