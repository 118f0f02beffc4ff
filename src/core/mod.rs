//! Core abstractions shared by the controller and device implementations.
//!
//! - [`driver::Board`] / [`driver::Sensor`]: capabilities a device must provide
//! - [`driver::Motor`]: the motor surface exposed to the host
//! - [`deps::Dependencies`]: named devices handed to a controller
//! - [`types`]: sensor values and readings

pub mod deps;
pub mod driver;
pub mod types;
