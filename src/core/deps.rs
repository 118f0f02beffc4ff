//! Named device registry handed to controllers

use crate::core::driver::{Board, Sensor};
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Devices available to a controller, keyed by name
#[derive(Clone, Default)]
pub struct Dependencies {
    boards: HashMap<String, Arc<dyn Board>>,
    sensors: HashMap<String, Arc<dyn Sensor>>,
}

impl Dependencies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a board under its own name
    pub fn add_board(&mut self, board: Arc<dyn Board>) -> &mut Self {
        self.boards.insert(board.name().to_string(), board);
        self
    }

    /// Register a sensor under its own name
    pub fn add_sensor(&mut self, sensor: Arc<dyn Sensor>) -> &mut Self {
        self.sensors.insert(sensor.name().to_string(), sensor);
        self
    }

    /// Look up a board by name
    pub fn board(&self, name: &str) -> Result<Arc<dyn Board>> {
        self.boards
            .get(name)
            .cloned()
            .ok_or_else(|| Error::DependencyResolution {
                kind: "board",
                name: name.to_string(),
            })
    }

    /// Look up a sensor by name
    pub fn sensor(&self, name: &str) -> Result<Arc<dyn Sensor>> {
        self.sensors
            .get(name)
            .cloned()
            .ok_or_else(|| Error::DependencyResolution {
                kind: "sensor",
                name: name.to_string(),
            })
    }
}
