//! Core data types for sensor readings and motor properties.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Runtime sensor values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SensorValue {
    Bool(bool),
    U16(u16),
    U32(u32),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    String(String),
}

impl SensorValue {
    /// Numeric value as `f64`, or `None` for non-numeric variants
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            SensorValue::U16(v) => Some(v as f64),
            SensorValue::U32(v) => Some(v as f64),
            SensorValue::I16(v) => Some(v as f64),
            SensorValue::I32(v) => Some(v as f64),
            SensorValue::I64(v) => Some(v as f64),
            SensorValue::F32(v) => Some(v as f64),
            SensorValue::F64(v) => Some(v),
            SensorValue::Bool(_) | SensorValue::String(_) => None,
        }
    }
}

/// One sample from a sensor, keyed by reading name
pub type Readings = HashMap<String, SensorValue>;

/// Static motor capabilities
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Properties {
    pub position_reporting: bool,
}
