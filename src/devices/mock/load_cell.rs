//! Simulated load cell

use crate::core::driver::Sensor;
use crate::core::types::{Readings, SensorValue};
use crate::error::{Error, Result};
use crate::winch::monitor::RAW_READING;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Mode {
    Healthy,
    /// `readings()` returns an error
    Failing,
    /// `readings()` succeeds without a `raw` entry
    Malformed,
}

struct LoadCellInner {
    raw: f64,
    mode: Mode,
}

/// Load cell whose reading is set by the caller
pub struct SimLoadCell {
    name: String,
    inner: Mutex<LoadCellInner>,
    reads: AtomicU64,
}

impl SimLoadCell {
    pub fn new(name: &str, raw: f64) -> Self {
        Self {
            name: name.to_string(),
            inner: Mutex::new(LoadCellInner {
                raw,
                mode: Mode::Healthy,
            }),
            reads: AtomicU64::new(0),
        }
    }

    /// Set the raw value returned by subsequent reads
    pub fn set_raw(&self, raw: f64) {
        let mut inner = self.inner.lock();
        inner.raw = raw;
        inner.mode = Mode::Healthy;
    }

    /// Current raw value
    pub fn raw(&self) -> f64 {
        self.inner.lock().raw
    }

    /// Make subsequent reads fail
    pub fn set_failing(&self) {
        self.inner.lock().mode = Mode::Failing;
    }

    /// Make subsequent reads omit the raw value
    pub fn set_malformed(&self) {
        self.inner.lock().mode = Mode::Malformed;
    }

    /// Number of `readings()` calls so far
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }
}

impl Sensor for SimLoadCell {
    fn name(&self) -> &str {
        &self.name
    }

    fn readings(&self) -> Result<Readings> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let inner = self.inner.lock();

        let mut readings = Readings::new();
        match inner.mode {
            Mode::Failing => {
                return Err(Error::SensorFailure(format!(
                    "{}: simulated read failure",
                    self.name
                )));
            }
            Mode::Malformed => {
                readings.insert("status".to_string(), SensorValue::String("ok".into()));
            }
            Mode::Healthy => {
                readings.insert(RAW_READING.to_string(), SensorValue::F64(inner.raw));
            }
        }
        Ok(readings)
    }
}
