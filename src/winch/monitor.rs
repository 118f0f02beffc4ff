//! Load cell safety monitor
//!
//! One monitor thread runs per raise. Each cycle it checks its cancel token,
//! samples the load cell, and sleeps for the poll interval, so cancellation
//! latency is at most one interval plus one sensor read.
//!
//! ```text
//!              token cancelled
//!   Running ──────────────────────────▶ Cancelled
//!      │     raw > max_allowable_raw
//!      ├──────────────────────────────▶ Tripped      (latches emergency stop, stops winch)
//!      │     read error / no numeric "raw"
//!      └──────────────────────────────▶ SensorError  (stops winch only when fail-safe)
//! ```
//!
//! All three exits are terminal. A replacement monitor joins its predecessor
//! before it starts sampling, so at most one monitor is ever running per
//! controller.

use super::Shared;
use crate::config::{SafetyConfig, SensorFailurePolicy};
use crate::core::driver::Sensor;
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

/// Reading key carrying the load cell's raw value
pub const RAW_READING: &str = "raw";

/// Cooperative cancellation flag
///
/// A child token reports cancelled when it or any ancestor is cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    parent: Option<Box<CancelToken>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// New token cancelled together with `self`
    pub fn child(&self) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            parent: Some(Box::new(self.clone())),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
            || self.parent.as_ref().is_some_and(|p| p.is_cancelled())
    }
}

/// How a monitor ended
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorExit {
    /// Token cancelled by stop, reconfigure, a new power command or close
    Cancelled,
    /// Load exceeded the threshold; emergency stop latched
    Tripped { raw: f64 },
    /// Load cell unreadable
    SensorError(String),
}

/// Monitor lifecycle counters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonitorStats {
    /// Monitors spawned since construction
    pub spawned: u64,
    /// Monitors currently sampling
    pub active: usize,
    /// Highest `active` ever observed
    pub peak_active: usize,
    pub last_exit: Option<MonitorExit>,
}

#[derive(Default)]
pub(crate) struct MonitorCounters {
    stats: Mutex<MonitorStats>,
}

impl MonitorCounters {
    fn spawned(&self) -> u64 {
        let mut stats = self.stats.lock();
        stats.spawned += 1;
        stats.spawned
    }

    fn entered(&self) {
        let mut stats = self.stats.lock();
        stats.active += 1;
        stats.peak_active = stats.peak_active.max(stats.active);
    }

    fn exited(&self, exit: &MonitorExit) {
        let mut stats = self.stats.lock();
        stats.active = stats.active.saturating_sub(1);
        stats.last_exit = Some(exit.clone());
    }

    pub fn snapshot(&self) -> MonitorStats {
        self.stats.lock().clone()
    }
}

/// Owner's handle on a running monitor
pub(crate) struct MonitorHandle {
    id: u64,
    token: CancelToken,
    thread: JoinHandle<MonitorExit>,
}

impl MonitorHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Wait for the monitor thread to finish
    ///
    /// Must not be called with the state lock held: a tripping monitor takes
    /// that lock before it exits. Returns `None` when called from the monitor
    /// thread itself or if the thread panicked.
    pub fn join(self) -> Option<MonitorExit> {
        if self.thread.thread().id() == thread::current().id() {
            return None;
        }
        match self.thread.join() {
            Ok(exit) => Some(exit),
            Err(_) => {
                log::error!("Safety monitor {} panicked", self.id);
                None
            }
        }
    }
}

/// Start a monitor bound to a fresh child of the controller context
///
/// `predecessor`, if given, must already be cancelled; the new thread joins
/// it before sampling.
pub(crate) fn spawn(
    shared: &Arc<Shared>,
    sensor: Arc<dyn Sensor>,
    safety: SafetyConfig,
    predecessor: Option<MonitorHandle>,
) -> Result<MonitorHandle> {
    let token = shared.context.child();
    let id = shared.monitors.spawned();

    let monitor = Monitor {
        id,
        shared: Arc::clone(shared),
        sensor,
        safety,
        token: token.clone(),
    };

    let thread = thread::Builder::new()
        .name(format!("winch-monitor-{}", id))
        .spawn(move || monitor.run(predecessor))
        .map_err(|e| Error::Other(format!("Failed to spawn safety monitor: {}", e)))?;

    Ok(MonitorHandle { id, token, thread })
}

/// Sample the load cell once and extract the raw value
pub(crate) fn read_raw(sensor: &dyn Sensor) -> Result<f64> {
    let readings = sensor.readings().map_err(|e| match e {
        Error::SensorFailure(_) => e,
        other => Error::SensorFailure(format!("{}: {}", sensor.name(), other)),
    })?;

    let value = readings.get(RAW_READING).ok_or_else(|| {
        Error::SensorFailure(format!(
            "{}: reading has no '{}' value",
            sensor.name(),
            RAW_READING
        ))
    })?;

    match value.as_f64() {
        Some(raw) if raw.is_finite() => Ok(raw),
        _ => Err(Error::SensorFailure(format!(
            "{}: '{}' is not a finite number: {:?}",
            sensor.name(),
            RAW_READING,
            value
        ))),
    }
}

struct Monitor {
    id: u64,
    shared: Arc<Shared>,
    sensor: Arc<dyn Sensor>,
    safety: SafetyConfig,
    token: CancelToken,
}

impl Monitor {
    fn run(self, predecessor: Option<MonitorHandle>) -> MonitorExit {
        if let Some(previous) = predecessor {
            previous.join();
        }

        self.shared.monitors.entered();
        log::debug!(
            "{}: safety monitor {} started (limit {}, every {}ms)",
            self.shared.name,
            self.id,
            self.safety.max_allowable_raw,
            self.safety.poll_interval_ms
        );

        let exit = self.poll();

        match &exit {
            MonitorExit::Cancelled => {
                log::debug!("{}: safety monitor {} cancelled", self.shared.name, self.id)
            }
            MonitorExit::Tripped { raw } => log::warn!(
                "{}: safety monitor {} tripped at raw {}",
                self.shared.name,
                self.id,
                raw
            ),
            MonitorExit::SensorError(reason) => log::error!(
                "{}: safety monitor {} stopped, load cell unreadable: {}",
                self.shared.name,
                self.id,
                reason
            ),
        }

        self.shared.monitors.exited(&exit);
        exit
    }

    fn poll(&self) -> MonitorExit {
        let interval = self.safety.poll_interval();

        loop {
            if self.token.is_cancelled() {
                return MonitorExit::Cancelled;
            }

            match read_raw(self.sensor.as_ref()) {
                Ok(raw) if raw > self.safety.max_allowable_raw => {
                    let reason = format!(
                        "load cell raw {} exceeds {}",
                        raw, self.safety.max_allowable_raw
                    );
                    return if self.shared.trip(&self.token, &reason) {
                        MonitorExit::Tripped { raw }
                    } else {
                        MonitorExit::Cancelled
                    };
                }
                Ok(raw) => {
                    log::trace!("{}: load cell raw {}", self.shared.name, raw);
                }
                Err(e) => {
                    let reason = e.to_string();
                    if self.safety.sensor_failure == SensorFailurePolicy::FailSafe
                        && !self.shared.trip(&self.token, &reason)
                    {
                        return MonitorExit::Cancelled;
                    }
                    return MonitorExit::SensorError(reason);
                }
            }

            thread::sleep(interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Readings, SensorValue};
    use crate::devices::mock::SimLoadCell;

    struct FixedSensor(Readings);

    impl Sensor for FixedSensor {
        fn name(&self) -> &str {
            "fixed"
        }

        fn readings(&self) -> Result<Readings> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_child_token_follows_parent() {
        let parent = CancelToken::new();
        let child = parent.child();
        let grandchild = child.child();

        assert!(!grandchild.is_cancelled());
        parent.cancel();
        assert!(child.is_cancelled());
        assert!(grandchild.is_cancelled());
    }

    #[test]
    fn test_child_cancel_does_not_reach_parent() {
        let parent = CancelToken::new();
        let child = parent.child();
        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());
    }

    #[test]
    fn test_read_raw() {
        let cell = SimLoadCell::new("scale", 1234.5);
        assert_eq!(read_raw(&cell).unwrap(), 1234.5);

        cell.set_malformed();
        assert!(matches!(read_raw(&cell), Err(Error::SensorFailure(_))));

        cell.set_failing();
        assert!(matches!(read_raw(&cell), Err(Error::SensorFailure(_))));
    }

    #[test]
    fn test_read_raw_accepts_integer_values() {
        let mut readings = Readings::new();
        readings.insert(RAW_READING.to_string(), SensorValue::I32(20000));
        assert_eq!(read_raw(&FixedSensor(readings)).unwrap(), 20000.0);
    }

    #[test]
    fn test_read_raw_rejects_wrong_type() {
        let mut readings = Readings::new();
        readings.insert(RAW_READING.to_string(), SensorValue::String("heavy".into()));
        assert!(matches!(
            read_raw(&FixedSensor(readings)),
            Err(Error::SensorFailure(_))
        ));

        let mut readings = Readings::new();
        readings.insert(RAW_READING.to_string(), SensorValue::F64(f64::NAN));
        assert!(matches!(
            read_raw(&FixedSensor(readings)),
            Err(Error::SensorFailure(_))
        ));
    }

    #[test]
    fn test_counters_track_peak() {
        let counters = MonitorCounters::default();
        assert_eq!(counters.spawned(), 1);
        counters.entered();
        counters.exited(&MonitorExit::Cancelled);
        counters.entered();

        let stats = counters.snapshot();
        assert_eq!(stats.spawned, 1);
        assert_eq!(stats.active, 1);
        assert_eq!(stats.peak_active, 1);
        assert_eq!(stats.last_exit, Some(MonitorExit::Cancelled));
    }
}
