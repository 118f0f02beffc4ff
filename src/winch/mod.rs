//! Winch motor controller
//!
//! Drives a winch through two PWM channels, "raise" and "lower", and guards
//! every raise with a load cell [`monitor`].
//!
//! # Locking
//!
//! All controller state lives in one `WinchState` behind a single mutex.
//! Decisions and output writes happen with the lock held; waiting for a
//! cancelled monitor to exit happens after it is released, because a
//! tripping monitor needs the lock to latch the emergency stop.
//!
//! # Emergency stop
//!
//! When the monitor sees an overload it latches `emergency_stop` and halts
//! the winch in the same critical section. While latched, raise commands fail
//! with [`Error::SafetyViolation`] and leave the outputs untouched. Any lower
//! command clears the latch.

mod gpio;
pub mod monitor;
mod state;

pub use monitor::{CancelToken, MonitorExit, MonitorStats};
pub use state::Direction;

use crate::config::Config;
use crate::core::deps::Dependencies;
use crate::core::driver::Motor;
use crate::core::types::{Properties, SensorValue};
use crate::error::{Error, Result};
use monitor::MonitorCounters;
use parking_lot::Mutex;
use state::{WinchSettings, WinchState};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Power magnitudes at or below this are treated as a stop request
pub const POWER_EPSILON: f64 = 1e-3;

/// State shared between the controller and its monitor thread
pub(crate) struct Shared {
    name: String,
    state: Mutex<WinchState>,
    /// Controller-wide context; every monitor token is a child of it
    context: CancelToken,
    monitors: MonitorCounters,
}

impl Shared {
    /// Latch the emergency stop and halt the winch on behalf of the monitor
    /// owning `token`
    ///
    /// Returns `false` without touching anything if the token was cancelled
    /// first, i.e. the winch has already been moved on by another command.
    fn trip(&self, token: &CancelToken, reason: &str) -> bool {
        let mut state = self.state.lock();
        if token.is_cancelled() {
            return false;
        }

        state.emergency_stop = true;
        // The handle taken here is the calling monitor's own. It is parked
        // so the next command that takes a monitor waits for this thread.
        state.retired = state.halt();
        drop(state);

        log::warn!("{}: EMERGENCY STOP - {}", self.name, reason);
        true
    }
}

/// Winch controller
pub struct WinchMotor {
    shared: Arc<Shared>,
    closed: AtomicBool,
}

impl WinchMotor {
    /// Build a controller from `config`, resolving its board and load cell
    /// from `deps`
    ///
    /// Both direction pins are driven low and programmed with the configured
    /// PWM frequency before this returns.
    pub fn new(name: &str, config: &Config, deps: &Dependencies) -> Result<Self> {
        config.validate()?;

        let board = deps.board(&config.winch.board)?;
        let sensor = deps.sensor(&config.winch.load_cell_sensor)?;
        log::info!(
            "{}: using board {} and load cell {}",
            name,
            board.name(),
            sensor.name()
        );

        let state = WinchState::new(board, sensor, WinchSettings::from(config));
        state.reset_outputs();

        Ok(Self {
            shared: Arc::new(Shared {
                name: name.to_string(),
                state: Mutex::new(state),
                context: CancelToken::new(),
                monitors: MonitorCounters::default(),
            }),
            closed: AtomicBool::new(false),
        })
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Drive the winch at a signed fraction of full power
    ///
    /// Positive raises, negative lowers, (near) zero stops. Raising starts a
    /// new safety monitor; any previous monitor is cancelled first.
    pub fn set_power(&self, power_pct: f64) -> Result<()> {
        if !power_pct.is_finite() {
            return Err(Error::InvalidParameter(format!(
                "power must be finite, got {}",
                power_pct
            )));
        }
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Closed);
        }
        if power_pct.abs() <= POWER_EPSILON {
            return self.stop();
        }

        let mut magnitude = power_pct.abs();
        if magnitude > 1.0 {
            log::warn!(
                "{}: power {} out of range, clamping to 1.0",
                self.name(),
                power_pct
            );
            magnitude = 1.0;
        }

        let previous = {
            let mut state = self.shared.state.lock();
            // close() sets the flag before taking the lock to stop
            if self.closed.load(Ordering::SeqCst) {
                return Err(Error::Closed);
            }

            if power_pct > 0.0 {
                if state.emergency_stop {
                    return Err(Error::SafetyViolation(format!(
                        "{}: emergency stop latched, lower the winch before raising",
                        self.name()
                    )));
                }

                let previous = state.take_monitor();
                state.drive(Direction::Raising, magnitude);

                let sensor = Arc::clone(&state.sensor);
                let safety = state.settings.safety.clone();
                match monitor::spawn(&self.shared, sensor, safety, previous) {
                    Ok(handle) => state.monitor = Some(handle),
                    Err(e) => {
                        state.halt();
                        return Err(e);
                    }
                }
                log::debug!("{}: raising at {:.3}", self.name(), magnitude);
                // The new monitor joins its predecessor itself
                None
            } else {
                if state.emergency_stop {
                    log::info!("{}: emergency stop cleared by lower command", self.name());
                }
                state.emergency_stop = false;

                let previous = state.take_monitor();
                state.drive(Direction::Lowering, magnitude);
                log::debug!("{}: lowering at {:.3}", self.name(), magnitude);
                previous
            }
        };

        if let Some(previous) = previous {
            previous.join();
        }
        Ok(())
    }

    /// Cancel any monitor and zero both outputs
    ///
    /// Idempotent. Returns once the cancelled monitor has exited, so no
    /// further load cell reads happen on behalf of this winch.
    pub fn stop(&self) -> Result<()> {
        let previous = self.shared.state.lock().halt();
        if let Some(previous) = previous {
            previous.join();
        }
        log::debug!("{}: stopped", self.name());
        Ok(())
    }

    /// Rebind the board and load cell from `deps`
    ///
    /// Any running monitor is cancelled first. If the board cannot be
    /// resolved nothing changes. The board and settings are rebound before
    /// the load cell is resolved and are not rolled back if that fails.
    ///
    /// When the board or output pins change, the old pins are zeroed and the
    /// new ones reset before the swap completes, leaving the winch stopped.
    pub fn reconfigure(&self, config: &Config, deps: &Dependencies) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Closed);
        }
        config.validate()?;

        let (previous, result) = {
            let mut state = self.shared.state.lock();
            if self.closed.load(Ordering::SeqCst) {
                return Err(Error::Closed);
            }
            let previous = state.take_monitor();
            if state.direction == Direction::Raising {
                log::warn!(
                    "{}: reconfigured while raising, load monitoring stopped",
                    self.name()
                );
            }
            let result = self.rebind(&mut state, config, deps);
            (previous, result)
        };

        if let Some(previous) = previous {
            previous.join();
        }
        if let Err(e) = &result {
            log::warn!("{}: reconfigure failed: {}", self.name(), e);
        }
        result
    }

    fn rebind(&self, state: &mut WinchState, config: &Config, deps: &Dependencies) -> Result<()> {
        let board = deps.board(&config.winch.board)?;
        let settings = WinchSettings::from(config);

        let outputs_changed = !Arc::ptr_eq(&board, &state.board)
            || settings.raise_pin != state.settings.raise_pin
            || settings.lower_pin != state.settings.lower_pin
            || settings.pwm_frequency_hz != state.settings.pwm_frequency_hz;

        if outputs_changed {
            if state.direction != Direction::Stopped {
                log::warn!(
                    "{}: outputs rebound while {:?}, stopping",
                    self.name(),
                    state.direction
                );
            }
            // Zero the pins on the old binding; later stops only reach the new one
            state.drive(Direction::Stopped, 0.0);
            state.board = board;
            state.settings = settings;
            state.reset_outputs();
        } else {
            state.board = board;
            state.settings = settings;
        }
        log::info!(
            "{}: board is now configured to {}",
            self.name(),
            state.board.name()
        );

        state.sensor = deps.sensor(&config.winch.load_cell_sensor)?;
        log::info!(
            "{}: load cell is now configured to {}",
            self.name(),
            state.sensor.name()
        );
        Ok(())
    }

    /// Stop the winch and cancel the controller's background context
    ///
    /// Later calls are no-ops.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let result = self.stop();
        self.shared.context.cancel();
        log::info!("{}: closed", self.name());
        result
    }

    pub fn is_moving(&self) -> bool {
        self.shared.state.lock().direction != Direction::Stopped
    }

    /// `(powered, magnitude)`; magnitude is 0.0 while stopped
    pub fn is_powered(&self) -> (bool, f64) {
        let state = self.shared.state.lock();
        match state.direction {
            Direction::Stopped => (false, 0.0),
            _ => (true, state.power_pct),
        }
    }

    pub fn direction(&self) -> Direction {
        self.shared.state.lock().direction
    }

    pub fn emergency_stopped(&self) -> bool {
        self.shared.state.lock().emergency_stop
    }

    pub fn monitor_stats(&self) -> MonitorStats {
        self.shared.monitors.snapshot()
    }
}

impl Motor for WinchMotor {
    fn set_power(&self, power_pct: f64) -> Result<()> {
        WinchMotor::set_power(self, power_pct)
    }

    fn go_for(&self, _rpm: f64, _revolutions: f64) -> Result<()> {
        Err(Error::NotSupported("go_for"))
    }

    fn go_to(&self, _rpm: f64, _position_revolutions: f64) -> Result<()> {
        Err(Error::NotSupported("go_to"))
    }

    fn set_rpm(&self, _rpm: f64) -> Result<()> {
        Err(Error::NotSupported("set_rpm"))
    }

    fn stop(&self) -> Result<()> {
        WinchMotor::stop(self)
    }

    fn is_moving(&self) -> bool {
        WinchMotor::is_moving(self)
    }

    fn is_powered(&self) -> (bool, f64) {
        WinchMotor::is_powered(self)
    }

    fn position(&self) -> Result<f64> {
        Err(Error::NotSupported("position"))
    }

    fn properties(&self) -> Result<Properties> {
        Err(Error::NotSupported("properties"))
    }

    fn reset_zero_position(&self, _offset: f64) -> Result<()> {
        Err(Error::NotSupported("reset_zero_position"))
    }

    fn do_command(
        &self,
        _cmd: &HashMap<String, SensorValue>,
    ) -> Result<HashMap<String, SensorValue>> {
        log::error!("{}: do_command is not supported", self.name());
        Err(Error::NotSupported("do_command"))
    }
}

impl Drop for WinchMotor {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::mock::{SimBoard, SimLoadCell, sim_dependencies};
    use std::time::{Duration, Instant};

    fn winch() -> (WinchMotor, Arc<SimBoard>, Arc<SimLoadCell>) {
        let config = Config::default();
        let (deps, board, cell) = sim_dependencies(&config);
        let winch = WinchMotor::new("winch", &config, &deps).unwrap();
        (winch, board, cell)
    }

    fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        cond()
    }

    #[test]
    fn test_new_resets_outputs() {
        let (winch, board, _) = winch();
        assert_eq!(board.command_count(), 4);
        assert!(!winch.is_moving());
        assert_eq!(winch.is_powered(), (false, 0.0));
        assert!(!winch.emergency_stopped());
    }

    #[test]
    fn test_new_rejects_unknown_dependency() {
        let config = Config::default();
        let result = WinchMotor::new("winch", &config, &Dependencies::new());
        assert!(matches!(
            result,
            Err(Error::DependencyResolution { kind: "board", .. })
        ));
    }

    #[test]
    fn test_raise_starts_one_monitor() {
        let (winch, board, cell) = winch();
        winch.set_power(0.5).unwrap();

        assert_eq!(winch.direction(), Direction::Raising);
        assert_eq!(board.duty("35"), 0.5);
        assert!(wait_until(Duration::from_secs(1), || cell.read_count() > 0));
        assert_eq!(winch.monitor_stats().spawned, 1);
    }

    #[test]
    fn test_lower_does_not_monitor() {
        let (winch, board, cell) = winch();
        winch.set_power(-0.4).unwrap();

        assert_eq!(winch.direction(), Direction::Lowering);
        assert_eq!(winch.is_powered(), (true, 0.4));
        assert_eq!(board.duty("37"), 0.4);
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(cell.read_count(), 0);
        assert_eq!(winch.monitor_stats().spawned, 0);
    }

    #[test]
    fn test_power_is_clamped() {
        let (winch, board, _) = winch();
        winch.set_power(-2.5).unwrap();
        assert_eq!(winch.is_powered(), (true, 1.0));
        assert_eq!(board.duty("37"), 1.0);
    }

    #[test]
    fn test_non_finite_power_rejected() {
        let (winch, board, _) = winch();
        let before = board.command_count();
        assert!(matches!(
            winch.set_power(f64::NAN),
            Err(Error::InvalidParameter(_))
        ));
        assert_eq!(board.command_count(), before);
    }

    #[test]
    fn test_near_zero_power_stops() {
        let (winch, board, cell) = winch();
        winch.set_power(0.7).unwrap();
        winch.set_power(0.0005).unwrap();

        assert!(!winch.is_moving());
        assert_eq!(board.duty("35"), 0.0);
        let reads = cell.read_count();
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(cell.read_count(), reads);
    }

    #[test]
    fn test_trip_latches_and_blocks_raise() {
        let (winch, board, cell) = winch();
        cell.set_raw(20000.0);
        winch.set_power(0.5).unwrap();

        assert!(wait_until(Duration::from_secs(1), || !winch.is_moving()));
        assert!(winch.emergency_stopped());
        assert_eq!(board.duty("35"), 0.0);

        let before = board.command_count();
        assert!(matches!(
            winch.set_power(0.5),
            Err(Error::SafetyViolation(_))
        ));
        assert_eq!(board.command_count(), before);
        assert_eq!(winch.direction(), Direction::Stopped);
    }

    #[test]
    fn test_unsupported_motion() {
        let (winch, _, _) = winch();
        let motor: &dyn Motor = &winch;
        assert!(matches!(motor.go_for(10.0, 1.0), Err(Error::NotSupported("go_for"))));
        assert!(matches!(motor.go_to(10.0, 1.0), Err(Error::NotSupported("go_to"))));
        assert!(matches!(motor.set_rpm(10.0), Err(Error::NotSupported("set_rpm"))));
        assert!(matches!(motor.position(), Err(Error::NotSupported("position"))));
        assert!(matches!(motor.properties(), Err(Error::NotSupported(_))));
        assert!(matches!(
            motor.reset_zero_position(0.0),
            Err(Error::NotSupported(_))
        ));
        assert!(matches!(
            motor.do_command(&HashMap::new()),
            Err(Error::NotSupported("do_command"))
        ));
    }

    #[test]
    fn test_close_races_raise() {
        let (winch, board, _) = winch();
        let winch = Arc::new(winch);

        let raiser = {
            let winch = Arc::clone(&winch);
            std::thread::spawn(move || {
                loop {
                    match winch.set_power(0.5) {
                        Ok(()) => {}
                        Err(Error::Closed) => break,
                        Err(e) => panic!("unexpected error: {}", e),
                    }
                }
            })
        };
        std::thread::sleep(Duration::from_millis(20));
        winch.close().unwrap();
        raiser.join().unwrap();

        assert!(!winch.is_moving());
        assert_eq!(board.duty("35"), 0.0);
        assert!(wait_until(Duration::from_secs(1), || {
            winch.monitor_stats().active == 0
        }));
    }

    #[test]
    fn test_close_is_idempotent_and_final() {
        let (winch, board, _) = winch();
        winch.set_power(0.5).unwrap();
        winch.close().unwrap();
        winch.close().unwrap();

        assert!(!winch.is_moving());
        assert_eq!(board.duty("35"), 0.0);
        assert!(matches!(winch.set_power(0.5), Err(Error::Closed)));
        assert_eq!(winch.monitor_stats().active, 0);
    }
}
