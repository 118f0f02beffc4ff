//! winchd - winch controller daemon
//!
//! Runs a [`WinchMotor`] on simulated devices and takes operator commands
//! from stdin:
//!
//! - `power <pct>`: signed power, positive raises, negative lowers
//! - `stop`
//! - `status`
//! - `load <raw>`: set the simulated load cell value
//! - `quit`

use crossbeam_channel::RecvTimeoutError;
use std::env;
use std::io::{self, BufRead};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use winch_motor::console::ConsoleCommand;
use winch_motor::devices::mock::{SimLoadCell, sim_dependencies};
use winch_motor::{Config, Error, Result, WinchMotor};

/// How often the main loop rechecks the shutdown flag
const IDLE_POLL: Duration = Duration::from_millis(100);

/// Parse config path from command line arguments.
///
/// Supports:
/// - `winchd <path>` (positional)
/// - `winchd --config <path>` (flag-based)
/// - `winchd -c <path>` (short flag)
///
/// Defaults to `winch.toml` if not specified.
fn parse_config_path() -> String {
    let args: Vec<String> = env::args().collect();

    for i in 1..args.len() {
        if (args[i] == "--config" || args[i] == "-c") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }

    if args.len() > 1 && !args[1].starts_with('-') {
        return args[1].clone();
    }

    "winch.toml".to_string()
}

fn main() -> Result<()> {
    let config_path = parse_config_path();
    let (config, from_file) = if Path::new(&config_path).exists() {
        (Config::load(&config_path)?, true)
    } else {
        (Config::default(), false)
    };

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    log::info!("winchd v{} starting...", env!("CARGO_PKG_VERSION"));
    if from_file {
        log::info!("Using config: {}", config_path);
    } else {
        log::warn!("{} not found, using built-in defaults", config_path);
    }

    let (deps, _board, load_cell) = sim_dependencies(&config);
    let winch = WinchMotor::new("winch", &config, &deps)?;

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })
    .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    let (line_tx, line_rx) = crossbeam_channel::unbounded::<String>();
    thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if line_tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        log::error!("stdin read error: {}", e);
                        break;
                    }
                }
            }
        })
        .map_err(|e| Error::Other(format!("Failed to spawn stdin reader: {}", e)))?;

    log::info!("winchd running. Type 'quit' or press Ctrl-C to stop.");

    while running.load(Ordering::Relaxed) {
        let line = match line_rx.recv_timeout(IDLE_POLL) {
            Ok(line) => line,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        match line.parse::<ConsoleCommand>() {
            Ok(ConsoleCommand::Quit) => break,
            Ok(command) => {
                if let Err(e) = execute(&winch, &load_cell, command) {
                    log::error!("{}", e);
                }
            }
            Err(e) => log::warn!("{}", e),
        }
    }

    log::info!("Shutting down...");
    winch.close()?;
    log::info!("winchd stopped");
    Ok(())
}

fn execute(winch: &WinchMotor, load_cell: &SimLoadCell, command: ConsoleCommand) -> Result<()> {
    match command {
        ConsoleCommand::Power(pct) => winch.set_power(pct)?,
        ConsoleCommand::Stop => winch.stop()?,
        ConsoleCommand::Load(raw) => load_cell.set_raw(raw),
        ConsoleCommand::Status => {
            let (powered, pct) = winch.is_powered();
            let stats = winch.monitor_stats();
            println!(
                "direction={:?} powered={} power={:.3} emergency_stop={} load={} monitors={} last_exit={:?}",
                winch.direction(),
                powered,
                pct,
                winch.emergency_stopped(),
                load_cell.raw(),
                stats.spawned,
                stats.last_exit
            );
        }
        ConsoleCommand::Quit => {}
    }
    Ok(())
}
