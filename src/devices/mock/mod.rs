//! Simulated devices for hardware-free runs and tests
//!
//! - [`SimBoard`]: records every output command, with per-pin failure injection
//! - [`SimLoadCell`]: load cell with a settable raw value

mod board;
mod load_cell;

pub use board::{PinCommand, SimBoard};
pub use load_cell::SimLoadCell;

use crate::config::Config;
use crate::core::deps::Dependencies;
use std::sync::Arc;

/// Build a dependency set with one simulated board and load cell, named as
/// the config expects
pub fn sim_dependencies(config: &Config) -> (Dependencies, Arc<SimBoard>, Arc<SimLoadCell>) {
    let board = Arc::new(SimBoard::new(&config.winch.board));
    let load_cell = Arc::new(SimLoadCell::new(&config.winch.load_cell_sensor, 0.0));

    let mut deps = Dependencies::new();
    deps.add_board(board.clone()).add_sensor(load_cell.clone());
    (deps, board, load_cell)
}
