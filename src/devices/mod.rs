//! Device implementations

pub mod mock;
