// src/core/state/mod.rs

//! Defines the central `BrokerState` struct: the process-wide context built
//! once at startup and shared, read-only, with every background task.

mod core;

pub use core::{BrokerInit, BrokerState};
