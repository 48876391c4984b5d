// src/core/tasks/mod.rs

//! Long-running background tasks that support the control plane: currently
//! just the zombie reaper.

pub mod reaper;
