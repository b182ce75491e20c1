//! # Interface Layer
//!
//! Chat-facing command handlers, run by the Router under the Supervisor.

pub mod commands;
