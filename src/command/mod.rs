//! Command dispatch against the open session
//!
//! This module handles:
//! - Translating takeoff / read requests into link calls
//! - Bounded waits for the first telemetry sample of a one-shot read
//! - Failing with `NotConnected` when no session is open

mod dispatcher;
mod first_sample;

pub use dispatcher::{CommandConfig, CommandDispatcher};
