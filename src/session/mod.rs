//! Session management for the single drone link
//!
//! This module handles:
//! - Owning at most one open link at a time
//! - Serializing connect/disconnect against every command
//! - Tracking the asynchronously reported deck-attachment flag

mod coordinator;

pub use coordinator::{SessionConfig, SessionCoordinator, DEFAULT_URI};
