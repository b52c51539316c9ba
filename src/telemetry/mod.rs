//! Telemetry streaming to WebSocket clients
//!
//! Each client gets its own log block on the shared session link. Samples
//! are forwarded one frame each until the client leaves or the link closes.

mod streamer;

pub use streamer::{StreamConfig, TelemetryStreamer};
