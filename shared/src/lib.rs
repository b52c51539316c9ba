//! quadlink shared wire types
//!
//! This crate provides the JSON types, frame codec and stream state machine
//! shared between the gateway and its clients.

pub mod codec;
pub mod state_machine;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Timing parameters for the gateway
pub mod timing {
    /// How long connect waits for the deck-attachment report
    pub const DECK_WAIT_MS: u64 = 1000;

    /// Upper bound on waiting for the first sample of a one-shot read
    pub const FIRST_SAMPLE_TIMEOUT_MS: u64 = 2000;

    /// Log period used by the telemetry stream
    pub const STREAM_PERIOD_MS: u64 = 10;

    /// How often the streamer probes the client socket
    pub const CLIENT_POLL_INTERVAL_MS: u64 = 1000;

    /// How long takeoff holds the hover before stopping
    pub const TAKEOFF_HOVER_MS: u64 = 2000;

    /// Radio log periods are expressed in 10 ms units stored in a u8
    pub const LOG_PERIOD_UNIT_MS: u64 = 10;
    pub const LOG_PERIOD_MIN_MS: u64 = 10;
    pub const LOG_PERIOD_MAX_MS: u64 = 2550;
}

/// Telemetry variable names as published by the drone's log TOC
pub mod vars {
    pub const ROLL: &str = "stabilizer.roll";
    pub const PITCH: &str = "stabilizer.pitch";
    pub const YAW: &str = "stabilizer.yaw";
    pub const BATTERY_VOLTAGE: &str = "pm.vbat";

    /// The attitude triple streamed to clients
    pub const STABILIZER: [&str; 3] = [ROLL, PITCH, YAW];
}

/// Number of decimal digits used when reporting single reads
pub const READ_PRECISION: usize = 8;

/// Format a read value the way the HTTP API reports it
pub fn format_reading(value: f32) -> String {
    format!("{:.*}", READ_PRECISION, value)
}

/// One timestamped set of decoded values pushed from the drone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    /// Drone tick clock, milliseconds since the link was opened
    pub timestamp: u64,
    /// Full variable name -> decoded value
    pub values: BTreeMap<String, f32>,
}

impl TelemetrySample {
    pub fn new(timestamp: u64) -> Self {
        Self {
            timestamp,
            values: BTreeMap::new(),
        }
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: f32) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<f32> {
        self.values.get(name).copied()
    }
}

/// Strip the log group from a variable name (`stabilizer.roll` -> `roll`)
pub fn short_name(name: &str) -> &str {
    name.rsplit_once('.').map(|(_, short)| short).unwrap_or(name)
}

/// Wire form of a telemetry sample: `{timestamp, roll, pitch, yaw}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryFrame {
    pub timestamp: u64,
    #[serde(flatten)]
    pub values: BTreeMap<String, f32>,
}

impl From<&TelemetrySample> for TelemetryFrame {
    fn from(sample: &TelemetrySample) -> Self {
        Self {
            timestamp: sample.timestamp,
            values: sample
                .values
                .iter()
                .map(|(name, value)| (short_name(name).to_string(), *value))
                .collect(),
        }
    }
}

/// Why a command failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    NotConnected,
    ConnectFailed,
    TelemetryTimeout,
    LinkError,
}

/// Tagged outcome of a dispatched command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CommandResult {
    Success {
        payload: serde_json::Value,
    },
    Failure {
        reason: ReasonCode,
        message: String,
    },
}

impl CommandResult {
    pub fn is_success(&self) -> bool {
        matches!(self, CommandResult::Success { .. })
    }
}

/// `{message}` body used by most command endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Body returned by `POST /connect`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectResponse {
    pub message: String,
    pub deck_attached: bool,
}

/// Body returned by `POST /read_battery_voltage`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatteryResponse {
    pub voltage: String,
}

/// Body returned by `POST /read_parameters`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttitudeResponse {
    pub roll: String,
    pub pitch: String,
    pub yaw: String,
}

/// Body returned by `GET /status`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub connected: bool,
    pub uri: Option<String>,
    pub deck_attached: bool,
    pub connected_for_ms: Option<u64>,
}

/// Error body, `{detail}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_reading_precision() {
        assert_eq!(format_reading(1.5), "1.50000000");
        assert_eq!(format_reading(-0.25), "-0.25000000");
        let formatted = format_reading(3.7);
        let decimals = formatted.split('.').nth(1).unwrap();
        assert_eq!(decimals.len(), READ_PRECISION);
    }

    #[test]
    fn test_short_name() {
        assert_eq!(short_name(vars::ROLL), "roll");
        assert_eq!(short_name("pm.vbat"), "vbat");
        assert_eq!(short_name("plain"), "plain");
    }

    #[test]
    fn test_frame_from_sample_strips_groups() {
        let sample = TelemetrySample::new(42)
            .with(vars::ROLL, 1.0)
            .with(vars::PITCH, 2.0)
            .with(vars::YAW, 3.0);
        let frame = TelemetryFrame::from(&sample);
        assert_eq!(frame.timestamp, 42);
        assert_eq!(frame.values.get("roll"), Some(&1.0));
        assert_eq!(frame.values.get("yaw"), Some(&3.0));
        assert!(!frame.values.contains_key(vars::ROLL));
    }

    #[test]
    fn test_command_result_tagging() {
        let failure = CommandResult::Failure {
            reason: ReasonCode::NotConnected,
            message: "not connected".into(),
        };
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["status"], "failure");
        assert_eq!(json["reason"], "not_connected");
        assert!(!failure.is_success());
    }
}
