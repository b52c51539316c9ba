//! JSON text-frame codec for the telemetry WebSocket
//!
//! Every WebSocket text frame carries exactly one JSON object:
//! ```text
//! { "timestamp": 1234, "roll": 0.1, "pitch": -0.2, "yaw": 12.5 }
//! { "error": "not connected" }
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{TelemetryFrame, TelemetrySample};

/// Maximum accepted frame size (64 KB); telemetry frames are a few dozen bytes
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

/// Errors that can occur during encoding/decoding
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Frame too large: {0} bytes (max: {MAX_FRAME_SIZE})")]
    FrameTooLarge(usize),

    #[error("Non-finite value for {0}")]
    NonFinite(String),

    #[error("Frame is not a JSON object")]
    NotAnObject,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Error frame sent before the server closes a stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorFrame {
    pub error: String,
}

/// Any message the gateway sends over the telemetry socket
#[derive(Debug, Clone, PartialEq)]
pub enum StreamMessage {
    Telemetry(TelemetryFrame),
    Error(ErrorFrame),
}

impl StreamMessage {
    pub fn error(message: impl Into<String>) -> Self {
        StreamMessage::Error(ErrorFrame {
            error: message.into(),
        })
    }
}

impl From<&TelemetrySample> for StreamMessage {
    fn from(sample: &TelemetrySample) -> Self {
        StreamMessage::Telemetry(TelemetryFrame::from(sample))
    }
}

/// Encode a message into a text frame
pub fn encode(message: &StreamMessage) -> Result<String, CodecError> {
    let text = match message {
        StreamMessage::Telemetry(frame) => {
            // serde_json would silently turn NaN into null
            if let Some((name, _)) = frame.values.iter().find(|(_, v)| !v.is_finite()) {
                return Err(CodecError::NonFinite(name.clone()));
            }
            serde_json::to_string(frame)?
        }
        StreamMessage::Error(frame) => serde_json::to_string(frame)?,
    };

    if text.len() > MAX_FRAME_SIZE {
        return Err(CodecError::FrameTooLarge(text.len()));
    }

    Ok(text)
}

/// Encode a telemetry sample directly
pub fn encode_sample(sample: &TelemetrySample) -> Result<String, CodecError> {
    encode(&StreamMessage::from(sample))
}

/// Decode a text frame
pub fn decode(text: &str) -> Result<StreamMessage, CodecError> {
    if text.len() > MAX_FRAME_SIZE {
        return Err(CodecError::FrameTooLarge(text.len()));
    }

    let value: serde_json::Value = serde_json::from_str(text)?;
    let object = value.as_object().ok_or(CodecError::NotAnObject)?;

    if object.get("error").is_some_and(|e| e.is_string()) {
        return Ok(StreamMessage::Error(serde_json::from_value(value)?));
    }

    Ok(StreamMessage::Telemetry(serde_json::from_value(value)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vars;

    fn sample() -> TelemetrySample {
        TelemetrySample::new(1500)
            .with(vars::ROLL, 0.5)
            .with(vars::PITCH, -1.25)
            .with(vars::YAW, 90.0)
    }

    #[test]
    fn test_telemetry_frame_shape() {
        let text = encode_sample(&sample()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(value["timestamp"], 1500);
        assert_eq!(value["roll"], 0.5);
        assert_eq!(value["pitch"], -1.25);
        assert_eq!(value["yaw"], 90.0);
        assert_eq!(value.as_object().unwrap().len(), 4);
    }

    #[test]
    fn test_decode_distinguishes_error_frames() {
        let decoded = decode(r#"{"error":"not connected"}"#).unwrap();
        assert_eq!(decoded, StreamMessage::error("not connected"));

        let text = encode_sample(&sample()).unwrap();
        match decode(&text).unwrap() {
            StreamMessage::Telemetry(frame) => assert_eq!(frame.values.len(), 3),
            other => panic!("expected telemetry, got {:?}", other),
        }
    }

    #[test]
    fn test_non_finite_rejected() {
        let bad = TelemetrySample::new(1).with(vars::ROLL, f32::NAN);
        assert!(matches!(
            encode_sample(&bad),
            Err(CodecError::NonFinite(name)) if name == "roll"
        ));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode("[1,2,3]"), Err(CodecError::NotAnObject)));
        assert!(matches!(decode(r#"{"roll":1.0}"#), Err(CodecError::Json(_))));
        assert!(decode("not json").is_err());
    }
}
