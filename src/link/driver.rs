//! Link trait abstraction for pluggable drone-control backends

use super::LinkUri;
use async_trait::async_trait;
use quadlink_shared::{timing, TelemetrySample};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};

/// Errors raised by a link backend
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LinkError {
    #[error("Invalid link URI: {0}")]
    InvalidUri(String),

    #[error("Failed to open {uri}: {reason}")]
    OpenFailed { uri: String, reason: String },

    #[error("Link is closed")]
    Closed,

    #[error("Unknown log variable: {0}")]
    UnknownVariable(String),

    #[error("Invalid log period {0} ms (multiple of 10 within 10..=2550)")]
    InvalidPeriod(u64),

    #[error("Log block rejected: {0}")]
    LogRejected(String),

    #[error("Sample is missing variable {0}")]
    MissingVariable(String),
}

/// Deck presence as last reported by the drone; `None` until the first report
pub type DeckState = Option<bool>;

/// A telemetry configuration: which variables, how often
#[derive(Debug, Clone, PartialEq)]
pub struct LogBlock {
    pub variables: Vec<String>,
    pub period: Duration,
}

impl LogBlock {
    pub fn new<I, S>(variables: I, period: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            variables: variables.into_iter().map(Into::into).collect(),
            period,
        }
    }

    /// Check the period fits the radio's 10 ms / u8 encoding
    pub fn validate(&self) -> Result<(), LinkError> {
        let ms = self.period.as_millis() as u64;
        let in_range = (timing::LOG_PERIOD_MIN_MS..=timing::LOG_PERIOD_MAX_MS).contains(&ms);
        let whole_ms = self.period.subsec_nanos() % 1_000_000 == 0;
        if !in_range || ms % timing::LOG_PERIOD_UNIT_MS != 0 || !whole_ms {
            return Err(LinkError::InvalidPeriod(ms));
        }
        if self.variables.is_empty() {
            return Err(LinkError::LogRejected("no variables".into()));
        }
        Ok(())
    }
}

/// Receiving end of a registered log block.
///
/// Dropping the stream unsubscribes the block. The stream ends (`recv`
/// returns `None`) when the link is closed.
pub struct LogStream {
    rx: mpsc::Receiver<TelemetrySample>,
    _stop: oneshot::Sender<()>,
}

impl LogStream {
    /// Build a stream from the sample channel and the stop signal the
    /// backend watches for
    pub fn new(rx: mpsc::Receiver<TelemetrySample>, stop: oneshot::Sender<()>) -> Self {
        Self { rx, _stop: stop }
    }

    /// Next sample, `None` once the backend stopped the block
    pub async fn recv(&mut self) -> Option<TelemetrySample> {
        self.rx.recv().await
    }
}

/// Single movement commands the gateway issues
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotionCommand {
    /// Climb to the given height and hold
    TakeOff { height_m: f32 },
    /// Cut the setpoint, motors stop
    Stop,
}

/// Factory for opening links
#[async_trait]
pub trait LinkDriver: Send + Sync {
    /// Open a link to the drone at `uri`
    async fn open(&self, uri: &LinkUri) -> Result<Box<dyn DroneLink>, LinkError>;

    /// Human-readable name for this driver
    fn name(&self) -> &'static str;
}

/// An open link to one drone
#[async_trait]
pub trait DroneLink: Send + Sync {
    fn uri(&self) -> &LinkUri;

    /// Deck-attachment flag, updated by the drone's parameter callback
    fn deck_state(&self) -> watch::Receiver<DeckState>;

    /// Register a log block; samples arrive on the returned stream
    async fn start_log(&self, block: LogBlock) -> Result<LogStream, LinkError>;

    /// Issue one movement command
    async fn send_motion(&self, command: MotionCommand) -> Result<(), LinkError>;

    /// Close the link; ends every open log stream
    async fn close(&mut self) -> Result<(), LinkError>;
}
