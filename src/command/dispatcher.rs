//! Command dispatcher for the open drone session

use super::first_sample::first_sample;
use crate::error::SessionError;
use crate::link::{LinkError, LogBlock, MotionCommand};
use crate::session::SessionCoordinator;
use quadlink_shared::{
    format_reading, timing, vars, AttitudeResponse, BatteryResponse, MessageResponse,
    TelemetrySample,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Configuration for command execution
#[derive(Debug, Clone)]
pub struct CommandConfig {
    /// Height the takeoff command climbs to
    pub takeoff_height_m: f32,
    /// How long takeoff holds before stopping
    pub takeoff_hover: Duration,
    /// Log period for one-shot reads
    pub read_period: Duration,
    /// Bound on waiting for the first sample of a read
    pub sample_timeout: Duration,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            takeoff_height_m: 0.3,
            takeoff_hover: Duration::from_millis(timing::TAKEOFF_HOVER_MS),
            read_period: Duration::from_millis(timing::LOG_PERIOD_MIN_MS),
            sample_timeout: Duration::from_millis(timing::FIRST_SAMPLE_TIMEOUT_MS),
        }
    }
}

/// Dispatches commands to the drone behind the session coordinator
pub struct CommandDispatcher {
    sessions: Arc<SessionCoordinator>,
    config: CommandConfig,
}

impl CommandDispatcher {
    /// Create a new command dispatcher
    pub fn new(sessions: Arc<SessionCoordinator>, config: CommandConfig) -> Self {
        Self { sessions, config }
    }

    /// Climb, hold for the hover duration, stop
    pub async fn takeoff(&self) -> Result<MessageResponse, SessionError> {
        let session = self.sessions.current().await?;
        let link = session.link();

        info!(
            "Takeoff to {}m on {}, holding {:?}",
            self.config.takeoff_height_m,
            session.uri(),
            self.config.takeoff_hover
        );
        link.send_motion(MotionCommand::TakeOff {
            height_m: self.config.takeoff_height_m,
        })
        .await?;

        tokio::time::sleep(self.config.takeoff_hover).await;

        link.send_motion(MotionCommand::Stop).await?;
        info!("Takeoff sequence complete");

        Ok(MessageResponse::new("Takeoff complete"))
    }

    /// Read roll, pitch and yaw once
    pub async fn read_parameters(&self) -> Result<AttitudeResponse, SessionError> {
        let sample = self.read_once(&vars::STABILIZER).await?;

        Ok(AttitudeResponse {
            roll: format_reading(value(&sample, vars::ROLL)?),
            pitch: format_reading(value(&sample, vars::PITCH)?),
            yaw: format_reading(value(&sample, vars::YAW)?),
        })
    }

    /// Read the battery voltage once
    pub async fn read_battery_voltage(&self) -> Result<BatteryResponse, SessionError> {
        let sample = self.read_once(&[vars::BATTERY_VOLTAGE]).await?;

        Ok(BatteryResponse {
            voltage: format_reading(value(&sample, vars::BATTERY_VOLTAGE)?),
        })
    }

    async fn read_once(&self, variables: &[&str]) -> Result<TelemetrySample, SessionError> {
        let session = self.sessions.current().await?;
        debug!("One-shot read of {:?}", variables);

        first_sample(
            session.link(),
            LogBlock::new(variables.iter().copied(), self.config.read_period),
            self.config.sample_timeout,
        )
        .await
    }
}

fn value(sample: &TelemetrySample, name: &str) -> Result<f32, SessionError> {
    sample
        .get(name)
        .ok_or_else(|| SessionError::Link(LinkError::MissingVariable(name.to_string())))
}
