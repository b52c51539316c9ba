use crate::command::CommandDispatcher;
use crate::config::GatewayConfig;
use crate::jobs::JobRegistry;
use crate::link::LinkDriver;
use crate::session::SessionCoordinator;
use crate::telemetry::TelemetryStreamer;
use std::sync::Arc;

/// Everything a request handler can reach
pub struct AppState {
    /// Owner of the one drone session
    pub sessions: Arc<SessionCoordinator>,

    /// Takeoff and one-shot reads
    pub commands: Arc<CommandDispatcher>,

    /// WebSocket telemetry
    pub streamer: Arc<TelemetryStreamer>,

    /// Background connect / takeoff jobs
    pub jobs: Arc<JobRegistry>,
}

impl AppState {
    pub fn new(driver: Arc<dyn LinkDriver>, config: &GatewayConfig) -> Self {
        let sessions = Arc::new(SessionCoordinator::new(driver, config.session.clone()));
        Self {
            commands: Arc::new(CommandDispatcher::new(
                sessions.clone(),
                config.command.clone(),
            )),
            streamer: Arc::new(TelemetryStreamer::new(
                sessions.clone(),
                config.stream.clone(),
            )),
            jobs: Arc::new(JobRegistry::new(&config.jobs)),
            sessions,
        }
    }
}
