//! Gateway configuration from command line and environment

use crate::command::CommandConfig;
use crate::jobs::JobConfig;
use crate::link::{LinkUri, LogBlock, SimOptions};
use crate::session::{SessionConfig, DEFAULT_URI};
use crate::telemetry::StreamConfig;
use anyhow::{bail, Context, Result};
use clap::Parser;
use quadlink_shared::{timing, vars};
use std::net::SocketAddr;
use std::time::Duration;

/// HTTP/WebSocket gateway for a single quadcopter
#[derive(Parser, Debug, Clone)]
#[command(name = "quadlink", version, about)]
pub struct Cli {
    /// Address the HTTP server binds to
    #[arg(long, env = "QUADLINK_BIND", default_value = "0.0.0.0:8000")]
    pub bind: SocketAddr,

    /// Link address used when `/connect` names none
    #[arg(long, env = "QUADLINK_URI", default_value = DEFAULT_URI)]
    pub uri: String,

    /// How long connect waits for the deck report
    #[arg(long, env = "QUADLINK_DECK_WAIT_MS", default_value_t = timing::DECK_WAIT_MS)]
    pub deck_wait_ms: u64,

    /// Bound on waiting for the first sample of a one-shot read
    #[arg(
        long,
        env = "QUADLINK_SAMPLE_TIMEOUT_MS",
        default_value_t = timing::FIRST_SAMPLE_TIMEOUT_MS
    )]
    pub sample_timeout_ms: u64,

    /// Log period for one-shot reads
    #[arg(long, env = "QUADLINK_READ_PERIOD_MS", default_value_t = timing::LOG_PERIOD_MIN_MS)]
    pub read_period_ms: u64,

    /// Log period for WebSocket telemetry
    #[arg(long, env = "QUADLINK_STREAM_PERIOD_MS", default_value_t = timing::STREAM_PERIOD_MS)]
    pub stream_period_ms: u64,

    /// How often streaming clients are probed
    #[arg(
        long,
        env = "QUADLINK_POLL_INTERVAL_MS",
        default_value_t = timing::CLIENT_POLL_INTERVAL_MS
    )]
    pub poll_interval_ms: u64,

    /// Takeoff target height in meters
    #[arg(long, env = "QUADLINK_TAKEOFF_HEIGHT", default_value_t = 0.3)]
    pub takeoff_height: f32,

    /// How long takeoff holds before stopping
    #[arg(long, env = "QUADLINK_TAKEOFF_HOVER_MS", default_value_t = timing::TAKEOFF_HOVER_MS)]
    pub takeoff_hover_ms: u64,

    /// How long finished jobs stay queryable
    #[arg(long, env = "QUADLINK_JOB_RETENTION_SECS", default_value_t = 300)]
    pub job_retention_secs: u64,

    /// Simulated drone reports no deck
    #[arg(long, env = "QUADLINK_SIM_NO_DECK")]
    pub sim_no_deck: bool,

    /// Delay before the simulated deck report
    #[arg(long, env = "QUADLINK_SIM_DECK_DELAY_MS", default_value_t = 50)]
    pub sim_deck_delay_ms: u64,

    /// Simulated resting battery voltage
    #[arg(long, env = "QUADLINK_SIM_BATTERY", default_value_t = 3.94)]
    pub sim_battery: f32,
}

impl Cli {
    pub fn into_config(self) -> GatewayConfig {
        let defaults = GatewayConfig::default();
        GatewayConfig {
            bind: self.bind,
            session: SessionConfig {
                default_uri: self.uri,
                deck_wait: Duration::from_millis(self.deck_wait_ms),
            },
            command: CommandConfig {
                takeoff_height_m: self.takeoff_height,
                takeoff_hover: Duration::from_millis(self.takeoff_hover_ms),
                read_period: Duration::from_millis(self.read_period_ms),
                sample_timeout: Duration::from_millis(self.sample_timeout_ms),
            },
            stream: StreamConfig {
                period: Duration::from_millis(self.stream_period_ms),
                poll_interval: Duration::from_millis(self.poll_interval_ms),
            },
            jobs: JobConfig {
                retention: Duration::from_secs(self.job_retention_secs),
                ..defaults.jobs
            },
            sim: SimOptions {
                deck_attached: !self.sim_no_deck,
                deck_report_delay: Duration::from_millis(self.sim_deck_delay_ms),
                battery_voltage: self.sim_battery,
                ..defaults.sim
            },
        }
    }
}

/// Complete gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub bind: SocketAddr,
    pub session: SessionConfig,
    pub command: CommandConfig,
    pub stream: StreamConfig,
    pub jobs: JobConfig,
    pub sim: SimOptions,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8000)),
            session: SessionConfig::default(),
            command: CommandConfig::default(),
            stream: StreamConfig::default(),
            jobs: JobConfig::default(),
            sim: SimOptions::default(),
        }
    }
}

impl GatewayConfig {
    /// Reject settings the link or the runtime cannot honour
    pub fn validate(&self) -> Result<()> {
        self.session
            .default_uri
            .parse::<LinkUri>()
            .with_context(|| format!("invalid default uri {:?}", self.session.default_uri))?;

        LogBlock::new(vars::STABILIZER, self.command.read_period)
            .validate()
            .context("invalid read period")?;
        LogBlock::new(vars::STABILIZER, self.stream.period)
            .validate()
            .context("invalid stream period")?;

        for (name, value) in [
            ("deck wait", self.session.deck_wait),
            ("sample timeout", self.command.sample_timeout),
            ("poll interval", self.stream.poll_interval),
            ("job check interval", self.jobs.check_interval),
        ] {
            if value.is_zero() {
                bail!("{} must be greater than zero", name);
            }
        }

        if !self.command.takeoff_height_m.is_finite() || self.command.takeoff_height_m <= 0.0 {
            bail!("takeoff height must be a positive number of meters");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> GatewayConfig {
        let mut argv = vec!["quadlink"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap().into_config()
    }

    #[test]
    fn test_defaults_match_cli_defaults() {
        let config = parse(&[]);
        let defaults = GatewayConfig::default();

        assert_eq!(config.bind, defaults.bind);
        assert_eq!(config.session.default_uri, DEFAULT_URI);
        assert_eq!(config.session.deck_wait, defaults.session.deck_wait);
        assert_eq!(config.command.sample_timeout, defaults.command.sample_timeout);
        assert_eq!(config.command.takeoff_hover, defaults.command.takeoff_hover);
        assert_eq!(config.stream.period, Duration::from_millis(10));
        assert_eq!(config.stream.poll_interval, Duration::from_secs(1));
        assert_eq!(config.jobs.retention, Duration::from_secs(300));
        assert!(config.sim.deck_attached);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = parse(&[
            "--bind",
            "127.0.0.1:9000",
            "--uri",
            "sim://bench",
            "--stream-period-ms",
            "100",
            "--sim-no-deck",
        ]);
        assert_eq!(config.bind, "127.0.0.1:9000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.session.default_uri, "sim://bench");
        assert_eq!(config.stream.period, Duration::from_millis(100));
        assert!(!config.sim.deck_attached);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_unencodable_period() {
        let config = parse(&["--stream-period-ms", "15"]);
        assert!(config.validate().is_err());

        let config = parse(&["--read-period-ms", "3000"]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_durations_and_bad_uri() {
        assert!(parse(&["--poll-interval-ms", "0"]).validate().is_err());
        assert!(parse(&["--sample-timeout-ms", "0"]).validate().is_err());
        assert!(parse(&["--uri", "usb://0"]).validate().is_err());
    }

    #[test]
    fn test_rejects_malformed_bind() {
        assert!(Cli::try_parse_from(["quadlink", "--bind", "nowhere"]).is_err());
    }
}
