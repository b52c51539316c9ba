//! Simulated radio link
//!
//! Stands in for the drone when no radio dongle is connected. Produces
//! synthetic attitude and battery telemetry, reports the deck after a delay
//! and records every motion command so tests can inspect the traffic.

use super::driver::{
    DeckState, DroneLink, LinkDriver, LinkError, LogBlock, LogStream, MotionCommand,
};
use super::LinkUri;
use async_trait::async_trait;
use quadlink_shared::{vars, TelemetrySample};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{interval, Instant};
use tracing::{debug, info};

/// Variables the simulated drone publishes in its log TOC
const SIM_TOC: &[&str] = &[
    vars::ROLL,
    vars::PITCH,
    vars::YAW,
    vars::BATTERY_VOLTAGE,
    "stabilizer.thrust",
];

/// Per-block sample buffer; samples beyond this are dropped, not queued
const SAMPLE_BUFFER: usize = 64;

/// Behaviour knobs for the simulated drone
#[derive(Debug, Clone)]
pub struct SimOptions {
    /// Whether the deck reports as attached
    pub deck_attached: bool,
    /// Delay before the deck report arrives
    pub deck_report_delay: Duration,
    /// Whether the deck is reported at all
    pub report_deck: bool,
    /// Resting battery voltage
    pub battery_voltage: f32,
    /// Every open attempt fails
    pub fail_open: bool,
    /// Every log block is refused
    pub reject_logs: bool,
    /// Log blocks are accepted but never produce samples
    pub silent_logs: bool,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            deck_attached: true,
            deck_report_delay: Duration::from_millis(50),
            report_deck: true,
            battery_voltage: 3.94,
            fail_open: false,
            reject_logs: false,
            silent_logs: false,
        }
    }
}

/// Counters shared between the driver and every link it opened
#[derive(Debug, Default)]
pub struct SimStats {
    opens: AtomicUsize,
    closes: AtomicUsize,
    active_blocks: AtomicUsize,
    delivered: AtomicU64,
    motions: Mutex<Vec<MotionCommand>>,
}

#[cfg(test)]
impl SimStats {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Log blocks currently registered
    pub fn active_blocks(&self) -> usize {
        self.active_blocks.load(Ordering::SeqCst)
    }

    /// Samples handed to subscribers so far
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::SeqCst)
    }

    pub fn motions(&self) -> Vec<MotionCommand> {
        self.motions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl SimStats {
    fn record_motion(&self, command: MotionCommand) {
        self.motions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(command);
    }
}

/// Driver producing simulated links
pub struct SimulatedDriver {
    options: SimOptions,
    stats: Arc<SimStats>,
}

impl SimulatedDriver {
    pub fn new(options: SimOptions) -> Self {
        Self {
            options,
            stats: Arc::new(SimStats::default()),
        }
    }

    #[cfg(test)]
    pub fn stats(&self) -> Arc<SimStats> {
        self.stats.clone()
    }
}

impl Default for SimulatedDriver {
    fn default() -> Self {
        Self::new(SimOptions::default())
    }
}

#[async_trait]
impl LinkDriver for SimulatedDriver {
    async fn open(&self, uri: &LinkUri) -> Result<Box<dyn DroneLink>, LinkError> {
        if self.options.fail_open {
            return Err(LinkError::OpenFailed {
                uri: uri.to_string(),
                reason: "no drone answered on this address".into(),
            });
        }

        self.stats.opens.fetch_add(1, Ordering::SeqCst);
        if uri.is_sim() {
            info!("[SIM] Link opened to {}", uri);
        } else {
            info!("[SIM] No radio backend, simulating link to {}", uri);
        }

        Ok(Box::new(SimLink::new(
            uri.clone(),
            self.options.clone(),
            self.stats.clone(),
        )))
    }

    fn name(&self) -> &'static str {
        "simulated"
    }
}

struct SimLink {
    uri: LinkUri,
    options: SimOptions,
    stats: Arc<SimStats>,
    deck_tx: Arc<watch::Sender<DeckState>>,
    shutdown_tx: watch::Sender<bool>,
    opened_at: Instant,
    closed: bool,
}

impl SimLink {
    fn new(uri: LinkUri, options: SimOptions, stats: Arc<SimStats>) -> Self {
        let (deck_tx, _) = watch::channel(None);
        let (shutdown_tx, _) = watch::channel(false);
        let deck_tx = Arc::new(deck_tx);

        if options.report_deck {
            let deck_tx = deck_tx.clone();
            let delay = options.deck_report_delay;
            let attached = options.deck_attached;
            let mut shutdown = shutdown_tx.subscribe();
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {
                        deck_tx.send_replace(Some(attached));
                    }
                    _ = shutdown.changed() => {}
                }
            });
        }

        Self {
            uri,
            options,
            stats,
            deck_tx,
            shutdown_tx,
            opened_at: Instant::now(),
            closed: false,
        }
    }
}

/// Synthetic value for a TOC variable at `t` seconds after open
fn simulate(name: &str, t: f32, battery_voltage: f32) -> f32 {
    match name {
        vars::ROLL => 5.0 * t.sin(),
        vars::PITCH => 3.0 * (0.5 * t).cos(),
        vars::YAW => ((t * 10.0) % 360.0) - 180.0,
        vars::BATTERY_VOLTAGE => battery_voltage - 0.001 * t,
        _ => 0.0,
    }
}

#[async_trait]
impl DroneLink for SimLink {
    fn uri(&self) -> &LinkUri {
        &self.uri
    }

    fn deck_state(&self) -> watch::Receiver<DeckState> {
        self.deck_tx.subscribe()
    }

    async fn start_log(&self, block: LogBlock) -> Result<LogStream, LinkError> {
        if self.closed {
            return Err(LinkError::Closed);
        }
        block.validate()?;
        if let Some(unknown) = block.variables.iter().find(|v| !SIM_TOC.contains(&v.as_str())) {
            return Err(LinkError::UnknownVariable(unknown.clone()));
        }
        if self.options.reject_logs {
            return Err(LinkError::LogRejected("log block memory full".into()));
        }

        let (tx, rx) = mpsc::channel(SAMPLE_BUFFER);
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let mut shutdown = self.shutdown_tx.subscribe();
        let stats = self.stats.clone();
        let opened_at = self.opened_at;
        let silent = self.options.silent_logs;
        let battery_voltage = self.options.battery_voltage;
        let LogBlock { variables, period } = block;

        debug!("[SIM] Log block started: {:?} every {:?}", variables, period);
        stats.active_blocks.fetch_add(1, Ordering::SeqCst);

        tokio::spawn(async move {
            let mut ticker = interval(period);

            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = shutdown.changed() => break,
                    _ = ticker.tick() => {
                        if silent {
                            continue;
                        }

                        let elapsed = opened_at.elapsed();
                        let t = elapsed.as_secs_f32();
                        let sample = variables.iter().fold(
                            TelemetrySample::new(elapsed.as_millis() as u64),
                            |sample, name| {
                                sample.with(name.clone(), simulate(name, t, battery_voltage))
                            },
                        );

                        match tx.try_send(sample) {
                            Ok(()) => {
                                stats.delivered.fetch_add(1, Ordering::SeqCst);
                            }
                            Err(mpsc::error::TrySendError::Full(_)) => {}
                            Err(mpsc::error::TrySendError::Closed(_)) => break,
                        }
                    }
                }
            }

            stats.active_blocks.fetch_sub(1, Ordering::SeqCst);
            debug!("[SIM] Log block stopped");
        });

        Ok(LogStream::new(rx, stop_tx))
    }

    async fn send_motion(&self, command: MotionCommand) -> Result<(), LinkError> {
        if self.closed {
            return Err(LinkError::Closed);
        }
        debug!("[SIM] Motion command {:?}", command);
        self.stats.record_motion(command);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), LinkError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.shutdown_tx.send_replace(true);
        self.stats.closes.fetch_add(1, Ordering::SeqCst);
        info!("[SIM] Link to {} closed", self.uri);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quadlink_shared::vars;

    fn radio() -> LinkUri {
        "radio://0/80/2M".parse().unwrap()
    }

    #[tokio::test]
    async fn test_open_failure() {
        let driver = SimulatedDriver::new(SimOptions {
            fail_open: true,
            ..Default::default()
        });
        let err = driver.open(&radio()).await.err().unwrap();
        assert!(matches!(err, LinkError::OpenFailed { .. }));
        assert_eq!(driver.stats().opens(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deck_reported_after_delay() {
        let driver = SimulatedDriver::default();
        let link = driver.open(&radio()).await.unwrap();
        let mut deck = link.deck_state();
        assert_eq!(*deck.borrow(), None);

        let state = deck.wait_for(|s| s.is_some()).await.unwrap();
        assert_eq!(*state, Some(true));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sample_rate_matches_period() {
        let driver = SimulatedDriver::default();
        let link = driver.open(&radio()).await.unwrap();
        let mut stream = link
            .start_log(LogBlock::new(vars::STABILIZER, Duration::from_millis(10)))
            .await
            .unwrap();

        let deadline = Instant::now() + Duration::from_millis(1000);
        let mut received = 0u32;
        while let Ok(Some(sample)) = tokio::time::timeout_at(deadline, stream.recv()).await {
            assert_eq!(sample.values.len(), 3);
            received += 1;
        }

        // 1000 ms / 10 ms, plus the immediate first tick
        assert!((95..=102).contains(&received), "received {}", received);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_stream_stops_block() {
        let driver = SimulatedDriver::default();
        let stats = driver.stats();
        let link = driver.open(&radio()).await.unwrap();
        let stream = link
            .start_log(LogBlock::new([vars::ROLL], Duration::from_millis(10)))
            .await
            .unwrap();
        assert_eq!(stats.active_blocks(), 1);

        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(stream);
        tokio::time::sleep(Duration::from_millis(20)).await;

        let delivered = stats.delivered();
        assert_eq!(stats.active_blocks(), 0);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(stats.delivered(), delivered);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_ends_streams() {
        let driver = SimulatedDriver::default();
        let stats = driver.stats();
        let mut link = driver.open(&radio()).await.unwrap();
        let mut stream = link
            .start_log(LogBlock::new(vars::STABILIZER, Duration::from_millis(10)))
            .await
            .unwrap();

        link.close().await.unwrap();
        while stream.recv().await.is_some() {}

        assert_eq!(stats.closes(), 1);
        assert_eq!(stats.active_blocks(), 0);
        assert_eq!(
            link.start_log(LogBlock::new([vars::ROLL], Duration::from_millis(10)))
                .await
                .err(),
            Some(LinkError::Closed)
        );
        assert_eq!(link.send_motion(MotionCommand::Stop).await, Err(LinkError::Closed));
    }

    #[tokio::test]
    async fn test_unknown_variable_rejected() {
        let driver = SimulatedDriver::default();
        let link = driver.open(&radio()).await.unwrap();
        let err = link
            .start_log(LogBlock::new(["kalman.stateX"], Duration::from_millis(10)))
            .await
            .err();
        assert_eq!(err, Some(LinkError::UnknownVariable("kalman.stateX".into())));
    }

    #[tokio::test]
    async fn test_motion_commands_recorded() {
        let driver = SimulatedDriver::default();
        let link = driver.open(&radio()).await.unwrap();
        link.send_motion(MotionCommand::TakeOff { height_m: 0.3 }).await.unwrap();
        link.send_motion(MotionCommand::Stop).await.unwrap();

        assert_eq!(
            driver.stats().motions(),
            vec![MotionCommand::TakeOff { height_m: 0.3 }, MotionCommand::Stop]
        );
    }
}
