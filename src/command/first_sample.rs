//! Bounded wait for the first sample of a log block

use crate::error::SessionError;
use crate::link::{DroneLink, LinkError, LogBlock};
use quadlink_shared::TelemetrySample;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

/// Register `block`, wait at most `limit` for one sample, then unsubscribe
pub async fn first_sample(
    link: &dyn DroneLink,
    block: LogBlock,
    limit: Duration,
) -> Result<TelemetrySample, SessionError> {
    let mut stream = link.start_log(block).await?;

    match timeout(limit, stream.recv()).await {
        Ok(Some(sample)) => {
            debug!("First sample after subscription: t={}", sample.timestamp);
            Ok(sample)
        }
        Ok(None) => Err(SessionError::Link(LinkError::Closed)),
        Err(_) => Err(SessionError::TelemetryTimeout {
            waited_ms: limit.as_millis() as u64,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{LinkDriver, SimOptions, SimulatedDriver};
    use quadlink_shared::vars;

    fn battery_block() -> LogBlock {
        LogBlock::new([vars::BATTERY_VOLTAGE], Duration::from_millis(10))
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_sample_unsubscribes() {
        let driver = SimulatedDriver::default();
        let stats = driver.stats();
        let link = driver.open(&"sim://bench".parse().unwrap()).await.unwrap();

        let sample = first_sample(link.as_ref(), battery_block(), Duration::from_secs(1))
            .await
            .unwrap();
        assert!(sample.get(vars::BATTERY_VOLTAGE).is_some());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(stats.active_blocks(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_link_times_out() {
        let driver = SimulatedDriver::new(SimOptions {
            silent_logs: true,
            ..Default::default()
        });
        let link = driver.open(&"sim://bench".parse().unwrap()).await.unwrap();

        let err = first_sample(link.as_ref(), battery_block(), Duration::from_millis(250))
            .await
            .unwrap_err();
        assert_eq!(err, SessionError::TelemetryTimeout { waited_ms: 250 });
    }

    #[tokio::test]
    async fn test_rejected_block_is_link_error() {
        let driver = SimulatedDriver::new(SimOptions {
            reject_logs: true,
            ..Default::default()
        });
        let link = driver.open(&"sim://bench".parse().unwrap()).await.unwrap();

        let err = first_sample(link.as_ref(), battery_block(), Duration::from_millis(250))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Link(LinkError::LogRejected(_))));
    }
}
