//! Telemetry streamer for one WebSocket client

use crate::error::SessionError;
use crate::link::{LogBlock, LogStream};
use crate::session::SessionCoordinator;
use axum::body::Bytes;
use axum::extract::ws::{Message, Utf8Bytes, WebSocket};
use futures::{SinkExt, StreamExt};
use quadlink_shared::codec::{self, StreamMessage};
use quadlink_shared::state_machine::{StreamEnd, StreamEvent, StreamStateMachine, TransitionResult};
use quadlink_shared::{timing, vars};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant};
use tracing::{debug, info, warn};

/// Configuration for client telemetry streams
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Log period of the streamed block
    pub period: Duration,
    /// How often the client socket is probed
    pub poll_interval: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(timing::STREAM_PERIOD_MS),
            poll_interval: Duration::from_millis(timing::CLIENT_POLL_INTERVAL_MS),
        }
    }
}

/// Forwards the session's attitude telemetry to WebSocket clients
pub struct TelemetryStreamer {
    sessions: Arc<SessionCoordinator>,
    config: StreamConfig,
    active: AtomicUsize,
}

impl TelemetryStreamer {
    pub fn new(sessions: Arc<SessionCoordinator>, config: StreamConfig) -> Self {
        Self {
            sessions,
            config,
            active: AtomicUsize::new(0),
        }
    }

    /// Streams currently forwarding samples
    pub fn active_streams(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Register the stream's log block; the session lock is released on return
    pub(crate) async fn subscribe(&self) -> Result<LogStream, SessionError> {
        let session = self.sessions.current().await?;
        let stream = session
            .link()
            .start_log(LogBlock::new(vars::STABILIZER, self.config.period))
            .await?;
        Ok(stream)
    }

    /// Drive one client socket until it closes
    pub async fn run(&self, socket: WebSocket) -> StreamEnd {
        let (mut sender, mut receiver) = socket.split();
        let mut fsm = StreamStateMachine::new();

        let mut stream = match self.subscribe().await {
            Ok(stream) => stream,
            Err(e) => {
                warn!("[WS] Refusing telemetry stream: {}", e);
                send_error(&mut sender, &e.to_string()).await;
                let _ = sender.close().await;
                fsm.process_event(StreamEvent::SubscribeFailed {
                    reason: e.to_string(),
                });
                return fsm.end().cloned().unwrap_or(StreamEnd::Rejected {
                    reason: e.to_string(),
                });
            }
        };

        fsm.process_event(StreamEvent::Subscribed);
        self.active.fetch_add(1, Ordering::SeqCst);
        info!("[WS] Telemetry stream started ({:?} period)", self.config.period);

        let poll = self.config.poll_interval;
        let mut probe = interval_at(Instant::now() + poll, poll);

        loop {
            let event = tokio::select! {
                sample = stream.recv() => match sample {
                    Some(sample) => match codec::encode_sample(&sample) {
                        Ok(text) => {
                            if sender.send(Message::Text(Utf8Bytes::from(text))).await.is_ok() {
                                StreamEvent::SampleForwarded
                            } else {
                                StreamEvent::SendFailed
                            }
                        }
                        Err(e) => {
                            debug!("[WS] Dropping sample: {}", e);
                            continue;
                        }
                    },
                    None => StreamEvent::LinkClosed,
                },

                inbound = receiver.next() => match inbound {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => StreamEvent::ClientGone,
                    Some(Ok(_)) => continue,
                },

                _ = probe.tick() => {
                    if sender.send(Message::Ping(Bytes::new())).await.is_err() {
                        StreamEvent::ClientGone
                    } else {
                        continue;
                    }
                }
            };

            if let TransitionResult::Ended(_) = fsm.process_event(event) {
                break;
            }
        }

        // Unsubscribe before anything else touches the socket
        drop(stream);
        self.active.fetch_sub(1, Ordering::SeqCst);

        if fsm.end() == Some(&StreamEnd::LinkClosed) {
            send_error(&mut sender, "link closed").await;
        }
        let _ = sender.close().await;

        let end = fsm.end().cloned().unwrap_or(StreamEnd::ClientGone);
        info!(
            "[WS] Telemetry stream closed after {} samples: {:?}",
            fsm.forwarded(),
            end
        );
        end
    }
}

async fn send_error<S>(sender: &mut S, message: &str)
where
    S: futures::Sink<Message> + Unpin,
{
    match codec::encode(&StreamMessage::error(message)) {
        Ok(text) => {
            let _ = sender.send(Message::Text(Utf8Bytes::from(text))).await;
        }
        Err(e) => warn!("[WS] Could not encode error frame: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{SimOptions, SimulatedDriver};
    use crate::session::SessionConfig;

    fn streamer() -> (Arc<SessionCoordinator>, TelemetryStreamer, Arc<crate::link::SimStats>) {
        let driver = SimulatedDriver::new(SimOptions::default());
        let stats = driver.stats();
        let sessions = Arc::new(SessionCoordinator::new(
            Arc::new(driver),
            SessionConfig::default(),
        ));
        let streamer = TelemetryStreamer::new(sessions.clone(), StreamConfig::default());
        (sessions, streamer, stats)
    }

    #[tokio::test]
    async fn test_subscribe_requires_session() {
        let (_, streamer, stats) = streamer();
        assert!(matches!(streamer.subscribe().await, Err(SessionError::NotConnected)));
        assert_eq!(stats.active_blocks(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribe_releases_session_lock() {
        let (sessions, streamer, stats) = streamer();
        sessions.connect(None).await.unwrap();

        let mut stream = streamer.subscribe().await.unwrap();
        assert_eq!(stats.active_blocks(), 1);

        // The lock is free while the stream is alive
        assert!(sessions.status().await.connected);
        let sample = stream.recv().await.unwrap();
        assert_eq!(sample.values.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_ends_subscription() {
        let (sessions, streamer, stats) = streamer();
        sessions.connect(None).await.unwrap();
        let mut stream = streamer.subscribe().await.unwrap();

        sessions.disconnect().await;
        while stream.recv().await.is_some() {}

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(stats.active_blocks(), 0);
    }
}
