//! Telemetry Stream State Machine
//!
//! Defines the lifecycle of one client telemetry stream:
//! `Idle -> Streaming -> Closed`, or `Idle -> Closed` when the
//! subscription is refused. `Closed` is terminal.

use serde::Serialize;

/// Lifecycle state of a telemetry stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamState {
    /// Client accepted, no subscription yet
    Idle,
    /// Log block registered, samples are being forwarded
    Streaming,
    /// Subscription dropped, socket done
    Closed,
}

/// Events that drive the stream
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Log block registered on the link
    Subscribed,
    /// Subscription could not be created
    SubscribeFailed { reason: String },
    /// One sample forwarded to the client
    SampleForwarded,
    /// Client closed the socket or stopped answering probes
    ClientGone,
    /// Writing to the client failed
    SendFailed,
    /// The link closed underneath the stream
    LinkClosed,
}

/// Why a stream reached `Closed`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamEnd {
    ClientGone,
    SendFailed,
    LinkClosed,
    Rejected { reason: String },
}

/// Result of feeding an event to the machine
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionResult {
    /// Transition was valid, machine is now in this state
    Success(StreamState),
    /// Transition was valid and ended the stream
    Ended(StreamEnd),
    /// Event is not valid from the current state
    Invalid { from: StreamState, event: StreamEvent },
}

/// State machine for a single client stream
#[derive(Debug)]
pub struct StreamStateMachine {
    current_state: StreamState,
    forwarded: u64,
    end: Option<StreamEnd>,
}

impl Default for StreamStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamStateMachine {
    /// Create a new state machine in Idle state
    pub fn new() -> Self {
        Self {
            current_state: StreamState::Idle,
            forwarded: 0,
            end: None,
        }
    }

    pub fn state(&self) -> StreamState {
        self.current_state
    }

    /// Samples forwarded while streaming
    pub fn forwarded(&self) -> u64 {
        self.forwarded
    }

    /// End reason, once closed
    pub fn end(&self) -> Option<&StreamEnd> {
        self.end.as_ref()
    }

    /// Process an event and return the transition result
    pub fn process_event(&mut self, event: StreamEvent) -> TransitionResult {
        use StreamEvent::*;
        use StreamState::*;

        match (self.current_state, &event) {
            (Idle, Subscribed) => {
                self.current_state = Streaming;
                TransitionResult::Success(Streaming)
            }
            (Idle, SubscribeFailed { reason }) => self.close(StreamEnd::Rejected {
                reason: reason.clone(),
            }),
            (Idle, ClientGone) => self.close(StreamEnd::ClientGone),

            (Streaming, SampleForwarded) => {
                self.forwarded += 1;
                TransitionResult::Success(Streaming)
            }
            (Streaming, ClientGone) => self.close(StreamEnd::ClientGone),
            (Streaming, SendFailed) => self.close(StreamEnd::SendFailed),
            (Streaming, LinkClosed) => self.close(StreamEnd::LinkClosed),

            _ => TransitionResult::Invalid {
                from: self.current_state,
                event: event.clone(),
            },
        }
    }

    fn close(&mut self, end: StreamEnd) -> TransitionResult {
        self.current_state = StreamState::Closed;
        self.end = Some(end.clone());
        TransitionResult::Ended(end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let fsm = StreamStateMachine::new();
        assert_eq!(fsm.state(), StreamState::Idle);
        assert_eq!(fsm.forwarded(), 0);
        assert!(fsm.end().is_none());
    }

    #[test]
    fn test_normal_stream_flow() {
        let mut fsm = StreamStateMachine::new();

        let result = fsm.process_event(StreamEvent::Subscribed);
        assert_eq!(result, TransitionResult::Success(StreamState::Streaming));

        for _ in 0..5 {
            fsm.process_event(StreamEvent::SampleForwarded);
        }
        assert_eq!(fsm.forwarded(), 5);

        let result = fsm.process_event(StreamEvent::ClientGone);
        assert_eq!(result, TransitionResult::Ended(StreamEnd::ClientGone));
        assert_eq!(fsm.state(), StreamState::Closed);
    }

    #[test]
    fn test_refused_subscription_closes_from_idle() {
        let mut fsm = StreamStateMachine::new();
        let result = fsm.process_event(StreamEvent::SubscribeFailed {
            reason: "not connected".into(),
        });
        assert!(matches!(result, TransitionResult::Ended(StreamEnd::Rejected { .. })));
        assert_eq!(fsm.state(), StreamState::Closed);
    }

    #[test]
    fn test_closed_is_terminal() {
        let mut fsm = StreamStateMachine::new();
        fsm.process_event(StreamEvent::Subscribed);
        fsm.process_event(StreamEvent::LinkClosed);

        let result = fsm.process_event(StreamEvent::Subscribed);
        assert!(matches!(result, TransitionResult::Invalid { from: StreamState::Closed, .. }));
        let result = fsm.process_event(StreamEvent::SampleForwarded);
        assert!(matches!(result, TransitionResult::Invalid { .. }));
        assert_eq!(fsm.forwarded(), 0);
        assert_eq!(fsm.end(), Some(&StreamEnd::LinkClosed));
    }

    #[test]
    fn test_samples_only_count_while_streaming() {
        let mut fsm = StreamStateMachine::new();
        let result = fsm.process_event(StreamEvent::SampleForwarded);
        assert!(matches!(result, TransitionResult::Invalid { from: StreamState::Idle, .. }));
        assert_eq!(fsm.forwarded(), 0);
    }
}
