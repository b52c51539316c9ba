//! Session coordinator owning the one open drone link

use crate::error::SessionError;
use crate::link::{DeckState, DroneLink, LinkDriver, LinkUri};
use quadlink_shared::{timing, ConnectResponse, StatusResponse};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, MappedMutexGuard, Mutex, MutexGuard};
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

/// Default radio address when a connect request names none
pub const DEFAULT_URI: &str = "radio://0/80/2M";

/// Configuration for the session coordinator
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Address used when connect is called without one
    pub default_uri: String,
    /// How long connect waits for the deck report
    pub deck_wait: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_uri: DEFAULT_URI.into(),
            deck_wait: Duration::from_millis(timing::DECK_WAIT_MS),
        }
    }
}

/// The open link and what is known about it
pub struct Session {
    link: Box<dyn DroneLink>,
    deck: watch::Receiver<DeckState>,
    connected_at: Instant,
}

impl Session {
    pub fn link(&self) -> &dyn DroneLink {
        self.link.as_ref()
    }

    pub fn uri(&self) -> &LinkUri {
        self.link.uri()
    }

    /// Latest deck report, `false` until one arrives
    pub fn deck_attached(&self) -> bool {
        (*self.deck.borrow()).unwrap_or(false)
    }

    pub fn connected_for(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

/// Exclusive access to the open session; holding it blocks connect,
/// disconnect and every other command
pub type SessionGuard<'a> = MappedMutexGuard<'a, Session>;

/// Result of a successful connect
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectOutcome {
    pub uri: String,
    pub deck_attached: bool,
    /// A session was already open; no new link was opened
    pub already_connected: bool,
}

impl From<ConnectOutcome> for ConnectResponse {
    fn from(outcome: ConnectOutcome) -> Self {
        let message = if outcome.already_connected {
            format!("Already connected to {}", outcome.uri)
        } else {
            format!("Connected to {}", outcome.uri)
        };
        Self {
            message,
            deck_attached: outcome.deck_attached,
        }
    }
}

/// Result of a disconnect; neither case is an error
#[derive(Debug, Clone, PartialEq)]
pub enum DisconnectOutcome {
    Disconnected { uri: String },
    WasNotConnected,
}

impl DisconnectOutcome {
    pub fn message(&self) -> String {
        match self {
            DisconnectOutcome::Disconnected { uri } => format!("Disconnected from {}", uri),
            DisconnectOutcome::WasNotConnected => "Was not connected".into(),
        }
    }
}

/// Owns zero or one open session
pub struct SessionCoordinator {
    driver: Arc<dyn LinkDriver>,
    config: SessionConfig,
    session: Mutex<Option<Session>>,
}

impl SessionCoordinator {
    /// Create a coordinator with no open session
    pub fn new(driver: Arc<dyn LinkDriver>, config: SessionConfig) -> Self {
        Self {
            driver,
            config,
            session: Mutex::new(None),
        }
    }

    /// Open a link to `address` (or the configured default) unless one is
    /// already open
    pub async fn connect(&self, address: Option<&str>) -> Result<ConnectOutcome, SessionError> {
        let mut slot = self.session.lock().await;

        if let Some(session) = slot.as_ref() {
            let uri = session.uri().to_string();
            if let Some(requested) = address {
                if requested != uri {
                    warn!("Connect to {} ignored, already connected to {}", requested, uri);
                }
            }
            return Ok(ConnectOutcome {
                uri,
                deck_attached: session.deck_attached(),
                already_connected: true,
            });
        }

        let address = address.unwrap_or(self.config.default_uri.as_str());
        let uri: LinkUri = address.parse().map_err(SessionError::ConnectFailure)?;

        info!("Connecting to {} via {} driver", uri, self.driver.name());
        let link = self
            .driver
            .open(&uri)
            .await
            .map_err(SessionError::ConnectFailure)?;

        let mut deck = link.deck_state();
        let reported = deck.wait_for(|s| s.is_some());
        let deck_attached = match timeout(self.config.deck_wait, reported).await {
            Ok(Ok(state)) => (*state).unwrap_or(false),
            Ok(Err(_)) | Err(_) => {
                debug!("No deck report within {:?}", self.config.deck_wait);
                false
            }
        };

        info!("Connected to {} (deck attached: {})", uri, deck_attached);
        *slot = Some(Session {
            link,
            deck,
            connected_at: Instant::now(),
        });

        Ok(ConnectOutcome {
            uri: uri.to_string(),
            deck_attached,
            already_connected: false,
        })
    }

    /// Close the open link, if any
    pub async fn disconnect(&self) -> DisconnectOutcome {
        let mut slot = self.session.lock().await;

        match slot.take() {
            Some(mut session) => {
                let uri = session.uri().to_string();
                if let Err(e) = session.link.close().await {
                    warn!("Error closing link to {}: {}", uri, e);
                }
                info!("Disconnected from {}", uri);
                DisconnectOutcome::Disconnected { uri }
            }
            None => DisconnectOutcome::WasNotConnected,
        }
    }

    /// Borrow the open session
    pub async fn current(&self) -> Result<SessionGuard<'_>, SessionError> {
        let guard = self.session.lock().await;
        MutexGuard::try_map(guard, |slot| slot.as_mut()).map_err(|_| SessionError::NotConnected)
    }

    /// Snapshot of the session for status reporting
    pub async fn status(&self) -> StatusResponse {
        let slot = self.session.lock().await;
        match slot.as_ref() {
            Some(session) => StatusResponse {
                connected: true,
                uri: Some(session.uri().to_string()),
                deck_attached: session.deck_attached(),
                connected_for_ms: Some(session.connected_for().as_millis() as u64),
            },
            None => StatusResponse {
                connected: false,
                uri: None,
                deck_attached: false,
                connected_for_ms: None,
            },
        }
    }
}
