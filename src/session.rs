//! Health store session
//!
//! One session owns the connection to the platform health store. It is built
//! once, initialized lazily by the first fetch (availability check plus the
//! permission handshake), and shared by every aggregator afterwards.

use crate::error::HealthError;
use crate::source::HealthSource;
use crate::types::{Metric, Sample};
use crate::window::DateWindow;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Session lifecycle: Uninitialized, then Ready or Failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum SessionState {
    Uninitialized,
    Ready,
    /// Terminal; the reason is reported once and aggregation never starts
    Failed(String),
}

/// Explicit handle to the health store
pub struct HealthSession<S> {
    id: Uuid,
    source: S,
    state: Mutex<SessionState>,
}

impl<S: HealthSource> HealthSession<S> {
    pub fn new(source: S) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
            state: Mutex::new(SessionState::Uninitialized),
        }
    }

    /// Identifier attached to this session's log events
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub async fn state(&self) -> SessionState {
        self.state.lock().await.clone()
    }

    /// Run the handshake on first use; later calls return the settled outcome
    pub async fn initialize(&self) -> Result<(), HealthError> {
        let mut state = self.state.lock().await;
        match &*state {
            SessionState::Ready => return Ok(()),
            SessionState::Failed(reason) => return Err(HealthError::Unavailable(reason.clone())),
            SessionState::Uninitialized => {}
        }

        match self.handshake().await {
            Ok(()) => {
                info!(
                    session = %self.id,
                    platform = self.source.platform().as_str(),
                    "health session ready"
                );
                *state = SessionState::Ready;
                Ok(())
            }
            Err(e) => {
                warn!(session = %self.id, error = %e, "health session failed to initialize");
                *state = SessionState::Failed(e.to_string());
                Err(e)
            }
        }
    }

    async fn handshake(&self) -> Result<(), HealthError> {
        let platform = self.source.platform();
        if !self.source.is_available().await? {
            return Err(HealthError::Unavailable(format!(
                "{} is not available on this device",
                platform.store_name()
            )));
        }
        self.source.request_permissions(&Metric::ALL).await
    }

    /// Range query for one metric; the session must be ready
    pub async fn query(&self, metric: Metric, window: DateWindow) -> Result<Vec<Sample>, HealthError> {
        if *self.state.lock().await != SessionState::Ready {
            return Err(HealthError::NotInitialized);
        }

        debug!(
            session = %self.id,
            %metric,
            start = %window.start,
            end = %window.end,
            "querying health store"
        );
        self.source.query(metric, window).await
    }
}
