use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use seekcore_events::{EventBus, SubscriptionHandle};
use seekcore_index::Entry;
use seekcore_query::{
    compose, Filter, FilterSet, QueryPayload, SearchMode, SearchRequest, SearchStreamEvent,
};
use seekcore_shell::SharedSearchService;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::ControllerError;

/// Identity of one search session; sent to the backend as the request id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionToken(u64);

impl SessionToken {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    Idle,
    Streaming,
    Completed,
    Cancelled,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub token: Option<SessionToken>,
    pub query: String,
    pub payload: QueryPayload,
    pub filters: Vec<Filter>,
    pub mode: SearchMode,
    pub results: Vec<Entry>,
    pub is_streaming: bool,
    pub phase: SessionPhase,
    pub duration_seconds: Option<f64>,
}

/// Lightweight change notification published on every session mutation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub token: Option<SessionToken>,
    pub phase: SessionPhase,
    pub result_count: usize,
    pub duration_seconds: Option<f64>,
}

struct LiveSession {
    token: SessionToken,
    started_at: Instant,
    subscription: SubscriptionHandle,
    delivery: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct SessionState {
    snapshot: SessionSnapshot,
    live: Option<LiveSession>,
}

impl SessionState {
    fn status(&self) -> SessionStatus {
        SessionStatus {
            token: self.snapshot.token,
            phase: self.snapshot.phase,
            result_count: self.snapshot.results.len(),
            duration_seconds: self.snapshot.duration_seconds,
        }
    }
}

/// Runs one streaming search at a time. Results reach the controller only
/// through its subscription on the stream channel, and every delivery is
/// checked against the live session token.
pub struct SearchSessionController {
    search: SharedSearchService,
    bus: EventBus<SearchStreamEvent>,
    channel: String,
    next_token: AtomicU64,
    state: Mutex<SessionState>,
    status: watch::Sender<SessionStatus>,
}

impl SearchSessionController {
    pub fn new(
        search: SharedSearchService,
        bus: EventBus<SearchStreamEvent>,
        channel: impl Into<String>,
    ) -> Self {
        let (status, _) = watch::channel(SessionStatus::default());
        Self {
            search,
            bus,
            channel: channel.into(),
            next_token: AtomicU64::new(1),
            state: Mutex::new(SessionState::default()),
            status,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.lock().snapshot.clone()
    }

    pub fn results(&self) -> Vec<Entry> {
        self.state.lock().snapshot.results.clone()
    }

    pub fn is_streaming(&self) -> bool {
        self.state.lock().snapshot.is_streaming
    }

    pub fn duration_seconds(&self) -> Option<f64> {
        self.state.lock().snapshot.duration_seconds
    }

    pub fn query(&self) -> String {
        self.state.lock().snapshot.query.clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    /// Starts a new session, replacing (and discarding) any streaming one.
    pub async fn start(
        self: &Arc<Self>,
        free_text: &str,
        is_llm: bool,
        filters: &FilterSet,
        current_path: &str,
    ) -> Result<SessionToken, ControllerError> {
        let payload = compose(free_text, filters, current_path);
        let mode = SearchMode::from_llm_flag(is_llm);
        let token = SessionToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        let mut subscription = self.bus.subscribe(&self.channel);

        {
            // Stop and install under one guard; a concurrent start must not
            // overwrite a live session it never finished.
            let mut state = self.state.lock();
            self.stop_locked(&mut state, SessionPhase::Cancelled, "replaced");
            state.snapshot = SessionSnapshot {
                token: Some(token),
                query: free_text.trim().to_string(),
                payload: payload.clone(),
                filters: filters.filters(),
                mode,
                results: Vec::new(),
                is_streaming: true,
                phase: SessionPhase::Streaming,
                duration_seconds: None,
            };
            state.live = Some(LiveSession {
                token,
                started_at: Instant::now(),
                subscription: subscription.handle().clone(),
                delivery: None,
            });
            self.status.send_replace(state.status());
        }

        // Upgraded per delivery only, so dropping the controller mid-stream
        // still runs `Drop`.
        let controller = Arc::downgrade(self);
        let delivery = tokio::spawn(async move {
            while let Some(event) = subscription.recv().await {
                let Some(this) = controller.upgrade() else {
                    break;
                };
                if !this.deliver(token, event) {
                    break;
                }
            }
        });
        match self.state.lock().live.as_mut() {
            Some(live) if live.token == token => live.delivery = Some(delivery),
            _ => delivery.abort(),
        }

        tracing::info!(token = token.get(), query = %payload.query, ?mode, "search started");
        let request = SearchRequest {
            request_id: token.get(),
            mode,
            payload,
        };
        let dispatched = match mode {
            SearchMode::Standard => self.search.start_stream(request).await,
            SearchMode::LanguageModel => self.search.start_llm_stream(request).await,
        };

        if let Err(err) = dispatched {
            tracing::warn!(token = token.get(), error = %err, "search initiation failed");
            let mut state = self.state.lock();
            if state.live.as_ref().is_some_and(|live| live.token == token) {
                self.finish(&mut state, SessionPhase::Failed);
            }
            return Err(ControllerError::SearchInitiationFailed(err.to_string()));
        }
        Ok(token)
    }

    /// Stops the live session. Safe to call at any time; returns whether a
    /// session was streaming. Its partial results are dropped.
    pub fn cancel(&self) -> bool {
        self.stop_live(SessionPhase::Cancelled, "cancelled")
    }

    fn stop_live(&self, phase: SessionPhase, reason: &'static str) -> bool {
        let mut state = self.state.lock();
        self.stop_locked(&mut state, phase, reason)
    }

    fn stop_locked(
        &self,
        state: &mut SessionState,
        phase: SessionPhase,
        reason: &'static str,
    ) -> bool {
        let Some(token) = state.live.as_ref().map(|live| live.token) else {
            return false;
        };
        state.snapshot.results.clear();
        self.finish(state, phase);
        tracing::info!(token = token.get(), reason, "search stopped");
        true
    }

    /// Releases the live subscription and records the duration.
    fn finish(&self, state: &mut SessionState, phase: SessionPhase) {
        let Some(live) = state.live.take() else {
            return;
        };
        self.bus.unsubscribe(&live.subscription);
        if let Some(delivery) = live.delivery {
            delivery.abort();
        }

        state.snapshot.is_streaming = false;
        state.snapshot.phase = phase;
        state.snapshot.duration_seconds = Some(live.started_at.elapsed().as_secs_f64());
        self.status.send_replace(state.status());
    }

    /// Applies one delivery. Returns false once the session is over.
    fn deliver(&self, token: SessionToken, event: SearchStreamEvent) -> bool {
        let mut state = self.state.lock();
        if state.live.as_ref().map(|live| live.token) != Some(token) {
            return false;
        }
        if event.request_id != token.get() {
            tracing::debug!(
                token = token.get(),
                request_id = event.request_id,
                "dropping item from another session"
            );
            return true;
        }

        let Some(raw) = event.item else {
            // The delivery task exits on its own; only the subscription is released.
            if let Some(live) = state.live.as_mut() {
                live.delivery = None;
            }
            self.finish(&mut state, SessionPhase::Completed);
            tracing::info!(
                token = token.get(),
                results = state.snapshot.results.len(),
                duration_ms = state.snapshot.duration_seconds.map(|s| (s * 1000.0) as u64),
                "search completed"
            );
            return false;
        };

        if !raw.is_complete() {
            tracing::debug!(token = token.get(), ?raw, "stream item malformed, filling defaults");
        }
        state.snapshot.results.push(raw.normalize(Utc::now()));
        self.status.send_replace(state.status());
        true
    }
}

impl Drop for SearchSessionController {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        if let Some(live) = state.live.take() {
            self.bus.unsubscribe(&live.subscription);
            if let Some(delivery) = live.delivery {
                delivery.abort();
            }
        }
    }
}
