/// Match phases and the plan/apply/abort machine.
pub mod match_machine;
/// Practice sessions.
pub mod practice;
pub mod room;
pub mod sessions;
mod sse;
/// Host transitions with their announcements.
pub mod transitions;

use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock, watch};
use tracing::info;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::arena_store::ArenaStore,
    error::ServiceError,
    services::sse_events,
    state::{
        practice::PracticeSession,
        room::{MatchRoom, RoomLease},
        sessions::SessionRegistry,
    },
};

pub use self::match_machine::{AbortError, ApplyError, Plan, PlanError, PlanId, Snapshot};
pub use self::sse::SseHub;

/// Handle to the application state shared by every handler.
pub type SharedState = Arc<AppState>;
/// Longest a host action may run before its plan is aborted.
pub const DEFAULT_TRANSITION_TIMEOUT: Duration = Duration::from_secs(5);
const PUBLIC_SSE_CAPACITY: usize = 64;

/// Central application state storing live rooms, sessions and the storage handle.
pub struct AppState {
    config: Arc<AppConfig>,
    store: RwLock<Option<Arc<dyn ArenaStore>>>,
    degraded: watch::Sender<bool>,
    public_sse: SseHub,
    sessions: SessionRegistry,
    rooms: DashMap<Uuid, Arc<MatchRoom>>,
    practice: DashMap<Uuid, PracticeSession>,
    account_gate: Mutex<()>,
    live_gate: Mutex<()>,
    transition_timeout: Option<Duration>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        Arc::new(Self::build(config, None))
    }

    /// Construct a state that is immediately backed by `store`.
    pub fn with_store(config: AppConfig, store: Arc<dyn ArenaStore>) -> SharedState {
        Arc::new(Self::build(config, Some(store)))
    }

    fn build(config: AppConfig, store: Option<Arc<dyn ArenaStore>>) -> Self {
        let (degraded_tx, _rx) = watch::channel(store.is_none());
        Self {
            config: Arc::new(config),
            store: RwLock::new(store),
            degraded: degraded_tx,
            public_sse: SseHub::new(PUBLIC_SSE_CAPACITY),
            sessions: SessionRegistry::new(),
            rooms: DashMap::new(),
            practice: DashMap::new(),
            account_gate: Mutex::new(()),
            live_gate: Mutex::new(()),
            transition_timeout: Some(DEFAULT_TRANSITION_TIMEOUT),
        }
    }

    /// Shared configuration.
    pub fn config(&self) -> Arc<AppConfig> {
        self.config.clone()
    }

    /// Obtain a handle to the current store, if one is installed.
    pub async fn store(&self) -> Option<Arc<dyn ArenaStore>> {
        let guard = self.store.read().await;
        guard.as_ref().cloned()
    }

    /// Obtain the current store or fail with [`ServiceError::Degraded`].
    pub async fn require_store(&self) -> Result<Arc<dyn ArenaStore>, ServiceError> {
        self.store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new store implementation and leave degraded mode.
    pub async fn install_store(&self, store: Arc<dyn ArenaStore>) {
        {
            let mut guard = self.store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false).await;
    }

    /// Remove the current store and enter degraded mode.
    pub async fn clear_store(&self) {
        {
            let mut guard = self.store.write().await;
            guard.take();
        }
        self.update_degraded(true).await;
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update the degraded flag and announce it on the public stream when it changes.
    pub async fn update_degraded(&self, value: bool) {
        let changed = self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });

        if changed {
            info!(degraded = value, "degraded mode changed");
            sse_events::broadcast_system_status(&self.public_sse, value);
        }
    }

    /// Broadcast hub used for the public SSE stream.
    pub fn public_sse(&self) -> &SseHub {
        &self.public_sse
    }

    /// Issued login sessions.
    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Active practice sessions keyed by their identifier.
    pub fn practice_sessions(&self) -> &DashMap<Uuid, PracticeSession> {
        &self.practice
    }

    /// Drop practice sessions older than `ttl` and the finished sessions of `user_id`.
    /// Returns how many were removed.
    pub fn prune_practice_sessions(&self, user_id: Uuid, ttl: Duration) -> usize {
        let now = SystemTime::now();
        let before = self.practice.len();
        self.practice.retain(|_, session| {
            let done = session.user_id == user_id && session.is_finished();
            !done && !session.is_expired(now, ttl)
        });
        before.saturating_sub(self.practice.len())
    }

    /// Serializes read-modify-write cycles on user accounts (token balances, first admin).
    pub fn account_gate(&self) -> &Mutex<()> {
        &self.account_gate
    }

    /// Serializes match starts so that a team never goes live twice.
    pub fn live_gate(&self) -> &Mutex<()> {
        &self.live_gate
    }

    /// Room for `match_id` if it is currently loaded.
    pub fn loaded_room(&self, match_id: Uuid) -> Option<Arc<MatchRoom>> {
        self.rooms.get(&match_id).map(|room| room.value().clone())
    }

    /// Room for `match_id`, loading the match and its questions from storage on first use.
    pub async fn room(&self, match_id: Uuid) -> Result<Arc<MatchRoom>, ServiceError> {
        if let Some(room) = self.loaded_room(match_id) {
            return Ok(room);
        }

        let store = self.require_store().await?;
        let entity = store
            .find_match(match_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("match `{match_id}` not found")))?;

        let mut questions = Vec::with_capacity(entity.question_ids.len());
        for question_id in &entity.question_ids {
            let question = store.find_question(*question_id).await?.ok_or_else(|| {
                ServiceError::InvalidState(format!(
                    "question `{question_id}` of match `{match_id}` no longer exists"
                ))
            })?;
            questions.push(question);
        }

        let room = Arc::new(MatchRoom::restore(
            &entity,
            questions,
            self.transition_timeout,
        ));
        let room = Arc::clone(&self.rooms.entry(match_id).or_insert(room));
        Ok(room)
    }

    /// Room for `match_id` leased for a host action. The room stays loaded until
    /// the lease is dropped.
    pub async fn hosted_room(&self, match_id: Uuid) -> Result<RoomLease, ServiceError> {
        loop {
            let room = self.room(match_id).await?;
            // The entry guard blocks `release_room` until the lease is counted.
            let lease = self
                .rooms
                .get(&match_id)
                .filter(|entry| Arc::ptr_eq(entry.value(), &room))
                .map(|_entry| RoomLease::new(room));
            if let Some(lease) = lease {
                return Ok(lease);
            }
        }
    }

    /// Drop the room of `match_id` when nobody watches or hosts it and it is not live.
    pub fn release_room(&self, match_id: Uuid) -> bool {
        self.rooms
            .remove_if(&match_id, |_, room| room.is_idle())
            .is_some()
    }

    /// Number of rooms currently loaded.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
