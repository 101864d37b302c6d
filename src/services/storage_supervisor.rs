use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{arena_store::ArenaStore, storage::StorageError},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Backoff timings of the supervisor loop.
#[derive(Debug, Clone, Copy)]
pub struct SupervisorTimings {
    /// First retry delay, doubled after each failure.
    pub initial_delay: Duration,
    /// Upper bound of the retry delay.
    pub max_delay: Duration,
    /// Pause between two health checks of a healthy store.
    pub health_poll_interval: Duration,
}

impl Default for SupervisorTimings {
    fn default() -> Self {
        Self {
            initial_delay: INITIAL_DELAY,
            max_delay: MAX_DELAY,
            health_poll_interval: HEALTH_POLL_INTERVAL,
        }
    }
}

/// Reconnect to the storage backend and keep the shared state in degraded mode when it is unavailable.
pub async fn run<F, Fut>(state: SharedState, connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn ArenaStore>, StorageError>> + Send,
{
    run_with_timings(state, connect, SupervisorTimings::default()).await
}

/// [`run`] with explicit backoff timings.
pub async fn run_with_timings<F, Fut>(state: SharedState, mut connect: F, timings: SupervisorTimings)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn ArenaStore>, StorageError>> + Send,
{
    let mut delay = timings.initial_delay;

    loop {
        match connect().await {
            Ok(store) => {
                state.install_store(store.clone()).await;
                info!("storage connection established; leaving degraded mode");
                delay = timings.initial_delay;

                watch_store(&state, store.as_ref(), timings).await;

                warn!("exhausted storage reconnect attempts; dropping the connection");
                state.clear_store().await;
                sleep(delay).await;
                delay = (delay * 2).min(timings.max_delay);
            }
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(timings.max_delay);
            }
        }
    }
}

/// Poll the store health until it fails and cannot be revived in place.
async fn watch_store(state: &SharedState, store: &dyn ArenaStore, timings: SupervisorTimings) {
    loop {
        if store.health_check().await.is_ok() {
            if state.is_degraded() {
                info!("storage healthy again; leaving degraded mode");
                state.update_degraded(false).await;
            }
            sleep(timings.health_poll_interval).await;
            continue;
        }

        if !reconnect_in_place(state, store, timings).await {
            return;
        }
        state.update_degraded(false).await;
        sleep(timings.health_poll_interval).await;
    }
}

async fn reconnect_in_place(
    state: &SharedState,
    store: &dyn ArenaStore,
    timings: SupervisorTimings,
) -> bool {
    let mut reconnect_delay = timings.initial_delay;

    for attempt in 0..MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => {
                info!(attempt, "storage reconnection succeeded after health check failure");
                return true;
            }
            Err(err) => {
                if attempt == 0 {
                    warn!(
                        attempt, error = %err,
                        "storage reconnect first attempt failed; entering degraded mode"
                    );
                    state.update_degraded(true).await;
                } else {
                    warn!(attempt, error = %err, "storage reconnect attempt failed");
                }
                sleep(reconnect_delay).await;
                reconnect_delay = (reconnect_delay * 2).min(timings.max_delay);
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use std::{
        io,
        sync::atomic::{AtomicBool, Ordering},
    };

    use futures::future::{self, BoxFuture};
    use uuid::Uuid;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            arena_store::MemoryStore,
            models::{
                CompetitionEntity, MatchEntity, PaymentEntity, QuestionEntity, StandingEntity,
                TeamEntity, UserEntity,
            },
            storage::StorageResult,
        },
        state::AppState,
    };

    /// Memory store whose health can be switched off.
    struct FlakyStore {
        inner: MemoryStore,
        healthy: Arc<AtomicBool>,
    }

    impl FlakyStore {
        fn status(&self) -> BoxFuture<'static, StorageResult<()>> {
            let result = if self.healthy.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(StorageError::unavailable(
                    "down".into(),
                    io::Error::other("connection refused"),
                ))
            };
            Box::pin(future::ready(result))
        }
    }

    impl ArenaStore for FlakyStore {
        fn save_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.save_user(user)
        }
        fn find_user(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
            self.inner.find_user(id)
        }
        fn find_user_by_username(
            &self,
            username: String,
        ) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
            self.inner.find_user_by_username(username)
        }
        fn count_users(&self) -> BoxFuture<'static, StorageResult<u64>> {
            self.inner.count_users()
        }
        fn save_team(&self, team: TeamEntity) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.save_team(team)
        }
        fn find_team(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<TeamEntity>>> {
            self.inner.find_team(id)
        }
        fn list_teams(&self) -> BoxFuture<'static, StorageResult<Vec<TeamEntity>>> {
            self.inner.list_teams()
        }
        fn delete_team(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
            self.inner.delete_team(id)
        }
        fn save_question(&self, question: QuestionEntity) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.save_question(question)
        }
        fn find_question(
            &self,
            id: Uuid,
        ) -> BoxFuture<'static, StorageResult<Option<QuestionEntity>>> {
            self.inner.find_question(id)
        }
        fn list_questions(&self) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>> {
            self.inner.list_questions()
        }
        fn save_competition(
            &self,
            competition: CompetitionEntity,
        ) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.save_competition(competition)
        }
        fn find_competition(
            &self,
            id: Uuid,
        ) -> BoxFuture<'static, StorageResult<Option<CompetitionEntity>>> {
            self.inner.find_competition(id)
        }
        fn list_competitions(&self) -> BoxFuture<'static, StorageResult<Vec<CompetitionEntity>>> {
            self.inner.list_competitions()
        }
        fn save_match(&self, game: MatchEntity) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.save_match(game)
        }
        fn find_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
            self.inner.find_match(id)
        }
        fn list_matches(
            &self,
            competition_id: Option<Uuid>,
        ) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>> {
            self.inner.list_matches(competition_id)
        }
        fn replace_standings(
            &self,
            competition_id: Uuid,
            standings: Vec<StandingEntity>,
        ) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.replace_standings(competition_id, standings)
        }
        fn list_standings(
            &self,
            competition_id: Uuid,
        ) -> BoxFuture<'static, StorageResult<Vec<StandingEntity>>> {
            self.inner.list_standings(competition_id)
        }
        fn save_payment(&self, payment: PaymentEntity) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.save_payment(payment)
        }
        fn list_payments(
            &self,
            user_id: Uuid,
        ) -> BoxFuture<'static, StorageResult<Vec<PaymentEntity>>> {
            self.inner.list_payments(user_id)
        }
        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.status()
        }
        fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.status()
        }
    }

    fn fast_timings() -> SupervisorTimings {
        SupervisorTimings {
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(10),
            health_poll_interval: Duration::from_millis(5),
        }
    }

    async fn wait_for_degraded(state: &SharedState, expected: bool) {
        let mut watcher = state.degraded_watcher();
        tokio::time::timeout(Duration::from_secs(2), watcher.wait_for(|value| *value == expected))
            .await
            .expect("degraded flag did not change in time")
            .unwrap();
    }

    #[tokio::test]
    async fn supervisor_tracks_store_health() {
        let state = AppState::new(AppConfig::default());
        let healthy = Arc::new(AtomicBool::new(true));

        let flag = healthy.clone();
        let task = tokio::spawn(run_with_timings(
            state.clone(),
            move || {
                let store: Arc<dyn ArenaStore> = Arc::new(FlakyStore {
                    inner: MemoryStore::new(),
                    healthy: flag.clone(),
                });
                async move { Ok(store) }
            },
            fast_timings(),
        ));

        wait_for_degraded(&state, false).await;
        assert!(state.store().await.is_some());

        healthy.store(false, Ordering::SeqCst);
        wait_for_degraded(&state, true).await;

        healthy.store(true, Ordering::SeqCst);
        wait_for_degraded(&state, false).await;

        task.abort();
    }
}
