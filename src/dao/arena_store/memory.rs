//! Process-local store used when no database is configured and by the test suite.

use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::{self, BoxFuture};
use uuid::Uuid;

use super::ArenaStore;
use crate::dao::{
    models::{
        CompetitionEntity, MatchEntity, PaymentEntity, QuestionEntity, StandingEntity, TeamEntity,
        UserEntity,
    },
    storage::{StorageError, StorageResult},
};

/// [`ArenaStore`] keeping every collection in a [`DashMap`]. Never fails.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    users: DashMap<Uuid, UserEntity>,
    usernames: DashMap<String, Uuid>,
    teams: DashMap<Uuid, TeamEntity>,
    questions: DashMap<Uuid, QuestionEntity>,
    competitions: DashMap<Uuid, CompetitionEntity>,
    matches: DashMap<Uuid, MatchEntity>,
    standings: DashMap<Uuid, Vec<StandingEntity>>,
    payments: DashMap<Uuid, PaymentEntity>,
}

impl MemoryStore {
    /// Build an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn insert_user(&self, user: UserEntity) -> StorageResult<()> {
        let inner = &self.inner;
        match inner.usernames.entry(user.username.clone()) {
            Entry::Occupied(entry) if *entry.get() != user.id => {
                return Err(StorageError::Duplicate(format!(
                    "username `{}` is already taken",
                    user.username
                )));
            }
            Entry::Occupied(_) => {}
            Entry::Vacant(entry) => {
                entry.insert(user.id);
            }
        }

        if let Some(previous) = inner.users.insert(user.id, user.clone()) {
            if previous.username != user.username {
                inner.usernames.remove(&previous.username);
            }
        }
        Ok(())
    }
}

fn ready<T: Send + 'static>(value: StorageResult<T>) -> BoxFuture<'static, StorageResult<T>> {
    Box::pin(future::ready(value))
}

fn sorted_by<T: Clone, K: Ord>(map: &DashMap<Uuid, T>, key: impl Fn(&T) -> K) -> Vec<T> {
    let mut values = map
        .iter()
        .map(|entry| entry.value().clone())
        .collect::<Vec<_>>();
    values.sort_by_key(|value| key(value));
    values
}

impl ArenaStore for MemoryStore {
    fn save_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>> {
        ready(self.insert_user(user))
    }

    fn find_user(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        ready(Ok(self.inner.users.get(&id).map(|entry| entry.clone())))
    }

    fn find_user_by_username(
        &self,
        username: String,
    ) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        let user = self
            .inner
            .usernames
            .get(&username)
            .map(|entry| *entry.value())
            .and_then(|id| self.inner.users.get(&id).map(|entry| entry.clone()));
        ready(Ok(user))
    }

    fn count_users(&self) -> BoxFuture<'static, StorageResult<u64>> {
        ready(Ok(self.inner.users.len() as u64))
    }

    fn save_team(&self, team: TeamEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.teams.insert(team.id, team);
        ready(Ok(()))
    }

    fn find_team(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<TeamEntity>>> {
        ready(Ok(self.inner.teams.get(&id).map(|entry| entry.clone())))
    }

    fn list_teams(&self) -> BoxFuture<'static, StorageResult<Vec<TeamEntity>>> {
        ready(Ok(sorted_by(&self.inner.teams, |team| team.created_at)))
    }

    fn delete_team(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        ready(Ok(self.inner.teams.remove(&id).is_some()))
    }

    fn save_question(&self, question: QuestionEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.questions.insert(question.id, question);
        ready(Ok(()))
    }

    fn find_question(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<QuestionEntity>>> {
        ready(Ok(self.inner.questions.get(&id).map(|entry| entry.clone())))
    }

    fn list_questions(&self) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>> {
        ready(Ok(sorted_by(&self.inner.questions, |q| q.created_at)))
    }

    fn save_competition(
        &self,
        competition: CompetitionEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.competitions.insert(competition.id, competition);
        ready(Ok(()))
    }

    fn find_competition(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<CompetitionEntity>>> {
        ready(Ok(self
            .inner
            .competitions
            .get(&id)
            .map(|entry| entry.clone())))
    }

    fn list_competitions(&self) -> BoxFuture<'static, StorageResult<Vec<CompetitionEntity>>> {
        ready(Ok(sorted_by(&self.inner.competitions, |c| c.created_at)))
    }

    fn save_match(&self, game: MatchEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.matches.insert(game.id, game);
        ready(Ok(()))
    }

    fn find_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        ready(Ok(self.inner.matches.get(&id).map(|entry| entry.clone())))
    }

    fn list_matches(
        &self,
        competition_id: Option<Uuid>,
    ) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>> {
        let mut matches = sorted_by(&self.inner.matches, |m| (m.scheduled_at, m.updated_at));
        if let Some(competition_id) = competition_id {
            matches.retain(|m| m.competition_id == competition_id);
        }
        ready(Ok(matches))
    }

    fn replace_standings(
        &self,
        competition_id: Uuid,
        standings: Vec<StandingEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.standings.insert(competition_id, standings);
        ready(Ok(()))
    }

    fn list_standings(
        &self,
        competition_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<StandingEntity>>> {
        ready(Ok(self
            .inner
            .standings
            .get(&competition_id)
            .map(|entry| entry.clone())
            .unwrap_or_default()))
    }

    fn save_payment(&self, payment: PaymentEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.payments.insert(payment.id, payment);
        ready(Ok(()))
    }

    fn list_payments(&self, user_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<PaymentEntity>>> {
        let mut payments = sorted_by(&self.inner.payments, |p| p.created_at);
        payments.retain(|p| p.user_id == user_id);
        ready(Ok(payments))
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        ready(Ok(()))
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        ready(Ok(()))
    }
}
