pub mod memory;
/// MongoDB backend.
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::{
    CompetitionEntity, MatchEntity, PaymentEntity, QuestionEntity, StandingEntity, TeamEntity,
    UserEntity,
};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;
use uuid::Uuid;

pub use memory::MemoryStore;

/// Abstraction over the persistence layer for every arena entity.
///
/// `save_*` operations upsert. `save_user` rejects a username already held by a
/// different user with [`StorageError::Duplicate`](crate::dao::storage::StorageError::Duplicate).
pub trait ArenaStore: Send + Sync {
    /// Upsert a user.
    fn save_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// User by id.
    fn find_user(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<UserEntity>>>;
    /// User by exact username.
    fn find_user_by_username(
        &self,
        username: String,
    ) -> BoxFuture<'static, StorageResult<Option<UserEntity>>>;
    /// Number of registered users.
    fn count_users(&self) -> BoxFuture<'static, StorageResult<u64>>;

    /// Upsert a team.
    fn save_team(&self, team: TeamEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Team by id.
    fn find_team(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<TeamEntity>>>;
    /// Every team, oldest first.
    fn list_teams(&self) -> BoxFuture<'static, StorageResult<Vec<TeamEntity>>>;
    /// Delete a team. Returns whether it existed.
    fn delete_team(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;

    /// Upsert a question.
    fn save_question(&self, question: QuestionEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Question by id.
    fn find_question(&self, id: Uuid)
    -> BoxFuture<'static, StorageResult<Option<QuestionEntity>>>;
    /// Every question, oldest first.
    fn list_questions(&self) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>>;

    /// Upsert a competition.
    fn save_competition(
        &self,
        competition: CompetitionEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Competition by id.
    fn find_competition(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<CompetitionEntity>>>;
    /// Every competition, oldest first.
    fn list_competitions(&self) -> BoxFuture<'static, StorageResult<Vec<CompetitionEntity>>>;

    /// Upsert a match.
    fn save_match(&self, game: MatchEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Match by id.
    fn find_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>>;
    /// Matches of one competition, or all of them.
    fn list_matches(
        &self,
        competition_id: Option<Uuid>,
    ) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>>;

    /// Replace the whole table of a competition.
    fn replace_standings(
        &self,
        competition_id: Uuid,
        standings: Vec<StandingEntity>,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Stored table of a competition.
    fn list_standings(
        &self,
        competition_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<StandingEntity>>>;

    /// Record a payment attempt.
    fn save_payment(&self, payment: PaymentEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Payment attempts of a user.
    fn list_payments(&self, user_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<PaymentEntity>>>;

    /// Cheap round-trip proving the backend answers.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the connection after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
