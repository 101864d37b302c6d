use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database,
    bson::{Document, doc},
    options::IndexOptions,
};
use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult, is_duplicate_key},
    models::{EntityDocument, doc_id, doc_key},
};
use crate::dao::{
    arena_store::ArenaStore,
    models::{
        CompetitionEntity, MatchEntity, PaymentEntity, QuestionEntity, StandingEntity, TeamEntity,
        UserEntity,
    },
    storage::StorageResult,
};

const USERS: &str = "users";
const TEAMS: &str = "teams";
const QUESTIONS: &str = "questions";
const COMPETITIONS: &str = "competitions";
const MATCHES: &str = "matches";
const STANDINGS: &str = "standings";
const PAYMENTS: &str = "payments";

/// Arena store keeping one MongoDB collection per entity.
#[derive(Clone)]
pub struct MongoArenaStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    // Keeps the connection pool alive alongside the database handle.
    #[allow(dead_code)]
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoArenaStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;

        for (collection, unique) in [(USERS, true), (MATCHES, false), (PAYMENTS, false)] {
            let index = mongodb::IndexModel::builder()
                .keys(doc! {"key": 1})
                .options(
                    IndexOptions::builder()
                        .name(Some(format!("{collection}_key_idx")))
                        .unique(Some(unique))
                        .build(),
                )
                .build();

            database
                .collection::<Document>(collection)
                .create_index(index)
                .await
                .map_err(|source| MongoDaoError::EnsureIndex {
                    collection,
                    index: "key",
                    source,
                })?;
        }

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn collection<T>(&self, name: &str) -> Collection<EntityDocument<T>>
    where
        T: Send + Sync,
    {
        self.database().await.collection::<EntityDocument<T>>(name)
    }

    async fn upsert<T>(&self, name: &'static str, document: EntityDocument<T>) -> MongoResult<()>
    where
        T: Serialize + Send + Sync,
    {
        let collection = self.collection::<T>(name).await;
        let id = document.id.clone();
        collection
            .replace_one(doc! {"_id": id.as_str()}, &document)
            .upsert(true)
            .await
            .map_err(|source| {
                if is_duplicate_key(&source) {
                    MongoDaoError::DuplicateKey {
                        collection: name,
                        id: id.clone(),
                    }
                } else {
                    MongoDaoError::Save {
                        collection: name,
                        id: id.clone(),
                        source,
                    }
                }
            })?;
        Ok(())
    }

    async fn find_one<T>(&self, name: &'static str, filter: Document) -> MongoResult<Option<T>>
    where
        T: DeserializeOwned + Send + Sync,
    {
        let collection = self.collection::<T>(name).await;
        let document = collection
            .find_one(filter)
            .await
            .map_err(|source| MongoDaoError::Load {
                collection: name,
                source,
            })?;
        Ok(document.map(|document| document.payload))
    }

    async fn find_many<T>(&self, name: &'static str, filter: Document) -> MongoResult<Vec<T>>
    where
        T: DeserializeOwned + Send + Sync + Unpin,
    {
        let collection = self.collection::<T>(name).await;
        let documents: Vec<EntityDocument<T>> = collection
            .find(filter)
            .await
            .map_err(|source| MongoDaoError::Load {
                collection: name,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Load {
                collection: name,
                source,
            })?;
        Ok(documents
            .into_iter()
            .map(|document| document.payload)
            .collect())
    }

    async fn delete(&self, name: &'static str, id: Uuid) -> MongoResult<bool> {
        let collection = self.database().await.collection::<Document>(name);
        let result = collection
            .delete_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::Delete {
                collection: name,
                id: id.to_string(),
                source,
            })?;
        Ok(result.deleted_count > 0)
    }

    async fn count(&self, name: &'static str) -> MongoResult<u64> {
        let collection = self.database().await.collection::<Document>(name);
        collection
            .count_documents(doc! {})
            .await
            .map_err(|source| MongoDaoError::Load {
                collection: name,
                source,
            })
    }
}

impl ArenaStore for MongoArenaStore {
    fn save_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let document = EntityDocument::new(user.id, Some(user.username.clone()), user);
            store.upsert(USERS, document).await.map_err(Into::into)
        })
    }

    fn find_user(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_one(USERS, doc_id(id)).await.map_err(Into::into) })
    }

    fn find_user_by_username(
        &self,
        username: String,
    ) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_one(USERS, doc_key(username))
                .await
                .map_err(Into::into)
        })
    }

    fn count_users(&self) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move { store.count(USERS).await.map_err(Into::into) })
    }

    fn save_team(&self, team: TeamEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let document = EntityDocument::new(team.id, None, team);
            store.upsert(TEAMS, document).await.map_err(Into::into)
        })
    }

    fn find_team(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<TeamEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_one(TEAMS, doc_id(id)).await.map_err(Into::into) })
    }

    fn list_teams(&self) -> BoxFuture<'static, StorageResult<Vec<TeamEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut teams: Vec<TeamEntity> = store.find_many(TEAMS, doc! {}).await?;
            teams.sort_by_key(|team| team.created_at);
            Ok(teams)
        })
    }

    fn delete_team(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.delete(TEAMS, id).await.map_err(Into::into) })
    }

    fn save_question(&self, question: QuestionEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let document = EntityDocument::new(question.id, None, question);
            store.upsert(QUESTIONS, document).await.map_err(Into::into)
        })
    }

    fn find_question(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<QuestionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_one(QUESTIONS, doc_id(id))
                .await
                .map_err(Into::into)
        })
    }

    fn list_questions(&self) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut questions: Vec<QuestionEntity> = store.find_many(QUESTIONS, doc! {}).await?;
            questions.sort_by_key(|question| question.created_at);
            Ok(questions)
        })
    }

    fn save_competition(
        &self,
        competition: CompetitionEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let document = EntityDocument::new(competition.id, None, competition);
            store.upsert(COMPETITIONS, document).await.map_err(Into::into)
        })
    }

    fn find_competition(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<CompetitionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_one(COMPETITIONS, doc_id(id))
                .await
                .map_err(Into::into)
        })
    }

    fn list_competitions(&self) -> BoxFuture<'static, StorageResult<Vec<CompetitionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut competitions: Vec<CompetitionEntity> =
                store.find_many(COMPETITIONS, doc! {}).await?;
            competitions.sort_by_key(|competition| competition.created_at);
            Ok(competitions)
        })
    }

    fn save_match(&self, game: MatchEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let document =
                EntityDocument::new(game.id, Some(game.competition_id.to_string()), game);
            store.upsert(MATCHES, document).await.map_err(Into::into)
        })
    }

    fn find_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_one(MATCHES, doc_id(id)).await.map_err(Into::into) })
    }

    fn list_matches(
        &self,
        competition_id: Option<Uuid>,
    ) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let filter = competition_id
                .map(|id| doc_key(id.to_string()))
                .unwrap_or_default();
            let mut matches: Vec<MatchEntity> = store.find_many(MATCHES, filter).await?;
            matches.sort_by_key(|game| (game.scheduled_at, game.updated_at));
            Ok(matches)
        })
    }

    fn replace_standings(
        &self,
        competition_id: Uuid,
        standings: Vec<StandingEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let document = EntityDocument::new(competition_id, None, standings);
            store.upsert(STANDINGS, document).await.map_err(Into::into)
        })
    }

    fn list_standings(
        &self,
        competition_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<StandingEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let standings: Option<Vec<StandingEntity>> =
                store.find_one(STANDINGS, doc_id(competition_id)).await?;
            Ok(standings.unwrap_or_default())
        })
    }

    fn save_payment(&self, payment: PaymentEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let document =
                EntityDocument::new(payment.id, Some(payment.user_id.to_string()), payment);
            store.upsert(PAYMENTS, document).await.map_err(Into::into)
        })
    }

    fn list_payments(&self, user_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<PaymentEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut payments: Vec<PaymentEntity> = store
                .find_many(PAYMENTS, doc_key(user_id.to_string()))
                .await?;
            payments.sort_by_key(|payment| payment.created_at);
            Ok(payments)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
