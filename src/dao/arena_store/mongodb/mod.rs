mod config;
mod connection;
mod error;
mod models;
/// [`ArenaStore`](crate::dao::arena_store::ArenaStore) implementation over MongoDB collections.
pub mod store;

pub use config::MongoConfig;
pub use error::MongoDaoError;
pub use store::MongoArenaStore;

use crate::dao::storage::StorageError;

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        match err {
            MongoDaoError::DuplicateKey { .. } => StorageError::Duplicate(err.to_string()),
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}
