use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use thiserror::Error;

/// Result alias for MongoDB operations.
pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

const DUPLICATE_KEY_CODE: i32 = 11000;

/// Failures of the MongoDB arena store, tagged with the collection involved.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// The connection string could not be parsed.
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        /// Offending URI.
        uri: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// The driver rejected the client options.
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// No ping succeeded while connecting.
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        /// Pings tried before giving up.
        attempts: u32,
        /// Last driver error.
        #[source]
        source: MongoError,
    },
    /// A ping on an established connection failed.
    #[error("MongoDB ping health check failed")]
    HealthPing {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Index creation failed at startup.
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        /// Collection being indexed.
        collection: &'static str,
        /// Index name.
        index: &'static str,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// An upsert failed.
    #[error("failed to save document `{id}` in `{collection}`")]
    Save {
        /// Target collection.
        collection: &'static str,
        /// Document identifier.
        id: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// An upsert hit a unique index.
    #[error("document `{id}` in `{collection}` violates a unique index")]
    DuplicateKey {
        /// Target collection.
        collection: &'static str,
        /// Document identifier.
        id: String,
    },
    /// A query or document decode failed.
    #[error("failed to load from `{collection}`")]
    Load {
        /// Queried collection.
        collection: &'static str,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// A delete failed.
    #[error("failed to delete document `{id}` from `{collection}`")]
    Delete {
        /// Target collection.
        collection: &'static str,
        /// Document identifier.
        id: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
}

/// Whether a write failed because of a unique index.
pub fn is_duplicate_key(err: &MongoError) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => {
            write_error.code == DUPLICATE_KEY_CODE
        }
        _ => false,
    }
}
