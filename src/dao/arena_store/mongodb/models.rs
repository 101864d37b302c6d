use mongodb::bson::{Document, doc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Envelope stored in every collection.
///
/// `_id` and `key` are plain strings so lookups never depend on how the
/// payload's UUIDs are encoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDocument<T> {
    /// Entity identifier, also the document `_id`.
    #[serde(rename = "_id")]
    pub id: String,
    /// Secondary lookup key (username, competition id or user id).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub payload: T,
}

impl<T> EntityDocument<T> {
    /// Wrap `payload` for storage.
    pub fn new(id: Uuid, key: Option<String>, payload: T) -> Self {
        Self {
            id: id.to_string(),
            key,
            payload,
        }
    }
}

/// Filter matching the document of `id`.
pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": id.to_string()}
}

/// Filter matching the secondary `key`.
pub fn doc_key(key: impl Into<String>) -> Document {
    doc! {"key": key.into()}
}
