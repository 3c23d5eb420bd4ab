use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Outbox row. Written in the same database transaction as the state change
/// it describes; `sent_at IS NULL` means pending publication.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OutboxEvent {
    pub id: Uuid,
    pub event_type: String,
    /// Opaque JSON payload; the relay never inspects it.
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

impl OutboxEvent {
    pub fn new(event_type: impl Into<String>, payload: serde_json::Value) -> Self {
        OutboxEvent {
            id: Uuid::new_v4(),
            event_type: event_type.into(),
            payload,
            created_at: Utc::now(),
            sent_at: None,
        }
    }
}

/// Stored response for an `(user_id, key)` pair. The response bytes are
/// replayed verbatim on duplicate requests.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub user_id: Uuid,
    pub key: String,
    pub request_id: Uuid,
    pub response: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
