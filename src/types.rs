use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered account. Read-only on the client; the copy held by the
/// session store is whatever the login response returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
}

/// An event as the backend serves it. `user_id` is the owner; only the
/// owner may update or delete. The backend uses PascalCase field names
/// for entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Event {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub description: String,
    pub location: String,
    pub date_time: DateTime<Utc>,
}

/// Join record between a user and an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Attendee {
    pub id: i64,
    pub user_id: i64,
    pub event_id: i64,
}

/// Payload for creating an event; the server assigns `Id` and fills the
/// owner from the bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EventInput {
    pub name: String,
    pub description: String,
    pub location: String,
    pub date_time: DateTime<Utc>,
}

/// Auth payloads use lowercase keys, unlike the entity types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

/// Error body shape the backend produces: `{"error": "..."}` everywhere,
/// with `{"message": "..."}` occasionally carrying extra detail.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
