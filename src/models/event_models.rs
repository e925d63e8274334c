use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub id: Uuid,
    pub name: String,
    pub date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// A user's registration for one event, with the event row joined in
/// when the read asked for it.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Registration {
    pub id: Uuid,
    pub user_id: Uuid,
    pub event_id: Uuid,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub event: Option<Event>,
}

#[derive(Debug, Serialize, Clone)]
pub struct NewRegistration {
    pub user_id: Uuid,
    pub event_id: Uuid,
}
