use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One user's live vote on one question. The store holds at most one of
/// these per (user, question); re-votes update `option_id` in place.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VoteRecord {
    pub id: Uuid,
    pub question_id: Uuid,
    pub option_id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Clone)]
pub struct NewVote {
    pub question_id: Uuid,
    pub option_id: Uuid,
    pub user_id: Uuid,
}
