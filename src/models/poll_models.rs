use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A poll as presented to the UI, with per-option vote counts and the
/// current user's vote state folded in.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Poll {
    pub id: Uuid,
    pub title: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub questions: Vec<PollQuestion>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PollQuestion {
    pub id: Uuid,
    pub poll_id: Uuid,
    pub question: String,
    pub description: Option<String>,
    pub uploaded_file_url: Option<String>,
    pub uploaded_file_name: Option<String>,
    pub uploaded_file_type: Option<String>,
    pub extracted_text: Option<String>,
    pub created_at: DateTime<Utc>,
    pub options: Vec<PollOption>,
    // Derived, never stored: the requesting user's vote state.
    pub user_voted: bool,
    pub user_vote_option_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PollOption {
    pub id: Uuid,
    pub question_id: Uuid,
    pub option_text: String,
    pub option_order: i32,
    // Derived: count of vote rows referencing this option.
    pub votes: u64,
}

/// Raw rows as the remote store returns them, nested one level deep.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PollRecord {
    pub id: Uuid,
    pub title: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "poll_questions", default)]
    pub questions: Vec<QuestionRecord>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct QuestionRecord {
    pub id: Uuid,
    pub poll_id: Uuid,
    pub question: String,
    pub description: Option<String>,
    pub uploaded_file_url: Option<String>,
    pub uploaded_file_name: Option<String>,
    pub uploaded_file_type: Option<String>,
    pub extracted_text: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "poll_options", default)]
    pub options: Vec<OptionRecord>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OptionRecord {
    pub id: Uuid,
    pub question_id: Uuid,
    pub option_text: String,
    pub option_order: i32,
}

/// Input for one question of a new poll, carried through `create_poll`.
#[derive(Debug, Clone, Default)]
pub struct QuestionDraft {
    pub question: String,
    pub description: Option<String>,
    pub uploaded_file_url: Option<String>,
    pub uploaded_file_name: Option<String>,
    pub uploaded_file_type: Option<String>,
    pub extracted_text: Option<String>,
    pub options: Vec<String>,
}

#[derive(Debug, Serialize, Clone)]
pub struct NewPoll {
    pub title: String,
    pub created_by: Uuid,
}

#[derive(Debug, Serialize, Clone)]
pub struct NewQuestion {
    pub poll_id: Uuid,
    pub question: String,
    pub description: Option<String>,
    pub uploaded_file_url: Option<String>,
    pub uploaded_file_name: Option<String>,
    pub uploaded_file_type: Option<String>,
    pub extracted_text: Option<String>,
}

#[derive(Debug, Serialize, Clone)]
pub struct NewOption {
    pub question_id: Uuid,
    pub option_text: String,
    pub option_order: i32,
}

/// Partial updates; `None` fields are left untouched remotely.
#[derive(Debug, Serialize, Clone, Default)]
pub struct PollUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Debug, Serialize, Clone, Default)]
pub struct QuestionUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Clone, Default)]
pub struct OptionUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub option_text: Option<String>,
}
