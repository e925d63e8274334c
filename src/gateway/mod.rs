//! Seams to the hosted backend: narrow traits for the relational store,
//! the identity provider, and object storage, so coordinators can run
//! against the real service or an in-memory double.

pub mod memory;
pub mod rest;

use std::fmt;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::event_models::{Event, NewRegistration, Registration};
use crate::models::file_models::StoredObject;
use crate::models::poll_models::{
    NewOption, NewPoll, NewQuestion, OptionUpdate, PollRecord, PollUpdate, QuestionRecord,
    QuestionUpdate,
};
use crate::models::user_models::{NewProfile, SessionUser, UserProfile, UserRole};
use crate::models::vote_record_models::{NewVote, VoteRecord};

#[derive(Debug)]
pub enum GatewayError {
    /// Request never completed or came back non-2xx.
    Request(String),
    /// Response arrived but did not decode into the expected shape.
    Decode(String),
    /// Write rejected because an equivalent row already exists.
    Conflict(String),
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::Request(msg) => write!(f, "Request failed: {}", msg),
            GatewayError::Decode(msg) => write!(f, "Decode failed: {}", msg),
            GatewayError::Conflict(msg) => write!(f, "Conflict: {}", msg),
        }
    }
}

impl std::error::Error for GatewayError {}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Session accessor plus the thin sign-in/sign-up/sign-out
/// pass-throughs. Token issuance and refresh stay with the identity
/// provider; implementations only cache what it returns.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn current_session(&self) -> GatewayResult<Option<SessionUser>>;
    async fn sign_in(&self, email: &str, password: &str) -> GatewayResult<SessionUser>;
    async fn sign_up(&self, email: &str, password: &str) -> GatewayResult<SessionUser>;
    async fn sign_out(&self) -> GatewayResult<()>;
}

/// Rows for polls, questions, options, and votes. Deletes cascade to
/// children and votes at the storage layer, not here.
#[async_trait]
pub trait PollStore: Send + Sync {
    /// Polls with questions and options nested, newest poll first.
    async fn list_polls(&self) -> GatewayResult<Vec<PollRecord>>;
    async fn count_votes(&self, option_id: Uuid) -> GatewayResult<u64>;
    /// At most one row exists per (question, user).
    async fn find_vote(&self, question_id: Uuid, user_id: Uuid)
        -> GatewayResult<Option<VoteRecord>>;
    async fn insert_poll(&self, new: &NewPoll) -> GatewayResult<PollRecord>;
    async fn insert_question(&self, new: &NewQuestion) -> GatewayResult<QuestionRecord>;
    async fn insert_options(&self, rows: &[NewOption]) -> GatewayResult<()>;
    async fn insert_vote(&self, new: &NewVote) -> GatewayResult<()>;
    async fn update_vote(&self, vote_id: Uuid, option_id: Uuid) -> GatewayResult<()>;
    async fn update_poll(&self, poll_id: Uuid, fields: &PollUpdate) -> GatewayResult<()>;
    async fn update_question(
        &self,
        question_id: Uuid,
        fields: &QuestionUpdate,
    ) -> GatewayResult<()>;
    async fn update_option(&self, option_id: Uuid, fields: &OptionUpdate) -> GatewayResult<()>;
    async fn delete_poll(&self, poll_id: Uuid) -> GatewayResult<()>;
    async fn delete_question(&self, question_id: Uuid) -> GatewayResult<()>;
    async fn delete_option(&self, option_id: Uuid) -> GatewayResult<()>;
}

#[async_trait]
pub trait EventStore: Send + Sync {
    /// All events, soonest first.
    async fn list_events(&self) -> GatewayResult<Vec<Event>>;
    /// One user's registrations with the event row joined in.
    async fn list_registrations(&self, user_id: Uuid) -> GatewayResult<Vec<Registration>>;
    async fn insert_registrations(&self, rows: &[NewRegistration]) -> GatewayResult<()>;
    async fn delete_registration(&self, user_id: Uuid, event_id: Uuid) -> GatewayResult<()>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn find_profile(&self, email: &str) -> GatewayResult<Option<UserProfile>>;
    /// Duplicate inserts come back as `Conflict` so callers can re-read.
    async fn insert_profile(&self, new: &NewProfile) -> GatewayResult<UserProfile>;
    async fn update_role(&self, profile_id: Uuid, role: UserRole) -> GatewayResult<UserProfile>;
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Probe the bucket; create it when the probe says it is missing.
    async fn ensure_bucket(&self, bucket: &str) -> GatewayResult<()>;
    async fn upload(
        &self,
        bucket: &str,
        object_name: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> GatewayResult<()>;
    fn public_url(&self, bucket: &str, object_name: &str) -> String;
    async fn download(&self, url: &str) -> GatewayResult<Vec<u8>>;
    async fn remove(&self, bucket: &str, object_name: &str) -> GatewayResult<()>;
    async fn list(&self, bucket: &str) -> GatewayResult<Vec<StoredObject>>;
}

/// Text extraction for PDF/DOCX payloads is an external utility; the
/// crate only carries the seam.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(
        &self,
        file_name: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<String, String>;
}

/// Stand-in used when no extraction service is wired up: every request
/// reports extraction as unavailable and the upload flow records that
/// per file instead of failing.
pub struct UnavailableExtractor;

#[async_trait]
impl TextExtractor for UnavailableExtractor {
    async fn extract(
        &self,
        file_name: &str,
        _content_type: &str,
        _bytes: &[u8],
    ) -> Result<String, String> {
        Err(format!("no text extraction service configured for {}", file_name))
    }
}
