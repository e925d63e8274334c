//! Production gateway binding against the hosted backend's HTTP
//! dialect: PostgREST-style relational access under `/rest/v1`, the
//! identity provider under `/auth/v1`, bucket storage under
//! `/storage/v1`. The signed-in session is cached here and attached to
//! every subsequent request.

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

use crate::config::Config;
use crate::gateway::{
    EventStore, GatewayError, GatewayResult, ObjectStore, PollStore, ProfileStore, SessionProvider,
};
use crate::models::event_models::{Event, NewRegistration, Registration};
use crate::models::file_models::{StoredObject, MAX_FILE_SIZE};
use crate::models::poll_models::{
    NewOption, NewPoll, NewQuestion, OptionUpdate, PollRecord, PollUpdate, QuestionRecord,
    QuestionUpdate,
};
use crate::models::user_models::{NewProfile, SessionUser, UserProfile, UserRole};
use crate::models::vote_record_models::{NewVote, VoteRecord};

#[derive(Debug, Clone, Deserialize)]
struct AuthSession {
    access_token: String,
    user: SessionUser,
}

pub struct RestGateway {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    session: RwLock<Option<AuthSession>>,
}

impl RestGateway {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            session: RwLock::new(None),
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    /// Attach the project key plus the strongest credential at hand:
    /// the user's access token when signed in, the project key otherwise.
    async fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        let token = self
            .session
            .read()
            .await
            .as_ref()
            .map(|s| s.access_token.clone())
            .unwrap_or_else(|| self.api_key.clone());
        builder
            .header("apikey", self.api_key.clone())
            .header("Authorization", format!("Bearer {}", token))
    }

    async fn send(&self, builder: RequestBuilder) -> GatewayResult<Response> {
        let response = self
            .authorize(builder)
            .await
            .send()
            .await
            .map_err(|e| GatewayError::Request(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::CONFLICT {
            Err(GatewayError::Conflict(body))
        } else {
            Err(GatewayError::Request(format!("{}: {}", status, body)))
        }
    }

    async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> GatewayResult<T> {
        response.json::<T>().await.map_err(|e| GatewayError::Decode(e.to_string()))
    }

    /// PostgREST returns created rows as a one-element array when asked
    /// for a representation.
    async fn decode_single<T: serde::de::DeserializeOwned>(response: Response) -> GatewayResult<T> {
        let mut rows: Vec<T> = Self::decode(response).await?;
        if rows.is_empty() {
            return Err(GatewayError::Decode("empty representation".to_string()));
        }
        Ok(rows.remove(0))
    }
}

#[async_trait]
impl SessionProvider for RestGateway {
    async fn current_session(&self) -> GatewayResult<Option<SessionUser>> {
        Ok(self.session.read().await.as_ref().map(|s| s.user.clone()))
    }

    async fn sign_in(&self, email: &str, password: &str) -> GatewayResult<SessionUser> {
        let url = format!("{}/auth/v1/token?grant_type=password", self.base_url);
        let response = self
            .send(self.http.post(&url).json(&json!({ "email": email, "password": password })))
            .await?;
        let session: AuthSession = Self::decode(response).await?;
        let user = session.user.clone();
        *self.session.write().await = Some(session);
        Ok(user)
    }

    async fn sign_up(&self, email: &str, password: &str) -> GatewayResult<SessionUser> {
        let url = format!("{}/auth/v1/signup", self.base_url);
        let response = self
            .send(self.http.post(&url).json(&json!({ "email": email, "password": password })))
            .await?;
        let value: serde_json::Value = Self::decode(response).await?;
        if value.get("access_token").is_some() {
            // Auto-confirm projects sign the user straight in.
            let session: AuthSession = serde_json::from_value(value)
                .map_err(|e| GatewayError::Decode(e.to_string()))?;
            let user = session.user.clone();
            *self.session.write().await = Some(session);
            Ok(user)
        } else {
            serde_json::from_value(value).map_err(|e| GatewayError::Decode(e.to_string()))
        }
    }

    async fn sign_out(&self) -> GatewayResult<()> {
        let url = format!("{}/auth/v1/logout", self.base_url);
        if let Err(err) = self.send(self.http.post(&url)).await {
            // Local sign-out proceeds regardless; the token just expires
            // server-side on its own schedule.
            warn!(error = %err, "remote sign-out failed");
        }
        *self.session.write().await = None;
        Ok(())
    }
}

#[async_trait]
impl PollStore for RestGateway {
    async fn list_polls(&self) -> GatewayResult<Vec<PollRecord>> {
        let response = self
            .send(self.http.get(self.table_url("polls")).query(&[
                ("select", "*,poll_questions(*,poll_options(*))"),
                ("order", "created_at.desc"),
            ]))
            .await?;
        Self::decode(response).await
    }

    async fn count_votes(&self, option_id: Uuid) -> GatewayResult<u64> {
        let response = self
            .send(self.http.get(self.table_url("poll_votes")).query(&[
                ("select", "id".to_string()),
                ("option_id", format!("eq.{}", option_id)),
            ]))
            .await?;
        let rows: Vec<serde_json::Value> = Self::decode(response).await?;
        Ok(rows.len() as u64)
    }

    async fn find_vote(
        &self,
        question_id: Uuid,
        user_id: Uuid,
    ) -> GatewayResult<Option<VoteRecord>> {
        let response = self
            .send(self.http.get(self.table_url("poll_votes")).query(&[
                ("select", "*".to_string()),
                ("question_id", format!("eq.{}", question_id)),
                ("user_id", format!("eq.{}", user_id)),
                ("limit", "1".to_string()),
            ]))
            .await?;
        let rows: Vec<VoteRecord> = Self::decode(response).await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_poll(&self, new: &NewPoll) -> GatewayResult<PollRecord> {
        let response = self
            .send(
                self.http
                    .post(self.table_url("polls"))
                    .header("Prefer", "return=representation")
                    .json(new),
            )
            .await?;
        Self::decode_single(response).await
    }

    async fn insert_question(&self, new: &NewQuestion) -> GatewayResult<QuestionRecord> {
        let response = self
            .send(
                self.http
                    .post(self.table_url("poll_questions"))
                    .header("Prefer", "return=representation")
                    .json(new),
            )
            .await?;
        Self::decode_single(response).await
    }

    async fn insert_options(&self, rows: &[NewOption]) -> GatewayResult<()> {
        self.send(self.http.post(self.table_url("poll_options")).json(&rows)).await?;
        Ok(())
    }

    async fn insert_vote(&self, new: &NewVote) -> GatewayResult<()> {
        self.send(self.http.post(self.table_url("poll_votes")).json(new)).await?;
        Ok(())
    }

    async fn update_vote(&self, vote_id: Uuid, option_id: Uuid) -> GatewayResult<()> {
        self.send(
            self.http
                .patch(self.table_url("poll_votes"))
                .query(&[("id", format!("eq.{}", vote_id))])
                .json(&json!({ "option_id": option_id })),
        )
        .await?;
        Ok(())
    }

    async fn update_poll(&self, poll_id: Uuid, fields: &PollUpdate) -> GatewayResult<()> {
        self.send(
            self.http
                .patch(self.table_url("polls"))
                .query(&[("id", format!("eq.{}", poll_id))])
                .json(fields),
        )
        .await?;
        Ok(())
    }

    async fn update_question(
        &self,
        question_id: Uuid,
        fields: &QuestionUpdate,
    ) -> GatewayResult<()> {
        self.send(
            self.http
                .patch(self.table_url("poll_questions"))
                .query(&[("id", format!("eq.{}", question_id))])
                .json(fields),
        )
        .await?;
        Ok(())
    }

    async fn update_option(&self, option_id: Uuid, fields: &OptionUpdate) -> GatewayResult<()> {
        self.send(
            self.http
                .patch(self.table_url("poll_options"))
                .query(&[("id", format!("eq.{}", option_id))])
                .json(fields),
        )
        .await?;
        Ok(())
    }

    async fn delete_poll(&self, poll_id: Uuid) -> GatewayResult<()> {
        self.send(
            self.http
                .delete(self.table_url("polls"))
                .query(&[("id", format!("eq.{}", poll_id))]),
        )
        .await?;
        Ok(())
    }

    async fn delete_question(&self, question_id: Uuid) -> GatewayResult<()> {
        self.send(
            self.http
                .delete(self.table_url("poll_questions"))
                .query(&[("id", format!("eq.{}", question_id))]),
        )
        .await?;
        Ok(())
    }

    async fn delete_option(&self, option_id: Uuid) -> GatewayResult<()> {
        self.send(
            self.http
                .delete(self.table_url("poll_options"))
                .query(&[("id", format!("eq.{}", option_id))]),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl EventStore for RestGateway {
    async fn list_events(&self) -> GatewayResult<Vec<Event>> {
        let response = self
            .send(
                self.http
                    .get(self.table_url("events"))
                    .query(&[("select", "*"), ("order", "date.asc")]),
            )
            .await?;
        Self::decode(response).await
    }

    async fn list_registrations(&self, user_id: Uuid) -> GatewayResult<Vec<Registration>> {
        let response = self
            .send(self.http.get(self.table_url("registrations")).query(&[
                ("select", "*,event:events(*)".to_string()),
                ("user_id", format!("eq.{}", user_id)),
            ]))
            .await?;
        Self::decode(response).await
    }

    async fn insert_registrations(&self, rows: &[NewRegistration]) -> GatewayResult<()> {
        self.send(self.http.post(self.table_url("registrations")).json(&rows)).await?;
        Ok(())
    }

    async fn delete_registration(&self, user_id: Uuid, event_id: Uuid) -> GatewayResult<()> {
        self.send(self.http.delete(self.table_url("registrations")).query(&[
            ("user_id", format!("eq.{}", user_id)),
            ("event_id", format!("eq.{}", event_id)),
        ]))
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for RestGateway {
    async fn find_profile(&self, email: &str) -> GatewayResult<Option<UserProfile>> {
        let response = self
            .send(self.http.get(self.table_url("users")).query(&[
                ("select", "*".to_string()),
                ("email", format!("eq.{}", email)),
                ("limit", "1".to_string()),
            ]))
            .await?;
        let rows: Vec<UserProfile> = Self::decode(response).await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_profile(&self, new: &NewProfile) -> GatewayResult<UserProfile> {
        let response = self
            .send(
                self.http
                    .post(self.table_url("users"))
                    .header("Prefer", "return=representation")
                    .json(new),
            )
            .await?;
        Self::decode_single(response).await
    }

    async fn update_role(&self, profile_id: Uuid, role: UserRole) -> GatewayResult<UserProfile> {
        let response = self
            .send(
                self.http
                    .patch(self.table_url("users"))
                    .query(&[("id", format!("eq.{}", profile_id))])
                    .header("Prefer", "return=representation")
                    .json(&json!({ "role": role })),
            )
            .await?;
        Self::decode_single(response).await
    }
}

#[async_trait]
impl ObjectStore for RestGateway {
    async fn ensure_bucket(&self, bucket: &str) -> GatewayResult<()> {
        let list_url = format!("{}/storage/v1/object/list/{}", self.base_url, bucket);
        let probe = self
            .send(self.http.post(&list_url).json(&json!({ "prefix": "", "limit": 1 })))
            .await;
        match probe {
            Ok(_) => Ok(()),
            Err(GatewayError::Request(msg)) if msg.contains("Bucket not found") => {
                let create_url = format!("{}/storage/v1/bucket", self.base_url);
                self.send(self.http.post(&create_url).json(&json!({
                    "id": bucket,
                    "name": bucket,
                    "public": true,
                    "file_size_limit": MAX_FILE_SIZE,
                })))
                .await?;
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    async fn upload(
        &self,
        bucket: &str,
        object_name: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> GatewayResult<()> {
        let url = format!("{}/storage/v1/object/{}/{}", self.base_url, bucket, object_name);
        self.send(
            self.http
                .post(&url)
                .header("Content-Type", content_type.to_string())
                .body(bytes.to_vec()),
        )
        .await?;
        Ok(())
    }

    fn public_url(&self, bucket: &str, object_name: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.base_url, bucket, object_name)
    }

    async fn download(&self, url: &str) -> GatewayResult<Vec<u8>> {
        let response = self.send(self.http.get(url)).await?;
        let bytes =
            response.bytes().await.map_err(|e| GatewayError::Request(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn remove(&self, bucket: &str, object_name: &str) -> GatewayResult<()> {
        let url = format!("{}/storage/v1/object/{}/{}", self.base_url, bucket, object_name);
        self.send(self.http.delete(&url)).await?;
        Ok(())
    }

    async fn list(&self, bucket: &str) -> GatewayResult<Vec<StoredObject>> {
        let url = format!("{}/storage/v1/object/list/{}", self.base_url, bucket);
        let response = self
            .send(self.http.post(&url).json(&json!({ "prefix": "", "limit": 100 })))
            .await?;
        Self::decode(response).await
    }
}
