//! In-memory gateway used by the test suite and as a local fixture.
//! One `RwLock`-guarded table per remote collection, plus switches to
//! inject read/write failures on demand. Deletes cascade the way the
//! hosted store's foreign keys do.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::gateway::{
    EventStore, GatewayError, GatewayResult, ObjectStore, PollStore, ProfileStore, SessionProvider,
};
use crate::models::event_models::{Event, NewRegistration, Registration};
use crate::models::file_models::StoredObject;
use crate::models::poll_models::{
    NewOption, NewPoll, NewQuestion, OptionRecord, OptionUpdate, PollRecord, PollUpdate,
    QuestionRecord, QuestionUpdate,
};
use crate::models::user_models::{NewProfile, SessionUser, UserProfile, UserRole};
use crate::models::vote_record_models::{NewVote, VoteRecord};

#[derive(Default)]
pub struct MemoryGateway {
    session: RwLock<Option<SessionUser>>,
    accounts: RwLock<HashMap<String, (String, Uuid)>>,
    polls: RwLock<Vec<PollRecord>>,
    questions: RwLock<Vec<QuestionRecord>>,
    options: RwLock<Vec<OptionRecord>>,
    votes: RwLock<Vec<VoteRecord>>,
    events: RwLock<Vec<Event>>,
    registrations: RwLock<Vec<Registration>>,
    profiles: RwLock<Vec<UserProfile>>,
    objects: RwLock<HashMap<String, Vec<(String, Vec<u8>, String)>>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Put a signed-in user in place without going through `sign_in`.
    pub async fn set_session(&self, user: Option<SessionUser>) {
        *self.session.write().await = user;
    }

    pub async fn seed_event(&self, name: &str, date: chrono::DateTime<Utc>) -> Uuid {
        let event = Event { id: Uuid::new_v4(), name: name.to_string(), date, created_at: Utc::now() };
        let id = event.id;
        self.events.write().await.push(event);
        id
    }

    /// Raw vote rows, for asserting on authoritative store state.
    pub async fn vote_rows(&self) -> Vec<VoteRecord> {
        self.votes.read().await.clone()
    }

    pub async fn poll_count(&self) -> usize {
        self.polls.read().await.len()
    }

    pub async fn question_count(&self) -> usize {
        self.questions.read().await.len()
    }

    pub async fn option_rows(&self) -> Vec<OptionRecord> {
        self.options.read().await.clone()
    }

    pub async fn registration_count(&self) -> usize {
        self.registrations.read().await.len()
    }

    fn read_guard(&self) -> GatewayResult<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(GatewayError::Request("injected read failure".to_string()));
        }
        Ok(())
    }

    fn write_guard(&self) -> GatewayResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(GatewayError::Request("injected write failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionProvider for MemoryGateway {
    async fn current_session(&self) -> GatewayResult<Option<SessionUser>> {
        Ok(self.session.read().await.clone())
    }

    async fn sign_in(&self, email: &str, password: &str) -> GatewayResult<SessionUser> {
        let user = {
            let accounts = self.accounts.read().await;
            match accounts.get(email) {
                Some((stored, id)) if stored == password => {
                    SessionUser { id: *id, email: email.to_string() }
                }
                _ => return Err(GatewayError::Request("invalid login credentials".to_string())),
            }
        };
        *self.session.write().await = Some(user.clone());
        Ok(user)
    }

    async fn sign_up(&self, email: &str, password: &str) -> GatewayResult<SessionUser> {
        let user = {
            let mut accounts = self.accounts.write().await;
            if accounts.contains_key(email) {
                return Err(GatewayError::Conflict(format!("account exists: {}", email)));
            }
            let user = SessionUser { id: Uuid::new_v4(), email: email.to_string() };
            accounts.insert(email.to_string(), (password.to_string(), user.id));
            user
        };
        *self.session.write().await = Some(user.clone());
        Ok(user)
    }

    async fn sign_out(&self) -> GatewayResult<()> {
        *self.session.write().await = None;
        Ok(())
    }
}

#[async_trait]
impl PollStore for MemoryGateway {
    async fn list_polls(&self) -> GatewayResult<Vec<PollRecord>> {
        self.read_guard()?;
        let questions = self.questions.read().await;
        let options = self.options.read().await;
        let mut polls: Vec<PollRecord> = self
            .polls
            .read()
            .await
            .iter()
            .map(|poll| {
                let mut poll = poll.clone();
                poll.questions = questions
                    .iter()
                    .filter(|q| q.poll_id == poll.id)
                    .map(|q| {
                        let mut q = q.clone();
                        q.options =
                            options.iter().filter(|o| o.question_id == q.id).cloned().collect();
                        q
                    })
                    .collect();
                poll
            })
            .collect();
        polls.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(polls)
    }

    async fn count_votes(&self, option_id: Uuid) -> GatewayResult<u64> {
        self.read_guard()?;
        Ok(self.votes.read().await.iter().filter(|v| v.option_id == option_id).count() as u64)
    }

    async fn find_vote(
        &self,
        question_id: Uuid,
        user_id: Uuid,
    ) -> GatewayResult<Option<VoteRecord>> {
        self.read_guard()?;
        Ok(self
            .votes
            .read()
            .await
            .iter()
            .find(|v| v.question_id == question_id && v.user_id == user_id)
            .cloned())
    }

    async fn insert_poll(&self, new: &NewPoll) -> GatewayResult<PollRecord> {
        self.write_guard()?;
        let now = Utc::now();
        let record = PollRecord {
            id: Uuid::new_v4(),
            title: new.title.clone(),
            created_by: new.created_by,
            created_at: now,
            updated_at: now,
            questions: Vec::new(),
        };
        self.polls.write().await.push(record.clone());
        Ok(record)
    }

    async fn insert_question(&self, new: &NewQuestion) -> GatewayResult<QuestionRecord> {
        self.write_guard()?;
        let record = QuestionRecord {
            id: Uuid::new_v4(),
            poll_id: new.poll_id,
            question: new.question.clone(),
            description: new.description.clone(),
            uploaded_file_url: new.uploaded_file_url.clone(),
            uploaded_file_name: new.uploaded_file_name.clone(),
            uploaded_file_type: new.uploaded_file_type.clone(),
            extracted_text: new.extracted_text.clone(),
            created_at: Utc::now(),
            options: Vec::new(),
        };
        self.questions.write().await.push(record.clone());
        Ok(record)
    }

    async fn insert_options(&self, rows: &[NewOption]) -> GatewayResult<()> {
        self.write_guard()?;
        let mut options = self.options.write().await;
        for row in rows {
            options.push(OptionRecord {
                id: Uuid::new_v4(),
                question_id: row.question_id,
                option_text: row.option_text.clone(),
                option_order: row.option_order,
            });
        }
        Ok(())
    }

    async fn insert_vote(&self, new: &NewVote) -> GatewayResult<()> {
        self.write_guard()?;
        let mut votes = self.votes.write().await;
        // The hosted store enforces one row per (question, user); the
        // double here does the same so racing first votes collapse.
        if votes.iter().any(|v| v.question_id == new.question_id && v.user_id == new.user_id) {
            return Err(GatewayError::Conflict("vote already exists".to_string()));
        }
        votes.push(VoteRecord {
            id: Uuid::new_v4(),
            question_id: new.question_id,
            option_id: new.option_id,
            user_id: new.user_id,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn update_vote(&self, vote_id: Uuid, option_id: Uuid) -> GatewayResult<()> {
        self.write_guard()?;
        let mut votes = self.votes.write().await;
        match votes.iter_mut().find(|v| v.id == vote_id) {
            Some(vote) => {
                vote.option_id = option_id;
                Ok(())
            }
            None => Err(GatewayError::Request(format!("no vote row {}", vote_id))),
        }
    }

    async fn update_poll(&self, poll_id: Uuid, fields: &PollUpdate) -> GatewayResult<()> {
        self.write_guard()?;
        let mut polls = self.polls.write().await;
        match polls.iter_mut().find(|p| p.id == poll_id) {
            Some(poll) => {
                if let Some(title) = &fields.title {
                    poll.title = title.clone();
                }
                poll.updated_at = Utc::now();
                Ok(())
            }
            None => Err(GatewayError::Request(format!("no poll row {}", poll_id))),
        }
    }

    async fn update_question(
        &self,
        question_id: Uuid,
        fields: &QuestionUpdate,
    ) -> GatewayResult<()> {
        self.write_guard()?;
        let mut questions = self.questions.write().await;
        match questions.iter_mut().find(|q| q.id == question_id) {
            Some(question) => {
                if let Some(text) = &fields.question {
                    question.question = text.clone();
                }
                if let Some(description) = &fields.description {
                    question.description = Some(description.clone());
                }
                Ok(())
            }
            None => Err(GatewayError::Request(format!("no question row {}", question_id))),
        }
    }

    async fn update_option(&self, option_id: Uuid, fields: &OptionUpdate) -> GatewayResult<()> {
        self.write_guard()?;
        let mut options = self.options.write().await;
        match options.iter_mut().find(|o| o.id == option_id) {
            Some(option) => {
                if let Some(text) = &fields.option_text {
                    option.option_text = text.clone();
                }
                Ok(())
            }
            None => Err(GatewayError::Request(format!("no option row {}", option_id))),
        }
    }

    async fn delete_poll(&self, poll_id: Uuid) -> GatewayResult<()> {
        self.write_guard()?;
        let question_ids: Vec<Uuid> = self
            .questions
            .read()
            .await
            .iter()
            .filter(|q| q.poll_id == poll_id)
            .map(|q| q.id)
            .collect();
        self.polls.write().await.retain(|p| p.id != poll_id);
        self.questions.write().await.retain(|q| q.poll_id != poll_id);
        self.options.write().await.retain(|o| !question_ids.contains(&o.question_id));
        self.votes.write().await.retain(|v| !question_ids.contains(&v.question_id));
        Ok(())
    }

    async fn delete_question(&self, question_id: Uuid) -> GatewayResult<()> {
        self.write_guard()?;
        self.questions.write().await.retain(|q| q.id != question_id);
        self.options.write().await.retain(|o| o.question_id != question_id);
        self.votes.write().await.retain(|v| v.question_id != question_id);
        Ok(())
    }

    async fn delete_option(&self, option_id: Uuid) -> GatewayResult<()> {
        self.write_guard()?;
        self.options.write().await.retain(|o| o.id != option_id);
        self.votes.write().await.retain(|v| v.option_id != option_id);
        Ok(())
    }
}

#[async_trait]
impl EventStore for MemoryGateway {
    async fn list_events(&self) -> GatewayResult<Vec<Event>> {
        self.read_guard()?;
        let mut events = self.events.read().await.clone();
        events.sort_by(|a, b| a.date.cmp(&b.date));
        Ok(events)
    }

    async fn list_registrations(&self, user_id: Uuid) -> GatewayResult<Vec<Registration>> {
        self.read_guard()?;
        let events = self.events.read().await;
        Ok(self
            .registrations
            .read()
            .await
            .iter()
            .filter(|r| r.user_id == user_id)
            .map(|r| {
                let mut r = r.clone();
                r.event = events.iter().find(|e| e.id == r.event_id).cloned();
                r
            })
            .collect())
    }

    async fn insert_registrations(&self, rows: &[NewRegistration]) -> GatewayResult<()> {
        self.write_guard()?;
        let mut registrations = self.registrations.write().await;
        for row in rows {
            registrations.push(Registration {
                id: Uuid::new_v4(),
                user_id: row.user_id,
                event_id: row.event_id,
                created_at: Utc::now(),
                event: None,
            });
        }
        Ok(())
    }

    async fn delete_registration(&self, user_id: Uuid, event_id: Uuid) -> GatewayResult<()> {
        self.write_guard()?;
        self.registrations
            .write()
            .await
            .retain(|r| !(r.user_id == user_id && r.event_id == event_id));
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for MemoryGateway {
    async fn find_profile(&self, email: &str) -> GatewayResult<Option<UserProfile>> {
        self.read_guard()?;
        Ok(self.profiles.read().await.iter().find(|p| p.email == email).cloned())
    }

    async fn insert_profile(&self, new: &NewProfile) -> GatewayResult<UserProfile> {
        self.write_guard()?;
        let mut profiles = self.profiles.write().await;
        if profiles.iter().any(|p| p.email == new.email) {
            return Err(GatewayError::Conflict(format!("profile exists: {}", new.email)));
        }
        let profile = UserProfile {
            id: Uuid::new_v4(),
            email: new.email.clone(),
            role: new.role,
            created_at: Utc::now(),
        };
        profiles.push(profile.clone());
        Ok(profile)
    }

    async fn update_role(&self, profile_id: Uuid, role: UserRole) -> GatewayResult<UserProfile> {
        self.write_guard()?;
        let mut profiles = self.profiles.write().await;
        match profiles.iter_mut().find(|p| p.id == profile_id) {
            Some(profile) => {
                profile.role = role;
                Ok(profile.clone())
            }
            None => Err(GatewayError::Request(format!("no profile row {}", profile_id))),
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryGateway {
    async fn ensure_bucket(&self, bucket: &str) -> GatewayResult<()> {
        self.write_guard()?;
        self.objects.write().await.entry(bucket.to_string()).or_default();
        Ok(())
    }

    async fn upload(
        &self,
        bucket: &str,
        object_name: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> GatewayResult<()> {
        self.write_guard()?;
        let mut objects = self.objects.write().await;
        let entries = objects
            .get_mut(bucket)
            .ok_or_else(|| GatewayError::Request(format!("bucket not found: {}", bucket)))?;
        entries.push((object_name.to_string(), bytes.to_vec(), content_type.to_string()));
        Ok(())
    }

    fn public_url(&self, bucket: &str, object_name: &str) -> String {
        format!("memory://{}/{}", bucket, object_name)
    }

    async fn download(&self, url: &str) -> GatewayResult<Vec<u8>> {
        self.read_guard()?;
        let path = url
            .strip_prefix("memory://")
            .ok_or_else(|| GatewayError::Request(format!("not an object url: {}", url)))?;
        let (bucket, name) = path
            .split_once('/')
            .ok_or_else(|| GatewayError::Request(format!("not an object url: {}", url)))?;
        let objects = self.objects.read().await;
        objects
            .get(bucket)
            .and_then(|entries| entries.iter().find(|(n, _, _)| n == name))
            .map(|(_, bytes, _)| bytes.clone())
            .ok_or_else(|| GatewayError::Request(format!("object not found: {}", url)))
    }

    async fn remove(&self, bucket: &str, object_name: &str) -> GatewayResult<()> {
        self.write_guard()?;
        let mut objects = self.objects.write().await;
        if let Some(entries) = objects.get_mut(bucket) {
            entries.retain(|(n, _, _)| n != object_name);
        }
        Ok(())
    }

    async fn list(&self, bucket: &str) -> GatewayResult<Vec<StoredObject>> {
        self.read_guard()?;
        let objects = self.objects.read().await;
        Ok(objects
            .get(bucket)
            .map(|entries| {
                entries
                    .iter()
                    .map(|(n, bytes, _)| StoredObject {
                        name: n.clone(),
                        size: Some(bytes.len() as u64),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}
