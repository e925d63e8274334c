//! The poll voting and aggregation coordinator: fetches the nested
//! poll/question/option graph, folds in vote counts and the current
//! user's votes, and keeps the one-vote-per-question invariant through
//! update-existing-else-insert writes. Votes and deletes mutate the
//! projection optimistically and reconcile against server truth in the
//! background; edits take the slow road through a full refetch.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::warn;
use uuid::Uuid;

use crate::coordinators::Reconciliation;
use crate::gateway::{PollStore, SessionProvider};
use crate::models::poll_models::{
    NewOption, NewPoll, NewQuestion, OptionUpdate, Poll, PollOption, PollQuestion, PollUpdate,
    QuestionDraft, QuestionUpdate,
};
use crate::models::vote_record_models::NewVote;
use crate::state::{PollsSnapshot, SharedState};
use crate::utils::error::{AppError, AppResult};

#[derive(Clone)]
pub struct PollCoordinator {
    store: Arc<dyn PollStore>,
    session: Arc<dyn SessionProvider>,
    state: SharedState<PollsSnapshot>,
}

impl PollCoordinator {
    pub fn new(store: Arc<dyn PollStore>, session: Arc<dyn SessionProvider>) -> Self {
        Self { store, session, state: SharedState::new(PollsSnapshot::default()) }
    }

    /// Current projection value. Each mutation publishes a complete new
    /// snapshot, so this is always internally consistent.
    pub fn snapshot(&self) -> PollsSnapshot {
        self.state.get()
    }

    pub fn subscribe(&self) -> watch::Receiver<PollsSnapshot> {
        self.state.subscribe()
    }

    /// Full refresh of the projection. All-or-nothing: any read failure
    /// leaves the previous polls in place and surfaces as `Fetch`.
    /// `show_loading` only drives the UI loading flag; background
    /// refreshes pass false so the swap does not flash a spinner.
    pub async fn fetch_all(&self, show_loading: bool) -> AppResult<Vec<Poll>> {
        if show_loading {
            self.state.update(|s| s.loading = true);
        }
        match self.load_projection().await {
            Ok(polls) => {
                self.state.update(|s| {
                    s.polls = polls.clone();
                    s.loading = false;
                    s.error = None;
                });
                Ok(polls)
            }
            Err(err) => {
                let message = err.to_string();
                self.state.update(|s| {
                    s.loading = false;
                    s.error = Some(message);
                });
                Err(err)
            }
        }
    }

    async fn load_projection(&self) -> AppResult<Vec<Poll>> {
        let records = self
            .store
            .list_polls()
            .await
            .map_err(|e| AppError::Fetch(format!("failed to fetch polls: {}", e)))?;

        // Vote-state lookups are best-effort for anonymous visitors; a
        // broken session accessor degrades to "not voted".
        let viewer = match self.session.current_session().await {
            Ok(user) => user,
            Err(err) => {
                warn!(error = %err, "session lookup failed during refresh");
                None
            }
        };

        let mut polls = Vec::with_capacity(records.len());
        for record in records {
            let mut questions = Vec::with_capacity(record.questions.len());
            for question in record.questions {
                let mut options = Vec::with_capacity(question.options.len());
                for option in &question.options {
                    let votes = self
                        .store
                        .count_votes(option.id)
                        .await
                        .map_err(|e| AppError::Fetch(format!("failed to count votes: {}", e)))?;
                    options.push(PollOption {
                        id: option.id,
                        question_id: option.question_id,
                        option_text: option.option_text.clone(),
                        option_order: option.option_order,
                        votes,
                    });
                }
                options.sort_by_key(|o| o.option_order);

                let user_vote = match &viewer {
                    Some(user) => match self.store.find_vote(question.id, user.id).await {
                        Ok(vote) => vote,
                        Err(err) => {
                            warn!(error = %err, question_id = %question.id, "user vote lookup failed");
                            None
                        }
                    },
                    None => None,
                };

                questions.push(PollQuestion {
                    id: question.id,
                    poll_id: question.poll_id,
                    question: question.question,
                    description: question.description,
                    uploaded_file_url: question.uploaded_file_url,
                    uploaded_file_name: question.uploaded_file_name,
                    uploaded_file_type: question.uploaded_file_type,
                    extracted_text: question.extracted_text,
                    created_at: question.created_at,
                    user_voted: user_vote.is_some(),
                    user_vote_option_id: user_vote.map(|v| v.option_id),
                    options,
                });
            }
            polls.push(Poll {
                id: record.id,
                title: record.title,
                created_by: record.created_by,
                created_at: record.created_at,
                updated_at: record.updated_at,
                questions,
            });
        }
        Ok(polls)
    }

    /// Cast or move the caller's vote on a question. The projection is
    /// updated before this returns; the remote write and the silent
    /// refetch run behind the returned handle. Only a missing session
    /// surfaces as an error; remote failures are logged and repaired by
    /// the refetch.
    pub async fn vote(&self, question_id: Uuid, option_id: Uuid) -> AppResult<Reconciliation> {
        let user = self
            .session
            .current_session()
            .await
            .map_err(|e| AppError::AuthRequired(format!("session lookup failed: {}", e)))?
            .ok_or_else(|| {
                AppError::AuthRequired("user not signed in - please log in again".to_string())
            })?;

        self.state.update(|s| apply_optimistic_vote(&mut s.polls, question_id, option_id));

        let this = self.clone();
        let handle = tokio::spawn(async move {
            let existing = match this.store.find_vote(question_id, user.id).await {
                Ok(vote) => vote,
                Err(err) => {
                    warn!(error = %err, %question_id, "existing vote check failed");
                    None
                }
            };
            let write = match existing {
                Some(vote) => this.store.update_vote(vote.id, option_id).await,
                None => {
                    this.store
                        .insert_vote(&NewVote { question_id, option_id, user_id: user.id })
                        .await
                }
            };
            if let Err(err) = write {
                warn!(error = %err, %question_id, %option_id, "vote write failed");
            }
            // Server truth replaces the optimistic counts either way.
            if let Err(err) = this.fetch_all(false).await {
                warn!(error = %err, "reconciling refetch failed");
            }
        });
        Ok(Reconciliation::spawned(handle))
    }

    /// Create a poll with its questions and their options, in input
    /// order. Sequential writes, no rollback: the first failure aborts
    /// the rest and surfaces as `Creation` naming the step.
    pub async fn create_poll(&self, title: &str, questions: Vec<QuestionDraft>) -> AppResult<()> {
        let user = self
            .session
            .current_session()
            .await
            .map_err(|e| AppError::AuthRequired(format!("session lookup failed: {}", e)))?
            .ok_or_else(|| {
                AppError::AuthRequired("user not signed in - please log in again".to_string())
            })?;

        let poll = self
            .store
            .insert_poll(&NewPoll { title: title.to_string(), created_by: user.id })
            .await
            .map_err(|e| AppError::Creation(format!("failed to create poll: {}", e)))?;

        for draft in questions {
            let QuestionDraft {
                question,
                description,
                uploaded_file_url,
                uploaded_file_name,
                uploaded_file_type,
                extracted_text,
                options,
            } = draft;

            let created = self
                .store
                .insert_question(&NewQuestion {
                    poll_id: poll.id,
                    question,
                    description,
                    uploaded_file_url,
                    uploaded_file_name,
                    uploaded_file_type,
                    extracted_text,
                })
                .await
                .map_err(|e| AppError::Creation(format!("failed to create question: {}", e)))?;

            let rows: Vec<NewOption> = options
                .into_iter()
                .enumerate()
                .map(|(index, option_text)| NewOption {
                    question_id: created.id,
                    option_text,
                    option_order: index as i32,
                })
                .collect();
            self.store
                .insert_options(&rows)
                .await
                .map_err(|e| AppError::Creation(format!("failed to create options: {}", e)))?;
        }

        self.fetch_all(true).await?;
        Ok(())
    }

    /// Optimistically drop the poll from the projection, then delete
    /// remotely and resync behind the returned handle.
    pub fn delete_poll(&self, poll_id: Uuid) -> Reconciliation {
        self.state.update(|s| s.polls.retain(|p| p.id != poll_id));
        let this = self.clone();
        Reconciliation::spawned(tokio::spawn(async move {
            if let Err(err) = this.store.delete_poll(poll_id).await {
                warn!(error = %err, %poll_id, "poll delete failed");
            }
            if let Err(err) = this.fetch_all(false).await {
                warn!(error = %err, "reconciling refetch failed");
            }
        }))
    }

    pub fn delete_question(&self, question_id: Uuid) -> Reconciliation {
        self.state.update(|s| {
            for poll in &mut s.polls {
                poll.questions.retain(|q| q.id != question_id);
            }
        });
        let this = self.clone();
        Reconciliation::spawned(tokio::spawn(async move {
            if let Err(err) = this.store.delete_question(question_id).await {
                warn!(error = %err, %question_id, "question delete failed");
            }
            if let Err(err) = this.fetch_all(false).await {
                warn!(error = %err, "reconciling refetch failed");
            }
        }))
    }

    pub fn delete_option(&self, option_id: Uuid) -> Reconciliation {
        self.state.update(|s| {
            for poll in &mut s.polls {
                for question in &mut poll.questions {
                    question.options.retain(|o| o.id != option_id);
                }
            }
        });
        let this = self.clone();
        Reconciliation::spawned(tokio::spawn(async move {
            if let Err(err) = this.store.delete_option(option_id).await {
                warn!(error = %err, %option_id, "option delete failed");
            }
            if let Err(err) = this.fetch_all(false).await {
                warn!(error = %err, "reconciling refetch failed");
            }
        }))
    }

    /// Edits are rare enough to take the round trip: remote update,
    /// surfaced failure, then a full visible refetch.
    pub async fn update_poll(&self, poll_id: Uuid, title: &str) -> AppResult<()> {
        self.store
            .update_poll(poll_id, &PollUpdate { title: Some(title.to_string()) })
            .await
            .map_err(|e| AppError::Write(format!("failed to update poll: {}", e)))?;
        self.fetch_all(true).await?;
        Ok(())
    }

    pub async fn update_question(
        &self,
        question_id: Uuid,
        fields: QuestionUpdate,
    ) -> AppResult<()> {
        self.store
            .update_question(question_id, &fields)
            .await
            .map_err(|e| AppError::Write(format!("failed to update question: {}", e)))?;
        self.fetch_all(true).await?;
        Ok(())
    }

    pub async fn update_option(&self, option_id: Uuid, fields: OptionUpdate) -> AppResult<()> {
        self.store
            .update_option(option_id, &fields)
            .await
            .map_err(|e| AppError::Write(format!("failed to update option: {}", e)))?;
        self.fetch_all(true).await?;
        Ok(())
    }
}

/// The synchronous optimistic stage of `vote`. First vote: +1 on the
/// chosen option. Moving a vote: -1 on the previous option, +1 on the
/// new one. Re-selecting the current option: no count change. The
/// previous option is whatever the projection believes it is; a stale
/// projection can misplace the decrement until the next refetch repairs
/// the counts.
fn apply_optimistic_vote(polls: &mut [Poll], question_id: Uuid, option_id: Uuid) {
    for poll in polls {
        for question in &mut poll.questions {
            if question.id != question_id {
                continue;
            }
            let already_voted = question.user_voted;
            let previous = question.user_vote_option_id;
            for option in &mut question.options {
                if option.id == option_id {
                    if !already_voted || previous != Some(option.id) {
                        option.votes += 1;
                    }
                } else if already_voted && previous == Some(option.id) {
                    option.votes = option.votes.saturating_sub(1);
                }
            }
            question.user_voted = true;
            question.user_vote_option_id = Some(option_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn poll_with_counts(question_id: Uuid, counts: &[(Uuid, u64)]) -> Vec<Poll> {
        let now = Utc::now();
        let options = counts
            .iter()
            .enumerate()
            .map(|(index, (id, votes))| PollOption {
                id: *id,
                question_id,
                option_text: format!("option {}", index),
                option_order: index as i32,
                votes: *votes,
            })
            .collect();
        vec![Poll {
            id: Uuid::new_v4(),
            title: "test".to_string(),
            created_by: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            questions: vec![PollQuestion {
                id: question_id,
                poll_id: Uuid::new_v4(),
                question: "?".to_string(),
                description: None,
                uploaded_file_url: None,
                uploaded_file_name: None,
                uploaded_file_type: None,
                extracted_text: None,
                created_at: now,
                options,
                user_voted: false,
                user_vote_option_id: None,
            }],
        }]
    }

    #[test]
    fn first_vote_increments_only_target() {
        let question_id = Uuid::new_v4();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut polls = poll_with_counts(question_id, &[(a, 3), (b, 1)]);

        apply_optimistic_vote(&mut polls, question_id, a);

        let question = &polls[0].questions[0];
        assert_eq!(question.options[0].votes, 4);
        assert_eq!(question.options[1].votes, 1);
        assert!(question.user_voted);
        assert_eq!(question.user_vote_option_id, Some(a));
    }

    #[test]
    fn moving_vote_is_a_net_move() {
        let question_id = Uuid::new_v4();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut polls = poll_with_counts(question_id, &[(a, 1), (b, 0)]);
        polls[0].questions[0].user_voted = true;
        polls[0].questions[0].user_vote_option_id = Some(a);

        apply_optimistic_vote(&mut polls, question_id, b);

        let question = &polls[0].questions[0];
        assert_eq!(question.options[0].votes, 0);
        assert_eq!(question.options[1].votes, 1);
        assert_eq!(question.user_vote_option_id, Some(b));
    }

    #[test]
    fn reselecting_same_option_changes_nothing() {
        let question_id = Uuid::new_v4();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut polls = poll_with_counts(question_id, &[(a, 2), (b, 5)]);
        polls[0].questions[0].user_voted = true;
        polls[0].questions[0].user_vote_option_id = Some(b);

        apply_optimistic_vote(&mut polls, question_id, b);

        let question = &polls[0].questions[0];
        assert_eq!(question.options[0].votes, 2);
        assert_eq!(question.options[1].votes, 5);
    }

    #[test]
    fn decrement_floors_at_zero() {
        let question_id = Uuid::new_v4();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut polls = poll_with_counts(question_id, &[(a, 0), (b, 0)]);
        polls[0].questions[0].user_voted = true;
        polls[0].questions[0].user_vote_option_id = Some(a);

        apply_optimistic_vote(&mut polls, question_id, b);

        let question = &polls[0].questions[0];
        assert_eq!(question.options[0].votes, 0);
        assert_eq!(question.options[1].votes, 1);
    }

    #[test]
    fn other_questions_are_untouched() {
        let question_id = Uuid::new_v4();
        let other = Uuid::new_v4();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut polls = poll_with_counts(question_id, &[(a, 1), (b, 1)]);

        apply_optimistic_vote(&mut polls, other, a);

        let question = &polls[0].questions[0];
        assert_eq!(question.options[0].votes, 1);
        assert!(!question.user_voted);
    }
}
