//! Voting flow: the one-vote-per-question invariant, optimistic count
//! math, reconciliation against store truth, and the failure paths that
//! get repaired by refetch instead of surfacing.

use std::sync::Arc;

use uuid::Uuid;

use agora::gateway::SessionProvider;
use agora::models::poll_models::QuestionDraft;
use agora::models::user_models::SessionUser;
use agora::{MemoryGateway, PollCoordinator};

async fn signed_in() -> (Arc<MemoryGateway>, PollCoordinator, SessionUser) {
    let gateway = Arc::new(MemoryGateway::new());
    let user = gateway.sign_up("voter@example.com", "hunter2").await.expect("sign up");
    let coordinator = PollCoordinator::new(gateway.clone(), gateway.clone());
    (gateway, coordinator, user)
}

fn draft(question: &str, options: &[&str]) -> QuestionDraft {
    QuestionDraft {
        question: question.to_string(),
        options: options.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    }
}

/// Option ids for the first question of the first poll, in display order.
fn first_question(coordinator: &PollCoordinator) -> (Uuid, Vec<Uuid>) {
    let snapshot = coordinator.snapshot();
    let question = &snapshot.polls[0].questions[0];
    (question.id, question.options.iter().map(|o| o.id).collect())
}

fn votes_for(coordinator: &PollCoordinator, question_id: Uuid) -> Vec<u64> {
    let snapshot = coordinator.snapshot();
    snapshot
        .polls
        .iter()
        .flat_map(|p| &p.questions)
        .find(|q| q.id == question_id)
        .expect("question in projection")
        .options
        .iter()
        .map(|o| o.votes)
        .collect()
}

#[tokio::test]
async fn repeated_votes_keep_one_row_tracking_last_choice() {
    let (gateway, coordinator, user) = signed_in().await;
    coordinator.create_poll("Lunch", vec![draft("Where to?", &["a", "b", "c"])]).await.unwrap();
    let (question_id, options) = first_question(&coordinator);

    for option_id in [options[0], options[1], options[2], options[1]] {
        coordinator.vote(question_id, option_id).await.unwrap().settled().await;
    }

    let rows = gateway.vote_rows().await;
    assert_eq!(rows.len(), 1, "exactly one vote row per (user, question)");
    assert_eq!(rows[0].user_id, user.id);
    assert_eq!(rows[0].question_id, question_id);
    assert_eq!(rows[0].option_id, options[1]);
    assert_eq!(votes_for(&coordinator, question_id), vec![0, 1, 0]);
}

#[tokio::test]
async fn optimistic_update_is_visible_before_reconciliation() {
    let (_gateway, coordinator, _user) = signed_in().await;
    coordinator.create_poll("Lunch", vec![draft("Where to?", &["a", "b"])]).await.unwrap();
    let (question_id, options) = first_question(&coordinator);
    let version_before = coordinator.snapshot().version;

    let reconciliation = coordinator.vote(question_id, options[0]).await.unwrap();

    // Before settlement: the projection already shows the vote.
    let snapshot = coordinator.snapshot();
    assert!(snapshot.version > version_before);
    assert_eq!(votes_for(&coordinator, question_id), vec![1, 0]);
    let question = &snapshot.polls[0].questions[0];
    assert!(question.user_voted);
    assert_eq!(question.user_vote_option_id, Some(options[0]));

    reconciliation.settled().await;
    assert_eq!(votes_for(&coordinator, question_id), vec![1, 0]);
}

#[tokio::test]
async fn vote_without_session_fails_and_mutates_nothing() {
    let (gateway, coordinator, _user) = signed_in().await;
    coordinator.create_poll("Lunch", vec![draft("Where to?", &["a", "b"])]).await.unwrap();
    let (question_id, options) = first_question(&coordinator);
    gateway.sign_out().await.unwrap();

    let err = coordinator.vote(question_id, options[0]).await.err().expect("must fail");
    assert!(err.is_auth_required(), "got {err}");

    assert_eq!(votes_for(&coordinator, question_id), vec![0, 0]);
    assert!(gateway.vote_rows().await.is_empty());
}

#[tokio::test]
async fn moving_a_vote_is_a_net_move_after_reconciliation() {
    let (gateway, coordinator, _user) = signed_in().await;
    coordinator.create_poll("Lunch", vec![draft("Where to?", &["a", "b"])]).await.unwrap();
    let (question_id, options) = first_question(&coordinator);

    coordinator.vote(question_id, options[0]).await.unwrap().settled().await;
    assert_eq!(votes_for(&coordinator, question_id), vec![1, 0]);

    coordinator.vote(question_id, options[1]).await.unwrap().settled().await;
    assert_eq!(votes_for(&coordinator, question_id), vec![0, 1]);

    let rows = gateway.vote_rows().await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].option_id, options[1]);
}

#[tokio::test]
async fn concurrent_votes_settle_to_one_row() {
    let (gateway, coordinator, _user) = signed_in().await;
    coordinator.create_poll("Lunch", vec![draft("Where to?", &["a", "b"])]).await.unwrap();
    let (question_id, options) = first_question(&coordinator);

    // Rapid double-click: neither reconciliation has run when the
    // second vote starts.
    let first = coordinator.vote(question_id, options[0]).await.unwrap();
    let second = coordinator.vote(question_id, options[1]).await.unwrap();
    tokio::join!(first.settled(), second.settled());

    let rows = gateway.vote_rows().await;
    assert_eq!(rows.len(), 1, "racing first votes must collapse to one row");
    assert!(
        rows[0].option_id == options[0] || rows[0].option_id == options[1],
        "the surviving row points at one of the requested options"
    );
}

#[tokio::test]
async fn failed_vote_write_is_swallowed_and_repaired_by_refetch() {
    let (gateway, coordinator, _user) = signed_in().await;
    coordinator.create_poll("Lunch", vec![draft("Where to?", &["a", "b"])]).await.unwrap();
    let (question_id, options) = first_question(&coordinator);
    coordinator.vote(question_id, options[0]).await.unwrap().settled().await;

    gateway.set_fail_writes(true);
    let reconciliation = coordinator.vote(question_id, options[1]).await.unwrap();
    // Optimistic stage applied even though the write will fail.
    assert_eq!(votes_for(&coordinator, question_id), vec![0, 1]);

    reconciliation.settled().await;
    gateway.set_fail_writes(false);

    // Refetch restored server truth, and the optimistic path never
    // populates the error value.
    assert_eq!(votes_for(&coordinator, question_id), vec![1, 0]);
    let snapshot = coordinator.snapshot();
    assert!(snapshot.error.is_none());
    let rows = gateway.vote_rows().await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].option_id, options[0]);
}

#[tokio::test]
async fn fetch_failure_surfaces_and_keeps_last_known_projection() {
    let (gateway, coordinator, _user) = signed_in().await;
    coordinator.create_poll("Lunch", vec![draft("Where to?", &["a", "b"])]).await.unwrap();

    gateway.set_fail_reads(true);
    let err = coordinator.fetch_all(true).await.err().expect("read failure surfaces");
    assert!(matches!(err, agora::AppError::Fetch(_)), "got {err}");
    gateway.set_fail_reads(false);

    let snapshot = coordinator.snapshot();
    assert!(snapshot.error.is_some());
    assert_eq!(snapshot.polls.len(), 1, "projection keeps last-known-good polls");
    assert!(!snapshot.loading);
}

#[tokio::test]
async fn counts_follow_votes_of_other_users() {
    let (gateway, coordinator, _user) = signed_in().await;
    coordinator.create_poll("Lunch", vec![draft("Where to?", &["a", "b"])]).await.unwrap();
    let (question_id, options) = first_question(&coordinator);
    coordinator.vote(question_id, options[0]).await.unwrap().settled().await;

    // A second account votes for the other option.
    gateway.sign_up("friend@example.com", "hunter2").await.unwrap();
    coordinator.vote(question_id, options[1]).await.unwrap().settled().await;

    assert_eq!(votes_for(&coordinator, question_id), vec![1, 1]);
    assert_eq!(gateway.vote_rows().await.len(), 2);

    // The projection reflects the second user's vote state now.
    let snapshot = coordinator.snapshot();
    let question = &snapshot.polls[0].questions[0];
    assert!(question.user_voted);
    assert_eq!(question.user_vote_option_id, Some(options[1]));
}
