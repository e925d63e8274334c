//! Event registration: selection diffing, optimistic cancellation, and
//! the anonymous view.

use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use agora::gateway::SessionProvider;
use agora::{EventCoordinator, MemoryGateway};

async fn seeded() -> (Arc<MemoryGateway>, EventCoordinator, Vec<Uuid>) {
    let gateway = Arc::new(MemoryGateway::new());
    let now = Utc::now();
    let mut event_ids = Vec::new();
    for (name, offset) in [("Hack Night", 1), ("Career Fair", 7), ("Demo Day", 30)] {
        event_ids.push(gateway.seed_event(name, now + Duration::days(offset)).await);
    }
    let coordinator = EventCoordinator::new(gateway.clone(), gateway.clone());
    (gateway, coordinator, event_ids)
}

#[tokio::test]
async fn anonymous_visitors_see_events_but_no_registrations() {
    let (_gateway, coordinator, _events) = seeded().await;

    coordinator.fetch_all().await.expect("fetch");

    let snapshot = coordinator.snapshot();
    assert_eq!(snapshot.events.len(), 3);
    assert_eq!(snapshot.events[0].name, "Hack Night", "soonest event first");
    assert!(snapshot.registrations.is_empty());
    assert!(!snapshot.loading);
}

#[tokio::test]
async fn save_selection_converges_to_the_selected_set() {
    let (gateway, coordinator, events) = seeded().await;
    gateway.sign_up("student@example.com", "hunter2").await.unwrap();
    coordinator.fetch_all().await.expect("fetch");

    coordinator.save_selection(&[events[0], events[1]]).await.expect("save");
    assert_eq!(gateway.registration_count().await, 2);

    // Re-selecting drops one and adds another.
    coordinator.save_selection(&[events[1], events[2]]).await.expect("save");
    assert_eq!(gateway.registration_count().await, 2);

    let snapshot = coordinator.snapshot();
    let mut registered: Vec<Uuid> = snapshot.registrations.iter().map(|r| r.event_id).collect();
    registered.sort();
    let mut expected = vec![events[1], events[2]];
    expected.sort();
    assert_eq!(registered, expected);
    assert!(coordinator.is_registered(events[2]));
    assert!(!coordinator.is_registered(events[0]));

    // The joined event row came back with the registration.
    assert!(snapshot.registrations.iter().all(|r| r.event.is_some()));
}

#[tokio::test]
async fn save_selection_requires_a_session() {
    let (_gateway, coordinator, events) = seeded().await;
    coordinator.fetch_all().await.expect("fetch");

    let err = coordinator.save_selection(&[events[0]]).await.err().expect("must fail");
    assert!(err.is_auth_required(), "got {err}");
}

#[tokio::test]
async fn cancel_registration_is_optimistic() {
    let (gateway, coordinator, events) = seeded().await;
    gateway.sign_up("student@example.com", "hunter2").await.unwrap();
    coordinator.fetch_all().await.expect("fetch");
    coordinator.save_selection(&[events[0], events[1]]).await.expect("save");

    let reconciliation = coordinator.cancel_registration(events[0]).await.expect("cancel");

    // Dropped from the projection before the remote delete completes.
    assert!(!coordinator.is_registered(events[0]));
    assert!(coordinator.is_registered(events[1]));

    reconciliation.settled().await;
    assert_eq!(gateway.registration_count().await, 1);
}

#[tokio::test]
async fn failed_cancellation_restores_the_registration() {
    let (gateway, coordinator, events) = seeded().await;
    gateway.sign_up("student@example.com", "hunter2").await.unwrap();
    coordinator.fetch_all().await.expect("fetch");
    coordinator.save_selection(&[events[0]]).await.expect("save");

    gateway.set_fail_writes(true);
    let reconciliation = coordinator.cancel_registration(events[0]).await.expect("cancel");
    assert!(!coordinator.is_registered(events[0]), "optimistic removal still applies");
    reconciliation.settled().await;
    gateway.set_fail_writes(false);

    assert!(coordinator.is_registered(events[0]), "refetch restored the authoritative row");
    assert_eq!(gateway.registration_count().await, 1);
}
