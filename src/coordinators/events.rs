//! Event registration flow: the list of events, the signed-in user's
//! registrations, diff-based saving of a new selection, and optimistic
//! cancellation.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::warn;
use uuid::Uuid;

use crate::coordinators::Reconciliation;
use crate::gateway::{EventStore, SessionProvider};
use crate::models::event_models::NewRegistration;
use crate::state::{EventsSnapshot, SharedState};
use crate::utils::error::{AppError, AppResult};

#[derive(Clone)]
pub struct EventCoordinator {
    store: Arc<dyn EventStore>,
    session: Arc<dyn SessionProvider>,
    state: SharedState<EventsSnapshot>,
}

impl EventCoordinator {
    pub fn new(store: Arc<dyn EventStore>, session: Arc<dyn SessionProvider>) -> Self {
        Self { store, session, state: SharedState::new(EventsSnapshot::default()) }
    }

    pub fn snapshot(&self) -> EventsSnapshot {
        self.state.get()
    }

    pub fn subscribe(&self) -> watch::Receiver<EventsSnapshot> {
        self.state.subscribe()
    }

    pub fn is_registered(&self, event_id: Uuid) -> bool {
        self.state.get().registrations.iter().any(|r| r.event_id == event_id)
    }

    /// Events plus the user's registrations in one pass. Anonymous
    /// visitors still get the event list, just no registrations.
    pub async fn fetch_all(&self) -> AppResult<()> {
        self.state.update(|s| s.loading = true);

        let events = match self.store.list_events().await {
            Ok(events) => events,
            Err(err) => {
                let message = format!("failed to fetch events: {}", err);
                self.state.update(|s| {
                    s.loading = false;
                    s.error = Some(message.clone());
                });
                return Err(AppError::Fetch(message));
            }
        };

        let registrations = match self.session.current_session().await {
            Ok(Some(user)) => self
                .store
                .list_registrations(user.id)
                .await
                .map_err(|e| AppError::Fetch(format!("failed to fetch registrations: {}", e)))?,
            Ok(None) => Vec::new(),
            Err(err) => {
                warn!(error = %err, "session lookup failed during event refresh");
                Vec::new()
            }
        };

        self.state.update(|s| {
            s.events = events;
            s.registrations = registrations;
            s.loading = false;
            s.error = None;
        });
        Ok(())
    }

    /// Converge the user's registrations to `selected`: insert what is
    /// newly selected, delete what was dropped, then re-read the
    /// authoritative rows. Surfaces `Write` on failure.
    pub async fn save_selection(&self, selected: &[Uuid]) -> AppResult<()> {
        let user = self
            .session
            .current_session()
            .await
            .map_err(|e| AppError::AuthRequired(format!("session lookup failed: {}", e)))?
            .ok_or_else(|| {
                AppError::AuthRequired("user not signed in - please log in again".to_string())
            })?;

        let selected: HashSet<Uuid> = selected.iter().copied().collect();
        let current: HashSet<Uuid> =
            self.state.get().registrations.iter().map(|r| r.event_id).collect();

        let to_add: Vec<NewRegistration> = selected
            .difference(&current)
            .map(|event_id| NewRegistration { user_id: user.id, event_id: *event_id })
            .collect();
        let to_remove: Vec<Uuid> = current.difference(&selected).copied().collect();

        if !to_add.is_empty() {
            self.store
                .insert_registrations(&to_add)
                .await
                .map_err(|e| AppError::Write(format!("failed to save registrations: {}", e)))?;
        }
        for event_id in to_remove {
            self.store
                .delete_registration(user.id, event_id)
                .await
                .map_err(|e| AppError::Write(format!("failed to remove registration: {}", e)))?;
        }

        self.refresh_registrations(user.id).await
    }

    /// Optimistically drop one registration, then delete remotely. A
    /// failed delete is logged and the following re-read restores the
    /// authoritative rows.
    pub async fn cancel_registration(&self, event_id: Uuid) -> AppResult<Reconciliation> {
        let user = self
            .session
            .current_session()
            .await
            .map_err(|e| AppError::AuthRequired(format!("session lookup failed: {}", e)))?
            .ok_or_else(|| {
                AppError::AuthRequired("user not signed in - please log in again".to_string())
            })?;

        self.state.update(|s| s.registrations.retain(|r| r.event_id != event_id));

        let this = self.clone();
        let handle = tokio::spawn(async move {
            if let Err(err) = this.store.delete_registration(user.id, event_id).await {
                warn!(error = %err, %event_id, "registration delete failed");
            }
            if let Err(err) = this.refresh_registrations(user.id).await {
                warn!(error = %err, "reconciling registration refetch failed");
            }
        });
        Ok(Reconciliation::spawned(handle))
    }

    async fn refresh_registrations(&self, user_id: Uuid) -> AppResult<()> {
        let registrations = self
            .store
            .list_registrations(user_id)
            .await
            .map_err(|e| AppError::Fetch(format!("failed to fetch registrations: {}", e)))?;
        self.state.update(|s| {
            s.registrations = registrations;
            s.error = None;
        });
        Ok(())
    }
}
