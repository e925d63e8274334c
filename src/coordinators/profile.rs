//! User profile lookup with lazy creation: the profile row is created
//! the first time a signed-in user shows up, with the default role. The
//! role flag is advisory for the UI only; the remote store's access
//! rules are the real authority.

use std::sync::Arc;

use tokio::sync::watch;

use crate::gateway::{GatewayError, ProfileStore};
use crate::models::user_models::{NewProfile, SessionUser, UserProfile, UserRole};
use crate::state::{ProfileSnapshot, SharedState};
use crate::utils::error::{AppError, AppResult};

#[derive(Clone)]
pub struct ProfileCoordinator {
    store: Arc<dyn ProfileStore>,
    state: SharedState<ProfileSnapshot>,
}

impl ProfileCoordinator {
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        Self { store, state: SharedState::new(ProfileSnapshot::default()) }
    }

    pub fn snapshot(&self) -> ProfileSnapshot {
        self.state.get()
    }

    pub fn subscribe(&self) -> watch::Receiver<ProfileSnapshot> {
        self.state.subscribe()
    }

    pub fn is_admin(&self) -> bool {
        matches!(self.state.get().profile, Some(UserProfile { role: UserRole::Admin, .. }))
    }

    /// Find the user's profile row, creating it with the default role
    /// on first sight. Two clients racing on first sight both converge:
    /// the loser's insert conflicts and falls back to a re-read.
    pub async fn load(&self, user: &SessionUser) -> AppResult<UserProfile> {
        self.state.update(|s| s.loading = true);

        let loaded = self.find_or_create(&user.email).await;
        match loaded {
            Ok(profile) => {
                self.state.update(|s| {
                    s.profile = Some(profile.clone());
                    s.loading = false;
                    s.error = None;
                });
                Ok(profile)
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

    async fn find_or_create(&self, email: &str) -> AppResult<UserProfile> {
        if let Some(existing) = self
            .store
            .find_profile(email)
            .await
            .map_err(|e| AppError::Fetch(format!("failed to fetch profile: {}", e)))?
        {
            return Ok(existing);
        }

        let new = NewProfile { email: email.to_string(), role: UserRole::User };
        match self.store.insert_profile(&new).await {
            Ok(profile) => Ok(profile),
            Err(GatewayError::Conflict(_)) => self
                .store
                .find_profile(email)
                .await
                .map_err(|e| AppError::Fetch(format!("failed to fetch profile: {}", e)))?
                .ok_or_else(|| {
                    AppError::Fetch(format!("profile for {} vanished after conflict", email))
                }),
            Err(err) => Err(AppError::Write(format!("failed to create profile: {}", err))),
        }
    }

    /// Persist a role change and republish the profile.
    pub async fn update_role(&self, role: UserRole) -> AppResult<UserProfile> {
        let current = self
            .state
            .get()
            .profile
            .ok_or_else(|| AppError::Validation("no profile loaded".to_string()))?;

        let updated = self
            .store
            .update_role(current.id, role)
            .await
            .map_err(|e| AppError::Write(format!("failed to update role: {}", e)))?;

        self.state.update(|s| {
            s.profile = Some(updated.clone());
            s.error = None;
        });
        Ok(updated)
    }

    /// Clear the loaded profile on sign-out.
    pub fn reset(&self) {
        self.state.update(|s| {
            s.profile = None;
            s.loading = false;
            s.error = None;
        });
    }
}
