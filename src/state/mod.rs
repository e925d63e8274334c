//! Coordinator-owned observable state. Every mutation clones the
//! current snapshot, applies the change, bumps the version, and
//! publishes the whole value; subscribers always see complete,
//! immutable snapshots and never a half-applied mutation.

use std::sync::Arc;

use tokio::sync::watch;

use crate::models::event_models::{Event, Registration};
use crate::models::file_models::UploadedFile;
use crate::models::poll_models::Poll;
use crate::models::user_models::UserProfile;

pub trait Versioned {
    fn bump(&mut self);
}

/// Single-writer handle around a `watch` channel. Coordinators own one;
/// the presentation layer subscribes.
pub struct SharedState<T> {
    tx: Arc<watch::Sender<T>>,
}

impl<T> Clone for SharedState<T> {
    fn clone(&self) -> Self {
        Self { tx: Arc::clone(&self.tx) }
    }
}

impl<T: Versioned + Clone + Send + Sync + 'static> SharedState<T> {
    pub fn new(initial: T) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }

    pub fn update(&self, apply: impl FnOnce(&mut T)) {
        let mut next = self.tx.borrow().clone();
        apply(&mut next);
        next.bump();
        self.tx.send_replace(next);
    }
}

#[derive(Debug, Clone)]
pub struct PollsSnapshot {
    pub polls: Vec<Poll>,
    pub loading: bool,
    pub error: Option<String>,
    pub version: u64,
}

impl Default for PollsSnapshot {
    fn default() -> Self {
        Self { polls: Vec::new(), loading: true, error: None, version: 0 }
    }
}

impl Versioned for PollsSnapshot {
    fn bump(&mut self) {
        self.version += 1;
    }
}

#[derive(Debug, Clone)]
pub struct EventsSnapshot {
    pub events: Vec<Event>,
    pub registrations: Vec<Registration>,
    pub loading: bool,
    pub error: Option<String>,
    pub version: u64,
}

impl Default for EventsSnapshot {
    fn default() -> Self {
        Self {
            events: Vec::new(),
            registrations: Vec::new(),
            loading: true,
            error: None,
            version: 0,
        }
    }
}

impl Versioned for EventsSnapshot {
    fn bump(&mut self) {
        self.version += 1;
    }
}

#[derive(Debug, Clone, Default)]
pub struct StorageSnapshot {
    /// None until the bucket has been probed.
    pub bucket_ready: Option<bool>,
    pub uploading: bool,
    pub files: Vec<UploadedFile>,
    pub error: Option<String>,
    pub version: u64,
}

impl Versioned for StorageSnapshot {
    fn bump(&mut self) {
        self.version += 1;
    }
}

#[derive(Debug, Clone)]
pub struct ProfileSnapshot {
    pub profile: Option<UserProfile>,
    pub loading: bool,
    pub error: Option<String>,
    pub version: u64,
}

impl Default for ProfileSnapshot {
    fn default() -> Self {
        Self { profile: None, loading: true, error: None, version: 0 }
    }
}

impl Versioned for ProfileSnapshot {
    fn bump(&mut self) {
        self.version += 1;
    }
}
