pub mod events;
pub mod polls;
pub mod profile;
pub mod storage;

use tokio::task::JoinHandle;

/// Handle for the background stage of an optimistic operation: the
/// remote write plus the silent refetch that replaces the optimistic
/// projection with server truth. Dropping it does not cancel the stage;
/// awaiting `settled` is how tests (and callers that care) wait for the
/// projection to converge.
pub struct Reconciliation {
    handle: JoinHandle<()>,
}

impl Reconciliation {
    fn spawned(handle: JoinHandle<()>) -> Self {
        Self { handle }
    }

    pub async fn settled(self) {
        // The task only logs on failure; a join error here means it
        // panicked, which there is no repairing from this side.
        let _ = self.handle.await;
    }
}
