//! Data layer for the agora event-registration and polling app: typed
//! coordinators over a hosted backend (auth, relational rows, object
//! storage), publishing observable snapshots for a UI to render.

pub mod config;
pub mod coordinators;
pub mod gateway;
pub mod models;
pub mod state;
pub mod utils;

pub use config::Config;
pub use coordinators::events::EventCoordinator;
pub use coordinators::polls::PollCoordinator;
pub use coordinators::profile::ProfileCoordinator;
pub use coordinators::storage::StorageCoordinator;
pub use coordinators::Reconciliation;
pub use gateway::memory::MemoryGateway;
pub use gateway::rest::RestGateway;
pub use utils::error::{AppError, AppResult};
