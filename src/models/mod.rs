pub mod event_models;
pub mod file_models;
pub mod poll_models;
pub mod user_models;
pub mod vote_record_models;
