use std::env;

use dotenvy::dotenv;

use crate::utils::error::{AppError, AppResult};

const DEFAULT_BUCKET: &str = "uploads";

/// Connection settings for the hosted backend, read from the
/// environment (a `.env` file is honored in development).
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the backend project, e.g. `https://xyz.example.co`.
    pub base_url: String,
    /// Publishable API key sent with every request.
    pub api_key: String,
    /// Storage bucket for question attachments.
    pub storage_bucket: String,
}

impl Config {
    pub fn from_env() -> AppResult<Self> {
        dotenv().ok();

        let base_url = env::var("AGORA_BACKEND_URL")
            .map_err(|_| AppError::Config("AGORA_BACKEND_URL must be set".to_string()))?;
        let api_key = env::var("AGORA_API_KEY")
            .map_err(|_| AppError::Config("AGORA_API_KEY must be set".to_string()))?;
        let storage_bucket =
            env::var("AGORA_STORAGE_BUCKET").unwrap_or_else(|_| DEFAULT_BUCKET.to_string());

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            storage_bucket,
        })
    }
}
