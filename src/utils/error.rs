use std::fmt;

use crate::gateway::GatewayError;

#[derive(Debug)]
pub enum AppError {
    AuthRequired(String),
    Fetch(String),
    Creation(String),
    Write(String),
    Validation(String),
    Config(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::AuthRequired(msg) => write!(f, "Authentication required: {}", msg),
            AppError::Fetch(msg) => write!(f, "Fetch error: {}", msg),
            AppError::Creation(msg) => write!(f, "Creation error: {}", msg),
            AppError::Write(msg) => write!(f, "Write error: {}", msg),
            AppError::Validation(msg) => write!(f, "Validation error: {}", msg),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

// Transport failures default to the read-path variant; write paths wrap
// explicitly with context instead of relying on this.
impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        AppError::Fetch(err.to_string())
    }
}

impl AppError {
    pub fn is_auth_required(&self) -> bool {
        matches!(self, AppError::AuthRequired(_))
    }
}

pub type AppResult<T> = Result<T, AppError>;
