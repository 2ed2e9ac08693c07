/// Domain-specific error types for the pricing service.
/// Invalid pricing inputs are caller bugs and fail fast; missing records
/// are reported as `NotFound`, never as a validation failure.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("config error: {0}")]
    Config(String),
}

impl EngineError {
    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        EngineError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    /// HTTP status the service layer maps this error to.
    pub fn status_code(&self) -> u16 {
        match self {
            EngineError::InvalidParameter { .. } | EngineError::Parse(_) => 400,
            EngineError::NotFound(_) => 404,
            EngineError::Database(_) | EngineError::Config(_) => 500,
        }
    }
}

impl From<rusqlite::Error> for EngineError {
    fn from(e: rusqlite::Error) -> Self {
        EngineError::Database(e.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
