use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Rejected-input and illegal-state failures raised by the domain types.
/// Smart constructors return these instead of panicking, so an invalid
/// value never exists in the first place.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    #[error("invalid phone number: {0}")]
    InvalidPhone(String),

    #[error("invalid message SID: {0}")]
    InvalidSid(String),

    #[error("message content cannot be empty")]
    EmptyContent,

    #[error("message content cannot exceed {0} characters")]
    ContentTooLong(usize),

    #[error("keywords cannot be empty")]
    NoKeywords,

    #[error("keyword cannot be empty")]
    EmptyKeyword,

    #[error("keyword cannot exceed {0} characters")]
    KeywordTooLong(usize),

    #[error("response template cannot be empty")]
    EmptyTemplate,

    #[error("response template cannot exceed {0} characters")]
    TemplateTooLong(usize),

    #[error("invalid conversation state: {0}")]
    InvalidState(String),

    #[error("invalid day of week: {0}")]
    InvalidDayOfWeek(String),

    #[error("open and close times are required when not closed")]
    MissingHours,

    #[error("open time must be before close time")]
    OpenNotBeforeClose,

    #[error("message already marked as sent")]
    AlreadySent,

    #[error("cannot mark a sent message as failed")]
    SentIsTerminal,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("messaging error: {0}")]
    Messaging(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Domain(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Messaging(_) => StatusCode::BAD_GATEWAY,
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}
