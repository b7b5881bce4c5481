use actix_web::http::StatusCode;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

/// Category every market error falls into. Decides the HTTP status and the
/// `error` field of the error envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum ErrorKind {
    ValidationError,
    Unauthorized,
    PermissionError,
    NotFoundError,
    StateConflictError,
    MismatchError,
    InternalError,
}

impl ErrorKind {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorKind::ValidationError | ErrorKind::MismatchError => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::PermissionError => StatusCode::FORBIDDEN,
            ErrorKind::NotFoundError => StatusCode::NOT_FOUND,
            ErrorKind::StateConflictError => StatusCode::CONFLICT,
            ErrorKind::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub trait ApiError: std::error::Error {
    fn kind(&self) -> ErrorKind;

    /// Machine readable reason of a merge mismatch.
    fn validation_type(&self) -> Option<String> {
        None
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorMessage {
    pub error: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_type: Option<String>,
}

impl ErrorMessage {
    /// Internal failures are reported without their cause.
    pub fn from_error<E: ApiError>(e: &E) -> Self {
        let kind = e.kind();
        let message = match kind {
            ErrorKind::InternalError => "Internal server error.".to_string(),
            _ => e.to_string(),
        };
        ErrorMessage {
            error: kind.to_string(),
            message,
            validation_type: e.validation_type(),
        }
    }
}
