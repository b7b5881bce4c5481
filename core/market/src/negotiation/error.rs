use serde::Serialize;
use strum_macros::Display;
use thiserror::Error;

use crate::db::dao::AppendError;
use crate::db::DbError;
use crate::error::{ApiError, ErrorKind};

/// Reason two or more sessions can't be merged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum MismatchKind {
    DifferentCustomer,
    DifferentContractor,
    DifferentAssigned,
    DifferentPaymentType,
    HasServices,
}

#[derive(Error, Debug)]
pub enum OfferError {
    #[error("Invalid {field}: {reason}.")]
    Validation { field: &'static str, reason: String },
    #[error("{entity} [{id}] not found.")]
    NotFound { entity: &'static str, id: String },
    #[error("{entity} [{id}] is not active.")]
    NotActive { entity: &'static str, id: String },
    #[error("{0}")]
    Permission(String),
    #[error("Offers can't be merged: {0}.")]
    Mismatch(MismatchKind),
    #[error("Offer session [{0}] was modified concurrently. Retry with fresh state.")]
    Conflict(String),
    #[error("Offer store error: {0}.")]
    Db(#[from] DbError),
}

impl OfferError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        OfferError::Validation {
            field,
            reason: reason.into(),
        }
    }

    pub fn session_not_found(id: &str) -> Self {
        OfferError::NotFound {
            entity: "Offer session",
            id: id.to_string(),
        }
    }

    pub fn session_not_active(id: &str) -> Self {
        OfferError::NotActive {
            entity: "Offer session",
            id: id.to_string(),
        }
    }
}

impl From<AppendError> for OfferError {
    fn from(e: AppendError) -> Self {
        match e {
            AppendError::Conflict(id) => OfferError::Conflict(id),
            AppendError::Db(e) => OfferError::Db(e),
        }
    }
}

impl ApiError for OfferError {
    fn kind(&self) -> ErrorKind {
        match self {
            OfferError::Validation { .. } => ErrorKind::ValidationError,
            OfferError::NotFound { .. } => ErrorKind::NotFoundError,
            OfferError::NotActive { .. } | OfferError::Conflict(_) => {
                ErrorKind::StateConflictError
            }
            OfferError::Permission(_) => ErrorKind::PermissionError,
            OfferError::Mismatch(_) => ErrorKind::MismatchError,
            OfferError::Db(_) => ErrorKind::InternalError,
        }
    }

    fn validation_type(&self) -> Option<String> {
        match self {
            OfferError::Mismatch(kind) => Some(kind.to_string()),
            _ => None,
        }
    }
}
