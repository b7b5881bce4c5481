use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};

use crate::contractors::ContractorError;
use crate::contracts::ContractError;
use crate::error::{ApiError, ErrorKind, ErrorMessage};
use crate::identity::IdentityError;
use crate::negotiation::OfferError;
use crate::orders::OrderError;

fn respond<E: ApiError>(e: &E) -> HttpResponse {
    let kind = e.kind();
    if kind == ErrorKind::InternalError {
        log::error!("Market request failed: {}", e);
    } else {
        log::debug!("Market request rejected: {}", e);
    }
    HttpResponse::build(kind.status()).json(ErrorMessage::from_error(e))
}

macro_rules! api_response_error {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ResponseError for $ty {
                fn status_code(&self) -> StatusCode {
                    self.kind().status()
                }

                fn error_response(&self) -> HttpResponse {
                    respond(self)
                }
            }
        )*
    };
}

api_response_error!(
    OfferError,
    OrderError,
    ContractorError,
    ContractError,
    IdentityError
);

impl ApiError for IdentityError {
    fn kind(&self) -> ErrorKind {
        match self {
            IdentityError::Missing | IdentityError::Unknown(_) => ErrorKind::Unauthorized,
            IdentityError::Banned(_) => ErrorKind::PermissionError,
            IdentityError::NotConfigured | IdentityError::Db(_) => ErrorKind::InternalError,
        }
    }
}
