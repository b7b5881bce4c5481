//! Market REST endpoints.
//!
//! Responsibility of these functions is calling respective functions from
//! within market modules and mapping return values to http responses.
//! No market logic is allowed here.

use actix_web::error::InternalError;
use actix_web::web::{JsonConfig, PathConfig, QueryConfig};
use actix_web::HttpResponse;
use serde::Deserialize;

use crate::error::{ErrorKind, ErrorMessage};

pub(crate) mod contractors;
pub(crate) mod contracts;
mod error;
pub(crate) mod offers;
pub(crate) mod orders;

fn bad_request(err: impl std::fmt::Display) -> actix_web::Error {
    let body = ErrorMessage {
        error: ErrorKind::ValidationError.to_string(),
        message: err.to_string(),
        validation_type: None,
    };
    InternalError::from_response(err.to_string(), HttpResponse::BadRequest().json(body)).into()
}

pub fn path_config() -> PathConfig {
    PathConfig::default().error_handler(|err, _req| bad_request(err))
}

pub fn json_config() -> JsonConfig {
    JsonConfig::default().error_handler(|err, _req| bad_request(err))
}

pub fn query_config() -> QueryConfig {
    QueryConfig::default().error_handler(|err, _req| bad_request(err))
}

#[derive(Deserialize)]
pub struct PathSession {
    pub session_id: String,
}

#[derive(Deserialize)]
pub struct PathOrder {
    pub order_id: String,
}

#[derive(Deserialize)]
pub struct PathContract {
    pub contract_id: String,
}

#[derive(Deserialize)]
pub struct PathMember {
    pub contractor_id: String,
    pub user_id: String,
}

#[derive(Deserialize)]
pub struct PathMemberRole {
    pub contractor_id: String,
    pub user_id: String,
    pub role_id: String,
}
