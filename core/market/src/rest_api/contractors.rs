use actix_web::web::{Data, Json, Path, ServiceConfig};
use actix_web::HttpResponse;
use std::sync::Arc;

use super::{PathMember, PathMemberRole};
use crate::contractors::{ContractorError, NewContractor};
use crate::identity::Identity;
use crate::market::MarketService;
use crate::utils::response;

pub fn register_endpoints(cfg: &mut ServiceConfig) {
    cfg.service(create_contractor)
        .service(add_member)
        .service(kick_member)
        .service(assign_role)
        .service(remove_role);
}

#[actix_web::post("/contractors")]
async fn create_contractor(
    market: Data<Arc<MarketService>>,
    body: Json<NewContractor>,
    id: Identity,
) -> Result<HttpResponse, ContractorError> {
    let contractor = market
        .contractors
        .create_contractor(&id.actor, body.into_inner())
        .await?;
    Ok(response::created(contractor))
}

#[actix_web::post("/contractors/{contractor_id}/members/{user_id}")]
async fn add_member(
    market: Data<Arc<MarketService>>,
    path: Path<PathMember>,
    id: Identity,
) -> Result<HttpResponse, ContractorError> {
    market
        .contractors
        .add_member(&id.actor, &path.contractor_id, &path.user_id)
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

#[actix_web::delete("/contractors/{contractor_id}/members/{user_id}")]
async fn kick_member(
    market: Data<Arc<MarketService>>,
    path: Path<PathMember>,
    id: Identity,
) -> Result<HttpResponse, ContractorError> {
    market
        .contractors
        .kick_member(&id.actor, &path.contractor_id, &path.user_id)
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

#[actix_web::post("/contractors/{contractor_id}/members/{user_id}/roles/{role_id}")]
async fn assign_role(
    market: Data<Arc<MarketService>>,
    path: Path<PathMemberRole>,
    id: Identity,
) -> Result<HttpResponse, ContractorError> {
    market
        .contractors
        .assign_role(&id.actor, &path.contractor_id, &path.user_id, &path.role_id)
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

#[actix_web::delete("/contractors/{contractor_id}/members/{user_id}/roles/{role_id}")]
async fn remove_role(
    market: Data<Arc<MarketService>>,
    path: Path<PathMemberRole>,
    id: Identity,
) -> Result<HttpResponse, ContractorError> {
    market
        .contractors
        .remove_role(&id.actor, &path.contractor_id, &path.user_id, &path.role_id)
        .await?;
    Ok(HttpResponse::NoContent().finish())
}
