use actix_web::web::{Data, Json, Path, ServiceConfig};
use actix_web::HttpResponse;
use std::sync::Arc;

use super::PathContract;
use crate::contracts::ContractError;
use crate::db::model::OfferTerms;
use crate::identity::Identity;
use crate::market::MarketService;
use crate::utils::response;

pub fn register_endpoints(cfg: &mut ServiceConfig) {
    cfg.service(create_contract)
        .service(get_contract)
        .service(cancel_contract);
}

#[actix_web::post("/contracts")]
async fn create_contract(
    market: Data<Arc<MarketService>>,
    body: Json<OfferTerms>,
    id: Identity,
) -> Result<HttpResponse, ContractError> {
    let contract = market
        .contracts
        .create_contract(&id.actor, body.into_inner())
        .await?;
    Ok(response::created(contract))
}

#[actix_web::get("/contracts/{contract_id}")]
async fn get_contract(
    market: Data<Arc<MarketService>>,
    path: Path<PathContract>,
    _id: Identity,
) -> Result<HttpResponse, ContractError> {
    let contract = market.contracts.get_contract(&path.contract_id).await?;
    Ok(response::ok(contract))
}

#[actix_web::delete("/contracts/{contract_id}")]
async fn cancel_contract(
    market: Data<Arc<MarketService>>,
    path: Path<PathContract>,
    id: Identity,
) -> Result<HttpResponse, ContractError> {
    market
        .contracts
        .cancel_contract(&id.actor, &path.contract_id)
        .await?;
    Ok(HttpResponse::NoContent().finish())
}
