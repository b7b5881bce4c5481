use actix_web::web::{Data, Json, Path, Query, ServiceConfig};
use actix_web::HttpResponse;
use std::sync::Arc;

use super::{PathContract, PathSession};
use crate::identity::Identity;
use crate::market::MarketService;
use crate::negotiation::{
    ContractOfferRequest, MergeRequest, NewOffer, OfferError, RespondRequest, SearchQuery,
};
use crate::utils::response;

pub fn register_endpoints(cfg: &mut ServiceConfig) {
    cfg.service(create_offer)
        .service(search_offers)
        .service(merge_offers)
        .service(get_offer)
        .service(respond_to_offer)
        .service(offer_on_contract);
}

#[actix_web::post("/offers")]
async fn create_offer(
    market: Data<Arc<MarketService>>,
    body: Json<NewOffer>,
    id: Identity,
) -> Result<HttpResponse, OfferError> {
    let session = market.offers.open(&id.actor, body.into_inner()).await?;
    Ok(response::created(session))
}

#[actix_web::get("/offers/search")]
async fn search_offers(
    market: Data<Arc<MarketService>>,
    query: Query<SearchQuery>,
    id: Identity,
) -> Result<HttpResponse, OfferError> {
    let result = market.offers.search(&id.actor, query.into_inner()).await?;
    Ok(response::ok(result))
}

#[actix_web::post("/offers/merge")]
async fn merge_offers(
    market: Data<Arc<MarketService>>,
    body: Json<MergeRequest>,
    id: Identity,
) -> Result<HttpResponse, OfferError> {
    let merged = market
        .offers
        .merge(&id.actor, body.into_inner().session_ids)
        .await?;
    Ok(response::created(merged))
}

#[actix_web::get("/offer/{session_id}")]
async fn get_offer(
    market: Data<Arc<MarketService>>,
    path: Path<PathSession>,
    id: Identity,
) -> Result<HttpResponse, OfferError> {
    let details = market
        .offers
        .get_session(&id.actor, &path.session_id)
        .await?;
    Ok(response::ok(details))
}

#[actix_web::put("/offer/{session_id}")]
async fn respond_to_offer(
    market: Data<Arc<MarketService>>,
    path: Path<PathSession>,
    body: Json<RespondRequest>,
    id: Identity,
) -> Result<HttpResponse, OfferError> {
    let responded = market
        .offers
        .respond(&id.actor, &path.session_id, body.into_inner())
        .await?;
    Ok(response::ok(responded))
}

#[actix_web::post("/contracts/{contract_id}/offers")]
async fn offer_on_contract(
    market: Data<Arc<MarketService>>,
    path: Path<PathContract>,
    body: Json<ContractOfferRequest>,
    id: Identity,
) -> Result<HttpResponse, OfferError> {
    let session = market
        .offers
        .offer_on_contract(&id.actor, &path.contract_id, body.into_inner())
        .await?;
    Ok(response::created(session))
}
