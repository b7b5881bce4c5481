use actix_web::web::{Data, Json, Path, ServiceConfig};
use actix_web::HttpResponse;
use std::sync::Arc;

use super::PathOrder;
use crate::identity::Identity;
use crate::market::MarketService;
use crate::orders::{OrderError, StatusChange};
use crate::utils::response;

pub fn register_endpoints(cfg: &mut ServiceConfig) {
    cfg.service(get_order).service(set_order_status);
}

#[actix_web::get("/orders/{order_id}")]
async fn get_order(
    market: Data<Arc<MarketService>>,
    path: Path<PathOrder>,
    id: Identity,
) -> Result<HttpResponse, OrderError> {
    let order = market.orders.get_order(&id.actor, &path.order_id).await?;
    Ok(response::ok(order))
}

#[actix_web::put("/orders/{order_id}/status")]
async fn set_order_status(
    market: Data<Arc<MarketService>>,
    path: Path<PathOrder>,
    body: Json<StatusChange>,
    id: Identity,
) -> Result<HttpResponse, OrderError> {
    let order = market
        .orders
        .set_order_status(&id.actor, &path.order_id, body.status)
        .await?;
    Ok(response::ok(order))
}
