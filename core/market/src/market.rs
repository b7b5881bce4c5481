use actix_web::web::Data;
use std::sync::Arc;
use thiserror::Error;

use crate::config::Config;
use crate::contractors::ContractorAdmin;
use crate::contracts::ContractBoard;
use crate::db::DbExecutor;
use crate::negotiation::{EventNotifier, OfferBroker};
use crate::orders::OrderMaterializer;
use crate::permissions::PermissionEvaluator;
use crate::rest_api;
use crate::scheduler::AuctionScheduler;

pub const MARKET_API_PATH: &str = "/api/market/v1";

#[derive(Error, Debug)]
pub enum MarketInitError {
    #[error("Failed to migrate market database. Error: {0}.")]
    Migration(#[from] anyhow::Error),
    #[error("Failed to initialize config. Error: {0}.")]
    Config(#[from] clap::Error),
}

/// Structure connecting all market objects.
pub struct MarketService {
    pub db: DbExecutor,
    pub notifier: EventNotifier,
    pub permissions: PermissionEvaluator,
    pub offers: OfferBroker,
    pub orders: OrderMaterializer,
    pub contractors: ContractorAdmin,
    pub contracts: ContractBoard,
    pub scheduler: AuctionScheduler,
}

impl MarketService {
    pub fn new(db: &DbExecutor, config: Arc<Config>) -> Result<Self, MarketInitError> {
        crate::db::init(db)?;

        let notifier = EventNotifier::new();
        let permissions = PermissionEvaluator::new(db.clone());
        let offers = OfferBroker::new(
            db.clone(),
            permissions.clone(),
            notifier.clone(),
            config.clone(),
        );
        let orders = OrderMaterializer::new(db.clone(), permissions.clone(), notifier.clone());
        let contractors = ContractorAdmin::new(db.clone(), permissions.clone());
        let contracts = ContractBoard::new(db.clone());
        let scheduler =
            AuctionScheduler::new(db.clone(), notifier.clone(), config.scheduler.clone());

        Ok(MarketService {
            db: db.clone(),
            notifier,
            permissions,
            offers,
            orders,
            contractors,
            contracts,
            scheduler,
        })
    }

    /// Starts background work. Must be called from within a tokio runtime.
    pub fn start(&self) {
        self.scheduler.start();
        log::info!("Market service started");
    }

    pub fn shutdown(&self) {
        self.scheduler.shutdown();
        log::info!("Market service stopped");
    }

    pub fn bind_rest(myself: Arc<MarketService>) -> actix_web::Scope {
        actix_web::web::scope(MARKET_API_PATH)
            .app_data(Data::new(myself.db.clone()))
            .app_data(Data::new(myself))
            .app_data(rest_api::path_config())
            .app_data(rest_api::json_config())
            .app_data(rest_api::query_config())
            .configure(rest_api::offers::register_endpoints)
            .configure(rest_api::orders::register_endpoints)
            .configure(rest_api::contracts::register_endpoints)
            .configure(rest_api::contractors::register_endpoints)
    }
}
