#[macro_use]
extern crate diesel;

pub mod config;
pub mod contractors;
pub mod contracts;
pub mod db;
pub mod error;
pub mod identity;
pub mod market;
pub mod negotiation;
pub mod orders;
pub mod permissions;
pub mod rest_api;
pub mod scheduler;
pub mod testing;
pub mod utils;

pub use market::{MarketService, MARKET_API_PATH};
