use chrono::NaiveDateTime;
use diesel::sql_types::Text;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use scm_persistence::types::BigDecimalField;

use crate::db::model::SellerRef;
use crate::db::schema::{market_auction_details, market_bids, market_listings};

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    AsExpression,
    FromSqlRow,
    Display,
    EnumString,
)]
#[sql_type = "Text"]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SaleType {
    Sale,
    Auction,
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    AsExpression,
    FromSqlRow,
    Display,
    EnumString,
)]
#[sql_type = "Text"]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ListingStatus {
    Active,
    Inactive,
    Archived,
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    AsExpression,
    FromSqlRow,
    Display,
    EnumString,
)]
#[sql_type = "Text"]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AuctionStatus {
    Active,
    Concluded,
}

text_enum_sql!(SaleType, ListingStatus, AuctionStatus);

#[derive(Clone, Debug, Queryable, Insertable, Serialize)]
#[table_name = "market_listings"]
pub struct MarketListing {
    pub listing_id: String,
    pub sale_type: SaleType,
    pub title: String,
    pub price: BigDecimalField,
    pub quantity_available: i32,
    pub user_seller_id: Option<String>,
    pub contractor_seller_id: Option<String>,
    pub status: ListingStatus,
    pub expiration: NaiveDateTime,
    pub timestamp: NaiveDateTime,
}

impl MarketListing {
    pub fn seller(&self) -> Option<SellerRef> {
        SellerRef::from_fields(self.user_seller_id.clone(), self.contractor_seller_id.clone())
    }
}

#[derive(Clone, Debug, Queryable, Insertable, Serialize)]
#[table_name = "market_auction_details"]
pub struct AuctionDetails {
    pub listing_id: String,
    pub end_time: NaiveDateTime,
    pub minimum_bid_increment: BigDecimalField,
    pub status: AuctionStatus,
}

#[derive(Clone, Debug, Queryable, Insertable, Serialize)]
#[table_name = "market_bids"]
pub struct Bid {
    pub bid_id: String,
    pub listing_id: String,
    pub user_bidder_id: String,
    pub bid: BigDecimalField,
    pub timestamp: NaiveDateTime,
}

/// Highest bid; among equal amounts the earliest one (by timestamp, then bid id) wins.
pub fn winning_bid(bids: &[Bid]) -> Option<&Bid> {
    bids.iter().fold(None, |best: Option<&Bid>, candidate| match best {
        None => Some(candidate),
        Some(best) => {
            let earlier = (&candidate.timestamp, &candidate.bid_id) < (&best.timestamp, &best.bid_id);
            if candidate.bid > best.bid || (candidate.bid == best.bid && earlier) {
                Some(candidate)
            } else {
                Some(best)
            }
        }
    })
}
