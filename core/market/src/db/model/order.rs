use chrono::NaiveDateTime;
use diesel::sql_types::Text;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use scm_persistence::types::BigDecimalField;

use crate::db::model::{OfferRevision, OfferSession, PaymentType};
use crate::db::schema::{order_market_listings, orders};

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
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum OrderStatus {
    NotStarted,
    InProgress,
    Fulfilled,
    Cancelled,
}

text_enum_sql!(OrderStatus);

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Fulfilled | OrderStatus::Cancelled)
    }

    pub fn can_transition(&self, to: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, to),
            (NotStarted, InProgress)
                | (InProgress, Fulfilled)
                | (NotStarted, Cancelled)
                | (InProgress, Cancelled)
        )
    }
}

/// Binding commitment materialized from an accepted offer revision.
#[derive(Clone, Debug, Queryable, Insertable, Identifiable, Serialize)]
#[table_name = "orders"]
#[primary_key(order_id)]
pub struct Order {
    pub order_id: String,
    pub offer_session_id: String,
    pub offer_id: String,
    pub customer_id: String,
    pub assigned_id: Option<String>,
    pub contractor_id: Option<String>,
    pub title: String,
    pub description: String,
    pub kind: String,
    pub cost: BigDecimalField,
    pub collateral: BigDecimalField,
    pub payment_type: PaymentType,
    pub departure: Option<String>,
    pub destination: Option<String>,
    pub status: OrderStatus,
    pub timestamp: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Order {
    pub fn from_offer(session: &OfferSession, revision: &OfferRevision, now: NaiveDateTime) -> Order {
        Order {
            order_id: super::new_id(),
            offer_session_id: session.id.clone(),
            offer_id: revision.id.clone(),
            customer_id: session.customer_id.clone(),
            assigned_id: session.assigned_id.clone(),
            contractor_id: session.contractor_id.clone(),
            title: revision.title.clone(),
            description: revision.description.clone(),
            kind: revision.kind.clone(),
            cost: revision.cost.clone(),
            collateral: revision.collateral.clone(),
            payment_type: revision.payment_type,
            departure: revision.departure.clone(),
            destination: revision.destination.clone(),
            status: OrderStatus::NotStarted,
            timestamp: now,
            updated_at: now,
        }
    }
}

#[derive(Clone, Debug, Queryable, Insertable, Serialize)]
#[table_name = "order_market_listings"]
pub struct OrderListing {
    pub order_id: String,
    pub listing_id: String,
    pub quantity: i32,
}
