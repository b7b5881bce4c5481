use chrono::NaiveDateTime;
use diesel::sql_types::Text;
use std::collections::HashSet;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use scm_persistence::types::BigDecimalField;

use crate::db::schema::{offer_market_listings, offer_sessions, order_offers};

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
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
pub enum SessionStatus {
    Active,
    Accepted,
    Rejected,
    Cancelled,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::Active)
    }
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
pub enum RevisionStatus {
    Pending,
    Accepted,
    Rejected,
    Cancelled,
}

impl RevisionStatus {
    /// Session status a revision with this status leaves behind.
    pub fn session_status(&self) -> SessionStatus {
        match self {
            RevisionStatus::Pending => SessionStatus::Active,
            RevisionStatus::Accepted => SessionStatus::Accepted,
            RevisionStatus::Rejected => SessionStatus::Rejected,
            RevisionStatus::Cancelled => SessionStatus::Cancelled,
        }
    }
}

/// Negotiating party a revision was submitted by.
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
pub enum Side {
    Customer,
    Seller,
}

impl Side {
    pub fn opposite(&self) -> Side {
        match self {
            Side::Customer => Side::Seller,
            Side::Seller => Side::Customer,
        }
    }
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
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum PaymentType {
    OneTime,
    Hourly,
    Daily,
}

text_enum_sql!(SessionStatus, RevisionStatus, Side, PaymentType);

/// Counterparty selling in a negotiation. Exactly one of them is set on a session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SellerRef {
    Assigned(String),
    Contractor(String),
}

impl SellerRef {
    /// `None` when both or neither of the fields are set.
    pub fn from_fields(assigned_id: Option<String>, contractor_id: Option<String>) -> Option<Self> {
        match (assigned_id, contractor_id) {
            (Some(assigned), None) => Some(SellerRef::Assigned(assigned)),
            (None, Some(contractor)) => Some(SellerRef::Contractor(contractor)),
            _ => None,
        }
    }

    pub fn assigned_id(&self) -> Option<String> {
        match self {
            SellerRef::Assigned(id) => Some(id.clone()),
            SellerRef::Contractor(_) => None,
        }
    }

    pub fn contractor_id(&self) -> Option<String> {
        match self {
            SellerRef::Contractor(id) => Some(id.clone()),
            SellerRef::Assigned(_) => None,
        }
    }
}

#[derive(Clone, Debug, Queryable, Insertable, Identifiable, Serialize)]
#[table_name = "offer_sessions"]
pub struct OfferSession {
    pub id: String,
    pub customer_id: String,
    pub assigned_id: Option<String>,
    pub contractor_id: Option<String>,
    pub status: SessionStatus,
    pub current_offer_id: Option<String>,
    pub merged_into: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl OfferSession {
    pub fn new(customer_id: String, seller: &SellerRef, created_at: NaiveDateTime) -> Self {
        OfferSession {
            id: super::new_id(),
            customer_id,
            assigned_id: seller.assigned_id(),
            contractor_id: seller.contractor_id(),
            status: SessionStatus::Active,
            current_offer_id: None,
            merged_into: None,
            created_at,
            updated_at: created_at,
        }
    }

    pub fn seller(&self) -> Option<SellerRef> {
        SellerRef::from_fields(self.assigned_id.clone(), self.contractor_id.clone())
    }
}

/// One immutable proposal in a session. Amendments are appended as new revisions.
#[derive(Clone, Debug, Queryable, Insertable, Identifiable, Serialize)]
#[table_name = "order_offers"]
pub struct OfferRevision {
    pub id: String,
    pub session_id: String,
    /// Position within the session, starting at 1.
    pub seq: i32,
    /// `None` when the revision was issued by the market itself on behalf of a contractor.
    pub actor_id: Option<String>,
    pub actor_side: Side,
    pub title: String,
    pub description: String,
    pub kind: String,
    pub cost: BigDecimalField,
    pub collateral: BigDecimalField,
    pub payment_type: PaymentType,
    pub departure: Option<String>,
    pub destination: Option<String>,
    pub service_id: Option<String>,
    pub status: RevisionStatus,
    pub timestamp: NaiveDateTime,
}

impl OfferRevision {
    pub fn terms(&self, market_listings: Vec<ListingQuantity>) -> OfferTerms {
        OfferTerms {
            title: self.title.clone(),
            description: self.description.clone(),
            kind: self.kind.clone(),
            cost: self.cost.clone(),
            collateral: self.collateral.clone(),
            payment_type: self.payment_type,
            departure: self.departure.clone(),
            destination: self.destination.clone(),
            service_id: self.service_id.clone(),
            market_listings,
        }
    }
}

#[derive(Clone, Debug, Queryable, Insertable, Serialize)]
#[table_name = "offer_market_listings"]
pub struct OfferListing {
    pub offer_id: String,
    pub listing_id: String,
    pub quantity: i32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingQuantity {
    pub listing_id: String,
    pub quantity: i32,
}

/// Commercial terms proposed by one revision.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OfferTerms {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub kind: String,
    pub cost: BigDecimalField,
    #[serde(default)]
    pub collateral: BigDecimalField,
    pub payment_type: PaymentType,
    #[serde(default)]
    pub departure: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub service_id: Option<String>,
    #[serde(default)]
    pub market_listings: Vec<ListingQuantity>,
}

impl OfferTerms {
    /// Returns the name of the first invalid field.
    pub fn invalid_field(&self) -> Option<&'static str> {
        if self.title.trim().is_empty() {
            return Some("title");
        }
        if self.kind.trim().is_empty() {
            return Some("kind");
        }
        if self.cost.is_negative() {
            return Some("cost");
        }
        if self.collateral.is_negative() {
            return Some("collateral");
        }
        let mut seen = HashSet::new();
        if self.market_listings.iter().any(|line| {
            line.quantity <= 0 || line.listing_id.is_empty() || !seen.insert(&line.listing_id)
        }) {
            return Some("market_listings");
        }
        None
    }

    pub fn into_revision(
        self,
        session_id: &str,
        seq: i32,
        actor_id: Option<&str>,
        actor_side: Side,
        status: RevisionStatus,
        timestamp: NaiveDateTime,
    ) -> (OfferRevision, Vec<OfferListing>) {
        let offer_id = super::new_id();
        let listings = self
            .market_listings
            .into_iter()
            .map(|line| OfferListing {
                offer_id: offer_id.clone(),
                listing_id: line.listing_id,
                quantity: line.quantity,
            })
            .collect();
        let revision = OfferRevision {
            id: offer_id,
            session_id: session_id.to_string(),
            seq,
            actor_id: actor_id.map(str::to_string),
            actor_side,
            title: self.title,
            description: self.description,
            kind: self.kind,
            cost: self.cost,
            collateral: self.collateral,
            payment_type: self.payment_type,
            departure: self.departure,
            destination: self.destination,
            service_id: self.service_id,
            status,
            timestamp,
        };
        (revision, listings)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct RevisionView {
    #[serde(flatten)]
    pub revision: OfferRevision,
    pub market_listings: Vec<ListingQuantity>,
}
