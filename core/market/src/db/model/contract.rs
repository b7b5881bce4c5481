use chrono::NaiveDateTime;
use diesel::sql_types::Text;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use scm_persistence::types::BigDecimalField;

use crate::db::model::{OfferTerms, PaymentType};
use crate::db::schema::{public_contract_offers, public_contracts};

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
pub enum ContractStatus {
    Active,
    Cancelled,
}

text_enum_sql!(ContractStatus);

/// Job posted openly by a customer; any seller may open a negotiation against it.
#[derive(Clone, Debug, Queryable, Insertable, Identifiable, Serialize)]
#[table_name = "public_contracts"]
pub struct PublicContract {
    pub id: String,
    pub customer_id: String,
    pub title: String,
    pub description: String,
    pub kind: String,
    pub cost: BigDecimalField,
    pub collateral: BigDecimalField,
    pub payment_type: PaymentType,
    pub departure: Option<String>,
    pub destination: Option<String>,
    pub status: ContractStatus,
    pub timestamp: NaiveDateTime,
}

impl PublicContract {
    pub fn new(customer_id: &str, terms: OfferTerms, timestamp: NaiveDateTime) -> Self {
        PublicContract {
            id: super::new_id(),
            customer_id: customer_id.to_string(),
            title: terms.title,
            description: terms.description,
            kind: terms.kind,
            cost: terms.cost,
            collateral: terms.collateral,
            payment_type: terms.payment_type,
            departure: terms.departure,
            destination: terms.destination,
            status: ContractStatus::Active,
            timestamp,
        }
    }

    pub fn terms(&self) -> OfferTerms {
        OfferTerms {
            title: self.title.clone(),
            description: self.description.clone(),
            kind: self.kind.clone(),
            cost: self.cost.clone(),
            collateral: self.collateral.clone(),
            payment_type: self.payment_type,
            departure: self.departure.clone(),
            destination: self.destination.clone(),
            service_id: None,
            market_listings: vec![],
        }
    }
}

#[derive(Clone, Debug, Queryable, Insertable, Serialize)]
#[table_name = "public_contract_offers"]
pub struct ContractOffer {
    pub contract_id: String,
    pub session_id: String,
}
