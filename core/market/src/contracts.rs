//! Public contracts: jobs a customer posts for any seller to bid on.

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;

use crate::db::dao::ContractDao;
use crate::db::model::{OfferTerms, PublicContract};
use crate::db::{DbError, DbExecutor};
use crate::error::{ApiError, ErrorKind};
use crate::identity::Actor;

#[derive(Error, Debug)]
pub enum ContractError {
    #[error("Invalid {0}.")]
    Validation(&'static str),
    #[error("Public contract [{0}] not found.")]
    NotFound(String),
    #[error("Public contract [{0}] is not active.")]
    NotActive(String),
    #[error("Only the customer can cancel public contract [{0}].")]
    Permission(String),
    #[error("Contract store error: {0}.")]
    Db(#[from] DbError),
}

impl ApiError for ContractError {
    fn kind(&self) -> ErrorKind {
        match self {
            ContractError::Validation(_) => ErrorKind::ValidationError,
            ContractError::NotFound(_) => ErrorKind::NotFoundError,
            ContractError::NotActive(_) => ErrorKind::StateConflictError,
            ContractError::Permission(_) => ErrorKind::PermissionError,
            ContractError::Db(_) => ErrorKind::InternalError,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ContractDetails {
    #[serde(flatten)]
    pub contract: PublicContract,
    /// Offer sessions opened against the contract.
    pub sessions: Vec<String>,
}

#[derive(Clone)]
pub struct ContractBoard {
    db: DbExecutor,
}

impl ContractBoard {
    pub fn new(db: DbExecutor) -> Self {
        ContractBoard { db }
    }

    pub async fn create_contract(
        &self,
        actor: &Actor,
        terms: OfferTerms,
    ) -> Result<PublicContract, ContractError> {
        if let Some(field) = terms.invalid_field() {
            return Err(ContractError::Validation(field));
        }
        let contract = PublicContract::new(&actor.user_id, terms, Utc::now().naive_utc());
        let contract = self.db.as_dao::<ContractDao>().insert(contract).await?;
        log::info!(
            "User [{}] posted public contract [{}].",
            actor.user_id,
            contract.id
        );
        Ok(contract)
    }

    pub async fn get_contract(&self, contract_id: &str) -> Result<ContractDetails, ContractError> {
        let dao = self.db.as_dao::<ContractDao>();
        let contract = dao
            .get(contract_id)
            .await?
            .ok_or_else(|| ContractError::NotFound(contract_id.to_string()))?;
        let sessions = dao.sessions(contract_id).await?;
        Ok(ContractDetails { contract, sessions })
    }

    /// Negotiations already opened are left alone; new ones are refused.
    pub async fn cancel_contract(
        &self,
        actor: &Actor,
        contract_id: &str,
    ) -> Result<(), ContractError> {
        let dao = self.db.as_dao::<ContractDao>();
        let contract = dao
            .get(contract_id)
            .await?
            .ok_or_else(|| ContractError::NotFound(contract_id.to_string()))?;
        if contract.customer_id != actor.user_id {
            return Err(ContractError::Permission(contract_id.to_string()));
        }
        if !dao.cancel(contract_id).await? {
            return Err(ContractError::NotActive(contract_id.to_string()));
        }
        log::info!(
            "User [{}] cancelled public contract [{}].",
            actor.user_id,
            contract_id
        );
        Ok(())
    }
}
