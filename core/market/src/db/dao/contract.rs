use diesel::prelude::*;

use scm_persistence::executor::{do_with_transaction, readonly_transaction, AsDao, PoolType};

use crate::db::model::{ContractStatus, PublicContract};
use crate::db::schema::public_contract_offers::dsl as contract_offer;
use crate::db::schema::public_contracts::dsl as contract;
use crate::db::DbResult;

pub struct ContractDao<'c> {
    pool: &'c PoolType,
}

impl<'c> AsDao<'c> for ContractDao<'c> {
    fn as_dao(pool: &'c PoolType) -> Self {
        Self { pool }
    }
}

impl<'c> ContractDao<'c> {
    pub async fn insert(&self, new: PublicContract) -> DbResult<PublicContract> {
        do_with_transaction(self.pool, move |conn| {
            diesel::insert_into(contract::public_contracts)
                .values(&new)
                .execute(conn)?;
            Ok(new)
        })
        .await
    }

    pub async fn get(&self, contract_id: &str) -> DbResult<Option<PublicContract>> {
        let contract_id = contract_id.to_string();
        readonly_transaction(self.pool, move |conn| {
            Ok(contract::public_contracts
                .filter(contract::id.eq(&contract_id))
                .first(conn)
                .optional()?)
        })
        .await
    }

    /// Returns false when the contract wasn't active anymore.
    pub async fn cancel(&self, contract_id: &str) -> DbResult<bool> {
        let contract_id = contract_id.to_string();
        do_with_transaction(self.pool, move |conn| {
            let updated = diesel::update(
                contract::public_contracts
                    .filter(contract::id.eq(&contract_id))
                    .filter(contract::status.eq(ContractStatus::Active)),
            )
            .set(contract::status.eq(ContractStatus::Cancelled))
            .execute(conn)?;
            Ok(updated > 0)
        })
        .await
    }

    /// Negotiations opened against the contract, including merged ones.
    pub async fn sessions(&self, contract_id: &str) -> DbResult<Vec<String>> {
        let contract_id = contract_id.to_string();
        readonly_transaction(self.pool, move |conn| {
            Ok(contract_offer::public_contract_offers
                .filter(contract_offer::contract_id.eq(&contract_id))
                .select(contract_offer::session_id)
                .order_by(contract_offer::session_id.asc())
                .load(conn)?)
        })
        .await
    }
}
