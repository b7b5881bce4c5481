use diesel::prelude::*;

use scm_persistence::executor::{do_with_transaction, readonly_transaction, AsDao, PoolType};

use crate::db::model::Account;
use crate::db::schema::accounts::dsl;
use crate::db::DbResult;

pub struct AccountDao<'c> {
    pool: &'c PoolType,
}

impl<'c> AsDao<'c> for AccountDao<'c> {
    fn as_dao(pool: &'c PoolType) -> Self {
        Self { pool }
    }
}

impl<'c> AccountDao<'c> {
    pub async fn get(&self, user_id: &str) -> DbResult<Option<Account>> {
        let user_id = user_id.to_string();
        readonly_transaction(self.pool, move |conn| {
            Ok(dsl::accounts
                .filter(dsl::user_id.eq(&user_id))
                .first::<Account>(conn)
                .optional()?)
        })
        .await
    }

    /// Accounts are owned by the identity service; this is its write path.
    pub async fn upsert(&self, account: Account) -> DbResult<Account> {
        do_with_transaction(self.pool, move |conn| {
            diesel::replace_into(dsl::accounts)
                .values(&account)
                .execute(conn)?;
            Ok(account)
        })
        .await
    }

    pub async fn set_banned(&self, user_id: &str, banned: bool) -> DbResult<bool> {
        let user_id = user_id.to_string();
        do_with_transaction(self.pool, move |conn| {
            let updated = diesel::update(dsl::accounts.filter(dsl::user_id.eq(&user_id)))
                .set(dsl::banned.eq(banned))
                .execute(conn)?;
            Ok(updated > 0)
        })
        .await
    }
}
