use diesel::prelude::*;

use scm_persistence::executor::{
    do_with_transaction, readonly_transaction, AsDao, ConnType, PoolType,
};

use crate::db::model::{Contractor, ContractorRole, MemberRole};
use crate::db::schema::contractor_member_roles::dsl as member;
use crate::db::schema::contractor_roles;
use crate::db::schema::contractor_roles::dsl as role;
use crate::db::schema::contractors::dsl as contractor;
use crate::db::{DbError, DbResult};

#[derive(thiserror::Error, Debug)]
pub enum CreateContractorError {
    #[error("Contractor with spectrum id [{0}] already exists.")]
    Exists(String),
    #[error("Failed to create contractor. Error: {0}.")]
    Db(#[from] DbError),
}

impl From<diesel::result::Error> for CreateContractorError {
    fn from(e: diesel::result::Error) -> Self {
        CreateContractorError::Db(e.into())
    }
}

pub struct ContractorDao<'c> {
    pool: &'c PoolType,
}

impl<'c> AsDao<'c> for ContractorDao<'c> {
    fn as_dao(pool: &'c PoolType) -> Self {
        Self { pool }
    }
}

impl<'c> ContractorDao<'c> {
    pub async fn get(&self, contractor_id: &str) -> DbResult<Option<Contractor>> {
        let contractor_id = contractor_id.to_string();
        readonly_transaction(self.pool, move |conn| {
            Ok(contractor::contractors
                .filter(contractor::contractor_id.eq(&contractor_id))
                .first(conn)
                .optional()?)
        })
        .await
    }

    pub async fn get_role(&self, role_id: &str) -> DbResult<Option<ContractorRole>> {
        let role_id = role_id.to_string();
        readonly_transaction(self.pool, move |conn| {
            Ok(role::contractor_roles
                .filter(role::role_id.eq(&role_id))
                .first(conn)
                .optional()?)
        })
        .await
    }

    /// Every role `user_id` holds in the contractor. Empty for non-members.
    pub async fn member_roles(
        &self,
        contractor_id: &str,
        user_id: &str,
    ) -> DbResult<Vec<ContractorRole>> {
        let contractor_id = contractor_id.to_string();
        let user_id = user_id.to_string();
        readonly_transaction(self.pool, move |conn| {
            Ok(member_roles(conn, &contractor_id, &user_id)?)
        })
        .await
    }

    /// Creates the contractor with its seeded roles and grants `owner_id` each of `owner_roles`.
    pub async fn create(
        &self,
        new: Contractor,
        roles: Vec<ContractorRole>,
        owner_id: &str,
        owner_roles: Vec<String>,
    ) -> Result<Contractor, CreateContractorError> {
        let owner_id = owner_id.to_string();
        do_with_transaction(self.pool, move |conn| {
            let existing: Option<Contractor> = contractor::contractors
                .filter(contractor::spectrum_id.eq(&new.spectrum_id))
                .first(conn)
                .optional()?;
            if existing.is_some() {
                return Err(CreateContractorError::Exists(new.spectrum_id.clone()));
            }

            diesel::insert_into(contractor::contractors)
                .values(&new)
                .execute(conn)?;
            diesel::insert_into(role::contractor_roles)
                .values(&roles)
                .execute(conn)?;

            let grants = owner_roles
                .into_iter()
                .map(|role_id| MemberRole {
                    user_id: owner_id.clone(),
                    role_id,
                })
                .collect::<Vec<_>>();
            diesel::insert_into(member::contractor_member_roles)
                .values(&grants)
                .execute(conn)?;
            Ok(new)
        })
        .await
    }

    /// Returns false if the user already held the role.
    pub async fn grant_role(&self, user_id: &str, role_id: &str) -> DbResult<bool> {
        let grant = MemberRole {
            user_id: user_id.to_string(),
            role_id: role_id.to_string(),
        };
        do_with_transaction(self.pool, move |conn| {
            let inserted = diesel::insert_or_ignore_into(member::contractor_member_roles)
                .values(&grant)
                .execute(conn)?;
            Ok(inserted > 0)
        })
        .await
    }

    /// Returns false if the user didn't hold the role.
    pub async fn revoke_role(&self, user_id: &str, role_id: &str) -> DbResult<bool> {
        let user_id = user_id.to_string();
        let role_id = role_id.to_string();
        do_with_transaction(self.pool, move |conn| {
            let deleted = diesel::delete(
                member::contractor_member_roles
                    .filter(member::user_id.eq(&user_id))
                    .filter(member::role_id.eq(&role_id)),
            )
            .execute(conn)?;
            Ok(deleted > 0)
        })
        .await
    }

    /// Drops every role membership the user has in the contractor.
    pub async fn remove_member(&self, contractor_id: &str, user_id: &str) -> DbResult<usize> {
        let contractor_id = contractor_id.to_string();
        let user_id = user_id.to_string();
        do_with_transaction(self.pool, move |conn| {
            let roles = role::contractor_roles
                .filter(role::contractor_id.eq(&contractor_id))
                .select(role::role_id);
            Ok(diesel::delete(
                member::contractor_member_roles
                    .filter(member::user_id.eq(&user_id))
                    .filter(member::role_id.eq_any(roles)),
            )
            .execute(conn)?)
        })
        .await
    }

    pub async fn insert_role(&self, new: ContractorRole) -> DbResult<ContractorRole> {
        do_with_transaction(self.pool, move |conn| {
            diesel::insert_into(role::contractor_roles)
                .values(&new)
                .execute(conn)?;
            Ok(new)
        })
        .await
    }
}

pub(super) fn member_roles(
    conn: &ConnType,
    contractor_id: &str,
    user_id: &str,
) -> QueryResult<Vec<ContractorRole>> {
    role::contractor_roles
        .inner_join(member::contractor_member_roles)
        .filter(role::contractor_id.eq(contractor_id))
        .filter(member::user_id.eq(user_id))
        .select(contractor_roles::all_columns)
        .order_by(role::position.asc())
        .load(conn)
}
