use actix_web::dev::Payload;
use actix_web::web::Data;
use actix_web::{FromRequest, HttpRequest};
use futures::future::{FutureExt, LocalBoxFuture};
use serde::Serialize;

use crate::db::dao::AccountDao;
use crate::db::model::{Account, AccountRole};
use crate::db::{DbError, DbExecutor};

/// Header in which the upstream authenticator places the caller's user id.
pub const ACCOUNT_HEADER: &str = "X-Account-Id";

/// User on whose behalf a core operation runs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Actor {
    pub user_id: String,
    pub role: AccountRole,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role == AccountRole::Admin
    }
}

impl From<&Account> for Actor {
    fn from(account: &Account) -> Self {
        Actor {
            user_id: account.user_id.clone(),
            role: account.role,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum IdentityError {
    #[error("Missing {} header.", ACCOUNT_HEADER)]
    Missing,
    #[error("Unknown account [{0}].")]
    Unknown(String),
    #[error("Account [{0}] is banned.")]
    Banned(String),
    #[error("Account store is not configured.")]
    NotConfigured,
    #[error("Failed to resolve account. Error: {0}.")]
    Db(#[from] DbError),
}

/// Caller resolved from [`ACCOUNT_HEADER`]. Rejects unknown and banned accounts.
#[derive(Clone, Debug)]
pub struct Identity {
    pub actor: Actor,
}

impl FromRequest for Identity {
    type Error = IdentityError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let user_id = req
            .headers()
            .get(ACCOUNT_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        let db = req.app_data::<Data<DbExecutor>>().cloned();

        async move {
            let user_id = user_id.ok_or(IdentityError::Missing)?;
            let db = db.ok_or(IdentityError::NotConfigured)?;
            let account = db
                .as_dao::<AccountDao>()
                .get(&user_id)
                .await?
                .ok_or_else(|| IdentityError::Unknown(user_id.clone()))?;
            if account.banned {
                return Err(IdentityError::Banned(user_id));
            }
            Ok(Identity {
                actor: Actor::from(&account),
            })
        }
        .boxed_local()
    }
}
