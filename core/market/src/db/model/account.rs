use chrono::NaiveDateTime;
use diesel::sql_types::Text;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::db::schema::accounts;

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
pub enum AccountRole {
    Admin,
    User,
}

text_enum_sql!(AccountRole);

/// Identity record owned by the account service. The market only reads it.
#[derive(Clone, Debug, Queryable, Insertable, Serialize)]
#[table_name = "accounts"]
pub struct Account {
    pub user_id: String,
    pub username: String,
    pub role: AccountRole,
    pub banned: bool,
    pub rsi_confirmed: bool,
    pub created_at: NaiveDateTime,
}

impl Account {
    pub fn is_admin(&self) -> bool {
        self.role == AccountRole::Admin
    }
}
