use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::db::schema::{contractor_member_roles, contractor_roles, contractors};

/// Capability flags a contractor role may grant.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Permission {
    ManageRoles,
    ManageOrders,
    KickMembers,
    ManageInvites,
    ManageOrgDetails,
    ManageStock,
    ManageMarket,
    ManageRecruiting,
    ManageWebhooks,
}

#[derive(Clone, Debug, Queryable, Insertable, Serialize)]
#[table_name = "contractors"]
pub struct Contractor {
    pub contractor_id: String,
    pub spectrum_id: String,
    pub name: String,
    pub owner_role: Option<String>,
    pub default_role: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Clone, Debug, Queryable, Insertable, Serialize, Deserialize, PartialEq)]
#[table_name = "contractor_roles"]
pub struct ContractorRole {
    pub role_id: String,
    pub contractor_id: String,
    pub name: String,
    /// Lower value means higher rank.
    pub position: i32,
    pub manage_roles: bool,
    pub manage_orders: bool,
    pub kick_members: bool,
    pub manage_invites: bool,
    pub manage_org_details: bool,
    pub manage_stock: bool,
    pub manage_market: bool,
    pub manage_recruiting: bool,
    pub manage_webhooks: bool,
}

impl ContractorRole {
    /// Role granting either every capability or none of them.
    pub fn uniform(contractor_id: &str, name: &str, position: i32, granted: bool) -> Self {
        ContractorRole {
            role_id: super::new_id(),
            contractor_id: contractor_id.to_string(),
            name: name.to_string(),
            position,
            manage_roles: granted,
            manage_orders: granted,
            kick_members: granted,
            manage_invites: granted,
            manage_org_details: granted,
            manage_stock: granted,
            manage_market: granted,
            manage_recruiting: granted,
            manage_webhooks: granted,
        }
    }

    pub fn grants(&self, permission: Permission) -> bool {
        match permission {
            Permission::ManageRoles => self.manage_roles,
            Permission::ManageOrders => self.manage_orders,
            Permission::KickMembers => self.kick_members,
            Permission::ManageInvites => self.manage_invites,
            Permission::ManageOrgDetails => self.manage_org_details,
            Permission::ManageStock => self.manage_stock,
            Permission::ManageMarket => self.manage_market,
            Permission::ManageRecruiting => self.manage_recruiting,
            Permission::ManageWebhooks => self.manage_webhooks,
        }
    }
}

#[derive(Clone, Debug, Queryable, Insertable, PartialEq, Eq)]
#[table_name = "contractor_member_roles"]
pub struct MemberRole {
    pub user_id: String,
    pub role_id: String,
}
