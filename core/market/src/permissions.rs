//! Contractor role-based authorization.
//!
//! Effective capability is the OR over every role a user holds in the contractor.
//! Rank is the minimum role position held; a user without roles has no rank and
//! therefore can't outrank anybody or manage any role.

use crate::db::dao::{AccountDao, ContractorDao};
use crate::db::model::{ContractorRole, Permission, Side};
use crate::db::{DbExecutor, DbResult};
use crate::identity::Actor;

/// Parties of a negotiated entity. Shared by offer sessions and orders.
pub trait Counterparties {
    fn customer_id(&self) -> &str;
    fn assigned_id(&self) -> Option<&str>;
    fn contractor_id(&self) -> Option<&str>;
}

impl Counterparties for crate::db::model::OfferSession {
    fn customer_id(&self) -> &str {
        &self.customer_id
    }

    fn assigned_id(&self) -> Option<&str> {
        self.assigned_id.as_deref()
    }

    fn contractor_id(&self) -> Option<&str> {
        self.contractor_id.as_deref()
    }
}

impl Counterparties for crate::db::model::Order {
    fn customer_id(&self) -> &str {
        &self.customer_id
    }

    fn assigned_id(&self) -> Option<&str> {
        self.assigned_id.as_deref()
    }

    fn contractor_id(&self) -> Option<&str> {
        self.contractor_id.as_deref()
    }
}

/// Which sides of an entity an actor may act for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Relation {
    pub customer: bool,
    pub seller: bool,
}

impl Relation {
    pub fn any(&self) -> bool {
        self.customer || self.seller
    }

    pub fn holds(&self, side: Side) -> bool {
        match side {
            Side::Customer => self.customer,
            Side::Seller => self.seller,
        }
    }
}

#[derive(Clone)]
pub struct PermissionEvaluator {
    db: DbExecutor,
}

impl PermissionEvaluator {
    pub fn new(db: DbExecutor) -> Self {
        PermissionEvaluator { db }
    }

    /// Site admins hold every capability. Non-members hold none.
    pub async fn has_permission(
        &self,
        contractor_id: &str,
        user_id: &str,
        permission: Permission,
    ) -> DbResult<bool> {
        if self.is_admin(user_id).await? {
            return Ok(true);
        }
        let roles = self.roles(contractor_id, user_id).await?;
        Ok(grants(&roles, permission))
    }

    pub async fn is_member(&self, contractor_id: &str, user_id: &str) -> DbResult<bool> {
        Ok(!self.roles(contractor_id, user_id).await?.is_empty())
    }

    /// True iff `higher_user` ranks strictly above `lower_user`. No admin bypass.
    pub async fn outranks(
        &self,
        contractor_id: &str,
        lower_user: &str,
        higher_user: &str,
    ) -> DbResult<bool> {
        let lower = min_position(&self.roles(contractor_id, lower_user).await?);
        let higher = min_position(&self.roles(contractor_id, higher_user).await?);
        Ok(ranks_above(higher, lower))
    }

    /// True iff the user ranks strictly above the role. False for unknown roles
    /// and roles of a different contractor.
    pub async fn can_manage_role(
        &self,
        contractor_id: &str,
        role_id: &str,
        user_id: &str,
    ) -> DbResult<bool> {
        let role = match self.db.as_dao::<ContractorDao>().get_role(role_id).await? {
            Some(role) if role.contractor_id == contractor_id => role,
            _ => return Ok(false),
        };
        let actor = min_position(&self.roles(contractor_id, user_id).await?);
        Ok(ranks_above(actor, Some(role.position)))
    }

    /// Single relation check for every negotiated entity.
    pub async fn relation<E: Counterparties>(&self, entity: &E, actor: &Actor) -> DbResult<Relation> {
        let customer = entity.customer_id() == actor.user_id;
        let seller = match (entity.assigned_id(), entity.contractor_id()) {
            (Some(assigned_id), _) => assigned_id == actor.user_id,
            (None, Some(contractor_id)) => {
                self.has_permission(contractor_id, &actor.user_id, Permission::ManageOrders)
                    .await?
            }
            (None, None) => false,
        };
        Ok(Relation { customer, seller })
    }

    /// Related party or site admin.
    pub async fn may_view<E: Counterparties>(&self, entity: &E, actor: &Actor) -> DbResult<bool> {
        Ok(actor.is_admin() || self.relation(entity, actor).await?.any())
    }

    async fn roles(&self, contractor_id: &str, user_id: &str) -> DbResult<Vec<ContractorRole>> {
        self.db
            .as_dao::<ContractorDao>()
            .member_roles(contractor_id, user_id)
            .await
    }

    async fn is_admin(&self, user_id: &str) -> DbResult<bool> {
        Ok(self
            .db
            .as_dao::<AccountDao>()
            .get(user_id)
            .await?
            .map(|account| account.is_admin())
            .unwrap_or(false))
    }
}

pub fn grants(roles: &[ContractorRole], permission: Permission) -> bool {
    roles.iter().any(|role| role.grants(permission))
}

/// `None` stands for a user without roles, ranked below everyone.
pub fn min_position(roles: &[ContractorRole]) -> Option<i32> {
    roles.iter().map(|role| role.position).min()
}

/// Lower position ranks higher. Any ranked user is above an unranked one;
/// an unranked user is above nobody.
pub fn ranks_above(candidate: Option<i32>, other: Option<i32>) -> bool {
    match (candidate, other) {
        (Some(candidate), Some(other)) => candidate < other,
        (Some(_), None) => true,
        (None, _) => false,
    }
}
