//! Contractor organizations and their role memberships.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::dao::{AccountDao, ContractorDao, CreateContractorError};
use crate::db::model::{new_id, Contractor, ContractorRole, Permission};
use crate::db::{DbError, DbExecutor};
use crate::error::{ApiError, ErrorKind};
use crate::identity::Actor;
use crate::permissions::PermissionEvaluator;

const OWNER_ROLE: (&str, i32) = ("Owner", 0);
const ADMIN_ROLE: (&str, i32) = ("Admin", 1);
const MEMBER_ROLE: (&str, i32) = ("Member", 10);

#[derive(Error, Debug)]
pub enum ContractorError {
    #[error("Invalid {field}: {reason}.")]
    Validation { field: &'static str, reason: String },
    #[error("{entity} [{id}] not found.")]
    NotFound { entity: &'static str, id: String },
    #[error("{0}")]
    Permission(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Contractor store error: {0}.")]
    Db(#[from] DbError),
}

impl From<CreateContractorError> for ContractorError {
    fn from(e: CreateContractorError) -> Self {
        match e {
            CreateContractorError::Exists(spectrum_id) => ContractorError::Conflict(format!(
                "Contractor with spectrum id [{}] already exists.",
                spectrum_id
            )),
            CreateContractorError::Db(e) => ContractorError::Db(e),
        }
    }
}

impl ApiError for ContractorError {
    fn kind(&self) -> ErrorKind {
        match self {
            ContractorError::Validation { .. } => ErrorKind::ValidationError,
            ContractorError::NotFound { .. } => ErrorKind::NotFoundError,
            ContractorError::Permission(_) => ErrorKind::PermissionError,
            ContractorError::Conflict(_) => ErrorKind::StateConflictError,
            ContractorError::Db(_) => ErrorKind::InternalError,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewContractor {
    pub spectrum_id: String,
    pub name: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct ContractorDetails {
    #[serde(flatten)]
    pub contractor: Contractor,
    pub roles: Vec<ContractorRole>,
}

/// Membership and role management, gated by the members' own capabilities.
#[derive(Clone)]
pub struct ContractorAdmin {
    db: DbExecutor,
    permissions: PermissionEvaluator,
}

impl ContractorAdmin {
    pub fn new(db: DbExecutor, permissions: PermissionEvaluator) -> Self {
        ContractorAdmin { db, permissions }
    }

    /// Seeds `Owner`, `Admin` and `Member` roles. The creator becomes owner.
    pub async fn create_contractor(
        &self,
        actor: &Actor,
        new: NewContractor,
    ) -> Result<ContractorDetails, ContractorError> {
        let spectrum_id = new.spectrum_id.trim().to_string();
        let name = new.name.trim().to_string();
        if spectrum_id.is_empty() {
            return Err(validation("spectrum_id", "must not be empty"));
        }
        if name.is_empty() {
            return Err(validation("name", "must not be empty"));
        }

        let contractor_id = new_id();
        let owner = ContractorRole::uniform(&contractor_id, OWNER_ROLE.0, OWNER_ROLE.1, true);
        let admin = ContractorRole::uniform(&contractor_id, ADMIN_ROLE.0, ADMIN_ROLE.1, true);
        let member = ContractorRole::uniform(&contractor_id, MEMBER_ROLE.0, MEMBER_ROLE.1, false);
        let contractor = Contractor {
            contractor_id,
            spectrum_id,
            name,
            owner_role: Some(owner.role_id.clone()),
            default_role: Some(member.role_id.clone()),
            created_at: Utc::now().naive_utc(),
        };
        let owner_roles = vec![owner.role_id.clone(), member.role_id.clone()];
        let roles = vec![owner, admin, member];

        let contractor = self
            .db
            .as_dao::<ContractorDao>()
            .create(contractor, roles.clone(), &actor.user_id, owner_roles)
            .await?;

        log::info!(
            "User [{}] created Contractor [{}] ({}).",
            actor.user_id,
            contractor.contractor_id,
            contractor.spectrum_id
        );
        Ok(ContractorDetails { contractor, roles })
    }

    /// Grants the default role to a user who isn't a member yet.
    pub async fn add_member(
        &self,
        actor: &Actor,
        contractor_id: &str,
        user_id: &str,
    ) -> Result<(), ContractorError> {
        let contractor = self.contractor(contractor_id).await?;
        self.require(contractor_id, actor, Permission::ManageInvites)
            .await?;
        if self.db.as_dao::<AccountDao>().get(user_id).await?.is_none() {
            return Err(not_found("Account", user_id));
        }
        if self.permissions.is_member(contractor_id, user_id).await? {
            return Err(ContractorError::Conflict(format!(
                "User [{}] is already a member of Contractor [{}].",
                user_id, contractor_id
            )));
        }
        let default_role = contractor
            .default_role
            .ok_or_else(|| not_found("Default role of Contractor", contractor_id))?;

        self.db
            .as_dao::<ContractorDao>()
            .grant_role(user_id, &default_role)
            .await?;
        log::info!(
            "User [{}] added [{}] to Contractor [{}].",
            actor.user_id,
            user_id,
            contractor_id
        );
        Ok(())
    }

    pub async fn assign_role(
        &self,
        actor: &Actor,
        contractor_id: &str,
        user_id: &str,
        role_id: &str,
    ) -> Result<(), ContractorError> {
        self.check_role_change(actor, contractor_id, user_id, role_id)
            .await?;
        let granted = self
            .db
            .as_dao::<ContractorDao>()
            .grant_role(user_id, role_id)
            .await?;
        if !granted {
            return Err(ContractorError::Conflict(format!(
                "User [{}] already holds role [{}].",
                user_id, role_id
            )));
        }
        log::info!(
            "User [{}] granted role [{}] of Contractor [{}] to [{}].",
            actor.user_id,
            role_id,
            contractor_id,
            user_id
        );
        Ok(())
    }

    /// The default role can't be removed; members are removed by kicking them.
    pub async fn remove_role(
        &self,
        actor: &Actor,
        contractor_id: &str,
        user_id: &str,
        role_id: &str,
    ) -> Result<(), ContractorError> {
        let contractor = self
            .check_role_change(actor, contractor_id, user_id, role_id)
            .await?;
        if contractor.default_role.as_deref() == Some(role_id) {
            return Err(validation("role_id", "the default role can't be removed"));
        }
        let revoked = self
            .db
            .as_dao::<ContractorDao>()
            .revoke_role(user_id, role_id)
            .await?;
        if !revoked {
            return Err(not_found("Role membership", role_id));
        }
        log::info!(
            "User [{}] removed role [{}] of Contractor [{}] from [{}].",
            actor.user_id,
            role_id,
            contractor_id,
            user_id
        );
        Ok(())
    }

    /// Removes every role membership of a lower ranked member.
    pub async fn kick_member(
        &self,
        actor: &Actor,
        contractor_id: &str,
        user_id: &str,
    ) -> Result<(), ContractorError> {
        self.contractor(contractor_id).await?;
        self.require(contractor_id, actor, Permission::KickMembers)
            .await?;
        if !self.permissions.is_member(contractor_id, user_id).await? {
            return Err(not_found("Member", user_id));
        }
        if !self
            .permissions
            .outranks(contractor_id, user_id, &actor.user_id)
            .await?
        {
            return Err(ContractorError::Permission(format!(
                "User [{}] doesn't outrank [{}] in Contractor [{}].",
                actor.user_id, user_id, contractor_id
            )));
        }

        let removed = self
            .db
            .as_dao::<ContractorDao>()
            .remove_member(contractor_id, user_id)
            .await?;
        log::info!(
            "User [{}] kicked [{}] from Contractor [{}], {} role(s) removed.",
            actor.user_id,
            user_id,
            contractor_id,
            removed
        );
        Ok(())
    }

    async fn check_role_change(
        &self,
        actor: &Actor,
        contractor_id: &str,
        user_id: &str,
        role_id: &str,
    ) -> Result<Contractor, ContractorError> {
        let contractor = self.contractor(contractor_id).await?;
        match self.db.as_dao::<ContractorDao>().get_role(role_id).await? {
            Some(role) if role.contractor_id == contractor_id => (),
            _ => return Err(not_found("Role", role_id)),
        }
        self.require(contractor_id, actor, Permission::ManageRoles)
            .await?;
        if !self
            .permissions
            .can_manage_role(contractor_id, role_id, &actor.user_id)
            .await?
        {
            return Err(ContractorError::Permission(format!(
                "User [{}] doesn't rank above role [{}].",
                actor.user_id, role_id
            )));
        }
        if !self.permissions.is_member(contractor_id, user_id).await? {
            return Err(not_found("Member", user_id));
        }
        Ok(contractor)
    }

    async fn contractor(&self, contractor_id: &str) -> Result<Contractor, ContractorError> {
        self.db
            .as_dao::<ContractorDao>()
            .get(contractor_id)
            .await?
            .ok_or_else(|| not_found("Contractor", contractor_id))
    }

    async fn require(
        &self,
        contractor_id: &str,
        actor: &Actor,
        permission: Permission,
    ) -> Result<(), ContractorError> {
        match self
            .permissions
            .has_permission(contractor_id, &actor.user_id, permission)
            .await?
        {
            true => Ok(()),
            false => Err(ContractorError::Permission(format!(
                "User [{}] lacks {} in Contractor [{}].",
                actor.user_id, permission, contractor_id
            ))),
        }
    }
}

fn validation(field: &'static str, reason: &str) -> ContractorError {
    ContractorError::Validation {
        field,
        reason: reason.to_string(),
    }
}

fn not_found(entity: &'static str, id: &str) -> ContractorError {
    ContractorError::NotFound {
        entity,
        id: id.to_string(),
    }
}
