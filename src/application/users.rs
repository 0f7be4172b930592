use crate::domain::authorization::{Action, Caller, Standing};
use crate::domain::identity::{Email, Identity};
use crate::domain::ports::UserRepositoryRef;
use crate::domain::user::{Profile, ProfilePatch, Role, User, UserChange, UserStatus};
use crate::error::{Result, ServiceError};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};

/// Outcome of a registration attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Registration {
    Created(User),
    /// The email was already registered; the stored account is returned untouched.
    Existing(User),
}

impl Registration {
    pub fn user(&self) -> &User {
        match self {
            Self::Created(user) | Self::Existing(user) => user,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoleInfo {
    pub role: Role,
    pub status: UserStatus,
}

/// Accounts, roles, and caller resolution.
#[derive(Clone)]
pub struct UserDirectory {
    users: UserRepositoryRef,
}

impl UserDirectory {
    pub fn new(users: UserRepositoryRef) -> Self {
        Self { users }
    }

    /// Joins a verified identity with its account standing.
    pub async fn caller(&self, identity: &Identity) -> Result<Caller> {
        let user = self.users.get(identity.email()).await?;
        Ok(Caller {
            email: identity.email().clone(),
            standing: Standing::of(user.as_ref()),
        })
    }

    /// Registers the caller's own account as an active donor.
    pub async fn register(&self, identity: &Identity, profile: Profile) -> Result<Registration> {
        let user = User::register(identity.email().clone(), profile, Utc::now())?;
        match self.users.insert(user.clone()).await {
            Ok(()) => {
                info!(email = %user.email, "Registered user");
                Ok(Registration::Created(user))
            }
            Err(ServiceError::Conflict(_)) => {
                let existing = self.users.get(identity.email()).await?.ok_or_else(|| {
                    ServiceError::NotFound(format!("user {}", identity.email()))
                })?;
                debug!(email = %existing.email, "User already registered");
                Ok(Registration::Existing(existing))
            }
            Err(e) => Err(e),
        }
    }

    /// Promotes `email` to admin, but only while the system has no admin.
    pub async fn bootstrap_admin(&self, email: &Email) -> Result<User> {
        let admins = self
            .users
            .list(None)
            .await?
            .into_iter()
            .filter(|u| u.role == Role::Admin)
            .count();
        if admins > 0 {
            return Err(ServiceError::Conflict(
                "An administrator already exists".to_string(),
            ));
        }
        let user = self
            .users
            .update(email, UserChange::Role(Role::Admin), Utc::now())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("user {}", email)))?;
        info!(email = %email, "Bootstrapped first administrator");
        Ok(user)
    }

    pub async fn list_users(
        &self,
        identity: &Identity,
        status: Option<UserStatus>,
    ) -> Result<Vec<User>> {
        self.caller(identity)
            .await?
            .authorize(Action::ListUsers, None)?;
        self.users.list(status).await
    }

    pub async fn role_of(&self, identity: &Identity, email: &Email) -> Result<RoleInfo> {
        self.caller(identity)
            .await?
            .authorize(Action::LookupRole, None)?;
        let user = self
            .users
            .get(email)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("user {}", email)))?;
        Ok(RoleInfo {
            role: user.role,
            status: user.status,
        })
    }

    pub async fn set_status(
        &self,
        identity: &Identity,
        email: &Email,
        status: UserStatus,
    ) -> Result<User> {
        self.caller(identity)
            .await?
            .authorize(Action::ChangeUserStatus, None)?;
        let user = self.apply(email, UserChange::Status(status)).await?;
        info!(email = %email, status = %status, by = %identity.email(), "Changed user status");
        Ok(user)
    }

    pub async fn set_role(&self, identity: &Identity, email: &Email, role: Role) -> Result<User> {
        self.caller(identity)
            .await?
            .authorize(Action::ChangeUserRole, None)?;
        let user = self.apply(email, UserChange::Role(role)).await?;
        info!(email = %email, role = %role, by = %identity.email(), "Changed user role");
        Ok(user)
    }

    /// Self-service profile update; nobody may edit another user's profile.
    pub async fn update_profile(
        &self,
        identity: &Identity,
        email: &Email,
        patch: ProfilePatch,
    ) -> Result<User> {
        self.caller(identity)
            .await?
            .authorize(Action::UpdateProfile, Some(email))?;
        patch.validate()?;
        self.apply(email, UserChange::Profile(patch)).await
    }

    pub async fn count(&self) -> Result<u64> {
        self.users.count().await
    }

    async fn apply(&self, email: &Email, change: UserChange) -> Result<User> {
        self.users
            .update(email, change, Utc::now())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("user {}", email)))
    }
}
