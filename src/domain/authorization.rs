//! Role-gated authorization.
//!
//! Every operation is named by an [`Action`]. Each action maps to a
//! [`Policy`] describing which roles may perform it and whether the owner of
//! the target resource may perform it regardless of role. The guard itself is
//! a pure function of the caller's [`Standing`], the action, and ownership.

use super::identity::Email;
use super::user::{Role, User, UserStatus};
use crate::error::{Result, ServiceError};
use tracing::warn;

/// Everything a caller can ask the system to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    CreateRequest,
    ViewOwnRequests,
    ViewRequest,
    SearchRequests,
    ListPendingRequests,
    ListAllRequests,
    ChangeRequestStatus,
    EditRequestContent,
    DeleteRequest,
    ViewStats,
    LookupRole,
    ListUsers,
    ChangeUserStatus,
    ChangeUserRole,
    UpdateProfile,
    StartCheckout,
    ConfirmSettlement,
    ListPayments,
}

/// Who may perform an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Any caller with a verified identity.
    Authenticated,
    /// Active callers holding one of `roles`, or the resource owner when
    /// `owner` is set.
    Gated {
        roles: &'static [Role],
        owner: bool,
    },
}

const ELEVATED: &[Role] = &[Role::Admin, Role::Volunteer];
const ADMIN: &[Role] = &[Role::Admin];

impl Action {
    pub const fn policy(self) -> Policy {
        match self {
            Self::CreateRequest
            | Self::ViewOwnRequests
            | Self::ViewRequest
            | Self::SearchRequests
            | Self::ListPendingRequests
            | Self::LookupRole
            | Self::StartCheckout
            | Self::ConfirmSettlement => Policy::Authenticated,
            Self::ListAllRequests | Self::ChangeRequestStatus | Self::ViewStats => Policy::Gated {
                roles: ELEVATED,
                owner: false,
            },
            Self::EditRequestContent | Self::DeleteRequest => Policy::Gated {
                roles: ADMIN,
                owner: true,
            },
            Self::ListUsers | Self::ChangeUserStatus | Self::ChangeUserRole | Self::ListPayments => {
                Policy::Gated {
                    roles: ADMIN,
                    owner: false,
                }
            }
            Self::UpdateProfile => Policy::Gated {
                roles: &[],
                owner: true,
            },
        }
    }
}

/// The caller's account standing as seen by the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Standing {
    /// Verified identity with no account on record.
    Unregistered,
    Blocked(Role),
    Active(Role),
}

impl Standing {
    pub fn of(user: Option<&User>) -> Self {
        match user {
            None => Self::Unregistered,
            Some(user) => match user.status {
                UserStatus::Active => Self::Active(user.role),
                UserStatus::Blocked => Self::Blocked(user.role),
            },
        }
    }

    /// The role, if the caller is allowed to exercise it.
    pub fn active_role(&self) -> Option<Role> {
        match self {
            Self::Active(role) => Some(*role),
            _ => None,
        }
    }
}

/// A verified identity joined with its account standing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub email: Email,
    pub standing: Standing,
}

impl Caller {
    pub fn owns(&self, owner: &Email) -> bool {
        &self.email == owner
    }

    pub fn is_elevated(&self) -> bool {
        self.standing.active_role().is_some_and(|role| role.is_elevated())
    }

    /// Runs the guard for `action` against a resource owned by `owner`.
    pub fn authorize(&self, action: Action, owner: Option<&Email>) -> Result<()> {
        let is_owner = owner.is_some_and(|owner| self.owns(owner));
        let decision = authorize(self.standing, action, is_owner);
        if decision == Decision::Deny {
            warn!(caller = %self.email, ?action, standing = ?self.standing, "Denied");
        }
        decision.into_result(action)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn into_result(self, action: Action) -> Result<()> {
        match self {
            Self::Allow => Ok(()),
            Self::Deny => Err(ServiceError::Forbidden(format!(
                "{:?} is not permitted for this caller",
                action
            ))),
        }
    }
}

pub fn authorize(standing: Standing, action: Action, is_owner: bool) -> Decision {
    match action.policy() {
        Policy::Authenticated => Decision::Allow,
        Policy::Gated { roles, owner } => match standing.active_role() {
            Some(role) if roles.contains(&role) || (owner && is_owner) => Decision::Allow,
            _ => Decision::Deny,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_ROLES: [Role; 3] = [Role::Donor, Role::Volunteer, Role::Admin];

    #[test]
    fn test_elevated_actions() {
        for action in [
            Action::ListAllRequests,
            Action::ChangeRequestStatus,
            Action::ViewStats,
        ] {
            assert_eq!(authorize(Standing::Active(Role::Admin), action, false), Decision::Allow);
            assert_eq!(
                authorize(Standing::Active(Role::Volunteer), action, false),
                Decision::Allow
            );
            assert_eq!(authorize(Standing::Active(Role::Donor), action, false), Decision::Deny);
            // Ownership grants nothing here.
            assert_eq!(authorize(Standing::Active(Role::Donor), action, true), Decision::Deny);
        }
    }

    #[test]
    fn test_owner_or_admin_actions() {
        for action in [Action::EditRequestContent, Action::DeleteRequest] {
            assert_eq!(authorize(Standing::Active(Role::Donor), action, true), Decision::Allow);
            assert_eq!(authorize(Standing::Active(Role::Donor), action, false), Decision::Deny);
            assert_eq!(
                authorize(Standing::Active(Role::Volunteer), action, false),
                Decision::Deny
            );
            assert_eq!(authorize(Standing::Active(Role::Admin), action, false), Decision::Allow);
        }
    }

    #[test]
    fn test_open_actions_need_no_account() {
        for action in [
            Action::CreateRequest,
            Action::ViewOwnRequests,
            Action::ViewRequest,
            Action::SearchRequests,
            Action::StartCheckout,
        ] {
            assert_eq!(authorize(Standing::Unregistered, action, false), Decision::Allow);
            assert_eq!(authorize(Standing::Blocked(Role::Donor), action, false), Decision::Allow);
        }
    }

    #[test]
    fn test_blocked_and_unregistered_are_denied_gated_actions() {
        for role in ALL_ROLES {
            assert_eq!(
                authorize(Standing::Blocked(role), Action::DeleteRequest, true),
                Decision::Deny
            );
            assert_eq!(
                authorize(Standing::Blocked(role), Action::ChangeRequestStatus, false),
                Decision::Deny
            );
        }
        assert_eq!(
            authorize(Standing::Unregistered, Action::EditRequestContent, true),
            Decision::Deny
        );
    }

    #[test]
    fn test_profile_updates_are_owner_only() {
        for role in ALL_ROLES {
            assert_eq!(
                authorize(Standing::Active(role), Action::UpdateProfile, false),
                Decision::Deny
            );
            assert_eq!(
                authorize(Standing::Active(role), Action::UpdateProfile, true),
                Decision::Allow
            );
        }
    }

    #[test]
    fn test_admin_only_actions() {
        for action in [
            Action::ListUsers,
            Action::ChangeUserStatus,
            Action::ChangeUserRole,
            Action::ListPayments,
        ] {
            assert_eq!(authorize(Standing::Active(Role::Admin), action, false), Decision::Allow);
            assert_eq!(
                authorize(Standing::Active(Role::Volunteer), action, false),
                Decision::Deny
            );
        }
    }

    #[test]
    fn test_denial_maps_to_forbidden() {
        let caller = Caller {
            email: Email::parse("b@example.com").unwrap(),
            standing: Standing::Active(Role::Donor),
        };
        let owner = Email::parse("a@example.com").unwrap();
        assert!(matches!(
            caller.authorize(Action::EditRequestContent, Some(&owner)),
            Err(ServiceError::Forbidden(_))
        ));
        assert!(caller
            .authorize(Action::EditRequestContent, Some(&caller.email.clone()))
            .is_ok());
    }
}
