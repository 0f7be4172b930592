use super::identity::Email;
use crate::error::{Result, ServiceError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Donor,
    Volunteer,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Donor => "donor",
            Self::Volunteer => "volunteer",
            Self::Admin => "admin",
        }
    }

    /// Admins and volunteers may act on requests they do not own.
    pub fn is_elevated(&self) -> bool {
        matches!(self, Self::Admin | Self::Volunteer)
    }
}

impl FromStr for Role {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "donor" => Ok(Self::Donor),
            "volunteer" => Ok(Self::Volunteer),
            "admin" => Ok(Self::Admin),
            other => Err(ServiceError::ValidationError(format!(
                "Unknown role: {:?}",
                other
            ))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Active,
    Blocked,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Blocked => "blocked",
        }
    }
}

impl FromStr for UserStatus {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "active" => Ok(Self::Active),
            "blocked" => Ok(Self::Blocked),
            other => Err(ServiceError::ValidationError(format!(
                "Unknown user status: {:?}",
                other
            ))),
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Self-service profile details attached to an account.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub age: Option<u8>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default, rename = "upazila")]
    pub sub_district: Option<String>,
    #[serde(default)]
    pub blood_group: Option<String>,
    #[serde(default, rename = "photoURL")]
    pub photo: Option<String>,
}

/// Partial profile update; `None` leaves a field untouched.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub age: Option<u8>,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub district: Option<String>,
    #[serde(rename = "upazila")]
    pub sub_district: Option<String>,
    pub blood_group: Option<String>,
    #[serde(rename = "photoURL")]
    pub photo: Option<String>,
}

impl ProfilePatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(ServiceError::ValidationError(
                "Profile update carries no fields".to_string(),
            ));
        }
        if let Some(name) = &self.name
            && name.trim().is_empty()
        {
            return Err(ServiceError::ValidationError(
                "Name must not be blank".to_string(),
            ));
        }
        Ok(())
    }

    fn apply(self, profile: &mut Profile) {
        if let Some(name) = self.name {
            profile.name = name;
        }
        if self.phone.is_some() {
            profile.phone = self.phone;
        }
        if self.age.is_some() {
            profile.age = self.age;
        }
        if self.gender.is_some() {
            profile.gender = self.gender;
        }
        if self.address.is_some() {
            profile.address = self.address;
        }
        if self.district.is_some() {
            profile.district = self.district;
        }
        if self.sub_district.is_some() {
            profile.sub_district = self.sub_district;
        }
        if self.blood_group.is_some() {
            profile.blood_group = self.blood_group;
        }
        if self.photo.is_some() {
            profile.photo = self.photo;
        }
    }
}

/// A registered account.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub email: Email,
    pub role: Role,
    pub status: UserStatus,
    #[serde(flatten)]
    pub profile: Profile,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single mutation applied to an existing account.
#[derive(Debug, Clone, PartialEq)]
pub enum UserChange {
    Profile(ProfilePatch),
    Role(Role),
    Status(UserStatus),
}

impl User {
    /// A freshly registered account: donor, active.
    pub fn register(email: Email, profile: Profile, now: DateTime<Utc>) -> Result<Self> {
        if profile.name.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Name must not be blank".to_string(),
            ));
        }
        Ok(Self {
            email,
            role: Role::Donor,
            status: UserStatus::Active,
            profile,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    pub fn apply(&mut self, change: UserChange, now: DateTime<Utc>) {
        match change {
            UserChange::Profile(patch) => patch.apply(&mut self.profile),
            UserChange::Role(role) => self.role = role,
            UserChange::Status(status) => self.status = status,
        }
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> User {
        User::register(
            Email::parse("alice@example.com").unwrap(),
            Profile {
                name: "Alice".to_string(),
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn test_register_defaults() {
        let user = alice();
        assert_eq!(user.role, Role::Donor);
        assert_eq!(user.status, UserStatus::Active);
        assert_eq!(user.created_at, user.updated_at);
    }

    #[test]
    fn test_register_requires_name() {
        let result = User::register(
            Email::parse("x@example.com").unwrap(),
            Profile::default(),
            Utc::now(),
        );
        assert!(matches!(result, Err(ServiceError::ValidationError(_))));
    }

    #[test]
    fn test_role_and_status_are_closed() {
        assert_eq!("volunteer".parse::<Role>().unwrap(), Role::Volunteer);
        assert!(matches!(
            "superuser".parse::<Role>(),
            Err(ServiceError::ValidationError(_))
        ));
        assert!(serde_json::from_str::<Role>("\"owner\"").is_err());
        assert!(serde_json::from_str::<UserStatus>("\"suspended\"").is_err());
        assert_eq!(
            serde_json::from_str::<UserStatus>("\"blocked\"").unwrap(),
            UserStatus::Blocked
        );
    }

    #[test]
    fn test_profile_patch_only_touches_given_fields() {
        let mut user = alice();
        user.profile.district = Some("Dhaka".to_string());
        let later = user.updated_at + chrono::Duration::seconds(5);

        user.apply(
            UserChange::Profile(ProfilePatch {
                phone: Some("0123".to_string()),
                ..Default::default()
            }),
            later,
        );

        assert_eq!(user.profile.phone.as_deref(), Some("0123"));
        assert_eq!(user.profile.district.as_deref(), Some("Dhaka"));
        assert_eq!(user.profile.name, "Alice");
        assert_eq!(user.updated_at, later);
    }

    #[test]
    fn test_empty_profile_patch_is_rejected() {
        assert!(ProfilePatch::default().validate().is_err());
    }

    #[test]
    fn test_user_serializes_with_wire_names() {
        let mut user = alice();
        user.profile.blood_group = Some("AB-".to_string());
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["email"], "alice@example.com");
        assert_eq!(json["role"], "donor");
        assert_eq!(json["status"], "active");
        assert_eq!(json["bloodGroup"], "AB-");
        assert!(json.get("createdAt").is_some());
    }
}
