use std::{fmt::Display, str::FromStr, time::SystemTime};

use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, Default, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Moderator,
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::User, Role::Moderator, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
        }
    }
}

impl AsRef<str> for Role {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown role: {0}, valid roles are user, moderator, admin")]
pub struct UnknownRole(String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

pub trait TimeLimited {
    fn set_validity(&mut self, until: SystemTime);
    fn check_validity(&self) -> bool;
}

/// Capability checks derived from user's role.
///
/// Superuser flag overrides role - superuser is always admin.
pub trait Authorization {
    fn role(&self) -> Role;

    fn is_superuser(&self) -> bool {
        false
    }

    fn is_admin(&self) -> bool {
        self.role() == Role::Admin || self.is_superuser()
    }

    fn is_moderator(&self) -> bool {
        self.role() == Role::Moderator
    }

    fn has_role(&self, role: Role) -> bool {
        match role {
            Role::Admin => self.is_admin(),
            role => self.role() == role,
        }
    }

    fn has_any_role<I>(&self, roles: I) -> bool
    where
        I: IntoIterator<Item = Role>,
    {
        roles.into_iter().any(|role| self.has_role(role))
    }

    /// Can modify content (review, comment) owned by `owner_id`
    fn can_moderate(&self, own_id: i64, owner_id: i64) -> bool {
        own_id == owner_id || self.has_any_role([Role::Moderator, Role::Admin])
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiClaim {
    pub sub: String,
    pub exp: u64,
    pub username: String,
    pub role: Role,
}

impl ApiClaim {
    pub fn new_expired(sub: impl Into<String>, username: impl Into<String>, role: Role) -> Self {
        ApiClaim {
            sub: sub.into(),
            exp: 0,
            username: username.into(),
            role,
        }
    }

    pub fn user_id(&self) -> Option<i64> {
        self.sub.parse().ok()
    }
}

impl Authorization for ApiClaim {
    fn role(&self) -> Role {
        self.role
    }
}

fn unix_secs(time: SystemTime) -> u64 {
    time.duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

impl TimeLimited for ApiClaim {
    fn set_validity(&mut self, until: SystemTime) {
        self.exp = unix_secs(until);
    }

    fn check_validity(&self) -> bool {
        self.exp > unix_secs(SystemTime::now())
    }
}
