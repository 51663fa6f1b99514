use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// Authorization roles every installation must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Staff,
    Student,
}

impl Role {
    /// The required roles, in provisioning order.
    pub fn all() -> &'static [Role] {
        &[Role::Admin, Role::Staff, Role::Student]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Staff => "staff",
            Role::Student => "student",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Role::Admin => "Full system access, can create users",
            Role::Staff => "Can manage books and issue them to students",
            Role::Student => "Can request book issues",
        }
    }

    pub fn is_required(name: &str) -> bool {
        Role::all().iter().any(|r| r.as_str() == name)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = crate::error::LibrisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "staff" => Ok(Role::Staff),
            "student" => Ok(Role::Student),
            other => Err(crate::error::LibrisError::InvalidRoleName(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// RoleRecord
// ---------------------------------------------------------------------------

/// A role as persisted in the role store. `name` is the unique key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleRecord {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl RoleRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            created_at: Utc::now(),
        }
    }
}
