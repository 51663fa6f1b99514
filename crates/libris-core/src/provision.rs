use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::role::Role;
use crate::store::RoleStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleStatus {
    pub role: Role,
    pub created: bool,
}

/// Outcome of one provisioning run, in required-role order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisionReport {
    pub created_count: usize,
    pub roles: Vec<RoleStatus>,
}

impl ProvisionReport {
    pub fn created(&self) -> impl Iterator<Item = Role> + '_ {
        self.roles.iter().filter(|s| s.created).map(|s| s.role)
    }
}

/// Ensure every required role exists in `store`.
///
/// Existing records are left as they are and nothing is ever removed, so
/// running this any number of times leaves the store with at least the
/// required set. Storage errors are returned to the caller unchanged.
pub fn provision_roles(store: &RoleStore) -> Result<ProvisionReport> {
    let mut roles = Vec::with_capacity(Role::all().len());
    for &role in Role::all() {
        let (_, created) = store.get_or_create(role.as_str())?;
        if created {
            tracing::info!(role = %role, "created role");
        }
        roles.push(RoleStatus { role, created });
    }
    let created_count = roles.iter().filter(|s| s.created).count();
    Ok(ProvisionReport {
        created_count,
        roles,
    })
}
