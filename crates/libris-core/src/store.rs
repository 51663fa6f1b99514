//! Persistent role storage using redb.
//!
//! A single `ROLES` table maps the role name (the unique key) to a
//! JSON-encoded [`RoleRecord`]. Lookups and inserts for one name happen in
//! the same write transaction, and redb allows only one writer at a time, so
//! two provisioning runs racing on the same database cannot both insert.

use std::path::Path;

use redb::{Database, ReadableTable, TableDefinition};

use crate::error::{LibrisError, Result};
use crate::paths;
use crate::role::RoleRecord;

/// Key: role name. Value: JSON-encoded RoleRecord.
const ROLES: TableDefinition<&str, &[u8]> = TableDefinition::new("roles");

fn store_err(e: impl std::fmt::Display) -> LibrisError {
    LibrisError::Store(e.to_string())
}

/// Persistent store for [`RoleRecord`]s.
pub struct RoleStore {
    db: Database,
}

impl RoleStore {
    /// Open or create the database at `path`, creating parent directories.
    ///
    /// Creates the `ROLES` table if it doesn't already exist so reads never
    /// hit a missing table.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            crate::io::ensure_dir(parent)?;
        }
        let db = Database::create(path).map_err(store_err)?;
        let wt = db.begin_write().map_err(store_err)?;
        wt.open_table(ROLES).map_err(store_err)?;
        wt.commit().map_err(store_err)?;
        tracing::debug!(path = %path.display(), "opened role store");
        Ok(Self { db })
    }

    pub fn get(&self, name: &str) -> Result<Option<RoleRecord>> {
        let rt = self.db.begin_read().map_err(store_err)?;
        let table = rt.open_table(ROLES).map_err(store_err)?;
        let record = match table.get(name).map_err(store_err)? {
            Some(v) => Some(serde_json::from_slice(v.value())?),
            None => None,
        };
        Ok(record)
    }

    /// Return the record for `name`, inserting a new one if absent.
    ///
    /// The boolean is `true` when this call created the record.
    pub fn get_or_create(&self, name: &str) -> Result<(RoleRecord, bool)> {
        paths::validate_role_name(name)?;

        let wt = self.db.begin_write().map_err(store_err)?;
        let outcome = {
            let mut table = wt.open_table(ROLES).map_err(store_err)?;
            let existing = table
                .get(name)
                .map_err(store_err)?
                .map(|v| v.value().to_vec());
            match existing {
                Some(bytes) => (serde_json::from_slice::<RoleRecord>(&bytes)?, false),
                None => {
                    let record = RoleRecord::new(name);
                    let value = serde_json::to_vec(&record)?;
                    table.insert(name, value.as_slice()).map_err(store_err)?;
                    (record, true)
                }
            }
        };
        wt.commit().map_err(store_err)?;

        tracing::debug!(role = name, created = outcome.1, "get_or_create");
        Ok(outcome)
    }

    /// All stored roles, sorted by name.
    pub fn list(&self) -> Result<Vec<RoleRecord>> {
        let rt = self.db.begin_read().map_err(store_err)?;
        let table = rt.open_table(ROLES).map_err(store_err)?;

        let mut result = Vec::new();
        for entry in table.iter().map_err(store_err)? {
            let (_, v) = entry.map_err(store_err)?;
            let record: RoleRecord = serde_json::from_slice(v.value())?;
            result.push(record);
        }
        result.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(result)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
