//! Persisted role catalog: named permission bundles shown on the role admin page.
//! Four reserved seed roles always exist; custom roles can be added, edited and
//! removed. Authorization itself goes through the static `permissions_for` table,
//! so editing a record here never widens what a user's fixed `Role` grants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{AuthError, AuthResult};
use crate::storage::{self, SharedKv, StorageKeys};

use super::permission::{permissions_for, Permission, Role};

pub const RESERVED_ROLE_IDS: [&str; 4] = ["role-admin", "role-researcher", "role-agent", "role-reader"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub permissions: Vec<Permission>,
    pub created_at: DateTime<Utc>,
}

impl RoleRecord {
    pub fn is_reserved(&self) -> bool { is_reserved(&self.id) }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRole {
    pub name: String,
    pub description: String,
    pub permissions: Vec<Permission>,
}

/// Partial update; `None` leaves the field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub permissions: Option<Vec<Permission>>,
}

pub fn is_reserved(id: &str) -> bool { RESERVED_ROLE_IDS.contains(&id) }

fn seed(id: &str, name: &str, description: &str, role: Role, now: DateTime<Utc>) -> RoleRecord {
    RoleRecord {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        permissions: permissions_for(role).to_vec(),
        created_at: now,
    }
}

fn seeds() -> Vec<RoleRecord> {
    let now = Utc::now();
    vec![
        seed("role-admin", "Administrator", "Full access to every part of the system", Role::Admin, now),
        seed("role-researcher", "Researcher", "Creates and edits object records and posts", Role::Researcher, now),
        seed("role-agent", "Agent", "Views object records and files reports", Role::Agent, now),
        seed("role-reader", "Reader", "Read-only access", Role::Reader, now),
    ]
}

fn normalized(mut permissions: Vec<Permission>) -> Vec<Permission> {
    permissions.sort();
    permissions.dedup();
    permissions
}

fn check_name(name: &str) -> AuthResult<()> {
    if name.trim().is_empty() {
        return Err(AuthError::InvalidInput { field: "name", reason: "must not be empty".into() });
    }
    Ok(())
}

#[derive(Clone)]
pub struct RoleCatalog {
    kv: SharedKv,
    keys: StorageKeys,
}

impl RoleCatalog {
    pub fn new(kv: SharedKv, keys: StorageKeys) -> Self { Self { kv, keys } }

    /// Read the collection, restoring any reserved role that is missing.
    /// An absent or corrupt key yields exactly the seed set.
    pub fn load(&self) -> Vec<RoleRecord> {
        let mut roles: Vec<RoleRecord> = storage::load_records(&*self.kv, &self.keys, &self.keys.roles);
        let missing: Vec<RoleRecord> = seeds().into_iter().filter(|s| !roles.iter().any(|r| r.id == s.id)).collect();
        if !missing.is_empty() {
            debug!(target: "sce::roles", "seeding {} reserved role(s)", missing.len());
            // Reserved roles lead the list, in seed order.
            let mut merged = missing;
            merged.append(&mut roles);
            merged.sort_by_key(|r| RESERVED_ROLE_IDS.iter().position(|id| *id == r.id).unwrap_or(usize::MAX));
            roles = merged;
            if let Err(e) = self.save(&roles) {
                warn!(target: "sce::roles", "could not persist seeded roles: {}", e);
            }
        }
        roles
    }

    fn save(&self, roles: &[RoleRecord]) -> AuthResult<()> {
        storage::store_json(&*self.kv, &self.keys.roles, roles)
    }

    pub fn list(&self) -> Vec<RoleRecord> { self.load() }

    pub fn get(&self, id: &str) -> Option<RoleRecord> {
        self.load().into_iter().find(|r| r.id == id)
    }

    pub fn create(&self, new: NewRole) -> AuthResult<RoleRecord> {
        check_name(&new.name)?;
        let mut roles = self.load();
        let record = RoleRecord {
            id: format!("role-{}", uuid::Uuid::new_v4()),
            name: new.name.trim().to_string(),
            description: new.description,
            permissions: normalized(new.permissions),
            created_at: Utc::now(),
        };
        roles.push(record.clone());
        self.save(&roles)?;
        info!(target: "sce::roles", "role created id={} permissions={}", record.id, record.permissions.len());
        Ok(record)
    }

    /// Apply `changes` to role `id`. `Ok(None)` if no such role.
    pub fn update(&self, id: &str, changes: RoleUpdate) -> AuthResult<Option<RoleRecord>> {
        if let Some(name) = &changes.name {
            check_name(name)?;
        }
        let mut roles = self.load();
        let Some(role) = roles.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };
        if let Some(name) = changes.name { role.name = name.trim().to_string(); }
        if let Some(description) = changes.description { role.description = description; }
        if let Some(permissions) = changes.permissions { role.permissions = normalized(permissions); }
        let updated = role.clone();
        self.save(&roles)?;
        info!(target: "sce::roles", "role updated id={}", id);
        Ok(Some(updated))
    }

    /// Remove a custom role. Reserved ids are refused; unknown ids return false.
    pub fn delete(&self, id: &str) -> AuthResult<bool> {
        if is_reserved(id) {
            warn!(target: "sce::roles", "refused to delete reserved role {}", id);
            return Err(AuthError::ReservedRoleDeletion { id: id.to_string() });
        }
        let mut roles = self.load();
        let before = roles.len();
        roles.retain(|r| r.id != id);
        if roles.len() == before {
            return Ok(false);
        }
        self.save(&roles)?;
        info!(target: "sce::roles", "role deleted id={}", id);
        Ok(true)
    }

    /// Like `get`, but a missing id is an error.
    pub fn require(&self, id: &str) -> AuthResult<RoleRecord> {
        self.get(id).ok_or_else(|| AuthError::RoleNotFound { id: id.to_string() })
    }
}
