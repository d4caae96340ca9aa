/// Centralized key names so every component agrees on where collections live.
/// All keys share the configured prefix, e.g. `sce_users`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKeys {
    pub users: String,
    pub current_user: String,
    pub roles: String,
    pub quarantine: String,
}

impl StorageKeys {
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            users: users_key(prefix),
            current_user: current_user_key(prefix),
            roles: roles_key(prefix),
            quarantine: quarantine_key(prefix),
        }
    }
}

impl Default for StorageKeys {
    fn default() -> Self { Self::with_prefix("sce") }
}

#[inline]
pub fn users_key(prefix: &str) -> String { format!("{}_users", prefix) }

#[inline]
pub fn current_user_key(prefix: &str) -> String { format!("{}_current_user", prefix) }

#[inline]
pub fn roles_key(prefix: &str) -> String { format!("{}_roles", prefix) }

#[inline]
pub fn quarantine_key(prefix: &str) -> String { format!("{}_quarantine", prefix) }
