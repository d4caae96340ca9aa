use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Settings for the access core. Every field has a default so a partial JSON file is enough.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct AuthSettings {
    /// Prefix for every persisted key (`<prefix>_users`, `<prefix>_current_user`, ...).
    #[serde(default = "AuthSettings::default_key_prefix")]
    pub key_prefix: String,
    /// Opt-in bootstrap administrator. Registering with this email assigns ADMIN;
    /// it grants nothing beyond the ADMIN role's normal permission set.
    #[serde(default)]
    pub bootstrap_admin_email: Option<String>,
    /// Random bytes per email verification token (base64url encoded).
    #[serde(default = "AuthSettings::default_token_bytes")]
    pub verification_token_bytes: usize,
    /// Argon2 cost parameters.
    #[serde(default)]
    pub hashing: HashingSettings,
    #[serde(default)]
    pub storage: StorageSettings,
}

impl AuthSettings {
    fn default_key_prefix() -> String { "sce".to_string() }
    fn default_token_bytes() -> usize { 16 }

    /// Load settings from a JSON file. Missing or unreadable files fall back to defaults;
    /// startup never fails because of configuration.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match std::fs::read(path) {
            Ok(bytes) => match serde_json::from_slice::<AuthSettings>(&bytes) {
                Ok(s) => {
                    debug!(target: "sce::config", "loaded settings from '{}'", path.display());
                    s
                }
                Err(e) => {
                    warn!(target: "sce::config", "invalid settings file '{}': {}; using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let bytes = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// True when `email` matches the configured bootstrap administrator (case-insensitive).
    pub fn is_bootstrap_admin(&self, email: &str) -> bool {
        match &self.bootstrap_admin_email {
            Some(b) => crate::identity::normalize_email(b) == crate::identity::normalize_email(email),
            None => false,
        }
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            key_prefix: Self::default_key_prefix(),
            bootstrap_admin_email: None,
            verification_token_bytes: Self::default_token_bytes(),
            hashing: HashingSettings::default(),
            storage: StorageSettings::default(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct HashingSettings {
    #[serde(default = "HashingSettings::default_memory_kib")]
    pub memory_kib: u32,
    #[serde(default = "HashingSettings::default_iterations")]
    pub iterations: u32,
    #[serde(default = "HashingSettings::default_parallelism")]
    pub parallelism: u32,
}

impl HashingSettings {
    // Argon2id defaults recommended by the argon2 crate.
    fn default_memory_kib() -> u32 { 19 * 1024 }
    fn default_iterations() -> u32 { 2 }
    fn default_parallelism() -> u32 { 1 }
}

impl Default for HashingSettings {
    fn default() -> Self {
        Self {
            memory_kib: Self::default_memory_kib(),
            iterations: Self::default_iterations(),
            parallelism: Self::default_parallelism(),
        }
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    File,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct StorageSettings {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Directory for the file backend's snapshot.
    #[serde(default = "StorageSettings::default_dir")]
    pub dir: PathBuf,
}

impl StorageSettings {
    fn default_dir() -> PathBuf { PathBuf::from("sce_data") }

    /// Open the configured backend.
    pub fn open(&self) -> anyhow::Result<crate::storage::SharedKv> {
        let kv: crate::storage::SharedKv = match self.backend {
            StorageBackend::Memory => std::sync::Arc::new(crate::storage::MemoryStore::new()),
            StorageBackend::File => std::sync::Arc::new(crate::storage::FileStore::open(&self.dir)?),
        };
        Ok(kv)
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self { backend: StorageBackend::default(), dir: Self::default_dir() }
    }
}
