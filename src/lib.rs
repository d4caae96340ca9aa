pub mod config;
pub mod error;
pub mod identity;
pub mod logging;
pub mod security;
pub mod storage;

pub use config::{AuthSettings, StorageBackend, StorageSettings};
pub use error::{AuthError, AuthOutcome, AuthResult};
pub use identity::{
    can_access, permissions_for, permissions_for_name, AccessDecision, NewRole, NewUser,
    Permission, PermissionSet, PublicUser, Registration, Role, RoleCatalog, RoleRecord,
    RoleUpdate, SessionManager, SessionSnapshot, SessionState, User, UserStore,
};
pub use security::{Argon2Verifier, CredentialVerifier};
pub use storage::{FileStore, KeyValueStore, MemoryStore, SharedKv};

// Debug printing helper: prints in test and debug builds and is compiled out otherwise.
// Usage: tprintln!("session.login user={}", id);
#[cfg(any(test, debug_assertions))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ( eprintln!($($arg)*) );
}

// In release builds, provide a no-op tprintln! so calls compile without effect.
#[cfg(not(any(test, debug_assertions)))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ({
        // Preserve formatting checks in release without producing code
        if false { let _ = format!($($arg)*); }
    });
}
