//! Session manager: the single current-user slot and the transitions that fill or
//! clear it. It is an owned context object; callers hold it (usually in an `Arc`)
//! and pass it to whatever needs `is_authenticated` / `has_permission`.
//!
//! State machine: Anonymous -> Authenticating -> Authenticated, and
//! Authenticated -> Anonymous on logout. `Authenticating` is reported while any
//! operation is in flight and before `restore_session` has run.

use std::sync::{Arc, Weak};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::config::AuthSettings;
use crate::error::{AuthError, AuthOutcome, AuthResult};
use crate::security::{self, Argon2Verifier, CredentialVerifier};
use crate::storage::{self, SharedKv, StorageKeys};
use crate::tprintln;

use super::authorizer::{can_access, AccessDecision};
use super::permission::{permissions_for, Permission, Role};
use super::roles::RoleCatalog;
use super::user::{NewUser, PublicUser, User};
use super::user_store::UserStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    Authenticating,
    Authenticated(PublicUser),
}

/// Point-in-time view of the session, handed to the route gate.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionSnapshot {
    pub user: Option<PublicUser>,
    pub loading: bool,
}

impl SessionSnapshot {
    pub fn anonymous() -> Self { Self { user: None, loading: false } }

    pub fn signed_in(user: PublicUser) -> Self { Self { user: Some(user), loading: false } }

    pub fn is_authenticated(&self) -> bool { self.user.is_some() }

    pub fn has_permission(&self, p: Permission) -> bool {
        self.user.as_ref().map(|u| permissions_for(u.role).contains(p)).unwrap_or(false)
    }
}

/// Result of a successful registration. The account is not signed in; the caller
/// delivers the token (e.g. by mail) and the user confirms via `verify_email`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub user: PublicUser,
    pub verification_token: String,
}

impl Registration {
    /// Relative link for the verification page.
    pub fn verification_path(&self) -> String {
        format!("/verify-email?token={}", self.verification_token)
    }
}

#[derive(Debug, Default)]
struct Slot {
    user: Option<PublicUser>,
    in_flight: usize,
    restored: bool,
}

/// Marks the slot as loading for its lifetime; cleared on drop, including early returns.
struct LoadingGuard<'a> {
    slot: &'a RwLock<Slot>,
}

impl<'a> LoadingGuard<'a> {
    fn enter(slot: &'a RwLock<Slot>) -> Self {
        slot.write().in_flight += 1;
        Self { slot }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        let mut s = self.slot.write();
        s.in_flight = s.in_flight.saturating_sub(1);
    }
}

pub struct SessionManager {
    users: UserStore,
    kv: SharedKv,
    keys: StorageKeys,
    verifier: Arc<dyn CredentialVerifier>,
    settings: AuthSettings,
    slot: Arc<RwLock<Slot>>,
    /// Held for a whole registration so the first-user check and the insert are one step.
    register_lock: tokio::sync::Mutex<()>,
}

impl SessionManager {
    /// Build a manager over `kv` with an Argon2 verifier from `settings.hashing`.
    /// The session is not restored yet; call `restore_session` once at startup.
    pub fn new(kv: SharedKv, settings: AuthSettings) -> AuthResult<Self> {
        let verifier = Argon2Verifier::new(&settings.hashing)?;
        Ok(Self::with_verifier(kv, settings, Arc::new(verifier)))
    }

    pub fn with_verifier(kv: SharedKv, settings: AuthSettings, verifier: Arc<dyn CredentialVerifier>) -> Self {
        let keys = StorageKeys::with_prefix(&settings.key_prefix);
        let users = UserStore::new(kv.clone(), keys.clone());
        let slot = Arc::new(RwLock::new(Slot::default()));
        users.subscribe_role_changes(refresh_on_role_change(Arc::downgrade(&slot), kv.clone(), keys.clone()));
        Self {
            users,
            kv,
            keys,
            verifier,
            settings,
            slot,
            register_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Open the configured storage backend, build the manager and restore the session.
    pub fn open(settings: AuthSettings) -> AuthResult<Self> {
        let kv = settings.storage.open().map_err(|e| AuthError::Storage(e.to_string()))?;
        let sm = Self::new(kv, settings)?;
        sm.restore_session();
        Ok(sm)
    }

    pub fn settings(&self) -> &AuthSettings { &self.settings }

    /// The backing store. Role changes made through it refresh this session too.
    pub fn user_store(&self) -> &UserStore { &self.users }

    /// Role catalog over the same storage.
    pub fn role_catalog(&self) -> RoleCatalog { RoleCatalog::new(self.kv.clone(), self.keys.clone()) }

    // ---- session state ----

    pub fn is_loading(&self) -> bool {
        let s = self.slot.read();
        s.in_flight > 0 || !s.restored
    }

    pub fn is_authenticated(&self) -> bool { self.slot.read().user.is_some() }

    pub fn current_user(&self) -> Option<PublicUser> { self.slot.read().user.clone() }

    pub fn state(&self) -> SessionState {
        let s = self.slot.read();
        if s.in_flight > 0 || !s.restored {
            SessionState::Authenticating
        } else if let Some(u) = &s.user {
            SessionState::Authenticated(u.clone())
        } else {
            SessionState::Anonymous
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let s = self.slot.read();
        SessionSnapshot { user: s.user.clone(), loading: s.in_flight > 0 || !s.restored }
    }

    /// False when anonymous; otherwise the catalog decides for the session role.
    pub fn has_permission(&self, permission: Permission) -> bool {
        match &self.slot.read().user {
            Some(u) => permissions_for(u.role).contains(permission),
            None => false,
        }
    }

    /// Route gate against the current snapshot.
    pub fn can_access(&self, required: Option<Permission>, requested_location: &str) -> AccessDecision {
        can_access(&self.snapshot(), required, requested_location)
    }

    // ---- transitions ----

    /// Read the persisted session. A parseable record is installed without its secret;
    /// if the user still exists in the store, the stored record wins so role changes
    /// made elsewhere are picked up. Anything corrupt is discarded. Never fails.
    pub fn restore_session(&self) {
        let persisted: Option<User> = storage::load_json_or_quarantine(&*self.kv, &self.keys, &self.keys.current_user);
        let user = persisted.map(|p| self.users.find_by_id(&p.id).unwrap_or(p));
        let mut s = self.slot.write();
        s.user = user.as_ref().map(PublicUser::from);
        s.restored = true;
        match &s.user {
            Some(u) => info!(target: "sce::auth", "session restored id={} role={}", u.id, u.role),
            None => debug!(target: "sce::auth", "no session to restore"),
        }
    }

    /// Register a new account. The first account in an empty store, or the configured
    /// bootstrap email, becomes ADMIN; everyone else starts as READER. Does not sign in.
    /// Overlapping calls on one manager run one at a time, so only one can be first.
    pub async fn register(&self, username: &str, email: &str, password: &str) -> AuthResult<Registration> {
        let _loading = LoadingGuard::enter(&self.slot);
        let _serial = self.register_lock.lock().await;
        if self.users.find_by_email(email).is_some() {
            warn!(target: "sce::auth", "register rejected: email already registered");
            return Err(AuthError::EmailAlreadyExists { email: email.to_string() });
        }
        if password.is_empty() {
            return Err(AuthError::InvalidInput { field: "password", reason: "must not be empty".into() });
        }
        let secret = self.hash_secret(password).await?;
        let token = security::random_token(self.settings.verification_token_bytes)?;
        let role = if self.users.is_empty() || self.settings.is_bootstrap_admin(email) {
            Role::Admin
        } else {
            Role::Reader
        };
        let user = self.users.create(NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password_secret: secret,
            role,
            is_email_verified: false,
            verification_token: Some(token.clone()),
        })?;
        tprintln!("session.register id={} role={}", user.id, user.role);
        Ok(Registration { user: user.to_public(), verification_token: token })
    }

    /// Sign in. Checks run in order: known email, password, verified email.
    pub async fn login(&self, email: &str, password: &str) -> AuthResult<PublicUser> {
        let _loading = LoadingGuard::enter(&self.slot);
        let Some(user) = self.users.find_by_email(email) else {
            debug!(target: "sce::auth", "login failed: unknown email");
            return Err(AuthError::UserNotFound { email: email.to_string() });
        };
        if !self.verify_secret(&user.password_secret, password).await? {
            warn!(target: "sce::auth", "login failed: bad credentials id={}", user.id);
            return Err(AuthError::InvalidCredentials);
        }
        if !user.is_email_verified {
            debug!(target: "sce::auth", "login refused: email not verified id={}", user.id);
            return Err(AuthError::EmailNotVerified { email: user.email });
        }
        // Persist first so a failed write never leaves a session that will not survive restart.
        storage::store_json(&*self.kv, &self.keys.current_user, &user)?;
        let public = user.to_public();
        self.slot.write().user = Some(public.clone());
        info!(target: "sce::auth", "login id={} role={}", public.id, public.role);
        Ok(public)
    }

    /// Clear the session and its persisted copy. No-op when already anonymous.
    pub fn logout(&self) {
        let previous = self.slot.write().user.take();
        if let Err(e) = storage::remove_key(&*self.kv, &self.keys.current_user) {
            warn!(target: "sce::auth", "logout: {}", e);
        }
        if let Some(u) = previous {
            info!(target: "sce::auth", "logout id={}", u.id);
        }
    }

    /// True the first time a token is presented, false for unknown or spent tokens.
    pub async fn verify_email(&self, token: &str) -> bool {
        let _loading = LoadingGuard::enter(&self.slot);
        match self.users.verify_token(token) {
            Ok(found) => found.is_some(),
            Err(e) => {
                warn!(target: "sce::auth", "verify_email: {}", e);
                false
            }
        }
    }

    // ---- user administration surface ----

    pub fn get_user_by_id(&self, id: &str) -> Option<PublicUser> {
        self.users.find_by_id(id).map(|u| u.to_public())
    }

    pub fn get_all_users(&self) -> Vec<PublicUser> { self.users.list_all() }

    /// Change a user's role. When the target is the signed-in user, the cached
    /// session and its persisted copy are refreshed through the store's role hook.
    pub fn update_user_role(&self, user_id: &str, role: Role) -> bool {
        self.users.update_role(user_id, role)
    }

    // ---- outcome adapters for form collaborators ----

    pub async fn login_outcome(&self, email: &str, password: &str) -> AuthOutcome {
        AuthOutcome::from(&self.login(email, password).await)
    }

    pub async fn register_outcome(&self, username: &str, email: &str, password: &str) -> AuthOutcome {
        match self.register(username, email, password).await {
            Ok(_) => AuthOutcome::ok_with("Registration successful. Check your email to confirm your address."),
            Err(e) => AuthOutcome::failed(&e),
        }
    }

    // ---- credential work off the async executor ----

    async fn hash_secret(&self, password: &str) -> AuthResult<String> {
        let verifier = Arc::clone(&self.verifier);
        let password = password.to_string();
        tokio::task::spawn_blocking(move || verifier.hash(&password))
            .await
            .map_err(|e| AuthError::Internal(format!("hashing task failed: {}", e)))?
            .map_err(AuthError::from)
    }

    async fn verify_secret(&self, secret: &str, password: &str) -> AuthResult<bool> {
        let verifier = Arc::clone(&self.verifier);
        let (secret, password) = (secret.to_string(), password.to_string());
        tokio::task::spawn_blocking(move || verifier.verify(&secret, &password))
            .await
            .map_err(|e| AuthError::Internal(format!("verification task failed: {}", e)))
    }
}

/// Role-change subscriber: keeps the signed-in user's cached role and persisted
/// session in step with the store. Holds the slot weakly so the store does not
/// keep a dropped manager alive.
fn refresh_on_role_change(slot: Weak<RwLock<Slot>>, kv: SharedKv, keys: StorageKeys) -> impl Fn(&User) + Send + Sync + 'static {
    move |updated: &User| {
        let Some(slot) = slot.upgrade() else { return };
        let mut s = slot.write();
        let Some(current) = s.user.as_mut().filter(|u| u.id == updated.id) else { return };
        current.role = updated.role;
        if let Err(e) = storage::store_json(&*kv, &keys.current_user, updated) {
            warn!(target: "sce::auth", "could not refresh persisted session: {}", e);
        }
        debug!(target: "sce::auth", "session role refreshed id={} role={}", updated.id, updated.role);
    }
}
