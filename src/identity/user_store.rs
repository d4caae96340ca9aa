use std::sync::Arc;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::error::{AuthError, AuthResult};
use crate::storage::{self, SharedKv, StorageKeys};
use crate::tprintln;

use super::permission::Role;
use super::user::{normalize_email, NewUser, PublicUser, User};

/// Called with the updated record after a role change has been persisted.
pub type RoleChangeHook = Arc<dyn Fn(&User) + Send + Sync>;

/// CRUD over the persisted `users` collection.
///
/// Every call reads the collection through the storage boundary, so a write made by
/// one call is what the next call sees. Malformed records are quarantined on read.
/// Clones share their role-change subscribers.
#[derive(Clone)]
pub struct UserStore {
    kv: SharedKv,
    keys: StorageKeys,
    role_hooks: Arc<RwLock<Vec<RoleChangeHook>>>,
}

impl UserStore {
    pub fn new(kv: SharedKv, keys: StorageKeys) -> Self {
        Self { kv, keys, role_hooks: Arc::new(RwLock::new(Vec::new())) }
    }

    /// Register `hook` to run after every successful role update on this store or its clones.
    pub fn subscribe_role_changes<F>(&self, hook: F)
    where
        F: Fn(&User) + Send + Sync + 'static,
    {
        self.role_hooks.write().push(Arc::new(hook));
    }

    fn notify_role_change(&self, user: &User) {
        // Snapshot so a hook may subscribe without deadlocking.
        let hooks: Vec<RoleChangeHook> = self.role_hooks.read().clone();
        for hook in hooks {
            hook(user);
        }
    }

    fn load(&self) -> Vec<User> {
        storage::load_records(&*self.kv, &self.keys, &self.keys.users)
    }

    fn save(&self, users: &[User]) -> AuthResult<()> {
        storage::store_json(&*self.kv, &self.keys.users, users)
    }

    pub fn len(&self) -> usize { self.load().len() }

    pub fn is_empty(&self) -> bool { self.load().is_empty() }

    pub fn find_by_email(&self, email: &str) -> Option<User> {
        let key = normalize_email(email);
        if key.is_empty() { return None; }
        self.load().into_iter().find(|u| normalize_email(&u.email) == key)
    }

    pub fn find_by_id(&self, id: &str) -> Option<User> {
        self.load().into_iter().find(|u| u.id == id)
    }

    /// Insert a new user with a fresh id and `created_at`. Emails are unique
    /// case-insensitively; a duplicate is rejected, never overwritten.
    pub fn create(&self, new: NewUser) -> AuthResult<User> {
        if normalize_email(&new.email).is_empty() {
            return Err(AuthError::InvalidInput { field: "email", reason: "must not be empty".into() });
        }
        if new.is_email_verified && new.verification_token.is_some() {
            return Err(AuthError::InvalidInput {
                field: "verification_token",
                reason: "a verified user cannot carry a token".into(),
            });
        }
        let mut users = self.load();
        if users.iter().any(|u| u.email_matches(&new.email)) {
            return Err(AuthError::EmailAlreadyExists { email: new.email });
        }
        let mut id = uuid::Uuid::new_v4().to_string();
        while users.iter().any(|u| u.id == id) {
            id = uuid::Uuid::new_v4().to_string();
        }
        let user = User {
            id,
            username: new.username,
            email: new.email,
            password_secret: new.password_secret,
            role: new.role,
            created_at: chrono::Utc::now(),
            is_email_verified: new.is_email_verified,
            verification_token: new.verification_token,
        };
        users.push(user.clone());
        self.save(&users)?;
        info!(target: "sce::auth", "user created id={} role={} total={}", user.id, user.role, users.len());
        Ok(user)
    }

    /// Typed variant of `update_role`.
    pub fn try_update_role(&self, id: &str, role: Role) -> AuthResult<User> {
        let mut users = self.load();
        let Some(user) = users.iter_mut().find(|u| u.id == id) else {
            return Err(AuthError::RoleUpdateTargetMissing { id: id.to_string() });
        };
        let previous = user.role;
        user.role = role;
        let updated = user.clone();
        self.save(&users)?;
        info!(target: "sce::auth", "role changed id={} {} -> {}", id, previous, role);
        self.notify_role_change(&updated);
        Ok(updated)
    }

    /// False if no user has `id` or the write failed.
    pub fn update_role(&self, id: &str, role: Role) -> bool {
        match self.try_update_role(id, role) {
            Ok(_) => true,
            Err(AuthError::RoleUpdateTargetMissing { .. }) => {
                debug!(target: "sce::auth", "update_role: no user id={}", id);
                false
            }
            Err(e) => {
                warn!(target: "sce::auth", "update_role id={} failed: {}", id, e);
                false
            }
        }
    }

    /// Every user in insertion order, secrets stripped.
    pub fn list_all(&self) -> Vec<PublicUser> {
        self.load().iter().map(PublicUser::from).collect()
    }

    /// Mark the user holding `token` as verified and clear the token.
    /// Returns the updated record, or None if no user holds it.
    pub fn verify_token(&self, token: &str) -> AuthResult<Option<User>> {
        if token.is_empty() { return Ok(None); }
        let mut users = self.load();
        let Some(user) = users.iter_mut().find(|u| u.verification_token.as_deref() == Some(token)) else {
            tprintln!("user_store.verify_token miss");
            return Ok(None);
        };
        user.is_email_verified = true;
        user.verification_token = None;
        let updated = user.clone();
        self.save(&users)?;
        info!(target: "sce::auth", "email verified id={}", updated.id);
        Ok(Some(updated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::storage::{KeyValueStore, MemoryStore};

    fn store() -> (UserStore, Arc<MemoryStore>) {
        let kv = Arc::new(MemoryStore::new());
        (UserStore::new(kv.clone(), StorageKeys::default()), kv)
    }

    fn new_user(email: &str) -> NewUser {
        NewUser {
            username: email.split('@').next().unwrap_or_default().to_string(),
            email: email.to_string(),
            password_secret: "$argon2id$stub".into(),
            role: Role::Reader,
            is_email_verified: false,
            verification_token: Some(format!("tok-{}", email)),
        }
    }

    #[test]
    fn create_then_find_by_id_roundtrip() {
        let (s, _) = store();
        let input = new_user("carol@example.com");
        let created = s.create(input.clone()).unwrap();
        let found = s.find_by_id(&created.id).unwrap();
        assert_eq!(found, created);
        assert_eq!(found.username, input.username);
        assert_eq!(found.email, input.email);
        assert_eq!(found.password_secret, input.password_secret);
        assert_eq!(found.role, input.role);
        assert_eq!(found.is_email_verified, input.is_email_verified);
        assert_eq!(found.verification_token, input.verification_token);
        assert!(!found.id.is_empty());
    }

    #[test]
    fn duplicate_email_rejected_case_insensitively() {
        let (s, _) = store();
        s.create(new_user("dave@example.com")).unwrap();
        let err = s.create(new_user("DAVE@Example.com")).unwrap_err();
        assert_eq!(err.code(), "email_already_exists");
        assert_eq!(s.len(), 1);
        assert!(s.find_by_email("Dave@EXAMPLE.com").is_some());
    }

    #[test]
    fn empty_email_rejected() {
        let (s, _) = store();
        let err = s.create(new_user("   ")).unwrap_err();
        assert_eq!(err.code(), "invalid_input");
        assert!(s.is_empty());
    }

    #[test]
    fn list_preserves_insertion_order_and_strips_secrets() {
        let (s, _) = store();
        for e in ["z@x.com", "a@x.com", "m@x.com"] {
            s.create(new_user(e)).unwrap();
        }
        let emails: Vec<String> = s.list_all().into_iter().map(|u| u.email).collect();
        assert_eq!(emails, vec!["z@x.com", "a@x.com", "m@x.com"]);
        let v = serde_json::to_value(s.list_all()).unwrap();
        assert!(v[0].get("passwordSecret").is_none());
    }

    #[test]
    fn update_role_missing_target_returns_false() {
        let (s, _) = store();
        assert!(!s.update_role("ghost", Role::Admin));
        match s.try_update_role("ghost", Role::Admin) {
            Err(AuthError::RoleUpdateTargetMissing { id }) => assert_eq!(id, "ghost"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn update_role_is_visible_to_next_read() {
        let (s, _) = store();
        let u = s.create(new_user("erin@example.com")).unwrap();
        assert!(s.update_role(&u.id, Role::Doctor));
        assert_eq!(s.find_by_id(&u.id).unwrap().role, Role::Doctor);
    }

    #[test]
    fn role_hooks_fire_after_persisted_update_only() {
        let (s, _) = store();
        let u = s.create(new_user("hank@example.com")).unwrap();
        let seen: Arc<RwLock<Vec<(String, Role)>>> = Arc::default();
        let sink = seen.clone();
        s.clone().subscribe_role_changes(move |user| sink.write().push((user.id.clone(), user.role)));

        assert!(s.update_role(&u.id, Role::Agent));
        assert!(!s.update_role("ghost", Role::Admin));
        assert_eq!(*seen.read(), vec![(u.id.clone(), Role::Agent)]);
    }

    #[test]
    fn verify_token_is_one_shot() {
        let (s, _) = store();
        let u = s.create(new_user("finn@example.com")).unwrap();
        let token = u.verification_token.clone().unwrap();
        let v = s.verify_token(&token).unwrap().unwrap();
        assert!(v.is_email_verified);
        assert!(v.verification_token.is_none());
        assert!(s.verify_token(&token).unwrap().is_none());
        assert!(s.verify_token("").unwrap().is_none());
    }

    #[test]
    fn corrupt_collection_reads_as_empty_and_recovers() {
        let (s, kv) = store();
        kv.set("sce_users", "not json at all".into()).unwrap();
        assert!(s.is_empty());
        assert!(s.find_by_email("x@y.z").is_none());
        let u = s.create(new_user("gail@example.com")).unwrap();
        assert_eq!(s.find_by_id(&u.id).unwrap().email, "gail@example.com");
    }
}
