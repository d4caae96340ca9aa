use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use super::permission::Role;

/// Key used for case-insensitive email comparison: NFKC, then lowercase.
pub fn normalize_email(email: &str) -> String {
    email.trim().nfkc().collect::<String>().to_lowercase()
}

/// Full persisted user record, secret included. Only the user store hands these out
/// inside the crate; everything that leaves goes through `PublicUser`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawUser")]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_secret: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub is_email_verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_token: Option<String>,
}

/// Shape accepted from storage before invariants are checked.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawUser {
    id: String,
    username: String,
    email: String,
    password_secret: String,
    role: Role,
    created_at: DateTime<Utc>,
    is_email_verified: bool,
    #[serde(default)]
    verification_token: Option<String>,
}

impl TryFrom<RawUser> for User {
    type Error = String;

    fn try_from(r: RawUser) -> Result<Self, Self::Error> {
        if r.id.trim().is_empty() { return Err("empty id".into()); }
        if normalize_email(&r.email).is_empty() { return Err(format!("user {} has an empty email", r.id)); }
        if r.is_email_verified && r.verification_token.is_some() {
            return Err(format!("user {} is verified but still carries a verification token", r.id));
        }
        Ok(User {
            id: r.id,
            username: r.username,
            email: r.email,
            password_secret: r.password_secret,
            role: r.role,
            created_at: r.created_at,
            is_email_verified: r.is_email_verified,
            verification_token: r.verification_token,
        })
    }
}

impl User {
    pub fn email_matches(&self, email: &str) -> bool {
        normalize_email(&self.email) == normalize_email(email)
    }

    pub fn to_public(&self) -> PublicUser { PublicUser::from(self) }
}

/// User projection without the secret or verification token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub is_email_verified: bool,
}

impl From<&User> for PublicUser {
    fn from(u: &User) -> Self {
        Self {
            id: u.id.clone(),
            username: u.username.clone(),
            email: u.email.clone(),
            role: u.role,
            created_at: u.created_at,
            is_email_verified: u.is_email_verified,
        }
    }
}

/// Input to `UserStore::create`; the store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_secret: String,
    pub role: Role,
    pub is_email_verified: bool,
    pub verification_token: Option<String>,
}
