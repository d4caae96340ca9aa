//! Route gate. A pure function of the session snapshot; the routing layer turns
//! the decision into a spinner, a redirect or the protected view.

use serde::{Deserialize, Serialize};

use super::permission::Permission;
use super::session::SessionSnapshot;

pub const LOGIN_PATH: &str = "/login";
pub const ACCESS_DENIED_PATH: &str = "/access-denied";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum AccessDecision {
    /// Session still initializing; show a loading state, do not redirect.
    Pending,
    Allow,
    /// `from` is the location to return to after login.
    RedirectToLogin { from: String },
    RedirectToForbidden,
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool { matches!(self, AccessDecision::Allow) }

    pub fn redirect_target(&self) -> Option<&'static str> {
        match self {
            AccessDecision::RedirectToLogin { .. } => Some(LOGIN_PATH),
            AccessDecision::RedirectToForbidden => Some(ACCESS_DENIED_PATH),
            AccessDecision::Pending | AccessDecision::Allow => None,
        }
    }
}

/// Rules, first match wins: loading, anonymous, missing permission, allow.
pub fn can_access(session: &SessionSnapshot, required: Option<Permission>, requested_location: &str) -> AccessDecision {
    if session.loading {
        return AccessDecision::Pending;
    }
    if !session.is_authenticated() {
        return AccessDecision::RedirectToLogin { from: requested_location.to_string() };
    }
    match required {
        Some(p) if !session.has_permission(p) => AccessDecision::RedirectToForbidden,
        _ => AccessDecision::Allow,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{PublicUser, Role};

    fn user(role: Role) -> PublicUser {
        PublicUser {
            id: "u-1".into(),
            username: "alice".into(),
            email: "alice@example.com".into(),
            role,
            created_at: chrono::Utc::now(),
            is_email_verified: true,
        }
    }

    #[test]
    fn loading_is_pending_even_without_requirement() {
        let s = SessionSnapshot { user: None, loading: true };
        assert_eq!(can_access(&s, None, "/admin"), AccessDecision::Pending);
        assert_eq!(can_access(&s, Some(Permission::ManageUsers), "/admin"), AccessDecision::Pending);
        let s = SessionSnapshot { user: Some(user(Role::Admin)), loading: true };
        assert_eq!(can_access(&s, None, "/admin"), AccessDecision::Pending);
    }

    #[test]
    fn anonymous_redirects_to_login_with_origin() {
        let d = can_access(&SessionSnapshot::anonymous(), Some(Permission::ViewObject), "/admin/objects?page=2");
        assert_eq!(d, AccessDecision::RedirectToLogin { from: "/admin/objects?page=2".into() });
        assert_eq!(d.redirect_target(), Some(LOGIN_PATH));
        assert!(matches!(can_access(&SessionSnapshot::anonymous(), None, "/"), AccessDecision::RedirectToLogin { .. }));
    }

    #[test]
    fn missing_permission_is_forbidden() {
        let s = SessionSnapshot::signed_in(user(Role::Reader));
        let d = can_access(&s, Some(Permission::EditObject), "/admin/objects");
        assert_eq!(d, AccessDecision::RedirectToForbidden);
        assert_eq!(d.redirect_target(), Some(ACCESS_DENIED_PATH));
    }

    #[test]
    fn held_or_absent_requirement_allows() {
        let s = SessionSnapshot::signed_in(user(Role::Researcher));
        assert!(can_access(&s, Some(Permission::EditObject), "/admin/objects").is_allowed());
        assert!(can_access(&s, None, "/profile").is_allowed());
        assert_eq!(can_access(&s, None, "/profile").redirect_target(), None);
    }

    #[test]
    fn admin_passes_every_requirement() {
        let s = SessionSnapshot::signed_in(user(Role::Admin));
        for &p in Permission::all() {
            assert!(can_access(&s, Some(p), "/admin").is_allowed(), "{}", p);
        }
    }

    #[test]
    fn decision_serializes_with_tag() {
        let v = serde_json::to_value(AccessDecision::RedirectToLogin { from: "/x".into() }).unwrap();
        assert_eq!(v, serde_json::json!({"decision": "redirect_to_login", "from": "/x"}));
    }
}
