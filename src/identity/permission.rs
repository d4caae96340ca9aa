use std::collections::BTreeSet;
use std::fmt;
use serde::{Deserialize, Serialize};

/// Capability atoms checked before a view or a state-changing action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    CreateObject,
    EditObject,
    DeleteObject,
    ViewObject,
    CreatePost,
    EditPost,
    DeletePost,
    ViewPost,
    ManageUsers,
    ManageRoles,
}

impl Permission {
    pub const fn all() -> &'static [Permission] {
        &[
            Permission::CreateObject,
            Permission::EditObject,
            Permission::DeleteObject,
            Permission::ViewObject,
            Permission::CreatePost,
            Permission::EditPost,
            Permission::DeletePost,
            Permission::ViewPost,
            Permission::ManageUsers,
            Permission::ManageRoles,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::CreateObject => "CREATE_OBJECT",
            Permission::EditObject => "EDIT_OBJECT",
            Permission::DeleteObject => "DELETE_OBJECT",
            Permission::ViewObject => "VIEW_OBJECT",
            Permission::CreatePost => "CREATE_POST",
            Permission::EditPost => "EDIT_POST",
            Permission::DeletePost => "DELETE_POST",
            Permission::ViewPost => "VIEW_POST",
            Permission::ManageUsers => "MANAGE_USERS",
            Permission::ManageRoles => "MANAGE_ROLES",
        }
    }

    /// Case-insensitive parse of the wire name.
    pub fn parse(s: &str) -> Option<Self> {
        let upper = s.trim().to_ascii_uppercase();
        Permission::all().iter().copied().find(|p| p.as_str() == upper)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Fixed role enumeration. Each role maps to a static permission set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Researcher,
    Agent,
    Security,
    Doctor,
    Reader,
}

impl Role {
    pub const fn all() -> &'static [Role] {
        &[Role::Admin, Role::Researcher, Role::Agent, Role::Security, Role::Doctor, Role::Reader]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Researcher => "RESEARCHER",
            Role::Agent => "AGENT",
            Role::Security => "SECURITY",
            Role::Doctor => "DOCTOR",
            Role::Reader => "READER",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let upper = s.trim().to_ascii_uppercase();
        Role::all().iter().copied().find(|r| r.as_str() == upper)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Ordered set of permissions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeSet<Permission>);

impl PermissionSet {
    pub fn empty() -> Self { Self::default() }

    pub fn full() -> Self { Permission::all().iter().copied().collect() }

    pub fn contains(&self, p: Permission) -> bool { self.0.contains(&p) }

    pub fn contains_all(&self, ps: &[Permission]) -> bool { ps.iter().all(|p| self.0.contains(p)) }

    pub fn contains_any(&self, ps: &[Permission]) -> bool { ps.iter().any(|p| self.0.contains(p)) }

    pub fn is_subset(&self, other: &PermissionSet) -> bool { self.0.is_subset(&other.0) }

    pub fn len(&self) -> usize { self.0.len() }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = Permission> + '_ { self.0.iter().copied() }

    pub fn to_vec(&self) -> Vec<Permission> { self.iter().collect() }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self { Self(iter.into_iter().collect()) }
}

/// Static, total role → permission mapping. ADMIN holds every permission.
pub fn permissions_for(role: Role) -> PermissionSet {
    use Permission::*;
    match role {
        Role::Admin => PermissionSet::full(),
        Role::Researcher => [ViewObject, CreateObject, EditObject, ViewPost, CreatePost, EditPost].into_iter().collect(),
        Role::Agent => [ViewObject, ViewPost, CreatePost].into_iter().collect(),
        Role::Security => [ViewObject, ViewPost].into_iter().collect(),
        Role::Doctor => [ViewObject, ViewPost, CreatePost].into_iter().collect(),
        Role::Reader => [ViewObject, ViewPost].into_iter().collect(),
    }
}

/// Resolve a raw role name. Unrecognized names get no permissions.
pub fn permissions_for_name(role: &str) -> PermissionSet {
    Role::parse(role).map(permissions_for).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_holds_full_enumeration() {
        let admin = permissions_for(Role::Admin);
        assert_eq!(admin.len(), Permission::all().len());
        assert!(admin.contains_all(Permission::all()));
    }

    #[test]
    fn every_role_is_nonempty_subset_of_full() {
        let full = PermissionSet::full();
        for &r in Role::all() {
            let set = permissions_for(r);
            assert!(!set.is_empty(), "{} has no permissions", r);
            assert!(set.is_subset(&full));
        }
    }

    #[test]
    fn documented_subsets() {
        use Permission::*;
        assert_eq!(
            permissions_for(Role::Researcher).to_vec(),
            vec![CreateObject, EditObject, ViewObject, CreatePost, EditPost, ViewPost]
        );
        assert_eq!(permissions_for(Role::Agent).to_vec(), vec![ViewObject, CreatePost, ViewPost]);
        assert_eq!(permissions_for(Role::Doctor), permissions_for(Role::Agent));
        assert_eq!(permissions_for(Role::Security).to_vec(), vec![ViewObject, ViewPost]);
        assert_eq!(permissions_for(Role::Reader), permissions_for(Role::Security));
    }

    #[test]
    fn only_admin_manages_users_and_roles() {
        for &r in Role::all() {
            let set = permissions_for(r);
            let manages = set.contains_any(&[Permission::ManageUsers, Permission::ManageRoles]);
            assert_eq!(manages, r == Role::Admin, "{}", r);
        }
    }

    #[test]
    fn unknown_role_name_fails_closed() {
        assert!(permissions_for_name("SUPERADMIN").is_empty());
        assert!(permissions_for_name("").is_empty());
        assert_eq!(permissions_for_name("researcher"), permissions_for(Role::Researcher));
    }

    #[test]
    fn wire_names_roundtrip_through_serde() {
        assert_eq!(serde_json::to_string(&Permission::ManageRoles).unwrap(), "\"MANAGE_ROLES\"");
        assert_eq!(serde_json::to_string(&Role::Researcher).unwrap(), "\"RESEARCHER\"");
        for &p in Permission::all() {
            assert_eq!(Permission::parse(&p.to_string()), Some(p));
            let s = serde_json::to_string(&p).unwrap();
            assert_eq!(s, format!("\"{}\"", p.as_str()));
        }
        assert!(serde_json::from_str::<Role>("\"ROOT\"").is_err());
    }
}
