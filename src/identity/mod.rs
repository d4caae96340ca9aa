//! Identity core: permission catalog, user store, session manager and route gate.
//! Keep the public surface thin and split implementation across sub-modules.

mod permission;
mod user;
mod user_store;
mod session;
mod authorizer;
mod roles;

pub use permission::{permissions_for, permissions_for_name, Permission, PermissionSet, Role};
pub use user::{normalize_email, NewUser, PublicUser, User};
pub use user_store::UserStore;
pub use session::{Registration, SessionManager, SessionSnapshot, SessionState};
pub use authorizer::{can_access, AccessDecision, ACCESS_DENIED_PATH, LOGIN_PATH};
pub use roles::{is_reserved, NewRole, RoleCatalog, RoleRecord, RoleUpdate, RESERVED_ROLE_IDS};
