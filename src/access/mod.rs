// Role/tenant access control: super-admin → tenant-admin → staff

pub mod guard;
pub mod permissions;
pub mod role;
pub mod tenant_context;

pub use guard::{enforce_last_admin, enforce_new_member, AdminRoster, AdminStanding, GuardError, MembershipChange};
pub use permissions::{get_permissions, Capability, Permissions};
pub use role::{Role, TenantRole};
pub use tenant_context::{AccessError, Session, TenantScope};
