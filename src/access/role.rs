use serde::{Deserialize, Serialize};
use std::fmt;

/// Effective role of a signed-in user.
///
/// Super-admin status lives in its own table; the two tenant roles come from
/// `user_roles` and are always scoped to exactly one venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    TenantAdmin,
    Staff,
}

/// The subset of roles that can be granted inside a venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantRole {
    TenantAdmin,
    Staff,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::SuperAdmin, Role::TenantAdmin, Role::Staff];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::TenantAdmin => "tenant_admin",
            Role::Staff => "staff",
        }
    }

    /// Parse a role string. Unknown or missing values mean "no role".
    pub fn parse(value: Option<&str>) -> Option<Role> {
        match value? {
            "super_admin" => Some(Role::SuperAdmin),
            "tenant_admin" => Some(Role::TenantAdmin),
            "staff" => Some(Role::Staff),
            _ => None,
        }
    }

    pub fn is_super_admin(&self) -> bool {
        matches!(self, Role::SuperAdmin)
    }

    pub fn tenant_role(&self) -> Option<TenantRole> {
        match self {
            Role::SuperAdmin => None,
            Role::TenantAdmin => Some(TenantRole::TenantAdmin),
            Role::Staff => Some(TenantRole::Staff),
        }
    }
}

impl TenantRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantRole::TenantAdmin => "tenant_admin",
            TenantRole::Staff => "staff",
        }
    }

    pub fn parse(value: &str) -> Option<TenantRole> {
        match value {
            "tenant_admin" => Some(TenantRole::TenantAdmin),
            "staff" => Some(TenantRole::Staff),
            _ => None,
        }
    }
}

impl From<TenantRole> for Role {
    fn from(role: TenantRole) -> Self {
        match role {
            TenantRole::TenantAdmin => Role::TenantAdmin,
            TenantRole::Staff => Role::Staff,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for TenantRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_roles_and_rejects_the_rest() {
        for role in Role::ALL {
            assert_eq!(Role::parse(Some(role.as_str())), Some(role));
        }
        assert_eq!(Role::parse(None), None);
        assert_eq!(Role::parse(Some("admin")), None);
        assert_eq!(Role::parse(Some("")), None);
    }

    #[test]
    fn tenant_roles_map_into_roles() {
        assert_eq!(Role::from(TenantRole::TenantAdmin), Role::TenantAdmin);
        assert_eq!(Role::Staff.tenant_role(), Some(TenantRole::Staff));
        assert_eq!(Role::SuperAdmin.tenant_role(), None);
        assert_eq!(TenantRole::parse("super_admin"), None);
    }

    #[test]
    fn serializes_as_snake_case() {
        assert_eq!(serde_json::to_value(Role::TenantAdmin).unwrap(), "tenant_admin");
        let role: TenantRole = serde_json::from_value(serde_json::json!("staff")).unwrap();
        assert_eq!(role, TenantRole::Staff);
    }
}
