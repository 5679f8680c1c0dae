use serde::Serialize;

use super::role::Role;

/// Fixed capability set derived from a role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Permissions {
    pub can_manage_users: bool,
    pub can_manage_menu: bool,
    pub can_manage_tables: bool,
    pub can_view_orders: bool,
    pub can_manage_orders: bool,
    pub can_confirm_payments: bool,
    pub can_manage_bank_details: bool,
    pub can_manage_venue_settings: bool,
    pub can_view_audit_log: bool,
    pub can_manage_tenants: bool,
    pub can_impersonate: bool,
    pub can_manage_feature_flags: bool,
}

/// Named capability, used by handlers to ask for one flag of [`Permissions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    ManageUsers,
    ManageMenu,
    ManageTables,
    ViewOrders,
    ManageOrders,
    ConfirmPayments,
    ManageBankDetails,
    ManageVenueSettings,
    ViewAuditLog,
    ManageTenants,
    Impersonate,
    ManageFeatureFlags,
}

impl Capability {
    pub fn describe(&self) -> &'static str {
        match self {
            Capability::ManageUsers => "manage users",
            Capability::ManageMenu => "manage the menu",
            Capability::ManageTables => "manage tables",
            Capability::ViewOrders => "view orders",
            Capability::ManageOrders => "manage orders",
            Capability::ConfirmPayments => "confirm payments",
            Capability::ManageBankDetails => "manage bank details",
            Capability::ManageVenueSettings => "manage venue settings",
            Capability::ViewAuditLog => "view the audit log",
            Capability::ManageTenants => "manage tenants",
            Capability::Impersonate => "impersonate tenants",
            Capability::ManageFeatureFlags => "manage feature flags",
        }
    }
}

impl Permissions {
    pub fn allows(&self, capability: Capability) -> bool {
        match capability {
            Capability::ManageUsers => self.can_manage_users,
            Capability::ManageMenu => self.can_manage_menu,
            Capability::ManageTables => self.can_manage_tables,
            Capability::ViewOrders => self.can_view_orders,
            Capability::ManageOrders => self.can_manage_orders,
            Capability::ConfirmPayments => self.can_confirm_payments,
            Capability::ManageBankDetails => self.can_manage_bank_details,
            Capability::ManageVenueSettings => self.can_manage_venue_settings,
            Capability::ViewAuditLog => self.can_view_audit_log,
            Capability::ManageTenants => self.can_manage_tenants,
            Capability::Impersonate => self.can_impersonate,
            Capability::ManageFeatureFlags => self.can_manage_feature_flags,
        }
    }
}

/// Total function from role to capabilities. `None` grants nothing.
pub fn get_permissions(role: Option<Role>) -> Permissions {
    let Some(role) = role else {
        return Permissions::default();
    };

    let platform = role == Role::SuperAdmin;
    let admin = matches!(role, Role::SuperAdmin | Role::TenantAdmin);

    Permissions {
        can_manage_users: admin,
        can_manage_menu: admin,
        can_manage_tables: admin,
        can_view_orders: true,
        can_manage_orders: true,
        can_confirm_payments: true,
        can_manage_bank_details: admin,
        can_manage_venue_settings: admin,
        can_view_audit_log: admin,
        can_manage_tenants: platform,
        can_impersonate: platform,
        can_manage_feature_flags: platform,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_CAPABILITIES: [Capability; 12] = [
        Capability::ManageUsers,
        Capability::ManageMenu,
        Capability::ManageTables,
        Capability::ViewOrders,
        Capability::ManageOrders,
        Capability::ConfirmPayments,
        Capability::ManageBankDetails,
        Capability::ManageVenueSettings,
        Capability::ViewAuditLog,
        Capability::ManageTenants,
        Capability::Impersonate,
        Capability::ManageFeatureFlags,
    ];

    #[test]
    fn manage_users_only_for_admins() {
        let roles = [None, Some(Role::SuperAdmin), Some(Role::TenantAdmin), Some(Role::Staff)];
        for role in roles {
            let expected = matches!(role, Some(Role::SuperAdmin) | Some(Role::TenantAdmin));
            assert_eq!(get_permissions(role).can_manage_users, expected, "role {:?}", role);
        }
    }

    #[test]
    fn no_role_grants_nothing() {
        let perms = get_permissions(None);
        assert!(ALL_CAPABILITIES.iter().all(|c| !perms.allows(*c)));
    }

    #[test]
    fn super_admin_is_a_superset() {
        let root = get_permissions(Some(Role::SuperAdmin));
        assert!(ALL_CAPABILITIES.iter().all(|c| root.allows(*c)));

        for role in [Role::TenantAdmin, Role::Staff] {
            let perms = get_permissions(Some(role));
            for c in ALL_CAPABILITIES {
                assert!(!perms.allows(c) || root.allows(c));
            }
        }
    }

    #[test]
    fn staff_handles_fulfilment_only() {
        let staff = get_permissions(Some(Role::Staff));
        assert!(staff.can_view_orders);
        assert!(staff.can_manage_orders);
        assert!(staff.can_confirm_payments);
        assert!(!staff.can_manage_menu);
        assert!(!staff.can_manage_bank_details);
        assert!(!staff.can_view_audit_log);
    }

    #[test]
    fn platform_capabilities_stay_with_super_admin() {
        let admin = get_permissions(Some(Role::TenantAdmin));
        assert!(!admin.can_manage_tenants);
        assert!(!admin.can_impersonate);
        assert!(!admin.can_manage_feature_flags);
    }

    #[test]
    fn serializes_with_client_field_names() {
        let value = serde_json::to_value(get_permissions(Some(Role::Staff))).unwrap();
        assert_eq!(value["canManageUsers"], false);
        assert_eq!(value["canManageOrders"], true);
    }
}
