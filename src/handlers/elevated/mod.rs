// handlers/elevated/mod.rs - Elevated handlers (super-admin JWT required)
//
// Platform operations spanning venues: tenant lifecycle, feature flags and
// impersonation. A super-admin keeps access here while impersonating.
//
// Security Level: JWT whose role claim is super_admin, re-checked against the store
// Route Prefix: /api/root/*
// Middleware: jwt_auth → require_super_admin → validate_session

pub mod root;

pub use root::routes;
