// handlers/mod.rs - Three security tiers
//
// Public (no auth) → Protected (JWT + session) → Elevated (super-admin JWT)
//
// Each tier exposes a `routes()` builder; middleware layers are attached in
// `crate::app`.
pub mod public; // Tier 1: guests and token acquisition (/public/*, /auth/*)
pub mod protected; // Tier 2: venue staff and admins (/api/*)
pub mod elevated; // Tier 3: platform operators (/api/root/*)
