pub mod auth;
pub mod response;
pub mod validate_session;

pub use auth::{jwt_auth_middleware, require_super_admin_middleware, AuthUser};
pub use response::{ApiResponse, ApiResult};
pub use validate_session::{validate_session_middleware, RequestContext};
