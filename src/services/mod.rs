pub mod audit_service;
pub mod auth_service;
pub mod error;
pub mod feature_service;
pub mod menu_service;
pub mod order_service;
pub mod payment_service;
pub mod rate_limit;
pub mod storage_service;
pub mod table_service;
pub mod user_service;
pub mod validation;
pub mod venue_service;

pub use error::{ServiceError, ServiceResult};
