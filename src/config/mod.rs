use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub storage: StorageConfig,
    pub orders: OrdersConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    pub max_request_size_bytes: usize,
    pub order_submit_limit: i64,
    pub order_submit_window_secs: i64,
    pub password_reset_limit: i64,
    pub password_reset_window_secs: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub impersonation_expiry_minutes: u64,
    pub cors_origins: Vec<String>,
    pub enable_audit_logging: bool,
    pub password_reset_ttl_minutes: i64,
    pub invitation_ttl_hours: i64,
    pub expose_dev_tokens: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub public_base_url: String,
    #[serde(skip_serializing)]
    pub signing_secret: String,
    pub signed_url_ttl_secs: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrdersConfig {
    pub enforce_transitions: bool,
    pub payment_window_minutes: i64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = Some(v);
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // API overrides
        if let Some(v) = env::var("TABLESIDE_PORT").ok().or_else(|| env::var("PORT").ok()) {
            self.api.port = v.parse().unwrap_or(self.api.port);
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }
        if let Ok(v) = env::var("API_ORDER_SUBMIT_LIMIT") {
            self.api.order_submit_limit = v.parse().unwrap_or(self.api.order_submit_limit);
        }
        if let Ok(v) = env::var("API_ORDER_SUBMIT_WINDOW_SECS") {
            self.api.order_submit_window_secs = v.parse().unwrap_or(self.api.order_submit_window_secs);
        }
        if let Ok(v) = env::var("API_PASSWORD_RESET_LIMIT") {
            self.api.password_reset_limit = v.parse().unwrap_or(self.api.password_reset_limit);
        }
        if let Ok(v) = env::var("API_PASSWORD_RESET_WINDOW_SECS") {
            self.api.password_reset_window_secs = v.parse().unwrap_or(self.api.password_reset_window_secs);
        }

        // Security overrides
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("SECURITY_IMPERSONATION_EXPIRY_MINUTES") {
            self.security.impersonation_expiry_minutes =
                v.parse().unwrap_or(self.security.impersonation_expiry_minutes);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Ok(v) = env::var("SECURITY_ENABLE_AUDIT_LOGGING") {
            self.security.enable_audit_logging = v.parse().unwrap_or(self.security.enable_audit_logging);
        }
        if let Ok(v) = env::var("SECURITY_PASSWORD_RESET_TTL_MINUTES") {
            self.security.password_reset_ttl_minutes =
                v.parse().unwrap_or(self.security.password_reset_ttl_minutes);
        }
        if let Ok(v) = env::var("SECURITY_INVITATION_TTL_HOURS") {
            self.security.invitation_ttl_hours = v.parse().unwrap_or(self.security.invitation_ttl_hours);
        }

        // Storage overrides
        if let Ok(v) = env::var("STORAGE_PUBLIC_BASE_URL") {
            self.storage.public_base_url = v;
        }
        if let Ok(v) = env::var("STORAGE_SIGNING_SECRET") {
            self.storage.signing_secret = v;
        }
        if let Ok(v) = env::var("STORAGE_SIGNED_URL_TTL_SECS") {
            self.storage.signed_url_ttl_secs = v.parse().unwrap_or(self.storage.signed_url_ttl_secs);
        }

        // Orders overrides
        if let Ok(v) = env::var("ORDERS_ENFORCE_TRANSITIONS") {
            self.orders.enforce_transitions = v.parse().unwrap_or(self.orders.enforce_transitions);
        }
        if let Ok(v) = env::var("ORDERS_PAYMENT_WINDOW_MINUTES") {
            self.orders.payment_window_minutes = v.parse().unwrap_or(self.orders.payment_window_minutes);
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                connection_timeout: 30,
            },
            api: ApiConfig {
                port: 3000,
                max_request_size_bytes: 1024 * 1024,
                order_submit_limit: 20,
                order_submit_window_secs: 600,
                password_reset_limit: 10,
                password_reset_window_secs: 3600,
            },
            security: SecurityConfig {
                jwt_secret: "tableside-development-secret".to_string(),
                jwt_expiry_hours: 24 * 7,
                impersonation_expiry_minutes: 120,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
                enable_audit_logging: true,
                password_reset_ttl_minutes: 60,
                invitation_ttl_hours: 24 * 7,
                expose_dev_tokens: true,
            },
            storage: StorageConfig {
                public_base_url: "http://localhost:9000/tableside".to_string(),
                signing_secret: "tableside-development-storage".to_string(),
                signed_url_ttl_secs: 3600,
            },
            orders: OrdersConfig {
                enforce_transitions: true,
                payment_window_minutes: 60,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                url: None,
                max_connections: 20,
                connection_timeout: 10,
            },
            api: ApiConfig {
                port: 3000,
                max_request_size_bytes: 512 * 1024,
                order_submit_limit: 10,
                order_submit_window_secs: 600,
                password_reset_limit: 5,
                password_reset_window_secs: 3600,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
                impersonation_expiry_minutes: 60,
                cors_origins: vec!["https://staging.tableside.app".to_string()],
                enable_audit_logging: true,
                password_reset_ttl_minutes: 30,
                invitation_ttl_hours: 72,
                expose_dev_tokens: false,
            },
            storage: StorageConfig {
                public_base_url: "https://files.staging.tableside.app".to_string(),
                signing_secret: String::new(),
                signed_url_ttl_secs: 900,
            },
            orders: OrdersConfig {
                enforce_transitions: true,
                payment_window_minutes: 45,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                url: None,
                max_connections: 50,
                connection_timeout: 5,
            },
            api: ApiConfig {
                port: 3000,
                max_request_size_bytes: 256 * 1024,
                order_submit_limit: 5,
                order_submit_window_secs: 600,
                password_reset_limit: 3,
                password_reset_window_secs: 3600,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 12,
                impersonation_expiry_minutes: 30,
                cors_origins: vec!["https://app.tableside.app".to_string()],
                enable_audit_logging: true,
                password_reset_ttl_minutes: 30,
                invitation_ttl_hours: 48,
                expose_dev_tokens: false,
            },
            storage: StorageConfig {
                public_base_url: "https://files.tableside.app".to_string(),
                signing_secret: String::new(),
                signed_url_ttl_secs: 600,
            },
            orders: OrdersConfig {
                enforce_transitions: true,
                payment_window_minutes: 30,
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[macro_export]
macro_rules! is_development {
    () => {
        matches!($crate::config::CONFIG.environment, $crate::config::Environment::Development)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert!(config.security.expose_dev_tokens);
        assert!(!config.security.jwt_secret.is_empty());
        assert!(config.orders.enforce_transitions);
        assert_eq!(config.api.order_submit_limit, 20);
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert!(!config.security.expose_dev_tokens);
        // secrets must come from the environment outside development
        assert!(config.security.jwt_secret.is_empty());
        assert!(config.storage.signing_secret.is_empty());
        assert!(config.api.order_submit_limit < AppConfig::development().api.order_submit_limit);
    }

    #[test]
    fn test_secrets_are_not_serialized() {
        let value = serde_json::to_value(AppConfig::development()).unwrap();
        assert!(value["security"].get("jwt_secret").is_none());
        assert!(value["storage"].get("signing_secret").is_none());
    }
}
