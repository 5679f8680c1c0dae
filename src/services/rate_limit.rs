//! Store-side rate limiting: record the attempt, then count attempts in the
//! window. Attempts are recorded even when they end up rejected.

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;

use crate::config;

use super::{ServiceError, ServiceResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateScope {
    /// Guest order submission, keyed by table QR token.
    OrderSubmit,
    /// Password reset requests, keyed by lower-cased email.
    PasswordReset,
}

impl RateScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateScope::OrderSubmit => "order_submit",
            RateScope::PasswordReset => "password_reset",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            RateScope::OrderSubmit => "order",
            RateScope::PasswordReset => "password reset",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub limit: i64,
    pub window_secs: i64,
}

impl RateLimit {
    pub fn for_scope(scope: RateScope) -> Self {
        let api = &config::config().api;
        match scope {
            RateScope::OrderSubmit => Self { limit: api.order_submit_limit, window_secs: api.order_submit_window_secs },
            RateScope::PasswordReset => Self { limit: api.password_reset_limit, window_secs: api.password_reset_window_secs },
        }
    }

    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::seconds(self.window_secs)
    }

    /// `count` includes the attempt being checked.
    pub fn exceeded(&self, count: i64) -> bool {
        count > self.limit
    }
}

const RECORD_ATTEMPT: &str = "INSERT INTO rate_limit_events (scope, key, created_at) VALUES ($1, $2, $3)";
const COUNT_IN_WINDOW: &str =
    "SELECT COUNT(*) FROM rate_limit_events WHERE scope = $1 AND key = $2 AND created_at > $3";
/// Expired rows go for every key in the scope, so one-off keys don't pile up.
const PURGE_EXPIRED: &str = "DELETE FROM rate_limit_events WHERE scope = $1 AND created_at <= $2";

pub async fn check_and_record(pool: &PgPool, scope: RateScope, key: &str) -> ServiceResult<()> {
    let rule = RateLimit::for_scope(scope);
    let now = Utc::now();
    let since = rule.window_start(now);

    sqlx::query(RECORD_ATTEMPT)
        .bind(scope.as_str())
        .bind(key)
        .bind(now)
        .execute(pool)
        .await?;

    let (count,): (i64,) = sqlx::query_as(COUNT_IN_WINDOW)
        .bind(scope.as_str())
        .bind(key)
        .bind(since)
        .fetch_one(pool)
        .await?;

    sqlx::query(PURGE_EXPIRED)
        .bind(scope.as_str())
        .bind(since)
        .execute(pool)
        .await?;

    if rule.exceeded(count) {
        tracing::warn!("Rate limit hit for {} ({} attempts in {}s)", scope.as_str(), count, rule.window_secs);
        return Err(ServiceError::RateLimited(scope.label()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_is_inclusive() {
        let rule = RateLimit { limit: 3, window_secs: 60 };
        assert!(!rule.exceeded(3));
        assert!(rule.exceeded(4));
    }

    #[test]
    fn window_start_is_offset_by_window() {
        let rule = RateLimit { limit: 1, window_secs: 600 };
        let now = Utc::now();
        assert_eq!(now - rule.window_start(now), Duration::minutes(10));
    }

    #[test]
    fn scopes_have_stable_keys() {
        assert_eq!(RateScope::OrderSubmit.as_str(), "order_submit");
        assert_eq!(RateScope::PasswordReset.as_str(), "password_reset");
    }

    #[test]
    fn purge_covers_the_whole_scope() {
        assert!(PURGE_EXPIRED.contains("scope = $1"));
        assert!(PURGE_EXPIRED.contains("created_at <= $2"));
        assert!(!PURGE_EXPIRED.contains("key"));
        // Purge and count split the timeline at the same instant.
        assert!(COUNT_IN_WINDOW.contains("created_at > $3"));
    }

    #[test]
    fn config_limits_are_positive() {
        for scope in [RateScope::OrderSubmit, RateScope::PasswordReset] {
            let rule = RateLimit::for_scope(scope);
            assert!(rule.limit > 0);
            assert!(rule.window_secs > 0);
        }
    }
}
