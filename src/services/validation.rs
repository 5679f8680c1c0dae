// Input rules shared by the services

use rust_decimal::Decimal;

use super::{ServiceError, ServiceResult};

pub const MAX_NAME_LEN: usize = 200;
pub const MAX_NOTE_LEN: usize = 500;

/// Trimmed, non-empty, bounded display text.
pub fn required_text(field: &str, value: &str, max: usize) -> ServiceResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ServiceError::validation(format!("{} is required", field)));
    }
    if value.chars().count() > max {
        return Err(ServiceError::validation(format!("{} must be at most {} characters", field, max)));
    }
    Ok(value.to_string())
}

/// Blank becomes `None`.
pub fn optional_text(field: &str, value: Option<&str>, max: usize) -> ServiceResult<Option<String>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => required_text(field, v, max).map(Some),
    }
}

pub fn normalize_email(email: &str) -> ServiceResult<String> {
    let email = email.trim().to_lowercase();
    let valid = email.len() <= 254
        && !email.chars().any(char::is_whitespace)
        && matches!(email.split_once('@'), Some((local, domain)) if !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.'));
    if !valid {
        return Err(ServiceError::validation("A valid email address is required"));
    }
    Ok(email)
}

/// Venue slug: 2-64 chars of `[a-z0-9-]`, no leading or trailing hyphen.
pub fn validate_slug(slug: &str) -> ServiceResult<String> {
    let slug = slug.trim();
    if !(2..=64).contains(&slug.len()) {
        return Err(ServiceError::validation("Slug must be between 2 and 64 characters"));
    }
    if !slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
        return Err(ServiceError::validation("Slug can only contain lowercase letters, numbers and hyphens"));
    }
    if slug.starts_with('-') || slug.ends_with('-') {
        return Err(ServiceError::validation("Slug cannot start or end with a hyphen"));
    }
    Ok(slug.to_string())
}

/// Feature flag keys follow the same shape as slugs, with underscores allowed.
pub fn validate_flag_key(key: &str) -> ServiceResult<String> {
    let key = key.trim();
    if key.is_empty() || key.len() > 64 || !key.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-') {
        return Err(ServiceError::validation("Feature key must be 1-64 characters of [a-z0-9_-]"));
    }
    Ok(key.to_string())
}

pub fn validate_price(price: Decimal) -> ServiceResult<Decimal> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(ServiceError::validation("Price cannot be negative"));
    }
    if price.scale() > 2 {
        return Err(ServiceError::validation("Price can have at most two decimal places"));
    }
    Ok(price)
}

/// Clamp list paging parameters.
pub fn page(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    (limit.unwrap_or(50).clamp(1, 200), offset.unwrap_or(0).max(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn emails_are_lowercased_and_checked() {
        assert_eq!(normalize_email("  Ana@Example.COM ").unwrap(), "ana@example.com");
        for bad in ["", "no-at", "@example.com", "a@b", "a b@example.com", "a@.com"] {
            assert!(normalize_email(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn slugs() {
        assert_eq!(validate_slug("la-bodega-2").unwrap(), "la-bodega-2");
        for bad in ["a", "Upper", "under_score", "-edge", "edge-", &"x".repeat(65)] {
            assert!(validate_slug(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn prices() {
        assert!(validate_price(Decimal::from_str("12.50").unwrap()).is_ok());
        assert!(validate_price(Decimal::ZERO).is_ok());
        assert!(validate_price(Decimal::from_str("-1").unwrap()).is_err());
        assert!(validate_price(Decimal::from_str("1.005").unwrap()).is_err());
    }

    #[test]
    fn text_rules() {
        assert_eq!(required_text("Name", "  Bar  ", 10).unwrap(), "Bar");
        assert!(required_text("Name", "   ", 10).is_err());
        assert!(required_text("Name", "abcdefghijk", 10).is_err());
        assert_eq!(optional_text("Note", Some("  "), 10).unwrap(), None);
    }

    #[test]
    fn paging_is_clamped() {
        assert_eq!(page(None, None), (50, 0));
        assert_eq!(page(Some(1000), Some(-5)), (200, 0));
    }
}
