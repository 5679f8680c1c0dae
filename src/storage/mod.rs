//! Time-limited access grants for the external blob store.
//!
//! A grant is `HMAC-SHA256(secret, "<path>\n<expires>")` hex-encoded and
//! appended to the public object URL together with the expiry.

use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use thiserror::Error;
use url::Url;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Storage signing secret is not configured")]
    MissingSecret,

    #[error("Invalid storage base URL")]
    InvalidBaseUrl,

    #[error("Invalid object path: {0}")]
    InvalidPath(String),

    #[error("Object path is outside this venue")]
    ForeignPath,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignedUrl {
    pub url: String,
    pub path: String,
    pub expires_at: DateTime<Utc>,
}

pub struct SignedUrlIssuer {
    base_url: Url,
    secret: Vec<u8>,
    ttl_secs: i64,
}

impl SignedUrlIssuer {
    pub fn new(base_url: &str, secret: &str, ttl_secs: i64) -> Result<Self, StorageError> {
        if secret.is_empty() {
            return Err(StorageError::MissingSecret);
        }
        let mut base_url = Url::parse(base_url).map_err(|_| StorageError::InvalidBaseUrl)?;
        if base_url.cannot_be_a_base() {
            return Err(StorageError::InvalidBaseUrl);
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { base_url, secret: secret.as_bytes().to_vec(), ttl_secs })
    }

    pub fn from_config() -> Result<Self, StorageError> {
        let storage = &crate::config::config().storage;
        Self::new(&storage.public_base_url, &storage.signing_secret, storage.signed_url_ttl_secs)
    }

    pub fn issue(&self, path: &str, now: DateTime<Utc>) -> Result<SignedUrl, StorageError> {
        validate_path(path)?;
        let expires = now.timestamp() + self.ttl_secs;
        let signature = hex::encode(self.mac(path, expires)?.finalize().into_bytes());

        let mut url = self.base_url.join(path).map_err(|e| StorageError::InvalidPath(e.to_string()))?;
        let expected = format!("{}{}", self.base_url.path(), path);
        if url.path() != expected || url.query().is_some() || url.fragment().is_some() {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
        url.query_pairs_mut()
            .append_pair("expires", &expires.to_string())
            .append_pair("signature", &signature);

        let expires_at = Utc
            .timestamp_opt(expires, 0)
            .single()
            .ok_or_else(|| StorageError::InvalidPath("expiry out of range".to_string()))?;

        Ok(SignedUrl { url: url.into(), path: path.to_string(), expires_at })
    }

    /// Check a presented grant. Expired, malformed and tampered grants all fail.
    pub fn verify(&self, path: &str, expires: i64, signature: &str, now: DateTime<Utc>) -> bool {
        if validate_path(path).is_err() || now.timestamp() > expires {
            return false;
        }
        let Ok(expected) = hex::decode(signature) else {
            return false;
        };
        match self.mac(path, expires) {
            Ok(mac) => mac.verify_slice(&expected).is_ok(),
            Err(_) => false,
        }
    }

    fn mac(&self, path: &str, expires: i64) -> Result<HmacSha256, StorageError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret).map_err(|_| StorageError::MissingSecret)?;
        mac.update(path.as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());
        Ok(mac)
    }
}

/// Relative, non-empty, no `..` or empty segments. Segments are limited to
/// characters the URL is emitted with verbatim, so no percent escapes,
/// query, fragment or scheme can sneak in.
pub fn validate_path(path: &str) -> Result<(), StorageError> {
    if path.is_empty() || path.starts_with('/') || !path.chars().all(is_path_char) {
        return Err(StorageError::InvalidPath(path.to_string()));
    }
    if path.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..") {
        return Err(StorageError::InvalidPath(path.to_string()));
    }
    Ok(())
}

fn is_path_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '-' | '_' | '~')
}

/// Object prefix owned by a venue.
pub fn venue_prefix(venue_id: Uuid) -> String {
    format!("venues/{}/", venue_id)
}

pub fn ensure_venue_path(path: &str, venue_id: Uuid) -> Result<(), StorageError> {
    validate_path(path)?;
    if !path.starts_with(&venue_prefix(venue_id)) {
        return Err(StorageError::ForeignPath);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn issuer() -> SignedUrlIssuer {
        SignedUrlIssuer::new("https://files.example.com/bucket", "secret", 600).unwrap()
    }

    fn query(url: &str, key: &str) -> String {
        Url::parse(url)
            .unwrap()
            .query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
            .unwrap()
    }

    #[test]
    fn issued_url_verifies_until_expiry() {
        let issuer = issuer();
        let now = Utc::now();
        let signed = issuer.issue("venues/a/menu/burger.jpg", now).unwrap();

        assert!(signed.url.starts_with("https://files.example.com/bucket/venues/a/menu/burger.jpg?"));
        let expires: i64 = query(&signed.url, "expires").parse().unwrap();
        let signature = query(&signed.url, "signature");
        assert_eq!(expires, signed.expires_at.timestamp());

        assert!(issuer.verify(&signed.path, expires, &signature, now));
        assert!(issuer.verify(&signed.path, expires, &signature, now + Duration::seconds(600)));
        assert!(!issuer.verify(&signed.path, expires, &signature, now + Duration::seconds(601)));
    }

    #[test]
    fn tampering_breaks_the_grant() {
        let issuer = issuer();
        let now = Utc::now();
        let signed = issuer.issue("venues/a/logo.png", now).unwrap();
        let expires: i64 = query(&signed.url, "expires").parse().unwrap();
        let signature = query(&signed.url, "signature");

        assert!(!issuer.verify("venues/b/logo.png", expires, &signature, now));
        assert!(!issuer.verify(&signed.path, expires + 3600, &signature, now));
        assert!(!issuer.verify(&signed.path, expires, "not-hex", now));

        let other = SignedUrlIssuer::new("https://files.example.com/bucket", "other", 600).unwrap();
        assert!(!other.verify(&signed.path, expires, &signature, now));
    }

    #[test]
    fn rejects_unsafe_paths() {
        for path in ["", "/etc/passwd", "venues/../secrets", "venues//x", "a\\b", "./x"] {
            assert!(validate_path(path).is_err(), "{path}");
        }
        assert!(validate_path("venues/a/b.jpg").is_ok());
    }

    #[test]
    fn encoded_and_url_syntax_paths_are_rejected() {
        let venue = Uuid::nil();
        let prefix = venue_prefix(venue);
        for tail in [
            "%2e%2e/other-venue/secret.pdf",
            "%2E%2E/other-venue/secret.pdf",
            "menu.jpg?x=1#frag",
            "menu.jpg#frag",
            "menu.jpg?expires=1",
            "https:/evil/x.jpg",
            "a b.jpg",
        ] {
            let path = format!("{prefix}{tail}");
            assert!(ensure_venue_path(&path, venue).is_err(), "{path}");
            assert!(issuer().issue(&path, Utc::now()).is_err(), "{path}");
        }
    }

    #[test]
    fn issued_url_path_matches_signed_path() {
        let path = format!("{}proofs/receipt-01.pdf", venue_prefix(Uuid::nil()));
        let signed = issuer().issue(&path, Utc::now()).unwrap();
        let url = Url::parse(&signed.url).unwrap();
        assert_eq!(url.path(), format!("/bucket/{path}"));
        assert_eq!(url.fragment(), None);
        let keys: Vec<String> = url.query_pairs().map(|(k, _)| k.into_owned()).collect();
        assert_eq!(keys, ["expires", "signature"]);
    }

    #[test]
    fn venue_paths_are_scoped() {
        let venue = Uuid::new_v4();
        let own = format!("{}menu/soup.jpg", venue_prefix(venue));
        assert!(ensure_venue_path(&own, venue).is_ok());
        let foreign = format!("{}menu/soup.jpg", venue_prefix(Uuid::new_v4()));
        assert_eq!(ensure_venue_path(&foreign, venue), Err(StorageError::ForeignPath));
    }

    #[test]
    fn requires_secret() {
        assert!(matches!(
            SignedUrlIssuer::new("https://files.example.com", "", 60),
            Err(StorageError::MissingSecret)
        ));
    }
}
