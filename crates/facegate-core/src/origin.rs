//! Cross-origin response header selection.
//!
//! An unmatched request origin is not rejected: the first configured origin
//! is echoed instead, so the browser enforces the mismatch on its side.

use crate::error::{FacegateError, Result};

pub const ALLOW_HEADERS: &str = "Content-Type,Authorization";
pub const ALLOW_CREDENTIALS: &str = "true";
pub const ALLOW_METHODS: &str = "GET,POST,OPTIONS";

/// Return `request_origin` if it is an exact, case-sensitive member of
/// `configured`, otherwise the first configured origin.
///
/// Returns `None` only when `configured` is empty.
pub fn select_allowed_origin<'a>(
    request_origin: Option<&'a str>,
    configured: &'a [String],
) -> Option<&'a str> {
    match request_origin {
        Some(origin) if configured.iter().any(|c| c == origin) => Some(origin),
        _ => configured.first().map(String::as_str),
    }
}

/// Non-empty list of origins allowed to read responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedOrigins(Vec<String>);

impl AllowedOrigins {
    pub fn new(origins: Vec<String>) -> Result<Self> {
        let origins: Vec<String> = origins
            .into_iter()
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();
        if origins.is_empty() {
            return Err(FacegateError::Validation(
                "at least one allowed origin must be configured".into(),
            ));
        }
        Ok(Self(origins))
    }

    /// Parse a comma-separated list, e.g. `https://a.example,https://b.example`.
    pub fn from_csv(csv: &str) -> Result<Self> {
        Self::new(csv.split(',').map(str::to_string).collect())
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

/// Selects the `Access-Control-Allow-Origin` value for each response.
#[derive(Debug, Clone)]
pub struct OriginValidator {
    allowed: AllowedOrigins,
}

impl OriginValidator {
    pub fn new(allowed: AllowedOrigins) -> Self {
        Self { allowed }
    }

    pub fn select<'a>(&'a self, request_origin: Option<&'a str>) -> &'a str {
        // AllowedOrigins is never empty.
        select_allowed_origin(request_origin, self.allowed.as_slice()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> Vec<String> {
        vec!["https://a.example".into(), "https://b.example".into()]
    }

    #[test]
    fn test_select_exact_member() {
        let origins = configured();
        assert_eq!(
            select_allowed_origin(Some("https://b.example"), &origins),
            Some("https://b.example")
        );
    }

    #[test]
    fn test_select_falls_back_to_first() {
        let origins = configured();
        assert_eq!(
            select_allowed_origin(Some("https://c.example"), &origins),
            Some("https://a.example")
        );
    }

    #[test]
    fn test_select_is_case_sensitive() {
        let origins = configured();
        assert_eq!(
            select_allowed_origin(Some("https://B.example"), &origins),
            Some("https://a.example")
        );
    }

    #[test]
    fn test_select_without_request_origin() {
        let origins = configured();
        assert_eq!(select_allowed_origin(None, &origins), Some("https://a.example"));
    }

    #[test]
    fn test_select_empty_configuration() {
        assert_eq!(select_allowed_origin(Some("https://a.example"), &[]), None);
    }

    #[test]
    fn test_allowed_origins_from_csv_trims() {
        let allowed = AllowedOrigins::from_csv(" https://a.example , ,https://b.example").unwrap();
        assert_eq!(allowed.as_slice(), configured().as_slice());
    }

    #[test]
    fn test_allowed_origins_rejects_empty() {
        assert!(AllowedOrigins::from_csv(" , ").is_err());
        assert!(AllowedOrigins::new(Vec::new()).is_err());
    }

    #[test]
    fn test_validator_select() {
        let validator = OriginValidator::new(AllowedOrigins::new(configured()).unwrap());
        assert_eq!(validator.select(Some("https://b.example")), "https://b.example");
        assert_eq!(validator.select(Some("https://evil.example")), "https://a.example");
    }
}
