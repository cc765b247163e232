//! Request DTOs for the MuzLoto API
//!
//! Defines the structure of incoming HTTP request bodies and query strings.

use serde::Deserialize;

/// Request body for `POST /cache/invalidate`
///
/// `pattern` uses the wildcard syntax: `*` for any run, `?` for one character.
#[derive(Debug, Clone, Deserialize)]
pub struct InvalidateRequest {
    pub pattern: String,
}

impl InvalidateRequest {
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.pattern.is_empty() {
            return Some("Pattern cannot be empty".to_string());
        }
        if self.pattern.len() > 256 {
            return Some("Pattern exceeds maximum length of 256 characters".to_string());
        }
        None
    }
}

/// Query string for collection listings, e.g. `GET /tracks?scope=42`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    /// Parent record id
    #[serde(default)]
    pub scope: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalidate_request_deserialize() {
        let req: InvalidateRequest = serde_json::from_str(r#"{"pattern": "tracks:*"}"#).unwrap();
        assert_eq!(req.pattern, "tracks:*");
        assert!(req.validate().is_none());
    }

    #[test]
    fn test_validate_empty_pattern() {
        let req = InvalidateRequest {
            pattern: String::new(),
        };
        assert!(req.validate().is_some());
    }

    #[test]
    fn test_validate_long_pattern() {
        let req = InvalidateRequest {
            pattern: "a".repeat(257),
        };
        assert!(req.validate().is_some());
    }

    #[test]
    fn test_list_query_scope_is_optional() {
        let query: ListQuery = serde_json::from_str("{}").unwrap();
        assert!(query.scope.is_none());
    }
}
