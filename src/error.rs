//! Failure taxonomy for data producers.
//!
//! Every producer (mock or backend) funnels into [`FetchError`]. The
//! taxonomy exists for internal classification and logging; consumers only
//! ever see a single human-readable message on the resource state.

use thiserror::Error;

/// Maximum characters of a raw error body kept in an HTTP failure message.
pub const MAX_BODY_MESSAGE_CHARS: usize = 200;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Transport-level failure: connect error, timeout, aborted stream.
    #[error("network failure: {0}")]
    Network(String),

    /// Non-2xx response with a best-effort message extracted from the body.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The synchronous mock generator failed.
    #[error("mock generation failed: {0}")]
    Mock(String),

    /// Response decoded but violated the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The operation was superseded by a newer generation. Never surfaced
    /// to consumer-visible state.
    #[error("cancelled")]
    Cancelled,
}

impl FetchError {
    /// Build an HTTP failure from a status code and a raw body.
    ///
    /// Message extraction order: JSON `message` field, JSON `error` field,
    /// the raw body truncated, then a generic `HTTP <status>` string.
    pub fn from_http_body(status: u16, body: &str) -> Self {
        let message = extract_body_message(body)
            .unwrap_or_else(|| format!("HTTP {status}"));
        Self::Http { status, message }
    }

    /// True when the error is eligible for mock substitution.
    ///
    /// Mock failures are terminal (there is nothing left to fall back to)
    /// and cancellations must stay invisible.
    pub fn recoverable_by_fallback(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Http { .. } | Self::Malformed(_)
        )
    }
}

fn extract_body_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        for field in ["message", "error"] {
            if let Some(msg) = value.get(field).and_then(|v| v.as_str())
                && !msg.trim().is_empty()
            {
                return Some(truncate_chars(msg.trim(), MAX_BODY_MESSAGE_CHARS));
            }
        }
    }
    Some(truncate_chars(trimmed, MAX_BODY_MESSAGE_CHARS))
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        text.chars().take(max).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_message_from_json_message_field() {
        let err = FetchError::from_http_body(500, r#"{"message": "db exploded"}"#);
        assert_eq!(
            err,
            FetchError::Http {
                status: 500,
                message: "db exploded".into()
            }
        );
    }

    #[test]
    fn http_message_from_json_error_field() {
        let err = FetchError::from_http_body(403, r#"{"error": "forbidden for user"}"#);
        match err {
            FetchError::Http { status, message } => {
                assert_eq!(status, 403);
                assert_eq!(message, "forbidden for user");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn http_message_from_plain_body_is_truncated() {
        let body = "x".repeat(500);
        let err = FetchError::from_http_body(502, &body);
        match err {
            FetchError::Http { message, .. } => {
                assert_eq!(message.chars().count(), MAX_BODY_MESSAGE_CHARS);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn http_message_generic_on_empty_body() {
        let err = FetchError::from_http_body(404, "   ");
        match err {
            FetchError::Http { message, .. } => assert_eq!(message, "HTTP 404"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn json_body_without_known_fields_falls_back_to_raw() {
        let err = FetchError::from_http_body(500, r#"{"code": 12}"#);
        match err {
            FetchError::Http { message, .. } => assert_eq!(message, r#"{"code": 12}"#),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn fallback_eligibility() {
        assert!(FetchError::Network("down".into()).recoverable_by_fallback());
        assert!(
            FetchError::Http {
                status: 500,
                message: "oops".into()
            }
            .recoverable_by_fallback()
        );
        assert!(!FetchError::Mock("bad seed math".into()).recoverable_by_fallback());
        assert!(!FetchError::Cancelled.recoverable_by_fallback());
    }
}
