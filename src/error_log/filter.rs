//! Message classification for captured errors.

use super::{ErrorLog, ErrorSource};

/// Substrings of messages that are dropped before recording.
///
/// Browser extensions, dev-server sockets and layout observers produce
/// these constantly and none of them are actionable.
pub const IGNORED_PATTERNS: [&str; 7] = [
    "attachshadow",
    "shadow root",
    "websocket connection",
    "websocket is closed",
    "script error",
    "resizeobserver loop",
    "non-error promise rejection",
];

/// Whether `message` matches the deny-list (case insensitive).
#[must_use]
pub fn should_ignore(message: &str) -> bool {
    let lower = message.to_lowercase();
    IGNORED_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Coarse type of an error, taken from its message.
///
/// Patterns are tried in order and the first match wins.
#[must_use]
pub fn error_type(message: &str) -> &'static str {
    let lower = message.to_lowercase();
    if lower.contains("api error") {
        "API Error"
    } else if lower.contains("network") {
        "Network"
    } else if lower.contains("timeout") {
        "Timeout"
    } else if lower.contains("401") || lower.contains("unauthorized") {
        "Unauthorized"
    } else if lower.contains("404") || lower.contains("not found") {
        "Not Found"
    } else if lower.contains("500") || lower.contains("server error") {
        "Server Error"
    } else {
        "Other"
    }
}

/// Whether an error needs attention ahead of the rest.
///
/// Critical errors are server-side API failures (status 500+), requests
/// that never reached the server, and every render failure.
#[must_use]
pub fn is_critical(error: &ErrorLog) -> bool {
    if error.source == ErrorSource::React {
        return true;
    }

    let server_failure = error.source == ErrorSource::Api
        && error
            .additional_data
            .as_ref()
            .and_then(|data| data.get("status"))
            .and_then(serde_json::Value::as_u64)
            .is_some_and(|status| status >= 500);
    if server_failure {
        return true;
    }

    let lower = error.message.to_lowercase();
    lower.contains("network error")
        || lower.contains("networkerror")
        || lower.contains("failed to fetch")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn log(message: &str, source: ErrorSource, data: Option<serde_json::Value>) -> ErrorLog {
        ErrorLog {
            id: "1-abc".to_string(),
            message: message.to_string(),
            stack: None,
            source,
            timestamp: 0,
            url: String::new(),
            user_agent: String::new(),
            user_id: None,
            additional_data: data,
        }
    }

    #[test]
    fn test_should_ignore_known_noise() {
        assert!(should_ignore(
            "Failed to execute 'attachShadow' on 'Element'"
        ));
        assert!(should_ignore("WebSocket connection to 'ws://localhost' failed"));
        assert!(should_ignore("Script error."));
        assert!(should_ignore(
            "ResizeObserver loop completed with undelivered notifications."
        ));
        assert!(should_ignore(
            "Non-Error promise rejection captured with value: undefined"
        ));
        assert!(should_ignore("SHADOW ROOT already attached"));
    }

    #[test]
    fn test_should_not_ignore_real_errors() {
        assert!(!should_ignore("Cannot read properties of undefined"));
        assert!(!should_ignore("API Error: 500 /api/users"));
    }

    #[test]
    fn test_error_type_order() {
        assert_eq!(error_type("API Error: 404 /api/users"), "API Error");
        assert_eq!(error_type("Network Error"), "Network");
        assert_eq!(error_type("Request timeout of 30000ms exceeded"), "Timeout");
        assert_eq!(error_type("Request failed with status code 401"), "Unauthorized");
        assert_eq!(error_type("Unauthorized access"), "Unauthorized");
        assert_eq!(error_type("Partner not found"), "Not Found");
        assert_eq!(error_type("status code 500"), "Server Error");
        assert_eq!(error_type("Internal Server Error"), "Server Error");
        assert_eq!(error_type("x is not a function"), "Other");
    }

    #[test]
    fn test_critical_api_server_error() {
        let err = log(
            "API Error: 502 /api/users",
            ErrorSource::Api,
            Some(json!({"status": 502})),
        );
        assert!(is_critical(&err));

        let client_err = log(
            "API Error: 404 /api/users",
            ErrorSource::Api,
            Some(json!({"status": 404})),
        );
        assert!(!is_critical(&client_err));
    }

    #[test]
    fn test_critical_status_only_counts_for_api_source() {
        let err = log(
            "boom",
            ErrorSource::Javascript,
            Some(json!({"status": 503})),
        );
        assert!(!is_critical(&err));
    }

    #[test]
    fn test_critical_network_failures() {
        assert!(is_critical(&log("Network Error", ErrorSource::Promise, None)));
        assert!(is_critical(&log(
            "TypeError: Failed to fetch",
            ErrorSource::Javascript,
            None
        )));
    }

    #[test]
    fn test_critical_react_always() {
        assert!(is_critical(&log("render failed", ErrorSource::React, None)));
    }
}
