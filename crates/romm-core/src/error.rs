//! Error classification.
//!
//! Every failure in the engine produces a free-form detail string somewhere
//! close to the failure site, then passes through [`classify`] once before it
//! reaches a caller. This keeps the internal detail (useful in logs) and the
//! user-facing message (safe to render) in separate fields instead of
//! interleaving them.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    Config,
    Network,
    Auth,
    Http,
    Parse,
    Filesystem,
    Data,
    Unsupported,
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    ConfigMissing,
    ConfigInvalid,
    MissingRequiredField,
    UnsupportedFeature,
    AuthFailure,
    NotFound,
    HttpStatus,
    DnsFailure,
    ConnectFailure,
    Timeout,
    TransportFailure,
    ParseFailure,
    InvalidData,
    Internal,
}

/// The classification record every failure is reduced to before it is
/// surfaced to a caller or rendered by the UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub category: ErrorCategory,
    pub code: ErrorCode,
    pub user_message: String,
    pub http_status: Option<u16>,
    pub retryable: bool,
    /// Internal detail, never shown to the user directly.
    pub detail: String,
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message)
    }
}

impl std::error::Error for ErrorInfo {}

fn info(
    category: ErrorCategory,
    code: ErrorCode,
    user_message: &str,
    http_status: Option<u16>,
    retryable: bool,
    detail: &str,
) -> ErrorInfo {
    ErrorInfo {
        category,
        code,
        user_message: user_message.to_string(),
        http_status,
        retryable,
        detail: detail.to_string(),
    }
}

/// Classify a free-form detail string into an [`ErrorInfo`].
///
/// `hint` is the caller's best guess at a category, used only when no rule
/// below matches. `http_status`, when known, lets rule 5 fire without the
/// status code having to be embedded in `detail`.
pub fn classify(detail: &str, hint: Option<ErrorCategory>, http_status: Option<u16>) -> ErrorInfo {
    let d = detail.to_ascii_lowercase();

    if d.contains("missing config") {
        return info(ErrorCategory::Config, ErrorCode::ConfigMissing, "Configuration is missing.", None, false, detail);
    }
    if d.contains("invalid config json") || d.contains("failed to parse env") {
        return info(ErrorCategory::Config, ErrorCode::ConfigInvalid, "Configuration could not be parsed.", None, false, detail);
    }
    if d.contains("missing server_url") || d.contains("missing platform id") {
        return info(
            hint.unwrap_or(ErrorCategory::Config),
            ErrorCode::MissingRequiredField,
            "A required field is missing.",
            None,
            false,
            detail,
        );
    }
    if d.contains("https not supported") || d.contains("tls not implemented") || d.contains("not supported") || d.contains("chunked transfer not supported") {
        return info(ErrorCategory::Unsupported, ErrorCode::UnsupportedFeature, "This feature is not supported.", None, false, detail);
    }
    if let Some(status) = http_status {
        if status == 401 || status == 403 {
            return info(ErrorCategory::Auth, ErrorCode::AuthFailure, "Authentication failed.", Some(status), false, detail);
        }
        if status == 404 {
            return info(ErrorCategory::Http, ErrorCode::NotFound, "The requested resource was not found.", Some(status), false, detail);
        }
        if (400..600).contains(&status) {
            let retryable = status >= 500 || matches!(status, 408 | 425 | 429);
            return info(ErrorCategory::Http, ErrorCode::HttpStatus, "The server returned an error.", Some(status), retryable, detail);
        }
    }
    if d.contains("dns") || d.contains("resolve") {
        return info(ErrorCategory::Network, ErrorCode::DnsFailure, "Could not resolve the server address.", None, true, detail);
    }
    if d.contains("connect failed") || d.contains("socket") {
        return info(ErrorCategory::Network, ErrorCode::ConnectFailure, "Could not connect to the server.", None, true, detail);
    }
    if d.contains("timeout") || d.contains("timed out") {
        return info(ErrorCategory::Network, ErrorCode::Timeout, "The connection timed out.", None, true, detail);
    }
    if d.contains("recv failed") || d.contains("send failed") || d.contains("transport") {
        return info(ErrorCategory::Network, ErrorCode::TransportFailure, "A network error occurred.", None, true, detail);
    }
    if d.contains("parse") || d.contains("malformed") || d.contains("json") {
        return info(ErrorCategory::Parse, ErrorCode::ParseFailure, "The response could not be parsed.", None, false, detail);
    }
    if d.contains("write failed") || d.contains("open part failed") || d.contains("seek failed") {
        return info(ErrorCategory::Filesystem, ErrorCode::InvalidData, "A storage error occurred.", None, true, detail);
    }
    if d.contains("no valid files") || d.contains("missing id") {
        return info(ErrorCategory::Data, ErrorCode::InvalidData, "No valid files were found.", None, false, detail);
    }

    info(
        hint.unwrap_or(ErrorCategory::Internal),
        ErrorCode::Internal,
        "An unexpected error occurred.",
        http_status,
        false,
        detail,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_network_timeout_as_retryable() {
        let e = classify("recv failed: timed out", None, None);
        assert_eq!(e.category, ErrorCategory::Network);
        assert!(e.retryable);
    }

    #[test]
    fn classifies_404_as_non_retryable_http() {
        let e = classify("not found", None, Some(404));
        assert_eq!(e.category, ErrorCategory::Http);
        assert_eq!(e.code, ErrorCode::NotFound);
        assert!(!e.retryable);
    }

    #[test]
    fn classifies_503_as_retryable() {
        let e = classify("service unavailable", None, Some(503));
        assert!(e.retryable);
    }

    #[test]
    fn falls_back_to_hint_category() {
        let e = classify("something odd happened", Some(ErrorCategory::Data), None);
        assert_eq!(e.category, ErrorCategory::Data);
        assert_eq!(e.code, ErrorCode::Internal);
    }

    #[test]
    fn unsupported_feature_rule_fires() {
        let e = classify("chunked transfer not supported in streamed mode", None, None);
        assert_eq!(e.category, ErrorCategory::Unsupported);
    }
}
