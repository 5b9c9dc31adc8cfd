use std::fmt;
use thiserror::Error;

use crate::config::API_KEY_ENV;

/// Failures of a single request against the missions API.
///
/// None of these are retried. The binary prints the rendered message to
/// stderr and exits with status 1.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("ERROR: {} environment variable not set", API_KEY_ENV)]
    MissingApiKey,

    #[error("ERROR: {} contains characters not allowed in an HTTP header", API_KEY_ENV)]
    InvalidApiKey,

    #[error("Connection Error: {0}")]
    Transport(String),

    #[error("HTTP Error {status}: {reason}{detail}")]
    Http {
        status: u16,
        reason: String,
        detail: ErrorDetail,
    },

    #[error("Invalid JSON response from {path}")]
    InvalidResponse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    pub fn http(status: reqwest::StatusCode, body: &str) -> Self {
        Self::Http {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            detail: ErrorDetail::parse(body),
        }
    }

    /// Flattens the whole source chain into one line.
    pub fn transport(err: &reqwest::Error) -> Self {
        let mut parts = vec![err.to_string()];
        let mut source = std::error::Error::source(err);
        while let Some(cause) = source {
            let msg = cause.to_string();
            if !parts.contains(&msg) {
                parts.push(msg);
            }
            source = cause.source();
        }
        Self::Transport(parts.join(": "))
    }
}

/// Body of an error response: structured when it parses as JSON, raw text
/// otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorDetail {
    None,
    Json(serde_json::Value),
    Text(String),
}

impl ErrorDetail {
    pub fn parse(body: &str) -> Self {
        if body.is_empty() {
            return Self::None;
        }
        match serde_json::from_str::<serde_json::Value>(body) {
            Ok(v) => Self::Json(v),
            Err(_) => Self::Text(body.to_string()),
        }
    }
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => Ok(()),
            Self::Json(v) => {
                let pretty = serde_json::to_string_pretty(v).map_err(|_| fmt::Error)?;
                write!(f, "\nDetails: {}", pretty)
            }
            Self::Text(t) => write!(f, "\nDetails: {}", t),
        }
    }
}
