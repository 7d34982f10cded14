// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Best-effort error taxonomy over heterogeneous handler errors.
//!
//! Advisory metadata attached to a persisted failure, never control flow.

use serde::{Deserialize, Serialize};

/// Closed taxonomy of error codes, classified from error text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    FileNotFound,
    ParseError,
    NetworkError,
    DatabaseError,
    ValidationError,
    AiError,
    Timeout,
    Unknown,
}

crate::simple_display! {
    ErrorCode {
        FileNotFound => "file_not_found",
        ParseError => "parse_error",
        NetworkError => "network_error",
        DatabaseError => "database_error",
        ValidationError => "validation_error",
        AiError => "ai_error",
        Timeout => "timeout",
        Unknown => "unknown",
    }
}

impl ErrorCode {
    pub const fn retryable(self) -> bool {
        match self {
            Self::FileNotFound => false,
            Self::ParseError => false,
            Self::NetworkError => true,
            Self::DatabaseError => true,
            Self::ValidationError => false,
            Self::AiError => true,
            Self::Timeout => true,
            Self::Unknown => true,
        }
    }

    pub const fn recoverable(self) -> bool {
        match self {
            Self::FileNotFound => true,
            Self::ParseError => true,
            Self::NetworkError => true,
            Self::DatabaseError => false,
            Self::ValidationError => true,
            Self::AiError => true,
            Self::Timeout => true,
            Self::Unknown => false,
        }
    }
}

/// Classification result attached to a persisted failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorContext {
    pub stage: String,
    pub code: ErrorCode,
    pub message: String,
    pub retryable: bool,
    pub recoverable: bool,
}

/// Classify an error's text for the given stage. Matching is a lowercased
/// substring search over a fixed, ordered pattern list — acceptable as a
/// best-effort taxonomy over backends with no typed errors of their own.
pub fn classify(stage: &str, err: &str) -> ErrorContext {
    let lower = err.to_lowercase();
    let code = if lower.contains("not found") || lower.contains("no such file") {
        ErrorCode::FileNotFound
    } else if lower.contains("parse") || lower.contains("malformed") {
        ErrorCode::ParseError
    } else if lower.contains("timeout") || lower.contains("timed out") {
        ErrorCode::Timeout
    } else if lower.contains("network") || lower.contains("connection") || lower.contains("dns") {
        ErrorCode::NetworkError
    } else if lower.contains("database") || lower.contains("sql") || lower.contains("postgres") {
        ErrorCode::DatabaseError
    } else if lower.contains("validation") || lower.contains("invalid") {
        ErrorCode::ValidationError
    } else if lower.contains("model") || lower.contains(" ai ") || lower.contains("llm") {
        ErrorCode::AiError
    } else {
        ErrorCode::Unknown
    };

    ErrorContext {
        stage: stage.to_string(),
        code,
        message: err.to_string(),
        retryable: code.retryable(),
        recoverable: code.recoverable(),
    }
}

#[cfg(test)]
#[path = "error_classifier_tests.rs"]
mod tests;
