// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    file_not_found = { ErrorCode::FileNotFound, false, true },
    parse_error = { ErrorCode::ParseError, false, true },
    network_error = { ErrorCode::NetworkError, true, true },
    database_error = { ErrorCode::DatabaseError, true, false },
    validation_error = { ErrorCode::ValidationError, false, true },
    ai_error = { ErrorCode::AiError, true, true },
    timeout = { ErrorCode::Timeout, true, true },
    unknown = { ErrorCode::Unknown, true, false },
)]
fn retryable_recoverable_table_matches_spec(code: ErrorCode, retryable: bool, recoverable: bool) {
    assert_eq!(code.retryable(), retryable);
    assert_eq!(code.recoverable(), recoverable);
}

#[parameterized(
    not_found = { "open foo.txt: no such file or directory", ErrorCode::FileNotFound },
    parse = { "failed to parse response body", ErrorCode::ParseError },
    timeout = { "request timed out after 30s", ErrorCode::Timeout },
    network = { "connection reset by peer", ErrorCode::NetworkError },
    database = { "database constraint violation", ErrorCode::DatabaseError },
    validation = { "invalid payload: missing field", ErrorCode::ValidationError },
    ai = { "model returned an empty completion", ErrorCode::AiError },
    unknown = { "something went sideways", ErrorCode::Unknown },
)]
fn classify_matches_substrings(text: &str, expected: ErrorCode) {
    let ctx = classify("execute", text);
    assert_eq!(ctx.code, expected);
    assert_eq!(ctx.retryable, expected.retryable());
    assert_eq!(ctx.recoverable, expected.recoverable());
}

#[test]
fn classify_is_case_insensitive() {
    let ctx = classify("execute", "CONNECTION REFUSED");
    assert_eq!(ctx.code, ErrorCode::NetworkError);
}

#[test]
fn classify_preserves_stage_and_message() {
    let ctx = classify("ingest", "boom");
    assert_eq!(ctx.stage, "ingest");
    assert_eq!(ctx.message, "boom");
}

#[test]
fn error_code_display_matches_wire_strings() {
    assert_eq!(ErrorCode::FileNotFound.to_string(), "file_not_found");
    assert_eq!(ErrorCode::NetworkError.to_string(), "network_error");
    assert_eq!(ErrorCode::Unknown.to_string(), "unknown");
}
