//! Classification of raw analyzer errors into kinded [`ExecutorError`]s.
//!
//! Analyzers are black boxes: whatever they throw arrives as an
//! [`anyhow::Error`]. Classification matches the error's textual signature
//! (including its cause chain) against an ordered pattern table; the first
//! matching row wins. No match means [`ErrorCode::Unknown`].

use crate::error::{ErrorCode, ExecutorError};
use crate::types::PipelineStage;

/// Ordered signature table. Earlier rows win ties, so the more specific
/// transport signatures come before the generic ones.
const PATTERNS: &[(ErrorCode, &[&str])] = &[
    (
        ErrorCode::RateLimit,
        &["429", "rate limit", "quota", "throttl"],
    ),
    (
        ErrorCode::NetworkError,
        &[
            "econnrefused",
            "enotfound",
            "etimedout",
            "fetch failed",
            "dns",
            "socket",
        ],
    ),
    (
        ErrorCode::ServiceUnavailable,
        &["500", "502", "503", "service unavailable", "overloaded"],
    ),
    (ErrorCode::Timeout, &["timeout", "timed out", "deadline"]),
    (
        ErrorCode::Authentication,
        &["401", "403", "unauthorized", "invalid api key", "forbidden"],
    ),
    (
        ErrorCode::ContentFilter,
        &["safety", "blocked", "policy", "content filter"],
    ),
    (
        ErrorCode::SchemaValidation,
        &["parse", "schema", "validation"],
    ),
    (ErrorCode::Cancelled, &["cancel", "abort"]),
];

/// Map a raw analyzer error to an [`ExecutorError`]. Never fails.
///
/// An error that already is an `ExecutorError` passes through with its
/// stage and attempt refreshed, so classification is idempotent across
/// layers.
pub fn classify_error(
    err: &anyhow::Error,
    stage: PipelineStage,
    attempt: Option<u32>,
) -> ExecutorError {
    if let Some(inner) = err.downcast_ref::<ExecutorError>() {
        let mut out = inner.clone();
        out.stage = stage;
        if attempt.is_some() {
            out.attempt = attempt;
        }
        return out;
    }

    // {:#} renders the whole cause chain, so signatures buried in a wrapped
    // source error still match.
    let text = format!("{:#}", err).to_lowercase();
    let code = PATTERNS
        .iter()
        .find(|(_, sigs)| sigs.iter().any(|sig| text.contains(sig)))
        .map(|(code, _)| *code)
        .unwrap_or(ErrorCode::Unknown);

    let mut out = ExecutorError::new(code, format!("{:#}", err), stage);
    out.attempt = attempt;
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    fn code_of(msg: &str) -> (ErrorCode, bool) {
        let e = classify_error(&anyhow!(msg.to_string()), PipelineStage::Dimensions, None);
        (e.code, e.recoverable)
    }

    #[test]
    fn test_rate_limit_signatures() {
        assert_eq!(
            code_of("429 Too Many Requests"),
            (ErrorCode::RateLimit, true)
        );
        assert_eq!(code_of("rate limit reached"), (ErrorCode::RateLimit, true));
        assert_eq!(code_of("quota exhausted"), (ErrorCode::RateLimit, true));
        assert_eq!(code_of("request throttled"), (ErrorCode::RateLimit, true));
    }

    #[test]
    fn test_network_signatures() {
        assert_eq!(
            code_of("connect ECONNREFUSED 127.0.0.1:443"),
            (ErrorCode::NetworkError, true)
        );
        assert_eq!(
            code_of("getaddrinfo ENOTFOUND api.example.com"),
            (ErrorCode::NetworkError, true)
        );
        assert_eq!(code_of("fetch failed"), (ErrorCode::NetworkError, true));
        assert_eq!(code_of("dns lookup error"), (ErrorCode::NetworkError, true));
        assert_eq!(code_of("socket hang up"), (ErrorCode::NetworkError, true));
    }

    #[test]
    fn test_etimedout_is_network_not_timeout() {
        // the network row comes before the timeout row in the table
        assert_eq!(code_of("connect ETIMEDOUT"), (ErrorCode::NetworkError, true));
    }

    #[test]
    fn test_unavailable_signatures() {
        assert_eq!(
            code_of("HTTP 503 Service Unavailable"),
            (ErrorCode::ServiceUnavailable, true)
        );
        assert_eq!(
            code_of("502 bad gateway"),
            (ErrorCode::ServiceUnavailable, true)
        );
        assert_eq!(
            code_of("HTTP 500 internal server error"),
            (ErrorCode::ServiceUnavailable, true)
        );
    }

    #[test]
    fn test_timeout_signatures() {
        assert_eq!(code_of("request timed out"), (ErrorCode::Timeout, true));
        assert_eq!(code_of("deadline exceeded"), (ErrorCode::Timeout, true));
    }

    #[test]
    fn test_fatal_signatures() {
        assert_eq!(
            code_of("401 unauthorized"),
            (ErrorCode::Authentication, false)
        );
        assert_eq!(
            code_of("invalid api key provided"),
            (ErrorCode::Authentication, false)
        );
        assert_eq!(
            code_of("response blocked by safety system"),
            (ErrorCode::ContentFilter, false)
        );
        assert_eq!(
            code_of("failed to parse model output"),
            (ErrorCode::SchemaValidation, false)
        );
        assert_eq!(
            code_of("schema mismatch in field 'verdict'"),
            (ErrorCode::SchemaValidation, false)
        );
        assert_eq!(code_of("operation aborted"), (ErrorCode::Cancelled, false));
    }

    #[test]
    fn test_unknown_fallback() {
        assert_eq!(
            code_of("something inexplicable happened"),
            (ErrorCode::Unknown, false)
        );
    }

    #[test]
    fn test_deterministic_over_fixture() {
        // same input, same (code, recoverable) pair, every time
        let fixture = [
            "429 Too Many Requests",
            "connect ECONNREFUSED",
            "HTTP 503",
            "timed out",
            "403 forbidden",
            "policy violation",
            "validation failed",
            "cancelled by user",
            "mystery",
        ];
        for msg in fixture {
            let a = code_of(msg);
            let b = code_of(msg);
            assert_eq!(a, b, "classification of {:?} not stable", msg);
        }
    }

    #[test]
    fn test_matches_signature_in_cause_chain() {
        let root = anyhow!("connection reset by peer (socket)");
        let wrapped = root.context("dimension analyzer failed");
        let e = classify_error(&wrapped, PipelineStage::Dimensions, Some(2));
        assert_eq!(e.code, ErrorCode::NetworkError);
        assert_eq!(e.attempt, Some(2));
    }

    #[test]
    fn test_executor_error_passes_through() {
        let inner = ExecutorError::new(ErrorCode::ContentFilter, "flagged", PipelineStage::Verdict);
        let raw = anyhow::Error::new(inner);
        let e = classify_error(&raw, PipelineStage::Secondary, Some(1));
        assert_eq!(e.code, ErrorCode::ContentFilter);
        assert_eq!(e.stage, PipelineStage::Secondary);
        assert_eq!(e.attempt, Some(1));
    }

    #[test]
    fn test_first_match_wins_on_mixed_text() {
        // contains both "rate limit" and "timeout"; the rate-limit row is first
        assert_eq!(
            code_of("rate limit: request timeout while throttled"),
            (ErrorCode::RateLimit, true)
        );
    }
}
