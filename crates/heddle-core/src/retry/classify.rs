//! Failure classification: is a failed attempt worth retrying?
//!
//! Only failures that look like rate limiting or server overload are
//! transient. Everything else surfaces immediately.

use crate::domain::config::RetryConfig;
use crate::domain::errors::{FailureKind, WorkerError};
use crate::ports::WorkerOutput;

/// Phrases that mark a rate-limit / overload failure (matched case-insensitively).
pub const OVERLOAD_SIGNALS: &[&str] = &[
    "rate limit",
    "rate_limit",
    "rate-limit",
    "too many requests",
    "overloaded",
    "quota exceeded",
];

/// Does a failed attempt's output signal rate limiting or overload?
///
/// Successful attempts are never overloaded. A code matches only as a whole
/// number (`"Error 429:"` matches 429, `"14290"` does not).
pub fn detect_overload(output: &str, success: bool, retryable_codes: &[u16]) -> bool {
    if success {
        return false;
    }
    let lower = output.to_lowercase();
    if OVERLOAD_SIGNALS.iter().any(|s| lower.contains(s)) {
        return true;
    }
    numbers_in(output).any(|n| retryable_codes.contains(&n))
}

/// Classify one attempt. `None` means the attempt succeeded.
pub fn classify(
    result: &Result<WorkerOutput, WorkerError>,
    config: &RetryConfig,
) -> Option<FailureKind> {
    match result {
        Ok(out) if out.success => None,
        Ok(out) => {
            if detect_overload(&out.output, false, config.retryable_codes()) {
                Some(FailureKind::Transient)
            } else {
                Some(FailureKind::Terminal)
            }
        }
        Err(_) => Some(FailureKind::Crash),
    }
}

/// True only for transient failures. Crashes and terminal failures are not retried.
pub fn is_retryable(result: &Result<WorkerOutput, WorkerError>, config: &RetryConfig) -> bool {
    classify(result, config) == Some(FailureKind::Transient)
}

/// Whole decimal numbers (up to u16) appearing in `text`.
fn numbers_in(text: &str) -> impl Iterator<Item = u16> + '_ {
    text.split(|c: char| !c.is_ascii_digit())
        .filter(|run| !run.is_empty() && run.len() <= 5)
        .filter_map(|run| run.parse::<u16>().ok())
}
