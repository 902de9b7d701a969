//! Retry: backoff computation, failure classification and the retrying executor.

pub mod backoff;
pub mod classify;
pub mod executor;

pub use backoff::{compute_delay, compute_delay_with};
pub use classify::{classify, detect_overload, is_retryable};
pub use executor::{Execution, RetryingExecutor};
