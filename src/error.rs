use thiserror::Error;

/// Errors a `FeedClient` fetch can raise. `PollEngine` branches on these kinds directly
/// rather than string-matching a generic error, so they stay typed all the way up.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("rate limited (retry_after={retry_after:?})")]
    RateLimited { retry_after: Option<u64> },
    #[error("forbidden")]
    Forbidden,
    #[error("request timed out")]
    Timeout,
    #[error("upstream error: {0}")]
    UpstreamOther(String),
}

/// Account/keyword normalization failures, surfaced synchronously to whatever CRUD caller
/// constructs a `Subscription` — never touches engine state.
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("account name must not be empty")]
    EmptyAccount,
}
