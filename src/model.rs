use std::time::{Duration, Instant};

/// One item fetched from upstream, already reduced to the fields the engine needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Stable identifier, derived via the fallback chain `guid -> id -> link -> "<account>-<index>"`.
    pub id: String,
    /// Canonical URL; may be empty.
    pub link: String,
    /// Human-readable body, HTML stripped and entities decoded.
    pub text: String,
    /// Original body including markup, used only for structural detection (quote markers etc).
    pub raw_text: String,
}

/// Immutable binding of one upstream account to one destination channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub channel_id: i64,
    pub thread_id: Option<i64>,
    pub account: String,
    pub interval_seconds: u64,
    pub include_reposts: bool,
    pub include_quotes: bool,
    pub include_keywords: Vec<String>,
    pub exclude_keywords: Vec<String>,
    /// Watermark snapshot at load time, seeds `PollState::last_id` on first observation.
    pub last_tweet_id: Option<String>,
    /// Minutes into `interval_seconds` a newly created subscription's first run is delayed by,
    /// so many subscriptions sharing an interval don't all come due on the same tick.
    pub start_offset_minutes: u32,
}

/// In-memory per-subscription runtime state, keyed by `(channel_id, account)` by the caller.
#[derive(Debug, Clone)]
pub struct PollState {
    pub next_run: Instant,
    pub last_id: Option<String>,
    pub backoff_multiplier: u32,
}

impl PollState {
    pub fn new(now: Instant, start_offset: Duration) -> Self {
        Self {
            next_run: now + start_offset,
            last_id: None,
            backoff_multiplier: 1,
        }
    }
}

pub type SubscriptionKey = (i64, String);

pub fn subscription_key(sub: &Subscription) -> SubscriptionKey {
    (sub.channel_id, sub.account.to_lowercase())
}
