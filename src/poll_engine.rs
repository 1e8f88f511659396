//! The scheduler. Generalizes `tvc_tracker::poller::run_poll` from one RPC collaborator
//! to five trait-bounded collaborators (feed, notifier, subscriptions, dedup, watermark),
//! keeping the same single-task cooperative tick shape.

use crate::dedup::DedupStore;
use crate::error::FetchError;
use crate::feed::FeedClient;
use crate::filter::should_include;
use crate::metrics::Metrics;
use crate::model::{subscription_key, Entry, PollState, Subscription, SubscriptionKey};
use crate::notifier::Notifier;
use crate::rate_gate::RateGate;
use crate::store::{SubStore, WatermarkStore};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Notify};
use tracing::{debug, info, warn};

const EMPTY_SUBS_SLEEP: Duration = Duration::from_secs(5);
const INTER_TICK_SLEEP: Duration = Duration::from_secs(1);
const FIRST_POLL_MAX_RESULTS: u32 = 1;
const STEADY_STATE_MAX_RESULTS: u32 = 5;

pub struct PollEngine<F, N, S, D, W> {
    feed: Arc<F>,
    notifier: Arc<N>,
    subs: Arc<S>,
    dedup: Arc<D>,
    watermark: Arc<W>,
    metrics: Arc<Metrics>,
    rate_gate: Mutex<RateGate>,
    states: Mutex<HashMap<SubscriptionKey, PollState>>,
    stop: Notify,
}

impl<F, N, S, D, W> PollEngine<F, N, S, D, W>
where
    F: FeedClient,
    N: Notifier,
    S: SubStore,
    D: DedupStore,
    W: WatermarkStore,
{
    pub fn new(
        feed: Arc<F>,
        notifier: Arc<N>,
        subs: Arc<S>,
        dedup: Arc<D>,
        watermark: Arc<W>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            feed,
            notifier,
            subs,
            dedup,
            watermark,
            metrics,
            rate_gate: Mutex::new(RateGate::new()),
            states: Mutex::new(HashMap::new()),
            stop: Notify::new(),
        }
    }

    /// Runs the tick loop until `stop()` is called. Mirrors `tvc_tracker::poller::run_poll`'s
    /// shape, generalized to a plain `loop { tick(); sleep }` with a cancellable sleep.
    pub async fn start(&self) {
        loop {
            if self.sleep_or_stop(Duration::ZERO).await {
                return;
            }

            let subs = match self.subs.list().await {
                Ok(subs) => subs,
                Err(e) => {
                    warn!(error = %e, "failed to list subscriptions");
                    if self.sleep_or_stop(EMPTY_SUBS_SLEEP).await {
                        return;
                    }
                    continue;
                }
            };

            self.metrics.subscriptions_loaded.set(subs.len() as i64);

            if subs.is_empty() {
                if self.sleep_or_stop(EMPTY_SUBS_SLEEP).await {
                    return;
                }
                continue;
            }

            let now = Instant::now();
            for sub in &subs {
                self.maybe_poll(sub, now).await;
            }
            self.metrics.ticks_total.inc();

            if self.sleep_or_stop(INTER_TICK_SLEEP).await {
                return;
            }
        }
    }

    pub fn stop(&self) {
        self.stop.notify_one();
    }

    /// Sleeps for `duration` (skipped if zero) racing the stop signal. Returns `true` if
    /// a stop was observed and the caller should exit the loop.
    async fn sleep_or_stop(&self, duration: Duration) -> bool {
        if duration.is_zero() {
            return false;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => false,
            _ = self.stop.notified() => true,
        }
    }

    pub async fn maybe_poll(&self, sub: &Subscription, now: Instant) {
        let key = subscription_key(sub);

        let mut states = self.states.lock().await;
        if !states.contains_key(&key) {
            let offset = Duration::from_secs(sub.start_offset_minutes as u64 * 60);
            states.insert(key.clone(), PollState::new(now, offset));
        }
        let mut state = states.remove(&key).unwrap();
        drop(states);

        if state.last_id.is_none() {
            if let Some(seed) = &sub.last_tweet_id {
                state.last_id = Some(seed.clone());
            } else {
                match self.watermark.get(sub.channel_id, &sub.account).await {
                    Ok(Some(seed)) => state.last_id = Some(seed),
                    Ok(None) => {}
                    Err(e) => warn!(account = %sub.account, error = %e, "watermark lookup failed"),
                }
            }
        }

        {
            let gate = self.rate_gate.lock().await;
            if let Some(earliest) = gate.earliest_legal(&sub.account, now) {
                state.next_run = state.next_run.max(earliest);
            }
        }

        if now < state.next_run {
            self.states.lock().await.insert(key, state);
            return;
        }

        self.poll(sub, &mut state, now).await;
        self.states.lock().await.insert(key, state);
    }

    pub async fn poll(&self, sub: &Subscription, state: &mut PollState, now: Instant) {
        let max_results = if state.last_id.is_none() {
            FIRST_POLL_MAX_RESULTS
        } else {
            STEADY_STATE_MAX_RESULTS
        };

        {
            let mut gate = self.rate_gate.lock().await;
            gate.record_call(&sub.account, now);
        }

        self.metrics.polls_attempted.inc();
        let entries = match self.feed.fetch(&sub.account, max_results).await {
            Ok(entries) => entries,
            Err(FetchError::RateLimited { retry_after }) => {
                self.metrics.polls_rate_limited.inc();
                let backoff = RateGate::backoff_for_rate_limit(
                    retry_after,
                    sub.interval_seconds,
                    state.backoff_multiplier,
                );
                state.backoff_multiplier = RateGate::next_backoff_multiplier(state.backoff_multiplier);
                state.next_run = now + backoff;
                self.metrics
                    .backoff_multiplier
                    .with_label_values(&[&sub.account])
                    .set(state.backoff_multiplier as i64);
                debug!(account = %sub.account, ?backoff, "rate limited, backing off");
                return;
            }
            Err(FetchError::Forbidden) => {
                self.metrics.polls_forbidden.inc();
                state.next_run = now + Duration::from_secs(sub.interval_seconds.max(60));
                warn!(account = %sub.account, "feed fetch forbidden");
                return;
            }
            Err(e) => {
                self.metrics.polls_errored.inc();
                state.next_run = now + Duration::from_secs(sub.interval_seconds);
                warn!(account = %sub.account, error = %e, "feed fetch failed");
                return;
            }
        };

        self.metrics.polls_succeeded.inc();
        state.next_run = now + Duration::from_secs(sub.interval_seconds);
        state.backoff_multiplier = 1;
        self.metrics
            .backoff_multiplier
            .with_label_values(&[&sub.account])
            .set(1);

        if entries.is_empty() {
            return;
        }

        let latest_id = entries[0].id.clone();
        let first_poll = state.last_id.is_none();

        if first_poll {
            state.last_id = Some(latest_id);
            self.persist_watermark(sub, state).await;
            return;
        }

        let watermark = state.last_id.clone().unwrap();
        let mut candidates: Vec<(&Entry, String)> = Vec::new();
        for entry in &entries {
            if entry.id == watermark {
                break;
            }
            if entry.id.is_empty() && entry.link.is_empty() {
                self.metrics.entries_malformed.inc();
                debug!(account = %sub.account, "skipping entry with neither id nor link");
                continue;
            }

            let id_key = entry.id.clone();
            let link_key = entry.link.clone();

            if self.dedup_contains(sub.channel_id, &id_key, &link_key).await {
                self.metrics.entries_deduped.inc();
                continue;
            }

            if !should_include(entry, sub) {
                self.metrics.entries_filtered.inc();
                continue;
            }

            let send_key = if !link_key.is_empty() { link_key } else { id_key };
            candidates.push((entry, send_key));
        }

        state.last_id = Some(latest_id);
        self.persist_watermark(sub, state).await;

        for (entry, send_key) in candidates.into_iter().rev() {
            match self
                .notifier
                .send(sub.channel_id, sub.thread_id, entry)
                .await
            {
                Ok(()) => {
                    self.metrics.entries_delivered.inc();
                    self.dedup.add(sub.channel_id, &send_key).await;
                    if !entry.id.is_empty() && entry.id != send_key {
                        self.dedup.add(sub.channel_id, &entry.id).await;
                    }
                    if !entry.link.is_empty() && entry.link != send_key {
                        self.dedup.add(sub.channel_id, &entry.link).await;
                    }
                }
                Err(e) => {
                    self.metrics.send_errors.inc();
                    warn!(account = %sub.account, entry_id = %entry.id, error = %e, "send failed");
                }
            }
        }

        info!(account = %sub.account, channel_id = sub.channel_id, "tick complete");
    }

    async fn dedup_contains(&self, channel_id: i64, id_key: &str, link_key: &str) -> bool {
        if !id_key.is_empty() && self.dedup.contains(channel_id, id_key).await {
            return true;
        }
        if !link_key.is_empty() && self.dedup.contains(channel_id, link_key).await {
            return true;
        }
        false
    }

    async fn persist_watermark(&self, sub: &Subscription, state: &PollState) {
        let Some(last_id) = &state.last_id else {
            return;
        };
        if let Err(e) = self.watermark.set(sub.channel_id, &sub.account, last_id).await {
            self.metrics
                .watermark_write_failures
                .with_label_values(&[&sub.account])
                .inc();
            warn!(account = %sub.account, error = %e, "watermark persist failed");
        }
    }
}
