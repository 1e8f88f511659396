use anyhow::Result;
use axum::http::{HeaderMap, HeaderValue};
use prometheus::{
    Encoder, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,

    // === Tick loop ===
    pub ticks_total: IntCounter,
    pub subscriptions_loaded: IntGauge,

    // === Poll outcomes ===
    pub polls_attempted: IntCounter,
    pub polls_succeeded: IntCounter,
    pub polls_rate_limited: IntCounter,
    pub polls_forbidden: IntCounter,
    pub polls_errored: IntCounter,

    // === Entries ===
    pub entries_delivered: IntCounter,
    pub entries_filtered: IntCounter,
    pub entries_deduped: IntCounter,
    pub entries_malformed: IntCounter,
    pub send_errors: IntCounter,

    // === Per-account state ===
    pub backoff_multiplier: IntGaugeVec,

    // === Store health ===
    pub watermark_write_failures: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let ticks_total = IntCounter::with_opts(Opts::new(
            "x2discord_ticks_total",
            "Number of scheduler tick iterations completed",
        ))?;

        let subscriptions_loaded = IntGauge::with_opts(Opts::new(
            "x2discord_subscriptions_loaded",
            "Subscription count observed on the most recent SubStore.List()",
        ))?;

        let polls_attempted = IntCounter::with_opts(Opts::new(
            "x2discord_polls_attempted_total",
            "Number of FeedClient.Fetch calls made",
        ))?;

        let polls_succeeded = IntCounter::with_opts(Opts::new(
            "x2discord_polls_succeeded_total",
            "Number of fetches that returned successfully",
        ))?;

        let polls_rate_limited = IntCounter::with_opts(Opts::new(
            "x2discord_polls_rate_limited_total",
            "Number of fetches that hit HTTP 429",
        ))?;

        let polls_forbidden = IntCounter::with_opts(Opts::new(
            "x2discord_polls_forbidden_total",
            "Number of fetches that hit HTTP 403",
        ))?;

        let polls_errored = IntCounter::with_opts(Opts::new(
            "x2discord_polls_errored_total",
            "Number of fetches that failed for any other reason",
        ))?;

        let entries_delivered = IntCounter::with_opts(Opts::new(
            "x2discord_entries_delivered_total",
            "Number of entries successfully handed to Notifier.Send",
        ))?;

        let entries_filtered = IntCounter::with_opts(Opts::new(
            "x2discord_entries_filtered_total",
            "Number of candidate entries rejected by FilterEngine",
        ))?;

        let entries_deduped = IntCounter::with_opts(Opts::new(
            "x2discord_entries_deduped_total",
            "Number of candidate entries skipped as already-delivered",
        ))?;

        let entries_malformed = IntCounter::with_opts(Opts::new(
            "x2discord_entries_malformed_total",
            "Number of entries skipped for having neither id nor link",
        ))?;

        let send_errors = IntCounter::with_opts(Opts::new(
            "x2discord_send_errors_total",
            "Number of Notifier.Send calls that returned an error",
        ))?;

        let backoff_multiplier = IntGaugeVec::new(
            Opts::new(
                "x2discord_backoff_multiplier",
                "Current rate-limit backoff multiplier per account",
            ),
            &["account"],
        )?;

        let watermark_write_failures = IntCounterVec::new(
            Opts::new(
                "x2discord_watermark_write_failures_total",
                "Number of WatermarkStore.Set calls that returned an error",
            ),
            &["account"],
        )?;

        registry.register(Box::new(ticks_total.clone()))?;
        registry.register(Box::new(subscriptions_loaded.clone()))?;
        registry.register(Box::new(polls_attempted.clone()))?;
        registry.register(Box::new(polls_succeeded.clone()))?;
        registry.register(Box::new(polls_rate_limited.clone()))?;
        registry.register(Box::new(polls_forbidden.clone()))?;
        registry.register(Box::new(polls_errored.clone()))?;
        registry.register(Box::new(entries_delivered.clone()))?;
        registry.register(Box::new(entries_filtered.clone()))?;
        registry.register(Box::new(entries_deduped.clone()))?;
        registry.register(Box::new(entries_malformed.clone()))?;
        registry.register(Box::new(send_errors.clone()))?;
        registry.register(Box::new(backoff_multiplier.clone()))?;
        registry.register(Box::new(watermark_write_failures.clone()))?;

        Ok(Self {
            registry,
            ticks_total,
            subscriptions_loaded,
            polls_attempted,
            polls_succeeded,
            polls_rate_limited,
            polls_forbidden,
            polls_errored,
            entries_delivered,
            entries_filtered,
            entries_deduped,
            entries_malformed,
            send_errors,
            backoff_multiplier,
            watermark_write_failures,
        })
    }

    pub fn render(&self) -> (HeaderMap, String) {
        let families = self.registry.gather();
        let encoder = TextEncoder::new();
        let mut buf = Vec::new();
        encoder.encode(&families, &mut buf).expect("encode metrics");
        let body = String::from_utf8(buf).expect("utf8 metrics");

        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::CONTENT_TYPE,
            HeaderValue::from_str(encoder.format_type()).unwrap(),
        );
        (headers, body)
    }
}

pub async fn metrics_handler(metrics: Arc<Metrics>) -> (HeaderMap, String) {
    metrics.render()
}
