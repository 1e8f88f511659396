use std::sync::Arc;
use std::time::Duration;
use x2discord_poller::dedup::InMemoryDedupStore;
use x2discord_poller::error::FetchError;
use x2discord_poller::feed::FakeFeedClient;
use x2discord_poller::metrics::Metrics;
use x2discord_poller::model::{Entry, Subscription};
use x2discord_poller::notifier::fake::RecordingNotifier;
use x2discord_poller::store::fake::InMemorySubStore;
use x2discord_poller::PollEngine;

fn sub(channel_id: i64, account: &str) -> Subscription {
    Subscription {
        channel_id,
        thread_id: None,
        account: account.to_string(),
        interval_seconds: 60,
        include_reposts: false,
        include_quotes: false,
        include_keywords: Vec::new(),
        exclude_keywords: Vec::new(),
        last_tweet_id: None,
        start_offset_minutes: 0,
    }
}

fn entry(id: &str) -> Entry {
    Entry {
        id: id.to_string(),
        link: format!("https://x.com/foo/{id}"),
        text: "hello".to_string(),
        raw_text: "hello".to_string(),
    }
}

/// S6 — two subscriptions on the same account but different channels both come due on
/// the same tick. The account-wide minimum spacing means only one of them actually
/// fetches; the other is deferred without calling `FeedClient`.
#[tokio::test(start_paused = true)]
async fn per_account_spacing_holds_across_channels() {
    let feed = Arc::new(FakeFeedClient::new());
    feed.push_entries("foo", vec![entry("p1")]);
    feed.push_entries("foo", vec![entry("p1")]);

    let notifier = Arc::new(RecordingNotifier::new());
    let store = Arc::new(InMemorySubStore::new(vec![
        sub(1, "foo"),
        sub(2, "foo"),
    ]));
    let dedup = Arc::new(InMemoryDedupStore::new());
    let metrics = Arc::new(Metrics::new().unwrap());

    let engine = Arc::new(PollEngine::new(
        feed.clone(),
        notifier,
        store.clone(),
        dedup,
        store,
        metrics,
    ));

    let handle = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.start().await })
    };

    // Let the first tick run and both subscriptions get a chance to be considered.
    tokio::time::sleep(Duration::from_millis(1)).await;
    tokio::task::yield_now().await;

    assert_eq!(
        feed.calls().len(),
        1,
        "only one of the two same-account subscriptions should fetch on the first tick"
    );

    engine.stop();
    let _ = handle.await;
}

/// Invariant 1 — while the dedup store is available, a distinct entry is delivered to a
/// channel at most once even when it reappears in a later poll's result window.
#[tokio::test]
async fn dedup_prevents_redelivery_across_polls() {
    let feed = Arc::new(FakeFeedClient::new());
    // First poll seeds the watermark silently.
    feed.push_entries("foo", vec![entry("p1")]);
    // Second poll: p2 is new, p1 reappears (upstream windows overlap) but must not resend.
    feed.push_entries("foo", vec![entry("p2"), entry("p1")]);
    // Third poll: p1 still trails in the window; only p3 is new.
    feed.push_entries("foo", vec![entry("p3"), entry("p2"), entry("p1")]);

    let notifier = Arc::new(RecordingNotifier::new());
    let store = Arc::new(InMemorySubStore::new(vec![sub(1, "foo")]));
    let dedup = Arc::new(InMemoryDedupStore::new());
    let metrics = Arc::new(Metrics::new().unwrap());

    let engine = PollEngine::new(
        feed.clone(),
        notifier.clone(),
        store.clone(),
        dedup,
        store,
        metrics,
    );

    let s = sub(1, "foo");
    let now = std::time::Instant::now();
    let mut state = x2discord_poller::model::PollState::new(now, Duration::ZERO);

    engine.poll(&s, &mut state, now).await;
    assert!(notifier.deliveries().is_empty());

    engine.poll(&s, &mut state, now + Duration::from_secs(61)).await;
    engine.poll(&s, &mut state, now + Duration::from_secs(122)).await;

    let ids: Vec<String> = notifier.deliveries().into_iter().map(|d| d.entry_id).collect();
    assert_eq!(ids.len(), ids.iter().collect::<std::collections::HashSet<_>>().len(), "no id delivered twice");
    assert!(ids.contains(&"p2".to_string()));
    assert!(ids.contains(&"p3".to_string()));
}

/// Exercises the tick loop end to end through `start()`/`stop()` rather than calling the
/// private `poll` helper directly, confirming the cooperative shutdown contract: `stop()`
/// is observed between iterations without hanging the caller.
#[tokio::test(start_paused = true)]
async fn start_runs_until_stopped() {
    let feed = Arc::new(FakeFeedClient::new());
    feed.push_entries("foo", vec![entry("p1")]);

    let notifier = Arc::new(RecordingNotifier::new());
    let store = Arc::new(InMemorySubStore::new(vec![sub(1, "foo")]));
    let dedup = Arc::new(InMemoryDedupStore::new());
    let metrics = Arc::new(Metrics::new().unwrap());

    let engine = Arc::new(PollEngine::new(feed, notifier, store.clone(), dedup, store, metrics));

    let handle = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.start().await })
    };

    tokio::time::advance(Duration::from_secs(2)).await;
    engine.stop();

    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("stop() should unblock start() promptly")
        .unwrap();
}

/// A fetch that fails for a reason other than 429/403 reschedules at `interval_seconds`
/// and never touches the watermark.
#[tokio::test]
async fn generic_fetch_error_reschedules_without_touching_watermark() {
    let feed = Arc::new(FakeFeedClient::new());
    feed.push("foo", Err(FetchError::UpstreamOther("boom".to_string())));

    let notifier = Arc::new(RecordingNotifier::new());
    let store = Arc::new(InMemorySubStore::new(vec![sub(1, "foo")]));
    let dedup = Arc::new(InMemoryDedupStore::new());
    let metrics = Arc::new(Metrics::new().unwrap());

    let engine = PollEngine::new(feed, notifier, store.clone(), dedup, store, metrics);
    let s = sub(1, "foo");
    let now = std::time::Instant::now();
    let mut state = x2discord_poller::model::PollState::new(now, Duration::ZERO);
    state.last_id = Some("p0".to_string());

    engine.poll(&s, &mut state, now).await;

    assert_eq!(state.last_id, Some("p0".to_string()));
    assert!(state.next_run > now);
}
