use anyhow::Result;
use clap::Parser;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tracing::info;
use x2discord_poller::config::Args;
use x2discord_poller::dedup::RedisDedupStore;
use x2discord_poller::feed::HttpFeedClient;
use x2discord_poller::logging::init_logging;
use x2discord_poller::metrics::{self, Metrics};
use x2discord_poller::notifier::LoggingNotifier;
use x2discord_poller::store::FileStore;
use x2discord_poller::PollEngine;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    args.validate()?;

    let _log_guard = init_logging(&args.log_dir)?;
    info!(?args, "x2discord-poller starting");

    let metrics = Arc::new(Metrics::new()?);

    let app = axum::Router::new().route(
        "/metrics",
        axum::routing::get({
            let metrics = metrics.clone();
            move || metrics::metrics_handler(metrics.clone())
        }),
    );
    let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), args.metrics_port);
    tokio::spawn(async move {
        let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
        axum::serve(listener, app).await.unwrap();
    });

    let feed = Arc::new(HttpFeedClient::new(
        args.feed_base_url.clone(),
        args.feed_refresh_seconds,
    )?);
    let notifier = Arc::new(LoggingNotifier);
    let store = Arc::new(FileStore::load(&args.watermark_path, args.default_interval_seconds).await?);
    let dedup = Arc::new(RedisDedupStore::connect(&args.dedup_redis_url, "x2discord").await);

    let engine = PollEngine::new(feed, notifier, store.clone(), dedup, store, metrics);

    engine.start().await;
    Ok(())
}
