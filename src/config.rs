use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Args {
    /// Floor applied to every subscription's interval_seconds
    #[arg(long, env = "X2DISCORD_MIN_INTERVAL_SECONDS", default_value_t = 30)]
    pub min_interval_seconds: u64,

    /// Interval used for subscriptions that don't specify one
    #[arg(long, env = "X2DISCORD_DEFAULT_INTERVAL_SECONDS", default_value_t = 300)]
    pub default_interval_seconds: u64,

    /// Base URL of the RSSHub-shaped feed producer
    #[arg(long, env = "X2DISCORD_FEED_BASE_URL", default_value = "http://localhost:1200")]
    pub feed_base_url: String,

    /// Optional refresh=<seconds> query parameter to pass through on every fetch
    #[arg(long, env = "X2DISCORD_FEED_REFRESH_SECONDS")]
    pub feed_refresh_seconds: Option<u64>,

    /// Redis URL backing the dedup store
    #[arg(long, env = "X2DISCORD_DEDUP_REDIS_URL", default_value = "redis://127.0.0.1/")]
    pub dedup_redis_url: String,

    /// Path to the JSON file backing subscriptions and watermarks
    #[arg(long, env = "X2DISCORD_WATERMARK_PATH", default_value = "data/watermarks.json")]
    pub watermark_path: String,

    /// Directory to write logs to
    #[arg(long, env = "X2DISCORD_LOG_DIR", default_value = "logs")]
    pub log_dir: String,

    /// Port to serve /metrics on
    #[arg(long, env = "X2DISCORD_METRICS_PORT", default_value_t = 7999)]
    pub metrics_port: u16,
}

impl Args {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.min_interval_seconds == 0 {
            anyhow::bail!("--min-interval-seconds must be greater than zero");
        }
        if self.default_interval_seconds < self.min_interval_seconds {
            anyhow::bail!("--default-interval-seconds must be >= --min-interval-seconds");
        }
        if self.feed_base_url.trim().is_empty() {
            anyhow::bail!("--feed-base-url must not be empty");
        }
        Ok(())
    }
}
