use super::{DedupStore, DEDUP_TTL_DAYS, MAX_LINKS_PER_CHANNEL};
use redis::AsyncCommands;
use tokio::sync::Mutex;
use tracing::warn;

/// Redis-backed dedup store, grounded on the original `RedisLinkStore`: a per-channel
/// `SADD`/`SISMEMBER` set with a refreshed TTL and best-effort bounded eviction via
/// `SRANDMEMBER`/`SREM` (the set has no order, so eviction is arbitrary by construction).
pub struct RedisDedupStore {
    conn: Mutex<Option<redis::aio::ConnectionManager>>,
    prefix: String,
    max_links_per_channel: u64,
    ttl_seconds: u64,
}

impl RedisDedupStore {
    pub async fn connect(redis_url: &str, prefix: impl Into<String>) -> Self {
        let conn = match redis::Client::open(redis_url) {
            Ok(client) => match client.get_connection_manager().await {
                Ok(conn) => Some(conn),
                Err(e) => {
                    warn!(error = %e, "failed to establish redis connection manager");
                    None
                }
            },
            Err(e) => {
                warn!(error = %e, "invalid redis url");
                None
            }
        };
        Self {
            conn: Mutex::new(conn),
            prefix: prefix.into(),
            max_links_per_channel: MAX_LINKS_PER_CHANNEL,
            ttl_seconds: DEDUP_TTL_DAYS * 24 * 60 * 60,
        }
    }

    fn key(&self, channel_id: i64) -> String {
        format!("{}:sent_links:{}", self.prefix, channel_id)
    }
}

impl DedupStore for RedisDedupStore {
    async fn contains(&self, channel_id: i64, key: &str) -> bool {
        let mut guard = self.conn.lock().await;
        let Some(conn) = guard.as_mut() else {
            return false;
        };
        match conn.sismember::<_, _, bool>(self.key(channel_id), key).await {
            Ok(present) => present,
            Err(e) => {
                warn!(error = %e, "dedup contains check failed, degrading to not-present");
                false
            }
        }
    }

    async fn add(&self, channel_id: i64, key: &str) {
        let mut guard = self.conn.lock().await;
        let Some(conn) = guard.as_mut() else {
            return;
        };
        let redis_key = self.key(channel_id);

        if let Err(e) = conn.sadd::<_, _, ()>(&redis_key, key).await {
            warn!(error = %e, "dedup add failed");
            return;
        }
        if let Err(e) = conn
            .expire::<_, ()>(&redis_key, self.ttl_seconds as i64)
            .await
        {
            warn!(error = %e, "dedup ttl refresh failed");
        }

        let size: u64 = match conn.scard(&redis_key).await {
            Ok(size) => size,
            Err(e) => {
                warn!(error = %e, "dedup size check failed");
                return;
            }
        };
        if size <= self.max_links_per_channel {
            return;
        }
        let excess = (size - self.max_links_per_channel) as usize;
        match conn
            .srandmember_multiple::<_, String>(&redis_key, excess)
            .await
        {
            Ok(members) if !members.is_empty() => {
                if let Err(e) = conn.srem::<_, _, ()>(&redis_key, &members).await {
                    warn!(error = %e, "dedup eviction failed");
                } else {
                    tracing::info!(channel_id, removed = members.len(), "evicted excess dedup keys");
                }
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "dedup eviction member selection failed"),
        }
    }
}
