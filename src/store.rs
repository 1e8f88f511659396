//! File-backed subscription list and watermark persistence. Co-located in one type per
//! spec: a subscription record and its watermark live in the same JSON document, guarded
//! by one mutex — the scale this engine runs at doesn't need more than that.

use crate::model::Subscription;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

#[allow(async_fn_in_trait)]
pub trait SubStore {
    async fn list(&self) -> Result<Vec<Subscription>>;
    async fn last_seen(&self, channel_id: i64, account: &str) -> Result<Option<String>>;
    async fn set_last_seen(&self, channel_id: i64, account: &str, entry_id: &str) -> Result<()>;
}

#[allow(async_fn_in_trait)]
pub trait WatermarkStore {
    async fn get(&self, channel_id: i64, account: &str) -> Result<Option<String>>;
    async fn set(&self, channel_id: i64, account: &str, entry_id: &str) -> Result<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct SubscriptionRecord {
    account: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    interval_seconds: Option<u64>,
    /// Legacy field: accepted on read, multiplied by 60, never written back in this form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    interval_minutes: Option<f64>,
    #[serde(default)]
    include_reposts: bool,
    #[serde(default)]
    include_quotes: bool,
    #[serde(default)]
    include_keywords: Vec<String>,
    #[serde(default)]
    exclude_keywords: Vec<String>,
    #[serde(default)]
    start_offset_minutes: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_tweet_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    thread_id: Option<i64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct WatermarkFile {
    #[serde(default)]
    subscriptions: HashMap<String, Vec<SubscriptionRecord>>,
}

/// Single-file JSON store, mutex-guarded — sufficient at the scale this engine runs at.
/// Implements both `SubStore` and `WatermarkStore`.
pub struct FileStore {
    path: PathBuf,
    default_interval_seconds: u64,
    file: Mutex<WatermarkFile>,
}

impl FileStore {
    pub async fn load(path: impl Into<PathBuf>, default_interval_seconds: u64) -> Result<Self> {
        let path = path.into();
        let file = if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            let raw = tokio::fs::read(&path)
                .await
                .with_context(|| format!("read {}", path.display()))?;
            serde_json::from_slice(&raw).unwrap_or_default()
        } else {
            WatermarkFile::default()
        };
        Ok(Self {
            path,
            default_interval_seconds,
            file: Mutex::new(file),
        })
    }

    fn derive_interval(rec: &SubscriptionRecord, default_interval: u64) -> u64 {
        if let Some(seconds) = rec.interval_seconds {
            if seconds > 0 {
                return seconds;
            }
        }
        if let Some(minutes) = rec.interval_minutes {
            if minutes > 0.0 {
                return (minutes * 60.0) as u64;
            }
        }
        default_interval
    }

    async fn save_locked(path: &Path, file: &WatermarkFile) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.with_context(|| {
                    format!("create parent directory {}", parent.display())
                })?;
            }
        }
        let json = serde_json::to_vec_pretty(file).context("serialize watermark file")?;
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, path)
            .await
            .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
        Ok(())
    }

    fn find<'a>(
        file: &'a WatermarkFile,
        channel_id: i64,
        account: &str,
    ) -> Option<&'a SubscriptionRecord> {
        file.subscriptions
            .get(&channel_id.to_string())?
            .iter()
            .find(|rec| rec.account.eq_ignore_ascii_case(account))
    }
}

impl SubStore for FileStore {
    async fn list(&self) -> Result<Vec<Subscription>> {
        let file = self.file.lock().await;
        let mut result = Vec::new();
        for (channel_key, records) in &file.subscriptions {
            let Ok(channel_id) = channel_key.parse::<i64>() else {
                continue;
            };
            for rec in records {
                result.push(Subscription {
                    channel_id,
                    thread_id: rec.thread_id,
                    account: rec.account.clone(),
                    interval_seconds: Self::derive_interval(rec, self.default_interval_seconds),
                    include_reposts: rec.include_reposts,
                    include_quotes: rec.include_quotes,
                    include_keywords: rec.include_keywords.clone(),
                    exclude_keywords: rec.exclude_keywords.clone(),
                    last_tweet_id: rec.last_tweet_id.clone(),
                    start_offset_minutes: rec.start_offset_minutes,
                });
            }
        }
        Ok(result)
    }

    async fn last_seen(&self, channel_id: i64, account: &str) -> Result<Option<String>> {
        let file = self.file.lock().await;
        Ok(Self::find(&file, channel_id, account).and_then(|r| r.last_tweet_id.clone()))
    }

    async fn set_last_seen(&self, channel_id: i64, account: &str, entry_id: &str) -> Result<()> {
        WatermarkStore::set(self, channel_id, account, entry_id).await
    }
}

impl WatermarkStore for FileStore {
    async fn get(&self, channel_id: i64, account: &str) -> Result<Option<String>> {
        SubStore::last_seen(self, channel_id, account).await
    }

    async fn set(&self, channel_id: i64, account: &str, entry_id: &str) -> Result<()> {
        let mut file = self.file.lock().await;
        if let Some(records) = file.subscriptions.get_mut(&channel_id.to_string()) {
            if let Some(rec) = records
                .iter_mut()
                .find(|r| r.account.eq_ignore_ascii_case(account))
            {
                rec.last_tweet_id = Some(entry_id.to_string());
            }
        }
        Self::save_locked(&self.path, &file).await
    }
}

pub mod fake {
    use super::{SubStore, WatermarkStore};
    use crate::model::Subscription;
    use anyhow::Result;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    /// In-memory `SubStore`/`WatermarkStore` double: a fixed subscription list plus a
    /// mutable watermark map, mirroring `FileStore`'s co-located responsibilities without
    /// touching disk.
    #[derive(Default)]
    pub struct InMemorySubStore {
        subs: Mutex<Vec<Subscription>>,
        watermarks: Mutex<HashMap<(i64, String), String>>,
    }

    impl InMemorySubStore {
        pub fn new(subs: Vec<Subscription>) -> Self {
            Self {
                subs: Mutex::new(subs),
                watermarks: Mutex::new(HashMap::new()),
            }
        }
    }

    impl SubStore for InMemorySubStore {
        async fn list(&self) -> Result<Vec<Subscription>> {
            Ok(self.subs.lock().await.clone())
        }

        async fn last_seen(&self, channel_id: i64, account: &str) -> Result<Option<String>> {
            Ok(self
                .watermarks
                .lock()
                .await
                .get(&(channel_id, account.to_lowercase()))
                .cloned())
        }

        async fn set_last_seen(&self, channel_id: i64, account: &str, entry_id: &str) -> Result<()> {
            WatermarkStore::set(self, channel_id, account, entry_id).await
        }
    }

    impl WatermarkStore for InMemorySubStore {
        async fn get(&self, channel_id: i64, account: &str) -> Result<Option<String>> {
            SubStore::last_seen(self, channel_id, account).await
        }

        async fn set(&self, channel_id: i64, account: &str, entry_id: &str) -> Result<()> {
            self.watermarks
                .lock()
                .await
                .insert((channel_id, account.to_lowercase()), entry_id.to_string());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile_free::unique_tmp_path;

    mod tempfile_free {
        use std::path::PathBuf;

        pub fn unique_tmp_path(name: &str) -> PathBuf {
            let pid = std::process::id();
            let mut path = std::env::temp_dir();
            path.push(format!("x2discord-test-{pid}-{name}.json"));
            path
        }
    }

    #[tokio::test]
    async fn round_trips_watermark_through_disk() {
        let path = unique_tmp_path("watermark");
        let _ = tokio::fs::remove_file(&path).await;
        let seed = serde_json::json!({
            "subscriptions": {
                "123": [{ "account": "foo", "interval_minutes": 2 }]
            }
        });
        tokio::fs::write(&path, serde_json::to_vec(&seed).unwrap())
            .await
            .unwrap();

        let store = FileStore::load(&path, 60).await.unwrap();
        let subs = store.list().await.unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].interval_seconds, 120, "interval_minutes upconverts to seconds");

        WatermarkStore::set(&store, 123, "foo", "p42").await.unwrap();
        assert_eq!(
            WatermarkStore::get(&store, 123, "foo").await.unwrap(),
            Some("p42".to_string())
        );

        let reloaded = FileStore::load(&path, 60).await.unwrap();
        assert_eq!(
            WatermarkStore::get(&reloaded, 123, "foo").await.unwrap(),
            Some("p42".to_string()),
            "watermark survives reload from disk"
        );

        let _ = tokio::fs::remove_file(&path).await;
        let _ = tokio::fs::remove_file(path.with_extension("tmp")).await;
    }

    #[tokio::test]
    async fn missing_file_yields_empty_store() {
        let path = unique_tmp_path("missing");
        let _ = tokio::fs::remove_file(&path).await;
        let store = FileStore::load(&path, 60).await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
    }
}
