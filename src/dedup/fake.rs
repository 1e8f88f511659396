use super::DedupStore;
use std::collections::HashSet;
use std::sync::Mutex;

/// In-memory dedup store for tests, with an `available` switch to exercise the
/// degraded-mode contract (`Contains` -> false, `Add` -> no-op) without a real Redis.
#[derive(Default)]
pub struct InMemoryDedupStore {
    keys: Mutex<HashSet<(i64, String)>>,
    available: std::sync::atomic::AtomicBool,
}

impl InMemoryDedupStore {
    pub fn new() -> Self {
        Self {
            keys: Mutex::new(HashSet::new()),
            available: std::sync::atomic::AtomicBool::new(true),
        }
    }

    pub fn seed(&self, channel_id: i64, key: impl Into<String>) {
        self.keys.lock().unwrap().insert((channel_id, key.into()));
    }

    pub fn set_available(&self, available: bool) {
        self.available
            .store(available, std::sync::atomic::Ordering::SeqCst);
    }
}

impl DedupStore for InMemoryDedupStore {
    async fn contains(&self, channel_id: i64, key: &str) -> bool {
        if !self.available.load(std::sync::atomic::Ordering::SeqCst) {
            return false;
        }
        self.keys
            .lock()
            .unwrap()
            .contains(&(channel_id, key.to_string()))
    }

    async fn add(&self, channel_id: i64, key: &str) {
        if !self.available.load(std::sync::atomic::Ordering::SeqCst) {
            return;
        }
        self.keys
            .lock()
            .unwrap()
            .insert((channel_id, key.to_string()));
    }
}
