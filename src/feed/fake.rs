use super::FeedClient;
use crate::error::FetchError;
use crate::model::Entry;
use std::collections::HashMap;
use std::sync::Mutex;

/// Scripted `FeedClient` for driving the poll engine in tests: each `account` has a
/// queue of canned results, consumed one per `fetch` call so a test can script a
/// sequence of ticks (success, then 429, then success again, etc.).
#[derive(Default)]
pub struct FakeFeedClient {
    scripts: Mutex<HashMap<String, std::collections::VecDeque<Result<Vec<Entry>, FetchError>>>>,
    calls: Mutex<Vec<String>>,
}

impl FakeFeedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, account: &str, result: Result<Vec<Entry>, FetchError>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(account.to_string())
            .or_default()
            .push_back(result);
    }

    pub fn push_entries(&self, account: &str, entries: Vec<Entry>) {
        self.push(account, Ok(entries));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl FeedClient for FakeFeedClient {
    async fn fetch(&self, account: &str, _max_results: u32) -> Result<Vec<Entry>, FetchError> {
        self.calls.lock().unwrap().push(account.to_string());
        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(account).and_then(|q| q.pop_front()) {
            Some(result) => result,
            None => Ok(Vec::new()),
        }
    }
}
