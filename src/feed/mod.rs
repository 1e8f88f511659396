//! Feed fetching abstraction. Generalizes the RSSHub per-account Twitter feed into a
//! narrow trait so the engine can be driven by a fake in tests.

mod fake;
mod http;

pub use fake::FakeFeedClient;
pub use http::HttpFeedClient;

use crate::error::FetchError;
use crate::model::Entry;

#[allow(async_fn_in_trait)]
pub trait FeedClient {
    /// Fetch up to `max_results` most recent entries for `account`, newest first.
    async fn fetch(&self, account: &str, max_results: u32) -> Result<Vec<Entry>, FetchError>;
}
