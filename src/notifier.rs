//! Delivery sink. The chat-platform client itself is an external collaborator (no
//! Discord gateway client ships here); this module defines the seam the engine depends
//! on plus a placeholder implementation that lets it run standalone.

use crate::model::Entry;
use anyhow::Result;
use tracing::info;

#[allow(async_fn_in_trait)]
pub trait Notifier {
    async fn send(&self, channel_id: i64, thread_id: Option<i64>, entry: &Entry) -> Result<()>;
}

/// Logs each delivery instead of posting it anywhere. Stands in for a real chat client.
pub struct LoggingNotifier;

impl Notifier for LoggingNotifier {
    async fn send(&self, channel_id: i64, thread_id: Option<i64>, entry: &Entry) -> Result<()> {
        info!(
            channel_id,
            thread_id,
            entry_id = %entry.id,
            link = %entry.link,
            "delivering entry"
        );
        Ok(())
    }
}

pub mod fake {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Delivery {
        pub channel_id: i64,
        pub thread_id: Option<i64>,
        pub entry_id: String,
    }

    /// Recording notifier for assertions, with a `fail_next` switch to exercise
    /// `SendFailed` handling without propagating out of `PollEngine`.
    #[derive(Default)]
    pub struct RecordingNotifier {
        deliveries: Mutex<Vec<Delivery>>,
        fail_next: std::sync::atomic::AtomicBool,
    }

    impl RecordingNotifier {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn fail_next(&self) {
            self.fail_next
                .store(true, std::sync::atomic::Ordering::SeqCst);
        }

        pub fn deliveries(&self) -> Vec<Delivery> {
            self.deliveries.lock().unwrap().clone()
        }
    }

    impl Notifier for RecordingNotifier {
        async fn send(&self, channel_id: i64, thread_id: Option<i64>, entry: &Entry) -> Result<()> {
            if self
                .fail_next
                .swap(false, std::sync::atomic::Ordering::SeqCst)
            {
                anyhow::bail!("simulated send failure");
            }
            self.deliveries.lock().unwrap().push(Delivery {
                channel_id,
                thread_id,
                entry_id: entry.id.clone(),
            });
            Ok(())
        }
    }
}
