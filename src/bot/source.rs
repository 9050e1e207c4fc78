use alloy::providers::{DynProvider, Provider};
use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::warn;

use super::EventSource;
use crate::error::Result;
use crate::monitoring::{TransferEvent, TransferFilter};

const CHANNEL_CAPACITY: usize = 256;

/// [`EventSource`] that polls node-side log filters
#[derive(Clone)]
pub struct LogWatcher {
    provider: DynProvider,
    poll_interval: Duration,
}

impl LogWatcher {
    pub fn new(provider: DynProvider, poll_interval: Duration) -> Self {
        Self {
            provider,
            poll_interval,
        }
    }
}

#[async_trait]
impl EventSource for LogWatcher {
    async fn subscribe(&self, filter: TransferFilter) -> Result<mpsc::Receiver<TransferEvent>> {
        let poller = self
            .provider
            .watch_logs(&filter.to_log_filter())
            .await?
            .with_poll_interval(self.poll_interval);
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

        tokio::spawn(async move {
            let mut stream = std::pin::pin!(poller.into_stream());
            while let Some(logs) = stream.next().await {
                for log in &logs {
                    match TransferEvent::try_from(log) {
                        Ok(event) => {
                            if tx.send(event).await.is_err() {
                                return;
                            }
                        }
                        Err(e) => warn!(token = %filter.token, error = %e, "skipping undecodable log"),
                    }
                }
            }
            warn!(token = %filter.token, "log poller finished");
        });

        Ok(rx)
    }
}
