//! Hosting surface for balance monitoring: startup hooks, transfer
//! subscriptions and the sinks that receive emitted metrics.

mod runtime;
mod source;

use alloy::primitives::Address;
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::monitoring::{TransferEvent, TransferFilter};

pub use runtime::Runtime;
pub use source::LogWatcher;

/// Metric name to value, as returned by transfer handlers
pub type Metrics = BTreeMap<String, BigDecimal>;

/// Runs once when the bot starts, before any subscription is active
#[async_trait]
pub trait StartupHook: Send + Sync {
    async fn run(&self) -> Result<()>;
}

/// Handles the transfers matching one subscription
#[async_trait]
pub trait TransferHandler: Send + Sync {
    async fn handle(&self, event: TransferEvent) -> Result<Metrics>;
}

/// Delivers transfer events matching a filter
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn subscribe(&self, filter: TransferFilter) -> Result<mpsc::Receiver<TransferEvent>>;
}

/// Receives every metric emitted by a handler
#[async_trait]
pub trait MetricSink: Send + Sync {
    /// Returning [`crate::TokenError::CircuitBreaker`] stops the bot
    async fn record(&self, name: &str, value: &BigDecimal) -> Result<()>;
}

/// Registration interface of a bot host
pub trait Bot {
    /// Account used when monitoring is started without explicit accounts
    fn signer(&self) -> Option<Address>;

    fn on_startup(&mut self, name: String, hook: Arc<dyn StartupHook>);

    fn on_transfer(&mut self, name: String, filter: TransferFilter, handler: Arc<dyn TransferHandler>);
}
