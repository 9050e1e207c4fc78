use crate::bot::MetricSink;
use crate::error::Result;
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// `info` level.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_line_number(true)
        .init();
}

/// Represents a change in balance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceChange {
    Increase,
    Decrease,
    NoChange,
}

impl BalanceChange {
    pub fn between(old: &BigDecimal, new: &BigDecimal) -> Self {
        if new > old {
            BalanceChange::Increase
        } else if new < old {
            BalanceChange::Decrease
        } else {
            BalanceChange::NoChange
        }
    }
}

/// Logs every balance metric together with the change since the last one
#[derive(Default)]
pub struct LogSink {
    previous: Mutex<HashMap<String, BigDecimal>>,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetricSink for LogSink {
    async fn record(&self, name: &str, value: &BigDecimal) -> Result<()> {
        let old = self
            .previous
            .lock()
            .await
            .insert(name.to_string(), value.clone());

        match old {
            Some(old) => {
                let (symbol, sign) = match BalanceChange::between(&old, value) {
                    BalanceChange::Increase => ("📈", "+"),
                    BalanceChange::Decrease => ("📉", ""),
                    BalanceChange::NoChange => ("  ", ""),
                };
                let diff = value - &old;
                info!(
                    metric = %name,
                    "{} {}{} | {} → {}",
                    symbol,
                    sign,
                    format_amount(&diff),
                    format_amount(&old),
                    format_amount(value)
                );
            }
            None => info!(metric = %name, balance = %format_amount(value), "🔔 balance update"),
        }
        Ok(())
    }
}

/// Human-friendly amount without trailing zeros
pub fn format_amount(value: &BigDecimal) -> String {
    value.normalized().to_plain_string()
}

/// Shorten address for display
pub fn shorten_address(address: &str) -> String {
    if address.len() > 10 {
        format!("{}...{}", &address[..6], &address[address.len() - 4..])
    } else {
        address.to_string()
    }
}
