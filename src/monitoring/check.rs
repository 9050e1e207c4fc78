use async_trait::async_trait;
use bigdecimal::BigDecimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

use super::balances::Balances;
use crate::bot::MetricSink;
use crate::error::{Result, TokenError};

/// Trips the circuit breaker when a cached balance drifts from the chain
pub struct BalanceCheck {
    balances: Arc<Balances>,
    debounce: Duration,
}

impl BalanceCheck {
    pub fn new(balances: Arc<Balances>, debounce: Duration) -> Self {
        Self { balances, debounce }
    }
}

#[async_trait]
impl MetricSink for BalanceCheck {
    async fn record(&self, name: &str, value: &BigDecimal) -> Result<()> {
        let (ledger, account) = self.balances.metric_ledger(name)?;

        tokio::time::sleep(self.debounce).await;

        let onchain = ledger.get(account).await?;
        if &onchain != value {
            error!(metric = %name, cached = %value, %onchain, "balances are off");
            return Err(TokenError::CircuitBreaker(format!(
                "{name}: cached {value} != on-chain {onchain}"
            )));
        }

        debug!(metric = %name, "balance matches chain");
        Ok(())
    }
}
