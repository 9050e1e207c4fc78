use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::event::TransferEvent;
use crate::bot::{Metrics, StartupHook, TransferHandler};
use crate::contracts::{ContractCaller, ViewCall};
use crate::error::{Result, TokenError};
use crate::tokens::Token;

/// Cached balances of one token, kept current from transfer events.
///
/// Only accounts handed to [`BalanceLedger::load_initial`] or touched by a
/// transfer handler are cached. Reads of anything else go to the chain and
/// leave the cache alone.
pub struct BalanceLedger {
    token: Token,
    label: String,
    caller: Arc<dyn ContractCaller>,
    balances: RwLock<HashMap<Address, BigDecimal>>,
}

impl BalanceLedger {
    pub fn new(token: Token, caller: Arc<dyn ContractCaller>) -> Self {
        Self {
            label: token.symbol.clone(),
            token,
            caller,
            balances: RwLock::new(HashMap::new()),
        }
    }

    /// Name metrics by `label` instead of the token symbol
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    /// Metric name prefix, the symbol unless overridden
    pub fn label(&self) -> &str {
        &self.label
    }

    /// `{label}/{account}`
    pub fn metric_name(&self, account: Address) -> String {
        format!("{}/{}", self.label, account)
    }

    /// On-chain balance, bypassing the cache
    pub async fn get(&self, account: Address) -> Result<BigDecimal> {
        let raw: U256 = self
            .caller
            .call_view(self.balance_call(account))
            .await?
            .try_into()?;
        Ok(self.token.to_decimal(raw))
    }

    /// Cached balance, or the on-chain balance for untracked accounts
    pub async fn read_cached(&self, account: Address) -> Result<BigDecimal> {
        let cached = self.balances.read().await.get(&account).cloned();
        match cached {
            Some(balance) => Ok(balance),
            None => self.get(account).await,
        }
    }

    pub async fn is_tracked(&self, account: Address) -> bool {
        self.balances.read().await.contains_key(&account)
    }

    pub async fn tracked(&self) -> HashMap<Address, BigDecimal> {
        self.balances.read().await.clone()
    }

    /// Seed the cache with on-chain balances. Several accounts are fetched in
    /// a single batched call.
    pub async fn load_initial(&self, accounts: &[Address]) -> Result<()> {
        let loaded = match accounts {
            [] => return Ok(()),
            [account] => vec![(*account, self.get(*account).await?)],
            _ => {
                let calls = accounts.iter().map(|a| self.balance_call(*a)).collect();
                let values = self.caller.batch_call(calls).await?;
                if values.len() != accounts.len() {
                    return Err(TokenError::Decode(format!(
                        "expected {} balances, got {}",
                        accounts.len(),
                        values.len()
                    )));
                }

                accounts
                    .iter()
                    .zip(values)
                    .map(|(account, value)| {
                        let raw: U256 = value.try_into()?;
                        Ok((*account, self.token.to_decimal(raw)))
                    })
                    .collect::<Result<Vec<_>>>()?
            }
        };

        let mut balances = self.balances.write().await;
        for (account, balance) in loaded {
            debug!(token = %self.token.symbol, %account, %balance, "loaded balance");
            balances.insert(account, balance);
        }
        info!(token = %self.token.symbol, accounts = accounts.len(), "initial balances loaded");
        Ok(())
    }

    /// Credit an inbound transfer, or debit it again if it was retracted
    pub async fn on_transfer_in(&self, account: Address, event: &TransferEvent) -> Metrics {
        let amount = self.token.to_decimal(event.amount);
        let delta = if event.removed { -amount } else { amount };
        self.apply(account, delta, event).await
    }

    /// Debit an outbound transfer, or credit it back if it was retracted
    pub async fn on_transfer_out(&self, account: Address, event: &TransferEvent) -> Metrics {
        let amount = self.token.to_decimal(event.amount);
        let delta = if event.removed { amount } else { -amount };
        self.apply(account, delta, event).await
    }

    async fn apply(&self, account: Address, delta: BigDecimal, event: &TransferEvent) -> Metrics {
        let balance = {
            let mut balances = self.balances.write().await;
            let balance = balances.entry(account).or_default();
            *balance += delta;
            balance.clone()
        };

        debug!(
            token = %self.token.symbol,
            %account,
            %balance,
            removed = event.removed,
            tx = ?event.transaction_hash,
            "balance updated"
        );
        Metrics::from([(self.metric_name(account), balance)])
    }

    fn balance_call(&self, holder: Address) -> ViewCall {
        ViewCall::BalanceOf {
            token: self.token.address,
            holder,
        }
    }
}

/// Startup hook seeding a ledger
pub struct LoadBalances {
    ledger: Arc<BalanceLedger>,
    accounts: Vec<Address>,
}

impl LoadBalances {
    pub fn new(ledger: Arc<BalanceLedger>, accounts: Vec<Address>) -> Self {
        Self { ledger, accounts }
    }
}

#[async_trait]
impl StartupHook for LoadBalances {
    async fn run(&self) -> Result<()> {
        self.ledger.load_initial(&self.accounts).await
    }
}

/// Transfers received by one account
pub struct Inbound {
    ledger: Arc<BalanceLedger>,
    account: Address,
}

impl Inbound {
    pub fn new(ledger: Arc<BalanceLedger>, account: Address) -> Self {
        Self { ledger, account }
    }
}

#[async_trait]
impl TransferHandler for Inbound {
    async fn handle(&self, event: TransferEvent) -> Result<Metrics> {
        Ok(self.ledger.on_transfer_in(self.account, &event).await)
    }
}

/// Transfers sent by one account
pub struct Outbound {
    ledger: Arc<BalanceLedger>,
    account: Address,
}

impl Outbound {
    pub fn new(ledger: Arc<BalanceLedger>, account: Address) -> Self {
        Self { ledger, account }
    }
}

#[async_trait]
impl TransferHandler for Outbound {
    async fn handle(&self, event: TransferEvent) -> Result<Metrics> {
        Ok(self.ledger.on_transfer_out(self.account, &event).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::{MockContractCaller, ViewValue};
    use alloy::primitives::address;
    use std::str::FromStr;

    const USDC: Address = address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");
    const ALICE: Address = address!("aA8ba7D4611437141192e7ceCed531Bc0A133efb");
    const BOB: Address = address!("28C6c06298d514Db089934071355E5743bf21d60");
    const CAROL: Address = address!("dAC17F958D2ee523a2206206994597C13D831ec7");

    fn usdc() -> Token {
        Token {
            chain_id: 1,
            address: USDC,
            symbol: "USDC".to_string(),
            name: "USD Coin".to_string(),
            decimals: 6,
            tags: Vec::new(),
        }
    }

    fn dec(value: &str) -> BigDecimal {
        BigDecimal::from_str(value).unwrap()
    }

    fn raw(value: u64) -> ViewValue {
        ViewValue::Uint(U256::from(value))
    }

    #[tokio::test]
    async fn batches_initial_load_for_many_accounts() {
        let mut caller = MockContractCaller::new();
        caller.expect_call_view().never();
        caller
            .expect_batch_call()
            .times(1)
            .withf(|calls| calls.len() == 3)
            .returning(|_| Ok(vec![raw(1_000_000), raw(2_500_000), raw(0)]));

        let ledger = BalanceLedger::new(usdc(), Arc::new(caller));
        ledger.load_initial(&[ALICE, BOB, CAROL]).await.unwrap();

        assert_eq!(ledger.read_cached(ALICE).await.unwrap(), dec("1"));
        assert_eq!(ledger.read_cached(BOB).await.unwrap(), dec("2.5"));
        assert_eq!(ledger.read_cached(CAROL).await.unwrap(), dec("0"));
    }

    #[tokio::test]
    async fn single_account_uses_direct_call() {
        let mut caller = MockContractCaller::new();
        caller.expect_batch_call().never();
        caller
            .expect_call_view()
            .times(1)
            .withf(|call| *call == ViewCall::BalanceOf { token: USDC, holder: ALICE })
            .returning(|_| Ok(raw(100_000_000)));

        let ledger = BalanceLedger::new(usdc(), Arc::new(caller));
        ledger.load_initial(&[ALICE]).await.unwrap();

        assert!(ledger.is_tracked(ALICE).await);
        assert_eq!(ledger.tracked().await.get(&ALICE), Some(&dec("100")));
    }

    #[tokio::test]
    async fn empty_initial_load_makes_no_calls() {
        let mut caller = MockContractCaller::new();
        caller.expect_batch_call().never();
        caller.expect_call_view().never();

        let ledger = BalanceLedger::new(usdc(), Arc::new(caller));
        ledger.load_initial(&[]).await.unwrap();
        assert!(ledger.tracked().await.is_empty());
    }

    #[tokio::test]
    async fn short_batch_result_is_an_error() {
        let mut caller = MockContractCaller::new();
        caller
            .expect_batch_call()
            .returning(|_| Ok(vec![raw(1)]));

        let ledger = BalanceLedger::new(usdc(), Arc::new(caller));
        let result = ledger.load_initial(&[ALICE, BOB]).await;

        assert!(matches!(result, Err(TokenError::Decode(_))));
        assert!(ledger.tracked().await.is_empty());
    }

    #[tokio::test]
    async fn untracked_reads_do_not_populate_cache() {
        let mut caller = MockContractCaller::new();
        caller
            .expect_call_view()
            .times(2)
            .returning(|_| Ok(raw(42_000_000)));

        let ledger = BalanceLedger::new(usdc(), Arc::new(caller));

        assert_eq!(ledger.read_cached(BOB).await.unwrap(), dec("42"));
        assert_eq!(ledger.get(BOB).await.unwrap(), dec("42"));
        assert!(!ledger.is_tracked(BOB).await);
    }

    #[tokio::test]
    async fn handlers_emit_metric_after_update() {
        let mut caller = MockContractCaller::new();
        caller.expect_call_view().returning(|_| Ok(raw(100_000_000)));
        let ledger = Arc::new(BalanceLedger::new(usdc(), Arc::new(caller)));
        ledger.load_initial(&[ALICE]).await.unwrap();

        let inbound = Inbound::new(ledger.clone(), ALICE);
        let event = TransferEvent::new(USDC, BOB, ALICE, U256::from(5_000_000u64));
        let metrics = inbound.handle(event).await.unwrap();

        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[&format!("USDC/{ALICE}")], dec("105"));
    }
}
