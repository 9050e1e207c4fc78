#![allow(dead_code)]

use alloy::primitives::{address, Address, U256};
use alloy::rpc::types::TransactionReceipt;
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use token_ledger::{
    Bot, ContractCaller, EventSource, MetricSink, Result, StartupHook, Token, TokenError,
    TokenList, TokenListManager, TokenRegistry, TransferEvent, TransferFilter, TransferHandler,
    ViewCall, ViewValue,
};
use tokio::sync::mpsc;

pub const USDC: Address = address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");
pub const LINK: Address = address!("514910771AF9Ca656af840dff83E8264EcF986CA");
pub const USDT: Address = address!("dAC17F958D2ee523a2206206994597C13D831ec7");
pub const ALICE: Address = address!("aA8ba7D4611437141192e7ceCed531Bc0A133efb");
pub const BOB: Address = address!("28C6c06298d514Db089934071355E5743bf21d60");

pub fn dec(value: &str) -> BigDecimal {
    BigDecimal::from_str(value).unwrap()
}

pub fn usdc() -> Token {
    Token {
        chain_id: 1,
        address: USDC,
        symbol: "USDC".to_string(),
        name: "USD Coin".to_string(),
        decimals: 6,
        tags: vec!["stablecoin".to_string()],
    }
}

pub fn link() -> Token {
    Token {
        chain_id: 1,
        address: LINK,
        symbol: "LINK".to_string(),
        name: "ChainLink Token".to_string(),
        decimals: 18,
        tags: Vec::new(),
    }
}

/// Token list registry with USDC and LINK on mainnet
pub async fn registry() -> Arc<TokenListManager> {
    let manager = TokenListManager::default();
    manager
        .add_list(TokenList {
            name: "Test List".to_string(),
            timestamp: None,
            version: None,
            tokens: vec![usdc(), link()],
        })
        .await;
    Arc::new(manager)
}

/// In-memory chain: raw balances per (token, holder) plus call counters
#[derive(Default)]
pub struct FakeChain {
    pub chain_id: u64,
    balances: Mutex<HashMap<(Address, Address), U256>>,
    metadata: Mutex<HashMap<Address, (String, String, u8)>>,
    pub view_calls: AtomicUsize,
    pub batch_calls: AtomicUsize,
    batches_fail: AtomicBool,
}

impl FakeChain {
    pub fn mainnet() -> Self {
        Self {
            chain_id: 1,
            ..Default::default()
        }
    }

    pub fn set_balance(&self, token: Address, holder: Address, raw: u64) {
        self.balances
            .lock()
            .unwrap()
            .insert((token, holder), U256::from(raw));
    }

    pub fn deploy(&self, token: Address, name: &str, symbol: &str, decimals: u8) {
        self.metadata
            .lock()
            .unwrap()
            .insert(token, (name.to_string(), symbol.to_string(), decimals));
    }

    /// Make every later batch call fail like an unreachable node
    pub fn fail_batches(&self) {
        self.batches_fail.store(true, Ordering::SeqCst);
    }

    pub fn view_calls(&self) -> usize {
        self.view_calls.load(Ordering::SeqCst)
    }

    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    fn answer(&self, call: ViewCall) -> Result<ViewValue> {
        let metadata = self.metadata.lock().unwrap();
        let meta = metadata.get(&call.target());
        match call {
            ViewCall::BalanceOf { token, holder } => Ok(ViewValue::Uint(
                self.balances
                    .lock()
                    .unwrap()
                    .get(&(token, holder))
                    .copied()
                    .unwrap_or_default(),
            )),
            ViewCall::Name(_) => meta
                .map(|(name, _, _)| ViewValue::Text(name.clone()))
                .ok_or_else(|| TokenError::Reverted("name".to_string())),
            ViewCall::Symbol(_) => meta
                .map(|(_, symbol, _)| ViewValue::Text(symbol.clone()))
                .ok_or_else(|| TokenError::Reverted("symbol".to_string())),
            ViewCall::Decimals(_) => meta
                .map(|(_, _, decimals)| ViewValue::U8(*decimals))
                .ok_or_else(|| TokenError::Reverted("decimals".to_string())),
            other => Err(TokenError::Reverted(other.method().to_string())),
        }
    }
}

#[async_trait]
impl ContractCaller for FakeChain {
    async fn chain_id(&self) -> Result<u64> {
        Ok(self.chain_id)
    }

    async fn call_view(&self, call: ViewCall) -> Result<ViewValue> {
        self.view_calls.fetch_add(1, Ordering::SeqCst);
        self.answer(call)
    }

    async fn batch_call(&self, calls: Vec<ViewCall>) -> Result<Vec<ViewValue>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        if self.batches_fail.load(Ordering::SeqCst) {
            return Err(TokenError::Rpc("node unavailable".to_string()));
        }
        calls.into_iter().map(|call| self.answer(call)).collect()
    }

    async fn transfer(
        &self,
        _token: Address,
        _receiver: Address,
        _amount: U256,
        _sender: Address,
    ) -> Result<TransactionReceipt> {
        Err(TokenError::Rpc("transfers are not supported".to_string()))
    }
}

/// Registry whose lists are unreachable
pub struct BrokenRegistry;

#[async_trait]
impl TokenRegistry for BrokenRegistry {
    async fn resolve_symbol(&self, symbol: &str, _chain_id: u64) -> Result<Token> {
        Err(TokenError::UnknownToken(symbol.to_string()))
    }

    async fn list_tokens(&self, _chain_id: u64, _tags: &[String]) -> Result<Vec<Token>> {
        Err(TokenError::TokenList("connection refused".to_string()))
    }

    async fn install_list(&self, uri: &str) -> Result<String> {
        Err(TokenError::TokenList(format!("cannot fetch {uri}")))
    }
}

/// Bot host that only records registrations
#[derive(Default)]
pub struct RecordingBot {
    pub signer: Option<Address>,
    pub startup: Vec<(String, Arc<dyn StartupHook>)>,
    pub handlers: Vec<(String, TransferFilter, Arc<dyn TransferHandler>)>,
}

impl RecordingBot {
    pub fn with_signer(signer: Address) -> Self {
        Self {
            signer: Some(signer),
            ..Default::default()
        }
    }

    /// Deliver an event to every handler whose filter matches it
    pub async fn deliver(&self, event: &TransferEvent) -> Vec<token_ledger::Metrics> {
        let mut emitted = Vec::new();
        for (_, filter, handler) in &self.handlers {
            if filter.matches(event) {
                emitted.push(handler.handle(event.clone()).await.unwrap());
            }
        }
        emitted
    }

    pub async fn start(&self) {
        for (_, hook) in &self.startup {
            hook.run().await.unwrap();
        }
    }
}

impl Bot for RecordingBot {
    fn signer(&self) -> Option<Address> {
        self.signer
    }

    fn on_startup(&mut self, name: String, hook: Arc<dyn StartupHook>) {
        self.startup.push((name, hook));
    }

    fn on_transfer(&mut self, name: String, filter: TransferFilter, handler: Arc<dyn TransferHandler>) {
        self.handlers.push((name, filter, handler));
    }
}

/// Event source fed by the test, dispatching to subscribers by filter
#[derive(Default)]
pub struct ChannelSource {
    subscribers: Mutex<Vec<(TransferFilter, mpsc::Sender<TransferEvent>)>>,
    pub subscribed: AtomicUsize,
}

impl ChannelSource {
    pub async fn publish(&self, event: TransferEvent) {
        let targets: Vec<_> = self
            .subscribers
            .lock()
            .unwrap()
            .iter()
            .filter(|(filter, _)| filter.matches(&event))
            .map(|(_, tx)| tx.clone())
            .collect();
        for tx in targets {
            tx.send(event.clone()).await.unwrap();
        }
    }

    /// End the subscriptions opened with `filter`
    pub fn close_subscription(&self, filter: &TransferFilter) {
        self.subscribers
            .lock()
            .unwrap()
            .retain(|(subscribed, _)| subscribed != filter);
    }

    /// Drop every sender so subscriptions end
    pub fn close(&self) {
        self.subscribers.lock().unwrap().clear();
    }

    pub fn subscribed(&self) -> usize {
        self.subscribed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventSource for ChannelSource {
    async fn subscribe(&self, filter: TransferFilter) -> Result<mpsc::Receiver<TransferEvent>> {
        let (tx, rx) = mpsc::channel(16);
        self.subscribers.lock().unwrap().push((filter, tx));
        self.subscribed.fetch_add(1, Ordering::SeqCst);
        Ok(rx)
    }
}

/// Sink that keeps every metric it receives
#[derive(Default)]
pub struct RecordingSink {
    pub records: Mutex<Vec<(String, BigDecimal)>>,
}

impl RecordingSink {
    pub fn records(&self) -> Vec<(String, BigDecimal)> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl MetricSink for RecordingSink {
    async fn record(&self, name: &str, value: &BigDecimal) -> Result<()> {
        self.records
            .lock()
            .unwrap()
            .push((name.to_string(), value.clone()));
        Ok(())
    }
}
