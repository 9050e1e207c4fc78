use alloy::{
    network::TransactionBuilder,
    primitives::{Address, Bytes, U256},
    providers::{DynProvider, Provider},
    rpc::types::{TransactionReceipt, TransactionRequest},
    sol_types::SolCall,
};
use async_trait::async_trait;
use tracing::debug;

use super::erc20::IERC20;
use super::multicall::{IMulticall3, MULTICALL3_ADDRESS};
use crate::error::{Result, TokenError};

/// A read-only ERC20 call against a single token contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewCall {
    Name(Address),
    Symbol(Address),
    Decimals(Address),
    TotalSupply(Address),
    BalanceOf {
        token: Address,
        holder: Address,
    },
    Allowance {
        token: Address,
        owner: Address,
        spender: Address,
    },
}

impl ViewCall {
    /// Contract the call is sent to
    pub fn target(&self) -> Address {
        match *self {
            ViewCall::Name(token)
            | ViewCall::Symbol(token)
            | ViewCall::Decimals(token)
            | ViewCall::TotalSupply(token)
            | ViewCall::BalanceOf { token, .. }
            | ViewCall::Allowance { token, .. } => token,
        }
    }

    pub fn method(&self) -> &'static str {
        match self {
            ViewCall::Name(_) => "name",
            ViewCall::Symbol(_) => "symbol",
            ViewCall::Decimals(_) => "decimals",
            ViewCall::TotalSupply(_) => "totalSupply",
            ViewCall::BalanceOf { .. } => "balanceOf",
            ViewCall::Allowance { .. } => "allowance",
        }
    }

    /// ABI-encoded calldata
    pub fn calldata(&self) -> Bytes {
        let encoded = match *self {
            ViewCall::Name(_) => IERC20::nameCall {}.abi_encode(),
            ViewCall::Symbol(_) => IERC20::symbolCall {}.abi_encode(),
            ViewCall::Decimals(_) => IERC20::decimalsCall {}.abi_encode(),
            ViewCall::TotalSupply(_) => IERC20::totalSupplyCall {}.abi_encode(),
            ViewCall::BalanceOf { holder, .. } => IERC20::balanceOfCall { account: holder }.abi_encode(),
            ViewCall::Allowance { owner, spender, .. } => {
                IERC20::allowanceCall { owner, spender }.abi_encode()
            }
        };
        Bytes::from(encoded)
    }

    /// Decode the raw return data of this call
    pub fn decode(&self, data: &[u8]) -> Result<ViewValue> {
        let value = match self {
            ViewCall::Name(_) => ViewValue::Text(IERC20::nameCall::abi_decode_returns(data)?),
            ViewCall::Symbol(_) => ViewValue::Text(IERC20::symbolCall::abi_decode_returns(data)?),
            ViewCall::Decimals(_) => ViewValue::U8(IERC20::decimalsCall::abi_decode_returns(data)?),
            ViewCall::TotalSupply(_) => {
                ViewValue::Uint(IERC20::totalSupplyCall::abi_decode_returns(data)?)
            }
            ViewCall::BalanceOf { .. } => {
                ViewValue::Uint(IERC20::balanceOfCall::abi_decode_returns(data)?)
            }
            ViewCall::Allowance { .. } => {
                ViewValue::Uint(IERC20::allowanceCall::abi_decode_returns(data)?)
            }
        };
        Ok(value)
    }
}

/// Decoded result of a [`ViewCall`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewValue {
    Uint(U256),
    U8(u8),
    Text(String),
}

impl TryFrom<ViewValue> for U256 {
    type Error = TokenError;

    fn try_from(value: ViewValue) -> Result<Self> {
        match value {
            ViewValue::Uint(v) => Ok(v),
            ViewValue::U8(v) => Ok(U256::from(v)),
            other => Err(TokenError::Decode(format!("expected uint, got {other:?}"))),
        }
    }
}

impl TryFrom<ViewValue> for u8 {
    type Error = TokenError;

    fn try_from(value: ViewValue) -> Result<Self> {
        match value {
            ViewValue::U8(v) => Ok(v),
            ViewValue::Uint(v) => {
                u8::try_from(v).map_err(|_| TokenError::Decode(format!("{v} does not fit in uint8")))
            }
            other => Err(TokenError::Decode(format!("expected uint8, got {other:?}"))),
        }
    }
}

impl TryFrom<ViewValue> for String {
    type Error = TokenError;

    fn try_from(value: ViewValue) -> Result<Self> {
        match value {
            ViewValue::Text(v) => Ok(v),
            other => Err(TokenError::Decode(format!("expected string, got {other:?}"))),
        }
    }
}

/// On-chain calls used by token handles and balance ledgers
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContractCaller: Send + Sync {
    /// Chain id of the connected network
    async fn chain_id(&self) -> Result<u64>;

    /// Single read-only call
    async fn call_view(&self, call: ViewCall) -> Result<ViewValue>;

    /// Many read-only calls in one round trip. Results keep the input order.
    async fn batch_call(&self, calls: Vec<ViewCall>) -> Result<Vec<ViewValue>>;

    async fn transfer(
        &self,
        token: Address,
        receiver: Address,
        amount: U256,
        sender: Address,
    ) -> Result<TransactionReceipt>;
}

/// [`ContractCaller`] backed by an alloy provider, batching through Multicall3
#[derive(Clone)]
pub struct AlloyCaller {
    provider: DynProvider,
    multicall: Address,
}

impl AlloyCaller {
    pub fn new(provider: DynProvider) -> Self {
        Self {
            provider,
            multicall: MULTICALL3_ADDRESS,
        }
    }

    /// Use a Multicall3 deployment at a non-canonical address (devnets)
    pub fn with_multicall(mut self, address: Address) -> Self {
        self.multicall = address;
        self
    }

    pub fn multicall(&self) -> Address {
        self.multicall
    }
}

#[async_trait]
impl ContractCaller for AlloyCaller {
    async fn chain_id(&self) -> Result<u64> {
        Ok(self.provider.get_chain_id().await?)
    }

    async fn call_view(&self, call: ViewCall) -> Result<ViewValue> {
        let tx = TransactionRequest::default()
            .with_to(call.target())
            .with_input(call.calldata());
        let data = self.provider.call(tx).await?;
        call.decode(&data)
    }

    async fn batch_call(&self, calls: Vec<ViewCall>) -> Result<Vec<ViewValue>> {
        if calls.is_empty() {
            return Ok(Vec::new());
        }

        let requests: Vec<IMulticall3::Call3> = calls
            .iter()
            .map(|call| IMulticall3::Call3 {
                target: call.target(),
                allowFailure: true,
                callData: call.calldata(),
            })
            .collect();

        debug!(calls = requests.len(), multicall = %self.multicall, "aggregating view calls");
        let multicall = IMulticall3::new(self.multicall, &self.provider);
        let outcomes = multicall.aggregate3(requests).call().await?;

        if outcomes.len() != calls.len() {
            return Err(TokenError::Decode(format!(
                "multicall returned {} results for {} calls",
                outcomes.len(),
                calls.len()
            )));
        }

        calls
            .iter()
            .zip(outcomes)
            .map(|(call, outcome)| {
                if !outcome.success {
                    return Err(TokenError::Reverted(format!(
                        "{} on {}",
                        call.method(),
                        call.target()
                    )));
                }
                call.decode(&outcome.returnData)
            })
            .collect()
    }

    async fn transfer(
        &self,
        token: Address,
        receiver: Address,
        amount: U256,
        sender: Address,
    ) -> Result<TransactionReceipt> {
        let pending = IERC20::new(token, &self.provider)
            .transfer(receiver, amount)
            .from(sender)
            .send()
            .await?;
        Ok(pending.get_receipt().await?)
    }
}
