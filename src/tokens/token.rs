use alloy::{
    primitives::{Address, U256},
    rpc::types::TransactionReceipt,
};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::units;
use crate::contracts::{ContractCaller, ViewCall, ViewValue};
use crate::error::{Result, TokenError};

/// Token metadata, as published in a token list
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub chain_id: u64,
    pub address: Address,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl Token {
    pub fn to_decimal(&self, raw: U256) -> BigDecimal {
        units::to_decimal(raw, self.decimals)
    }

    pub fn to_base_units(&self, amount: &BigDecimal) -> Result<U256> {
        units::to_base_units(amount, self.decimals)
    }

    pub fn has_tags(&self, tags: &[String]) -> bool {
        tags.iter().all(|tag| self.tags.contains(tag))
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.symbol, self.address)
    }
}

/// A token view that is either queried on-chain or fixed at construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewMethod<T> {
    Live(ViewCall),
    Cached(T),
}

impl<T> ViewMethod<T>
where
    T: Clone + TryFrom<ViewValue, Error = TokenError>,
{
    pub async fn value(&self, caller: &dyn ContractCaller) -> Result<T> {
        match self {
            ViewMethod::Cached(value) => Ok(value.clone()),
            ViewMethod::Live(call) => caller.call_view(*call).await?.try_into(),
        }
    }

    pub fn is_cached(&self) -> bool {
        matches!(self, ViewMethod::Cached(_))
    }
}

/// Handle on an ERC20 contract
#[derive(Clone)]
pub struct Erc20 {
    address: Address,
    chain_id: u64,
    name: ViewMethod<String>,
    symbol: ViewMethod<String>,
    decimals: ViewMethod<u8>,
    tags: Vec<String>,
    caller: Arc<dyn ContractCaller>,
}

impl Erc20 {
    /// Token from a token list; metadata never hits the chain
    pub fn listed(token: &Token, caller: Arc<dyn ContractCaller>) -> Self {
        Self {
            address: token.address,
            chain_id: token.chain_id,
            name: ViewMethod::Cached(token.name.clone()),
            symbol: ViewMethod::Cached(token.symbol.clone()),
            decimals: ViewMethod::Cached(token.decimals),
            tags: token.tags.clone(),
            caller,
        }
    }

    /// Bare contract address; metadata is read from the contract
    pub fn at(address: Address, chain_id: u64, caller: Arc<dyn ContractCaller>) -> Self {
        Self {
            address,
            chain_id,
            name: ViewMethod::Live(ViewCall::Name(address)),
            symbol: ViewMethod::Live(ViewCall::Symbol(address)),
            decimals: ViewMethod::Live(ViewCall::Decimals(address)),
            tags: Vec::new(),
            caller,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn is_listed(&self) -> bool {
        self.symbol.is_cached()
    }

    pub async fn name(&self) -> Result<String> {
        self.name.value(self.caller.as_ref()).await
    }

    pub async fn symbol(&self) -> Result<String> {
        self.symbol.value(self.caller.as_ref()).await
    }

    pub async fn decimals(&self) -> Result<u8> {
        self.decimals.value(self.caller.as_ref()).await
    }

    pub async fn total_supply(&self) -> Result<U256> {
        self.caller
            .call_view(ViewCall::TotalSupply(self.address))
            .await?
            .try_into()
    }

    pub async fn balance_of(&self, holder: Address) -> Result<U256> {
        self.caller
            .call_view(ViewCall::BalanceOf {
                token: self.address,
                holder,
            })
            .await?
            .try_into()
    }

    pub async fn allowance(&self, owner: Address, spender: Address) -> Result<U256> {
        self.caller
            .call_view(ViewCall::Allowance {
                token: self.address,
                owner,
                spender,
            })
            .await?
            .try_into()
    }

    pub async fn transfer(
        &self,
        receiver: Address,
        amount: U256,
        sender: Address,
    ) -> Result<TransactionReceipt> {
        self.caller
            .transfer(self.address, receiver, amount, sender)
            .await
    }

    /// Materialize the token metadata
    pub async fn info(&self) -> Result<Token> {
        Ok(Token {
            chain_id: self.chain_id,
            address: self.address,
            symbol: self.symbol().await?,
            name: self.name().await?,
            decimals: self.decimals().await?,
            tags: self.tags.clone(),
        })
    }
}

impl fmt::Debug for Erc20 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Erc20")
            .field("address", &self.address)
            .field("chain_id", &self.chain_id)
            .field("symbol", &self.symbol)
            .field("decimals", &self.decimals)
            .finish()
    }
}
