use alloy::primitives::Address;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::convert::UnitConverter;
use super::list::TokenRegistry;
use super::token::{Erc20, Token};
use crate::contracts::ContractCaller;
use crate::error::{Result, TokenError};

/// The network the token context is bound to
#[derive(Clone)]
pub struct Network {
    pub chain_id: u64,
    pub caller: Arc<dyn ContractCaller>,
}

/// Token lookups for one application.
///
/// Build it once, after the provider is up, and hand it to everything that
/// needs to resolve tokens. Without a network only registry management works;
/// lookups fail with [`TokenError::NoProvider`].
pub struct Tokens {
    registry: Arc<dyn TokenRegistry>,
    network: Option<Network>,
    list_warned: AtomicBool,
}

impl Tokens {
    pub fn offline(registry: Arc<dyn TokenRegistry>) -> Self {
        Self {
            registry,
            network: None,
            list_warned: AtomicBool::new(false),
        }
    }

    pub fn with_network(
        registry: Arc<dyn TokenRegistry>,
        chain_id: u64,
        caller: Arc<dyn ContractCaller>,
    ) -> Self {
        Self {
            registry,
            network: Some(Network { chain_id, caller }),
            list_warned: AtomicBool::new(false),
        }
    }

    /// Bind to the chain the caller is connected to
    pub async fn connect(
        registry: Arc<dyn TokenRegistry>,
        caller: Arc<dyn ContractCaller>,
    ) -> Result<Self> {
        let chain_id = caller.chain_id().await?;
        info!(chain_id, "token context connected");
        Ok(Self::with_network(registry, chain_id, caller))
    }

    pub fn registry(&self) -> &Arc<dyn TokenRegistry> {
        &self.registry
    }

    pub fn network(&self) -> Result<&Network> {
        self.network.as_ref().ok_or(TokenError::NoProvider)
    }

    pub fn chain_id(&self) -> Result<u64> {
        Ok(self.network()?.chain_id)
    }

    pub fn caller(&self) -> Result<Arc<dyn ContractCaller>> {
        Ok(self.network()?.caller.clone())
    }

    /// Resolve a symbol from the installed lists, falling back to treating
    /// the input as a contract address
    pub async fn resolve(&self, symbol_or_address: &str) -> Result<Erc20> {
        let network = self.network()?;
        let id = symbol_or_address.trim();

        match self.registry.resolve_symbol(id, network.chain_id).await {
            Ok(token) => return Ok(Erc20::listed(&token, network.caller.clone())),
            Err(e) => debug!(token = %id, error = %e, "not a listed symbol"),
        }

        let address = Address::from_str(id)
            .map_err(|_| TokenError::UnknownToken(symbol_or_address.to_string()))?;
        Ok(Erc20::at(address, network.chain_id, network.caller.clone()))
    }

    /// Resolve and materialize token metadata
    pub async fn token(&self, symbol_or_address: &str) -> Result<Token> {
        self.resolve(symbol_or_address).await?.info().await
    }

    /// Tokens of the active chain in the default list.
    ///
    /// Registry failures are reported once and then read as an empty list.
    pub async fn list(&self, tags: &[String]) -> Result<Vec<Token>> {
        let chain_id = self.chain_id()?;
        match self.registry.list_tokens(chain_id, tags).await {
            Ok(tokens) => Ok(tokens),
            Err(e) => {
                if !self.list_warned.swap(true, Ordering::Relaxed) {
                    warn!(chain_id, error = %e, "token list unavailable, no tokens loaded");
                }
                Ok(Vec::new())
            }
        }
    }

    pub fn converter(&self) -> UnitConverter<'_> {
        UnitConverter::new(self)
    }
}
