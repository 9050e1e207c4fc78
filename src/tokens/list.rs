use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::token::Token;
use crate::config::ListInfo;
use crate::error::{Result, TokenError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

/// A token list in the Uniswap token list format
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenList {
    pub name: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub version: Option<ListVersion>,
    pub tokens: Vec<Token>,
}

impl TokenList {
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn find(&self, symbol: &str, chain_id: u64) -> Option<&Token> {
        self.tokens
            .iter()
            .find(|token| token.chain_id == chain_id && token.symbol == symbol)
    }
}

/// Source of token metadata
#[async_trait]
pub trait TokenRegistry: Send + Sync {
    /// Look a symbol up on the given chain
    async fn resolve_symbol(&self, symbol: &str, chain_id: u64) -> Result<Token>;

    /// Tokens on the given chain carrying every one of `tags`
    async fn list_tokens(&self, chain_id: u64, tags: &[String]) -> Result<Vec<Token>>;

    /// Install a list from a URI and return the name it declares
    async fn install_list(&self, uri: &str) -> Result<String>;
}

/// In-memory collection of named token lists
pub struct TokenListManager {
    lists: RwLock<BTreeMap<String, TokenList>>,
    default: RwLock<Option<String>>,
    http: reqwest::Client,
}

impl TokenListManager {
    pub fn new(default: Option<String>) -> Self {
        Self {
            lists: RwLock::new(BTreeMap::new()),
            default: RwLock::new(default),
            http: reqwest::Client::new(),
        }
    }

    /// Install an already parsed list, replacing any list with the same name
    pub async fn add_list(&self, list: TokenList) -> String {
        let name = list.name.clone();
        info!(list = %name, tokens = list.tokens.len(), "installing token list");
        self.lists.write().await.insert(name.clone(), list);

        let mut default = self.default.write().await;
        if default.is_none() {
            *default = Some(name.clone());
        }
        name
    }

    pub async fn remove_list(&self, name: &str) -> Result<()> {
        if self.lists.write().await.remove(name).is_none() {
            return Err(TokenError::TokenList(format!("list '{name}' is not installed")));
        }

        let mut default = self.default.write().await;
        if default.as_deref() == Some(name) {
            *default = None;
        }
        Ok(())
    }

    pub async fn installed_lists(&self) -> Vec<String> {
        self.lists.read().await.keys().cloned().collect()
    }

    pub async fn default_list(&self) -> Option<String> {
        self.default.read().await.clone()
    }

    pub async fn set_default(&self, name: &str) -> Result<()> {
        if !self.lists.read().await.contains_key(name) {
            return Err(TokenError::TokenList(format!("list '{name}' is not installed")));
        }
        *self.default.write().await = Some(name.to_string());
        Ok(())
    }

    /// Install every required list. A list whose declared name differs from
    /// the configured one is kept under its declared name.
    pub async fn install_required(&self, required: &[ListInfo]) -> Result<()> {
        for info in required {
            let installed = self.install_list(&info.uri).await?;
            if installed != info.name {
                warn!(
                    expected = %info.name,
                    installed = %installed,
                    uri = %info.uri,
                    "token list name mismatch"
                );
            }
        }
        Ok(())
    }

    async fn fetch(&self, uri: &str) -> Result<TokenList> {
        let content = if uri.starts_with("http://") || uri.starts_with("https://") {
            debug!(%uri, "downloading token list");
            self.http
                .get(uri)
                .send()
                .await?
                .error_for_status()?
                .text()
                .await?
        } else {
            let path = uri.strip_prefix("file://").unwrap_or(uri);
            tokio::fs::read_to_string(path).await?
        };
        TokenList::from_json(&content)
    }
}

impl Default for TokenListManager {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl TokenRegistry for TokenListManager {
    async fn resolve_symbol(&self, symbol: &str, chain_id: u64) -> Result<Token> {
        let lists = self.lists.read().await;
        let default = self.default.read().await;

        // default list wins over the others
        let preferred = default.as_ref().and_then(|name| lists.get(name));
        preferred
            .into_iter()
            .chain(
                lists
                    .iter()
                    .filter(|(name, _)| Some(*name) != default.as_ref())
                    .map(|(_, list)| list),
            )
            .find_map(|list| list.find(symbol, chain_id))
            .cloned()
            .ok_or_else(|| TokenError::UnknownToken(format!("{symbol} on chain {chain_id}")))
    }

    async fn list_tokens(&self, chain_id: u64, tags: &[String]) -> Result<Vec<Token>> {
        let lists = self.lists.read().await;
        let default = self.default.read().await;

        let name = default
            .as_ref()
            .ok_or_else(|| TokenError::TokenList("no default token list".to_string()))?;
        let list = lists
            .get(name)
            .ok_or_else(|| TokenError::TokenList(format!("list '{name}' is not installed")))?;

        Ok(list
            .tokens
            .iter()
            .filter(|token| token.chain_id == chain_id && token.has_tags(tags))
            .cloned()
            .collect())
    }

    async fn install_list(&self, uri: &str) -> Result<String> {
        let list = self.fetch(uri).await?;
        Ok(self.add_list(list).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    const DEFAULT_LIST: &str = r#"{
        "name": "Default List",
        "timestamp": "2024-01-01T00:00:00.000Z",
        "version": { "major": 1, "minor": 0, "patch": 0 },
        "tokens": [
            {
                "chainId": 1,
                "address": "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48",
                "symbol": "USDC",
                "name": "USD Coin",
                "decimals": 6,
                "tags": ["stablecoin"]
            },
            {
                "chainId": 1,
                "address": "0x514910771AF9Ca656af840dff83E8264EcF986CA",
                "symbol": "LINK",
                "name": "ChainLink Token",
                "decimals": 18
            },
            {
                "chainId": 137,
                "address": "0x3c499c542cEF5E3811e1192ce70d8cC03d5c3359",
                "symbol": "USDC",
                "name": "USD Coin",
                "decimals": 6
            }
        ]
    }"#;

    const OTHER_LIST: &str = r#"{
        "name": "Other List",
        "tokens": [
            {
                "chainId": 1,
                "address": "0x0000000000000000000000000000000000000001",
                "symbol": "USDC",
                "name": "Fake USDC",
                "decimals": 18
            },
            {
                "chainId": 1,
                "address": "0xdAC17F958D2ee523a2206206994597C13D831ec7",
                "symbol": "USDT",
                "name": "Tether USD",
                "decimals": 6
            }
        ]
    }"#;

    async fn manager() -> TokenListManager {
        let manager = TokenListManager::default();
        manager
            .add_list(TokenList::from_json(DEFAULT_LIST).unwrap())
            .await;
        manager
            .add_list(TokenList::from_json(OTHER_LIST).unwrap())
            .await;
        manager
    }

    #[tokio::test]
    async fn first_list_becomes_default() {
        let manager = manager().await;
        assert_eq!(manager.default_list().await.as_deref(), Some("Default List"));
        assert_eq!(
            manager.installed_lists().await,
            vec!["Default List".to_string(), "Other List".to_string()]
        );
    }

    #[tokio::test]
    async fn default_list_takes_precedence() {
        let manager = manager().await;

        let usdc = manager.resolve_symbol("USDC", 1).await.unwrap();
        assert_eq!(usdc.address, address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"));

        // only the other list knows USDT
        let usdt = manager.resolve_symbol("USDT", 1).await.unwrap();
        assert_eq!(usdt.decimals, 6);

        manager.set_default("Other List").await.unwrap();
        let usdc = manager.resolve_symbol("USDC", 1).await.unwrap();
        assert_eq!(usdc.name, "Fake USDC");
    }

    #[tokio::test]
    async fn lookups_are_chain_specific() {
        let manager = manager().await;

        let polygon = manager.resolve_symbol("USDC", 137).await.unwrap();
        assert_eq!(polygon.chain_id, 137);

        assert!(matches!(
            manager.resolve_symbol("LINK", 137).await,
            Err(TokenError::UnknownToken(_))
        ));
    }

    #[tokio::test]
    async fn list_tokens_filters_chain_and_tags() {
        let manager = manager().await;

        let mainnet = manager.list_tokens(1, &[]).await.unwrap();
        assert_eq!(mainnet.len(), 2);

        let stable = manager
            .list_tokens(1, &["stablecoin".to_string()])
            .await
            .unwrap();
        assert_eq!(stable.len(), 1);
        assert_eq!(stable[0].symbol, "USDC");
    }

    #[tokio::test]
    async fn removing_default_list_clears_default() {
        let manager = manager().await;
        manager.remove_list("Default List").await.unwrap();

        assert!(manager.default_list().await.is_none());
        assert!(manager.list_tokens(1, &[]).await.is_err());
        assert!(manager.remove_list("Default List").await.is_err());
    }

    #[tokio::test]
    async fn install_required_tolerates_name_mismatch() {
        let path = std::env::temp_dir().join(format!("token-list-{}.json", std::process::id()));
        std::fs::write(&path, OTHER_LIST).unwrap();

        let manager = TokenListManager::default();
        let required = vec![ListInfo {
            name: "Declared Elsewhere".to_string(),
            uri: path.display().to_string(),
        }];
        manager.install_required(&required).await.unwrap();

        assert_eq!(manager.installed_lists().await, vec!["Other List".to_string()]);
        std::fs::remove_file(path).ok();
    }
}
