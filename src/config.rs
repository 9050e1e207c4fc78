use alloy::primitives::Address;
use eyre::{bail, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use std::fs;
use std::time::Duration;

/// A token list the application needs installed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListInfo {
    pub name: String,
    pub uri: String,
}

/// Token list configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokensConfig {
    /// Name of the list used for symbol lookups first
    #[serde(default)]
    pub default: Option<String>,
    /// Lists installed at startup
    #[serde(default)]
    pub required: Vec<ListInfo>,
}

/// What to monitor
#[serde_as]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Symbols or addresses. Empty means every token of the default list.
    #[serde(default)]
    pub tokens: Vec<String>,
    /// Accounts to track. Empty means the signer.
    #[serde(default)]
    pub accounts: Vec<Address>,
    /// Compare cached balances with the chain after this delay
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    #[serde(rename = "check_debounce_secs")]
    pub check_debounce: Option<Duration>,
}

/// Telegram configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// List of allowed Telegram usernames (without @)
    #[serde(default)]
    pub allowed_users: Vec<String>,
}

/// Application configuration from YAML
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub rpc_nodes: Vec<String>,
    #[serde(default = "default_active_transport_count")]
    pub active_transport_count: usize,
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(rename = "poll_interval_secs", default = "default_poll_interval")]
    pub poll_interval: Duration,
    /// Default account for monitoring
    #[serde(default)]
    pub signer: Option<Address>,
    /// Multicall3 deployment, for chains without the canonical one
    #[serde(default)]
    pub multicall: Option<Address>,
    #[serde(default)]
    pub tokens: TokensConfig,
    #[serde(default)]
    pub watch: WatchConfig,
    pub telegram: Option<TelegramConfig>,
}

fn default_active_transport_count() -> usize {
    3
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(4)
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(content)?;
        if config.rpc_nodes.is_empty() {
            bail!("at least one rpc node must be configured");
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    #[test]
    fn parses_full_config() {
        let yaml = r#"
rpc_nodes:
  - https://ethereum.publicnode.com
poll_interval_secs: 12
signer: "0xaA8ba7D4611437141192e7ceCed531Bc0A133efb"
tokens:
  default: Uniswap Labs Default
  required:
    - name: Uniswap Labs Default
      uri: https://tokens.uniswap.org
watch:
  tokens: [USDT, USDC]
  accounts:
    - "0x28C6c06298d514Db089934071355E5743bf21d60"
  check_debounce_secs: 2
multicall: "0x5FbDB2315678afecb367f032d93F642f64180aa3"
"#;
        let config = Config::from_yaml(yaml).unwrap();

        assert_eq!(config.active_transport_count, 3);
        assert_eq!(config.poll_interval, Duration::from_secs(12));
        assert_eq!(
            config.signer,
            Some(address!("aA8ba7D4611437141192e7ceCed531Bc0A133efb"))
        );
        assert_eq!(
            config.multicall,
            Some(address!("5FbDB2315678afecb367f032d93F642f64180aa3"))
        );
        assert_eq!(config.tokens.required.len(), 1);
        assert_eq!(config.watch.tokens, vec!["USDT", "USDC"]);
        assert_eq!(config.watch.check_debounce, Some(Duration::from_secs(2)));
        assert!(config.telegram.is_none());
    }

    #[test]
    fn defaults_for_minimal_config() {
        let config = Config::from_yaml("rpc_nodes: [http://localhost:8545]").unwrap();

        assert_eq!(config.poll_interval, Duration::from_secs(4));
        assert!(config.signer.is_none());
        assert!(config.multicall.is_none());
        assert!(config.tokens.default.is_none());
        assert!(config.watch.accounts.is_empty());
        assert!(config.watch.check_debounce.is_none());
    }

    #[test]
    fn rejects_missing_rpc_nodes() {
        assert!(Config::from_yaml("rpc_nodes: []").is_err());
    }
}
