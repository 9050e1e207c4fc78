pub mod bot;
pub mod config;
pub mod contracts;
pub mod error;
pub mod logger;
pub mod monitoring;
pub mod providers;
pub mod telegram;
pub mod tokens;

pub use bot::{Bot, EventSource, LogWatcher, MetricSink, Metrics, Runtime, StartupHook, TransferHandler};
pub use config::{Config, ListInfo, TelegramConfig, TokensConfig, WatchConfig};
pub use contracts::{AlloyCaller, ContractCaller, ViewCall, ViewValue, IERC20};
pub use error::{Result, TokenError};
pub use logger::LogSink;
pub use monitoring::{
    BalanceCheck, BalanceLedger, Balances, TransferEvent, TransferFilter, MAX_RECOMMENDED_ACCOUNTS,
};
pub use providers::{create_fallback_provider, FallbackConfig};
pub use telegram::TelegramNotifier;
pub use tokens::{Erc20, Token, TokenList, TokenListManager, TokenRegistry, Tokens, UnitConverter, ViewMethod};
