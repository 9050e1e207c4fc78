// Error types for token resolution, balance tracking and the bot runtime

#[derive(thiserror::Error, Debug)]
pub enum TokenError {
    #[error("unknown token: {0}")]
    UnknownToken(String),

    #[error("token is not watched: {0}")]
    NotWatched(String),

    #[error("not connected to a provider")]
    NoProvider,

    #[error("monitor requires at least one account or a default signer")]
    InvalidMonitorArgs,

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("rpc: {0}")]
    Rpc(String),

    #[error("call reverted: {0}")]
    Reverted(String),

    #[error("decode: {0}")]
    Decode(String),

    #[error("token list: {0}")]
    TokenList(String),

    #[error("circuit breaker: {0}")]
    CircuitBreaker(String),

    #[error("runtime: {0}")]
    Runtime(String),
}

pub type Result<T> = std::result::Result<T, TokenError>;

impl From<alloy::transports::RpcError<alloy::transports::TransportErrorKind>> for TokenError {
    fn from(e: alloy::transports::RpcError<alloy::transports::TransportErrorKind>) -> Self {
        TokenError::Rpc(e.to_string())
    }
}

impl From<alloy::contract::Error> for TokenError {
    fn from(e: alloy::contract::Error) -> Self {
        TokenError::Rpc(e.to_string())
    }
}

impl From<alloy::providers::PendingTransactionError> for TokenError {
    fn from(e: alloy::providers::PendingTransactionError) -> Self {
        TokenError::Rpc(e.to_string())
    }
}

impl From<alloy::sol_types::Error> for TokenError {
    fn from(e: alloy::sol_types::Error) -> Self {
        TokenError::Decode(e.to_string())
    }
}

impl From<reqwest::Error> for TokenError {
    fn from(e: reqwest::Error) -> Self {
        TokenError::TokenList(e.to_string())
    }
}

impl From<serde_json::Error> for TokenError {
    fn from(e: serde_json::Error) -> Self {
        TokenError::TokenList(e.to_string())
    }
}

impl From<std::io::Error> for TokenError {
    fn from(e: std::io::Error) -> Self {
        TokenError::TokenList(e.to_string())
    }
}
