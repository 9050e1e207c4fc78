use alloy::primitives::U256;
use bigdecimal::BigDecimal;
use std::str::FromStr;
use tracing::debug;

use super::context::Tokens;
use crate::error::{Result, TokenError};

/// Converts token amounts like `100 LINK` into base units
pub struct UnitConverter<'a> {
    tokens: &'a Tokens,
}

impl<'a> UnitConverter<'a> {
    pub fn new(tokens: &'a Tokens) -> Self {
        Self { tokens }
    }

    /// Whether `value` is an amount of a known token.
    ///
    /// Fails only with [`TokenError::NoProvider`] when no network is active.
    pub async fn is_convertible(&self, value: &str) -> Result<bool> {
        self.tokens.network()?;

        match self.convert(value).await {
            Ok(_) => Ok(true),
            Err(TokenError::NoProvider) => Err(TokenError::NoProvider),
            Err(e) => {
                debug!(%value, error = %e, "not a token amount");
                Ok(false)
            }
        }
    }

    pub async fn convert(&self, value: &str) -> Result<U256> {
        let (amount, symbol) = split_amount(value)?;
        let chain_id = self.tokens.chain_id()?;
        let token = self.tokens.registry().resolve_symbol(symbol, chain_id).await?;
        token.to_base_units(&amount)
    }
}

fn split_amount(value: &str) -> Result<(BigDecimal, &str)> {
    let (amount, symbol) = value
        .split_once(' ')
        .filter(|(amount, symbol)| !amount.is_empty() && !symbol.is_empty() && !symbol.contains(' '))
        .ok_or_else(|| TokenError::InvalidAmount(format!("expected '<amount> <symbol>', got '{value}'")))?;

    let amount = BigDecimal::from_str(amount)
        .map_err(|e| TokenError::InvalidAmount(format!("{amount}: {e}")))?;
    Ok((amount, symbol))
}
