use alloy::primitives::Address;
use bigdecimal::BigDecimal;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

use super::event::TransferFilter;
use super::ledger::{BalanceLedger, Inbound, LoadBalances, Outbound};
use crate::bot::Bot;
use crate::contracts::ContractCaller;
use crate::error::{Result, TokenError};
use crate::tokens::{Token, Tokens};

/// Each account costs two subscriptions per token
pub const MAX_RECOMMENDED_ACCOUNTS: usize = 100;

/// Balance ledgers for a fixed set of tokens
pub struct Balances {
    ledgers: BTreeMap<Address, Arc<BalanceLedger>>,
}

impl Balances {
    /// Resolve `identifiers` (symbols or addresses) eagerly. No identifiers
    /// means every token of the default list.
    pub async fn new<I, S>(tokens: &Tokens, identifiers: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let caller = tokens.caller()?;
        let identifiers: Vec<S> = identifiers.into_iter().collect();

        let resolved = if identifiers.is_empty() {
            tokens.list(&[]).await?
        } else {
            let mut resolved = Vec::with_capacity(identifiers.len());
            for id in &identifiers {
                resolved.push(tokens.token(id.as_ref()).await?);
            }
            resolved
        };

        Ok(Self::with_tokens(caller, resolved))
    }

    /// One ledger per distinct address. Tokens sharing a symbol get their
    /// metrics named by address so the names stay unique.
    pub fn with_tokens(caller: Arc<dyn ContractCaller>, tokens: impl IntoIterator<Item = Token>) -> Self {
        let mut unique = BTreeMap::new();
        for token in tokens {
            unique.entry(token.address).or_insert(token);
        }

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for token in unique.values() {
            *counts.entry(token.symbol.as_str()).or_default() += 1;
        }
        let shared: HashSet<String> = counts
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(symbol, _)| symbol.to_string())
            .collect();
        for symbol in &shared {
            warn!(%symbol, "several watched tokens share a symbol, naming their metrics by address");
        }

        let ledgers = unique
            .into_iter()
            .map(|(address, token)| {
                let ambiguous = shared.contains(&token.symbol);
                let mut ledger = BalanceLedger::new(token, caller.clone());
                if ambiguous {
                    ledger = ledger.with_label(address.to_string());
                }
                (address, Arc::new(ledger))
            })
            .collect();
        Self { ledgers }
    }

    pub fn len(&self) -> usize {
        self.ledgers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ledgers.is_empty()
    }

    pub fn tokens(&self) -> impl Iterator<Item = &Token> {
        self.ledgers.values().map(|ledger| ledger.token())
    }

    /// Ledger of a watched token, by symbol or address. A symbol shared by
    /// several tokens matches the lowest address.
    pub fn ledger(&self, token: &str) -> Result<&Arc<BalanceLedger>> {
        let found = match Address::from_str(token) {
            Ok(address) => self.ledgers.get(&address),
            Err(_) => self
                .ledgers
                .values()
                .find(|ledger| ledger.token().symbol == token),
        };
        found.ok_or_else(|| TokenError::NotWatched(token.to_string()))
    }

    /// Ledger and account behind a metric emitted by one of the ledgers
    pub fn metric_ledger(&self, metric: &str) -> Result<(&Arc<BalanceLedger>, Address)> {
        let (label, account) = metric
            .rsplit_once('/')
            .ok_or_else(|| TokenError::Decode(format!("not a balance metric: {metric}")))?;
        let account = Address::from_str(account)
            .map_err(|e| TokenError::Decode(format!("{metric}: {e}")))?;
        let ledger = self
            .ledgers
            .values()
            .find(|ledger| ledger.label() == label)
            .ok_or_else(|| TokenError::NotWatched(label.to_string()))?;
        Ok((ledger, account))
    }

    pub async fn get_balance(&self, token: &str, account: Address) -> Result<BigDecimal> {
        self.ledger(token)?.read_cached(account).await
    }

    /// Track `accounts` (or the bot's signer) for every token.
    ///
    /// Registers one bulk-load startup hook per token and an inbound and an
    /// outbound transfer handler per token and account.
    pub fn monitor<B: Bot + ?Sized>(&self, bot: &mut B, accounts: &[Address]) -> Result<()> {
        let accounts = if accounts.is_empty() {
            vec![bot.signer().ok_or(TokenError::InvalidMonitorArgs)?]
        } else {
            let mut unique = Vec::with_capacity(accounts.len());
            for account in accounts {
                if !unique.contains(account) {
                    unique.push(*account);
                }
            }
            unique
        };

        if accounts.len() > MAX_RECOMMENDED_ACCOUNTS {
            warn!(
                accounts = accounts.len(),
                limit = MAX_RECOMMENDED_ACCOUNTS,
                "monitoring many accounts creates many subscriptions"
            );
        }

        for ledger in self.ledgers.values() {
            let token = ledger.token();
            bot.on_startup(
                format!("load_{}_balances", token.symbol),
                Arc::new(LoadBalances::new(ledger.clone(), accounts.clone())),
            );

            for &account in &accounts {
                bot.on_transfer(
                    format!("{}_in_{}", token.symbol, account),
                    TransferFilter::inbound(token.address, account),
                    Arc::new(Inbound::new(ledger.clone(), account)),
                );
                bot.on_transfer(
                    format!("{}_out_{}", token.symbol, account),
                    TransferFilter::outbound(token.address, account),
                    Arc::new(Outbound::new(ledger.clone(), account)),
                );
            }
        }

        info!(tokens = self.len(), accounts = accounts.len(), "balance monitoring registered");
        Ok(())
    }
}

impl fmt::Display for Balances {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Balances tokens={}>", self.len())
    }
}
