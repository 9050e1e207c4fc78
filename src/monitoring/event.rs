use alloy::{
    primitives::{Address, B256, U256},
    rpc::types::{Filter, Log},
    sol_types::SolEvent,
};

use crate::contracts::IERC20;
use crate::error::{Result, TokenError};

/// An ERC20 `Transfer` as delivered by the node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferEvent {
    pub token: Address,
    pub sender: Address,
    pub receiver: Address,
    pub amount: U256,
    /// Set when a reorg retracted a previously delivered transfer
    pub removed: bool,
    pub block_number: Option<u64>,
    pub transaction_hash: Option<B256>,
    pub log_index: Option<u64>,
}

impl TransferEvent {
    pub fn new(token: Address, sender: Address, receiver: Address, amount: U256) -> Self {
        Self {
            token,
            sender,
            receiver,
            amount,
            removed: false,
            block_number: None,
            transaction_hash: None,
            log_index: None,
        }
    }

    /// The same transfer, retracted
    pub fn retracted(mut self) -> Self {
        self.removed = true;
        self
    }
}

impl TryFrom<&Log> for TransferEvent {
    type Error = TokenError;

    fn try_from(log: &Log) -> Result<Self> {
        let decoded = log.log_decode::<IERC20::Transfer>()?;
        let transfer = decoded.inner.data;

        Ok(Self {
            token: log.inner.address,
            sender: transfer.sender,
            receiver: transfer.receiver,
            amount: transfer.amount,
            removed: log.removed,
            block_number: log.block_number,
            transaction_hash: log.transaction_hash,
            log_index: log.log_index,
        })
    }
}

/// Server-side filter for the transfers of one token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferFilter {
    pub token: Address,
    pub sender: Option<Address>,
    pub receiver: Option<Address>,
}

impl TransferFilter {
    /// Transfers received by `account`
    pub fn inbound(token: Address, account: Address) -> Self {
        Self {
            token,
            sender: None,
            receiver: Some(account),
        }
    }

    /// Transfers sent by `account`
    pub fn outbound(token: Address, account: Address) -> Self {
        Self {
            token,
            sender: Some(account),
            receiver: None,
        }
    }

    pub fn matches(&self, event: &TransferEvent) -> bool {
        event.token == self.token
            && self.sender.map_or(true, |sender| sender == event.sender)
            && self.receiver.map_or(true, |receiver| receiver == event.receiver)
    }

    pub fn to_log_filter(&self) -> Filter {
        let mut filter = Filter::new()
            .address(self.token)
            .event_signature(IERC20::Transfer::SIGNATURE_HASH);
        if let Some(sender) = self.sender {
            filter = filter.topic1(sender.into_word());
        }
        if let Some(receiver) = self.receiver {
            filter = filter.topic2(receiver.into_word());
        }
        filter
    }
}
