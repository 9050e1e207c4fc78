mod balances;
mod check;
mod event;
mod ledger;

pub use balances::{Balances, MAX_RECOMMENDED_ACCOUNTS};
pub use check::BalanceCheck;
pub use event::{TransferEvent, TransferFilter};
pub use ledger::{BalanceLedger, Inbound, LoadBalances, Outbound};
