mod context;
mod convert;
mod list;
mod token;
pub mod units;

pub use context::{Network, Tokens};
pub use convert::UnitConverter;
pub use list::{ListVersion, TokenList, TokenListManager, TokenRegistry};
pub use token::{Erc20, Token, ViewMethod};
