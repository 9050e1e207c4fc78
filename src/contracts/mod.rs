mod caller;
mod erc20;
mod multicall;

pub use caller::{AlloyCaller, ContractCaller, ViewCall, ViewValue};
#[cfg(test)]
pub use caller::MockContractCaller;
pub use erc20::IERC20;
pub use multicall::{IMulticall3, MULTICALL3_ADDRESS};
