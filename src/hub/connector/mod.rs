//! 连接器模块
//!
//! 提供基于传输层的连接器、有限次重试，以及没有真实硬件时使用的模拟端点。

mod endpoint;
mod retry;
mod simulated;

#[cfg(test)]
pub(crate) mod testing;

pub use endpoint::{EndpointConnector, STATUS_KEY};
pub use retry::{RetryConfig, RetryStrategy, RetryableError};
pub use simulated::{ACTION_KEY, COLOR_KEY, DATA_KEY, PowerState, STATE_KEY, SimulatedEndpoint};
