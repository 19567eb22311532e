//! Per-provider quota enforcement and retry with exponential backoff.

mod governor;
mod retry;

pub use governor::RateGovernor;
pub use retry::RetryPolicy;
