//! Policy abstractions for delivery operations.
//!
//! - [`RetryPolicy`]: how many times each provider is tried and how long to
//!   back off between tries

pub mod retry;

pub use retry::{RetryPolicy, calculate_backoff_delay};
