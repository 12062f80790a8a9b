pub mod retry;
pub mod scheduler;

pub use retry::{RetryConfig, RetryError, RetryManager, RetryStrategy};
pub use scheduler::{DeliveryResult, DeliveryScheduler};
