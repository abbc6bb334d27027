pub mod decision;
pub mod rate_limiter;
pub mod store;
pub mod sweeper;
pub mod token_bucket;
pub use decision::{AllowResult, BucketStats, RateLimited};
pub use rate_limiter::RateLimiter;
pub use token_bucket::TokenBucket;
