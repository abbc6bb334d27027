pub mod client_key;
pub mod rate_limit;
