pub mod server_metrics;
pub use server_metrics::{MetricsSnapshot, ServerMetrics};
