//! Catalog ingestion and metric rendering: the boundary between the pure
//! modeling crates and the outside world (CSV files, terminals).

pub mod catalog;
pub mod metrics;

pub use catalog::load_catalog;
pub use metrics::{all_metrics, Metric, MetricRegistry, MetricValue};
