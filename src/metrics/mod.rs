//! Prometheus metrics and the health/metrics HTTP server

pub mod collector;
pub mod health;

pub use collector::MetricsCollector;
pub use health::{HealthServer, HealthServerConfig};
