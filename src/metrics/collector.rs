//! Metrics collection using Prometheus

use anyhow::Result;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Prometheus counters and gauges for the queue lifecycle
#[derive(Clone)]
pub struct MetricsCollector {
    registry: Arc<Registry>,

    /// Successful queue joins by category
    pub joins_total: IntCounterVec,
    /// Successful queue/group departures
    pub leaves_total: IntCounter,
    /// Rejected operations by error kind
    pub rejections_total: IntCounterVec,
    /// Groups formed by category
    pub groups_formed_total: IntCounterVec,
    /// Groups dispatched by category
    pub groups_dispatched_total: IntCounterVec,
    /// Groups removed without dispatch, by reason
    pub groups_cancelled_total: IntCounterVec,
    /// Currently active match groups
    pub active_groups: IntGauge,
    /// Players currently waiting in pools
    pub players_waiting: IntGauge,
}

impl MetricsCollector {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let joins_total = IntCounterVec::new(
            Opts::new("queue_joins_total", "Successful queue joins"),
            &["category"],
        )?;
        let leaves_total =
            IntCounter::new("queue_leaves_total", "Successful queue departures")?;
        let rejections_total = IntCounterVec::new(
            Opts::new("queue_rejections_total", "Rejected queue operations"),
            &["kind"],
        )?;
        let groups_formed_total = IntCounterVec::new(
            Opts::new("match_groups_formed_total", "Match groups formed"),
            &["category"],
        )?;
        let groups_dispatched_total = IntCounterVec::new(
            Opts::new("match_groups_dispatched_total", "Match groups dispatched"),
            &["category"],
        )?;
        let groups_cancelled_total = IntCounterVec::new(
            Opts::new(
                "match_groups_cancelled_total",
                "Match groups cancelled before dispatch",
            ),
            &["reason"],
        )?;
        let active_groups =
            IntGauge::new("match_groups_active", "Currently active match groups")?;
        let players_waiting =
            IntGauge::new("queue_players_waiting", "Players waiting in pools")?;

        registry.register(Box::new(joins_total.clone()))?;
        registry.register(Box::new(leaves_total.clone()))?;
        registry.register(Box::new(rejections_total.clone()))?;
        registry.register(Box::new(groups_formed_total.clone()))?;
        registry.register(Box::new(groups_dispatched_total.clone()))?;
        registry.register(Box::new(groups_cancelled_total.clone()))?;
        registry.register(Box::new(active_groups.clone()))?;
        registry.register(Box::new(players_waiting.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            joins_total,
            leaves_total,
            rejections_total,
            groups_formed_total,
            groups_dispatched_total,
            groups_cancelled_total,
            active_groups,
            players_waiting,
        })
    }

    /// Text exposition of all registered metrics
    pub fn gather(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collector_records_and_gathers() {
        let metrics = MetricsCollector::new().unwrap();
        metrics.joins_total.with_label_values(&["duo"]).inc();
        metrics.groups_formed_total.with_label_values(&["duo"]).inc();
        metrics.active_groups.set(1);

        let text = metrics.gather().unwrap();
        assert!(text.contains("queue_joins_total"));
        assert!(text.contains("match_groups_active 1"));
    }

    #[test]
    fn test_independent_collectors_do_not_collide() {
        let first = MetricsCollector::new().unwrap();
        let second = MetricsCollector::new().unwrap();
        first.leaves_total.inc();
        assert_eq!(second.leaves_total.get(), 0);
    }
}
