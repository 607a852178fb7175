//! Metric emission for planning and path construction.
//!
//! Counters go through the `metrics` facade; without an installed recorder
//! every call is a no-op.

use metrics::counter;

use crate::error::RelmapError;

/// Path and mutation planning metrics
pub struct CoreMetrics;

impl CoreMetrics {
    /// Record a planned table mutation
    pub fn mutation_planned(kind: &str, table: &str) {
        counter!("relmap_mutations_planned_total",
                "kind" => kind.to_string(),
                "table" => table.to_string())
            .increment(1);
    }

    /// Record a change set rejected before anything was handed off
    pub fn flush_rejected(error: &RelmapError) {
        counter!("relmap_flush_rejected_total", "reason" => error.kind().as_str())
            .increment(1);
    }

    /// Record a new node in a query tree
    pub fn path_created(source: &'static str) {
        counter!("relmap_paths_created_total", "source" => source)
            .increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_without_recorder() {
        CoreMetrics::mutation_planned("update", "orders");
        CoreMetrics::path_created("attribute");
        CoreMetrics::flush_rejected(&RelmapError::TableNotFound("orders".into()));
    }
}
