//! End-of-run rate aggregation
//!
//! Streaming aggregates per (service_code, geographic_scope); no rate
//! values are retained. The input model carries no geography, so every
//! observation lands in the `national` scope until an enrichment stage
//! supplies something finer.

use std::collections::BTreeMap;

use crate::types::AnalyticsRow;

/// Default geographic scope for aggregation.
pub const NATIONAL_SCOPE: &str = "national";

#[derive(Debug, Clone, Default)]
struct Aggregate {
    count: u64,
    min: f64,
    max: f64,
    sum: f64,
    sum_sq: f64,
}

impl Aggregate {
    fn observe(&mut self, rate: f64) {
        if self.count == 0 {
            self.min = rate;
            self.max = rate;
        } else {
            self.min = self.min.min(rate);
            self.max = self.max.max(rate);
        }
        self.count += 1;
        self.sum += rate;
        self.sum_sq += rate * rate;
    }

    fn mean(&self) -> f64 {
        self.sum / self.count as f64
    }

    fn stddev(&self) -> f64 {
        if self.count < 2 {
            return 0.0;
        }
        let mean = self.mean();
        let variance = (self.sum_sq / self.count as f64 - mean * mean).max(0.0);
        variance.sqrt()
    }
}

/// Accumulates admitted rates for one pipeline.
#[derive(Debug, Default)]
pub struct AnalyticsAccumulator {
    // BTreeMap keeps emission order deterministic across runs.
    cells: BTreeMap<(String, String), Aggregate>,
}

impl AnalyticsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, service_code: &str, scope: &str, rate: f64) {
        self.cells
            .entry((service_code.to_string(), scope.to_string()))
            .or_default()
            .observe(rate);
    }

    pub fn observe_national(&mut self, service_code: &str, rate: f64) {
        self.observe(service_code, NATIONAL_SCOPE, rate);
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Drain into output rows, ordered by (service_code, scope).
    pub fn into_rows(self) -> Vec<AnalyticsRow> {
        self.cells
            .into_iter()
            .map(|((service_code, geographic_scope), agg)| AnalyticsRow {
                service_code,
                geographic_scope,
                rate_count: agg.count,
                min_rate: agg.min,
                max_rate: agg.max,
                mean_rate: agg.mean(),
                stddev_rate: agg.stddev(),
            })
            .collect()
    }
}
