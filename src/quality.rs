//! Per-row quality scoring
//!
//! Every candidate rate row gets a completeness score (fraction of required
//! fields present) and an accuracy score (product of validity factors). A
//! row is admitted only when both clear their configured thresholds.
//! Rejections are counted, never propagated as errors.

use serde::{Deserialize, Serialize};

use crate::config::ProcessingConfig;

/// Sanity window for the accuracy factor. Deliberately wider than the hard
/// admission bounds: a rate outside this window is suspicious, one outside
/// the configured bounds is rejected outright.
const SANITY_MIN_RATE: f64 = 0.10;
const SANITY_MAX_RATE: f64 = 50_000.0;

/// Whether a rate falls in the plausible range for a single U.S. charge.
pub fn rate_is_sane(rate: f64) -> bool {
    (SANITY_MIN_RATE..=SANITY_MAX_RATE).contains(&rate)
}

/// Validity factors feeding the accuracy score.
#[derive(Debug, Clone, Copy)]
pub struct AccuracyFactors {
    /// Every NPI in the provider group passed the Luhn check
    pub npi_valid: bool,

    /// Rate within the sanity window
    pub rate_sane: bool,

    /// TIN shaped like a taxpayer identification number
    pub tin_valid: bool,
}

impl AccuracyFactors {
    pub fn score(&self) -> f64 {
        let npi = if self.npi_valid { 1.0 } else { 0.5 };
        let rate = if self.rate_sane { 1.0 } else { 0.6 };
        let tin = if self.tin_valid { 1.0 } else { 0.8 };
        npi * rate * tin
    }
}

/// Fraction of required fields present.
pub fn completeness(present: usize, required: usize) -> f64 {
    if required == 0 {
        1.0
    } else {
        present as f64 / required as f64
    }
}

/// Outcome of gating one candidate row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    RejectedCompleteness,
    RejectedAccuracy,
}

/// The quality gate itself: thresholds applied to scores.
#[derive(Debug, Clone)]
pub struct QualityGate {
    min_completeness: f64,
    min_accuracy: f64,
}

impl QualityGate {
    pub fn new(min_completeness: f64, min_accuracy: f64) -> Self {
        Self {
            min_completeness,
            min_accuracy,
        }
    }

    pub fn from_processing(config: &ProcessingConfig) -> Self {
        Self::new(
            config.min_completeness_pct / 100.0,
            config.min_accuracy_score,
        )
    }

    pub fn assess(&self, completeness: f64, factors: &AccuracyFactors) -> Admission {
        if completeness < self.min_completeness {
            Admission::RejectedCompleteness
        } else if factors.score() < self.min_accuracy {
            Admission::RejectedAccuracy
        } else {
            Admission::Admitted
        }
    }
}

/// Per-payer processing counters, merged into the end-of-run manifest.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QualityCounters {
    pub admitted: u64,
    pub rejected_completeness: u64,
    pub rejected_accuracy: u64,
    pub rejected_whitelist: u64,
    pub rejected_bounds: u64,
    pub rejected_code_type: u64,
    pub rejected_invalid_npi: u64,
    pub deferred_references: u64,
    pub duplicate_rate_uuids: u64,
}

impl QualityCounters {
    pub fn merge(&mut self, other: &QualityCounters) {
        self.admitted += other.admitted;
        self.rejected_completeness += other.rejected_completeness;
        self.rejected_accuracy += other.rejected_accuracy;
        self.rejected_whitelist += other.rejected_whitelist;
        self.rejected_bounds += other.rejected_bounds;
        self.rejected_code_type += other.rejected_code_type;
        self.rejected_invalid_npi += other.rejected_invalid_npi;
        self.deferred_references += other.deferred_references;
        self.duplicate_rate_uuids += other.duplicate_rate_uuids;
    }

    pub fn total_rejected(&self) -> u64 {
        self.rejected_completeness
            + self.rejected_accuracy
            + self.rejected_whitelist
            + self.rejected_bounds
            + self.rejected_code_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accuracy_factors_multiply() {
        let all_good = AccuracyFactors {
            npi_valid: true,
            rate_sane: true,
            tin_valid: true,
        };
        assert_eq!(all_good.score(), 1.0);

        let bad_npi = AccuracyFactors {
            npi_valid: false,
            ..all_good
        };
        assert_eq!(bad_npi.score(), 0.5);

        let bad_everything = AccuracyFactors {
            npi_valid: false,
            rate_sane: false,
            tin_valid: false,
        };
        assert!((bad_everything.score() - 0.5 * 0.6 * 0.8).abs() < 1e-12);
    }

    #[test]
    fn gate_admits_at_threshold() {
        let gate = QualityGate::new(0.8, 0.5);
        let factors = AccuracyFactors {
            npi_valid: false,
            rate_sane: true,
            tin_valid: true,
        };
        // Accuracy exactly 0.5 passes a 0.5 threshold.
        assert_eq!(gate.assess(1.0, &factors), Admission::Admitted);

        let strict = QualityGate::new(0.8, 0.6);
        assert_eq!(strict.assess(1.0, &factors), Admission::RejectedAccuracy);
    }

    #[test]
    fn completeness_short_circuits_accuracy() {
        let gate = QualityGate::new(0.8, 0.5);
        let factors = AccuracyFactors {
            npi_valid: true,
            rate_sane: true,
            tin_valid: true,
        };
        assert_eq!(
            gate.assess(0.5, &factors),
            Admission::RejectedCompleteness
        );
    }

    #[test]
    fn sanity_window() {
        assert!(rate_is_sane(81.84));
        assert!(!rate_is_sane(0.05));
        assert!(!rate_is_sane(1_000_000.0));
    }

    #[test]
    fn counters_merge() {
        let mut a = QualityCounters {
            admitted: 2,
            rejected_bounds: 1,
            ..Default::default()
        };
        let b = QualityCounters {
            admitted: 3,
            rejected_whitelist: 4,
            ..Default::default()
        };
        a.merge(&b);
        assert_eq!(a.admitted, 5);
        assert_eq!(a.rejected_whitelist, 4);
        assert_eq!(a.total_rejected(), 5);
    }
}
