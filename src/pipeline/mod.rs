//! Pipeline orchestration
//!
//! One `Pipeline` per run: it owns the shared fetcher and writer, spins up
//! one worker per configured payer under the worker pool, and folds the
//! per-payer outcomes into a `RunReport`. Only configuration problems fail
//! a run; everything else is scoped to a row, a file, or a payer.

mod orchestrator;
mod state;

pub use orchestrator::Pipeline;
pub use state::{PayerEvent, PayerState};

use chrono::NaiveDate;

use crate::config::ConfigError;
use crate::fetch::FetchError;
use crate::output::{ProcessingStatistics, WriteError};

/// Pre-run failures. Anything that happens after `execute` starts is
/// recorded in the report instead.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Output(#[from] WriteError),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Outcome of one payer pipeline.
#[derive(Debug)]
pub struct PayerOutcome {
    pub payer: String,
    pub state: PayerState,
    pub truncated: bool,
    pub failure: Option<String>,
    pub stats: ProcessingStatistics,
}

impl PayerOutcome {
    /// Whether this payer failed without emitting any output. Payers that
    /// emitted partial output before failing still count as productive.
    pub fn failed_without_output(&self) -> bool {
        self.failure.is_some() && !self.emitted_output()
    }

    pub fn emitted_output(&self) -> bool {
        self.stats.rates_emitted + self.stats.organizations_emitted + self.stats.providers_emitted
            > 0
    }
}

/// End-of-run summary across every payer.
#[derive(Debug)]
pub struct RunReport {
    pub run_date: NaiveDate,
    pub payers: Vec<PayerOutcome>,
    pub cancelled: bool,
}

impl RunReport {
    /// Exit semantics: 0 success (truncations allowed), 3 when every payer
    /// failed to emit any output, 4 when the run was cancelled. Code 2 is
    /// reserved for configuration errors, which surface before a report
    /// exists; see [`exit_code`].
    pub fn exit_code(&self) -> i32 {
        if self.cancelled {
            4
        } else if !self.payers.is_empty() && self.payers.iter().all(PayerOutcome::failed_without_output)
        {
            3
        } else {
            0
        }
    }

    pub fn truncated(&self) -> bool {
        self.payers.iter().any(|p| p.truncated)
    }
}

/// Process exit code for a whole run, including pre-run failures.
pub fn exit_code(result: &Result<RunReport, PipelineError>) -> i32 {
    match result {
        Ok(report) => report.exit_code(),
        Err(_) => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::QualityCounters;
    use chrono::Utc;
    use uuid::Uuid;

    fn outcome(rates: u64, failure: Option<&str>) -> PayerOutcome {
        PayerOutcome {
            payer: "p".into(),
            state: PayerState::Done,
            truncated: false,
            failure: failure.map(str::to_string),
            stats: ProcessingStatistics {
                payer: crate::types::PayerRow {
                    payer_uuid: Uuid::nil(),
                    name: "p".into(),
                    index_url: String::new(),
                    last_scraped: Utc::now(),
                },
                run_date: "2025-07-01".into(),
                started_at: Utc::now(),
                completed_at: Utc::now(),
                truncated: false,
                truncation_reason: None,
                failure: failure.map(str::to_string),
                files_discovered: 0,
                files_processed: 0,
                files_failed: 0,
                records_processed: 0,
                rates_emitted: rates,
                organizations_emitted: 0,
                providers_emitted: 0,
                write_failures: 0,
                quality: QualityCounters::default(),
            },
        }
    }

    fn report(payers: Vec<PayerOutcome>, cancelled: bool) -> RunReport {
        RunReport {
            run_date: NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
            payers,
            cancelled,
        }
    }

    #[test]
    fn all_payers_failing_without_output_exits_3() {
        let r = report(vec![outcome(0, Some("boom")), outcome(0, Some("bust"))], false);
        assert_eq!(r.exit_code(), 3);
    }

    #[test]
    fn one_productive_payer_exits_0() {
        let r = report(vec![outcome(0, Some("boom")), outcome(5, None)], false);
        assert_eq!(r.exit_code(), 0);
    }

    #[test]
    fn partial_output_before_failure_still_counts() {
        let r = report(vec![outcome(5, Some("died late"))], false);
        assert_eq!(r.exit_code(), 0);
    }

    #[test]
    fn empty_success_is_success() {
        let r = report(vec![outcome(0, None)], false);
        assert_eq!(r.exit_code(), 0);
    }

    #[test]
    fn cancellation_wins() {
        let r = report(vec![outcome(0, Some("boom"))], true);
        assert_eq!(r.exit_code(), 4);
    }

    #[test]
    fn config_errors_exit_2() {
        let result: Result<RunReport, PipelineError> = Err(PipelineError::Config(
            crate::config::ConfigError::Missing("payer_endpoints"),
        ));
        assert_eq!(exit_code(&result), 2);
    }
}
