//! Streaming ETL engine for Transparency in Coverage machine-readable files
//!
//! This crate ingests the in-network rate files U.S. payers publish under
//! the TiC rule, normalizes their structural variants into a canonical
//! relational model, and persists the result as partitioned Parquet under a
//! local directory or S3 bucket.
//!
//! The engine is built around four hard constraints:
//!
//! - **Bounded memory.** Files routinely decompress to many times the
//!   available RAM, so the parser streams items off the wire and the
//!   batcher caps resident rows per entity.
//! - **Fault isolation.** A malformed row, file, or payer never aborts the
//!   run; failures are counted at the smallest scope that contains them.
//! - **Deterministic identity.** Every entity's UUID derives from its
//!   natural key under one fixed namespace, so re-running the pipeline on
//!   the same input reproduces the same identifiers.
//! - **Budgeted execution.** File, record, and wall-clock budgets truncate
//!   a run gracefully instead of failing it.
//!
//! # Example
//!
//! ```no_run
//! use tic_pipeline::{config::PipelineConfig, pipeline::Pipeline};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PipelineConfig::from_yaml_str(r#"
//! payer_endpoints:
//!   example: https://example.com/index.json.gz
//! output:
//!   local_directory: ./out
//! "#)?;
//!
//! let pipeline = Pipeline::new(config)?;
//! let report = pipeline.execute(CancellationToken::new()).await;
//! std::process::exit(report.exit_code());
//! # }
//! ```

pub mod analytics;
pub mod config;
pub mod fetch;
pub mod handlers;
pub mod identity;
pub mod normalize;
pub mod output;
pub mod pipeline;
pub mod quality;
pub mod stream;
pub mod types;

pub use config::{ConfigError, PipelineConfig};
pub use pipeline::{exit_code, PayerOutcome, Pipeline, PipelineError, RunReport};
