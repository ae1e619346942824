//! End-of-run processing statistics
//!
//! One manifest per payer per run date, written next to the entity trees.
//! The manifest is the canonical record of what a pipeline did: file and
//! record counts, quality gate counters, truncation, and any failure that
//! ended the payer early.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::quality::QualityCounters;
use crate::types::PayerRow;

use super::{sanitize_payer, ColumnWriter, WriteError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingStatistics {
    /// The payer entity itself; one per configured endpoint per run
    pub payer: PayerRow,

    /// Partition date the run wrote under, YYYY-MM-DD
    pub run_date: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,

    /// The run hit a budget and finalized early
    pub truncated: bool,
    pub truncation_reason: Option<String>,

    /// Payer-fatal failure, when the pipeline died before finalizing
    pub failure: Option<String>,

    pub files_discovered: u64,
    pub files_processed: u64,
    pub files_failed: u64,
    pub records_processed: u64,

    pub rates_emitted: u64,
    pub organizations_emitted: u64,
    pub providers_emitted: u64,
    pub write_failures: u64,

    pub quality: QualityCounters,
}

/// Write the manifest at
/// `processing_statistics/<run_date>/<payer>.json`.
pub async fn write_manifest(
    writer: &ColumnWriter,
    stats: &ProcessingStatistics,
) -> Result<(), WriteError> {
    let relative = format!(
        "processing_statistics/{}/{}.json",
        stats.run_date,
        sanitize_payer(&stats.payer.name),
    );
    let location = writer.location(&relative);
    let body = serde_json::to_vec_pretty(stats)?;
    writer
        .store()
        .put(&location, bytes::Bytes::from(body).into())
        .await?;
    debug!(%location, "wrote processing statistics");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::local::LocalFileSystem;
    use object_store::path::Path;
    use std::sync::Arc;

    #[tokio::test]
    async fn manifest_lands_at_the_documented_path() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LocalFileSystem::new_with_prefix(dir.path()).unwrap());
        let writer = ColumnWriter::new(store, Path::default(), 1);

        let stats = ProcessingStatistics {
            payer: PayerRow {
                payer_uuid: uuid::Uuid::nil(),
                name: "Acme Health".into(),
                index_url: "https://example.com/index.json".into(),
                last_scraped: Utc::now(),
            },
            run_date: "2025-07-01".into(),
            started_at: Utc::now(),
            completed_at: Utc::now(),
            truncated: false,
            truncation_reason: None,
            failure: None,
            files_discovered: 1,
            files_processed: 1,
            files_failed: 0,
            records_processed: 10,
            rates_emitted: 8,
            organizations_emitted: 2,
            providers_emitted: 3,
            write_failures: 0,
            quality: QualityCounters::default(),
        };
        write_manifest(&writer, &stats).await.unwrap();

        let path = dir
            .path()
            .join("processing_statistics/2025-07-01/Acme_Health.json");
        let body = std::fs::read_to_string(path).unwrap();
        let parsed: ProcessingStatistics = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed.records_processed, 10);
        assert_eq!(parsed.quality, QualityCounters::default());
    }
}
