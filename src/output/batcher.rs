//! Bounded per-entity row queues
//!
//! The batcher is the memory boundary of a pipeline: each entity queue
//! holds at most `batch_size` rows, and an optional byte ceiling triggers
//! an early flush of everything resident. Backpressure falls out of the
//! design: `push` awaits the flush it causes, which blocks the normalizer's
//! producer until the writer catches up.

use std::collections::HashMap;

use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{ColumnWriter, EntityKind, EntityRow, WriteError};

/// Accumulates normalized rows for one payer and flushes them as
/// partitioned Parquet parts.
pub struct Batcher {
    writer: Arc<ColumnWriter>,
    payer: String,
    date: NaiveDate,
    batch_size: usize,
    memory_limit_bytes: Option<usize>,
    queues: HashMap<EntityKind, Vec<EntityRow>>,
    resident_bytes: usize,
    rows_written: HashMap<EntityKind, u64>,
    write_failures: u64,
}

impl Batcher {
    pub fn new(
        writer: Arc<ColumnWriter>,
        payer: String,
        date: NaiveDate,
        batch_size: usize,
        memory_threshold_mb: Option<usize>,
    ) -> Self {
        Self {
            writer,
            payer,
            date,
            batch_size,
            memory_limit_bytes: memory_threshold_mb.map(|mb| mb * 1024 * 1024),
            queues: HashMap::new(),
            resident_bytes: 0,
            rows_written: HashMap::new(),
            write_failures: 0,
        }
    }

    /// Enqueue one row, flushing when its entity queue fills or the memory
    /// ceiling is approached.
    pub async fn push(&mut self, row: EntityRow) {
        let kind = row.kind();
        self.resident_bytes += row.estimated_size();
        let queue = self.queues.entry(kind).or_default();
        queue.push(row);

        if queue.len() >= self.batch_size {
            self.flush_entity(kind).await;
        } else if let Some(limit) = self.memory_limit_bytes {
            if self.resident_bytes >= limit {
                debug!(
                    resident_bytes = self.resident_bytes,
                    limit, "memory ceiling approached, flushing early"
                );
                self.flush_all().await;
            }
        }
    }

    /// Flush one entity's queue. Write failures are absorbed: the partition
    /// is already marked failed by the writer, the rows are dropped, and
    /// the failure is counted for the manifest.
    async fn flush_entity(&mut self, kind: EntityKind) {
        let rows = match self.queues.get_mut(&kind) {
            Some(queue) if !queue.is_empty() => std::mem::take(queue),
            _ => return,
        };
        self.resident_bytes = self
            .resident_bytes
            .saturating_sub(rows.iter().map(EntityRow::estimated_size).sum::<usize>());

        match self
            .writer
            .write_rows(kind, &self.payer, self.date, &rows)
            .await
        {
            Ok(written) => {
                *self.rows_written.entry(kind).or_default() += written as u64;
            }
            Err(WriteError::PartitionFailed(partition)) => {
                self.write_failures += 1;
                warn!(%partition, dropped = rows.len(), "dropping rows for failed partition");
            }
            Err(e) => {
                self.write_failures += 1;
                warn!(entity = kind.as_str(), dropped = rows.len(), "flush failed: {e}");
            }
        }
    }

    /// Flush every queue. Called at finalize and on memory pressure.
    pub async fn flush_all(&mut self) {
        for kind in EntityKind::ALL {
            self.flush_entity(kind).await;
        }
    }

    pub fn rows_written(&self, kind: EntityKind) -> u64 {
        self.rows_written.get(&kind).copied().unwrap_or(0)
    }

    pub fn write_failures(&self) -> u64 {
        self.write_failures
    }

    /// Rows currently resident across all queues.
    pub fn resident_rows(&self) -> usize {
        self.queues.values().map(Vec::len).sum()
    }
}
