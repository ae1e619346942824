//! Batched columnar output
//!
//! Normalized rows accumulate in per-entity queues and flush as Parquet
//! files partitioned by entity, payer, and run date. Writes go through an
//! `object_store` backend, so local-disk and S3 output share one layout:
//!
//! ```text
//! <root>/<entity>/payer=<name>/date=<YYYY-MM-DD>/part-NNNN.parquet
//! <root>/processing_statistics/<YYYY-MM-DD>/<payer>.json
//! ```

mod batcher;
mod manifest;
mod store;
mod writer;

pub use batcher::Batcher;
pub use manifest::{write_manifest, ProcessingStatistics};
pub use store::build_store;
pub use writer::ColumnWriter;

use crate::types::{AnalyticsRow, OrganizationRow, ProviderRow, RateRow};

/// Error type for output operations. Write failures are scoped to their
/// partition; only configuration problems surface before any data moves.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("object store error: {0}")]
    Store(#[from] object_store::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("arrow encoding error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("parquet encoding error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("manifest serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("partition {0} is marked failed")]
    PartitionFailed(String),

    #[error("invalid output configuration: {0}")]
    Config(String),
}

/// The four output entity tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Rates,
    Organizations,
    Providers,
    Analytics,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Rates,
        EntityKind::Organizations,
        EntityKind::Providers,
        EntityKind::Analytics,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Rates => "rates",
            EntityKind::Organizations => "organizations",
            EntityKind::Providers => "providers",
            EntityKind::Analytics => "analytics",
        }
    }
}

/// One normalized row headed for the writer.
#[derive(Debug, Clone)]
pub enum EntityRow {
    Rate(RateRow),
    Organization(OrganizationRow),
    Provider(ProviderRow),
    Analytics(AnalyticsRow),
}

impl EntityRow {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityRow::Rate(_) => EntityKind::Rates,
            EntityRow::Organization(_) => EntityKind::Organizations,
            EntityRow::Provider(_) => EntityKind::Providers,
            EntityRow::Analytics(_) => EntityKind::Analytics,
        }
    }

    /// Rough resident size for the memory ceiling. UUIDs and scalars fold
    /// into the base constant; only variable-width fields are summed.
    pub fn estimated_size(&self) -> usize {
        const BASE: usize = 160;
        match self {
            EntityRow::Rate(r) => {
                BASE + r.service_code.len()
                    + r.service_codes.iter().map(String::len).sum::<usize>()
                    + r.plan_details.plan_name.as_deref().map_or(0, str::len)
                    + r.data_lineage.source_url.len()
                    + r.data_lineage.description.as_deref().map_or(0, str::len)
                    + 128
            }
            EntityRow::Organization(o) => {
                BASE + o.tin.len() + o.organization_name.as_deref().map_or(0, str::len)
            }
            EntityRow::Provider(p) => {
                BASE + p.npi.len()
                    + p.specialties.iter().map(String::len).sum::<usize>()
                    + p.addresses.iter().map(String::len).sum::<usize>()
            }
            EntityRow::Analytics(a) => BASE + a.service_code.len() + a.geographic_scope.len(),
        }
    }
}

/// Payer names become path segments; anything that is not path-safe
/// collapses to `_`.
pub(crate) fn sanitize_payer(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
