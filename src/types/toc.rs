//! Table-of-contents wire types
//!
//! Three index shapes occur in the wild: the standard TOC with a
//! `reporting_structure` array, the legacy blob listing some payers still
//! serve from their CDN APIs, and endpoints that point straight at an
//! in-network file with no index at all. Plan metadata stays stringly typed
//! here; payers do not agree on casing or vocabulary for these fields.

use serde::{Deserialize, Serialize};

/// Index document shape, detected from the first relevant top-level key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TocShape {
    /// `reporting_structure` array per the CMS TOC schema
    Standard,

    /// Legacy `blobs` listing of downloadable files
    LegacyBlobs,

    /// The endpoint itself is an in-network rates file
    DirectInNetwork,
}

/// One file reference yielded by TOC iteration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TocEntry {
    /// Plan the file reports for, when the index carries one
    pub plan: Option<ReportingPlan>,

    /// Description attached to the file entry
    pub description: Option<String>,

    /// Location of the in-network rates file
    pub in_network_url: String,

    /// Location of the companion allowed-amount file, if any
    pub allowed_amount_url: Option<String>,
}

/// Reporting structure element of a standard TOC.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportingStructure {
    #[serde(default)]
    pub reporting_plans: Vec<ReportingPlan>,

    pub in_network_files: Option<Vec<FileLocation>>,

    /// Singular form per the CMS schema
    pub allowed_amount_file: Option<FileLocation>,

    /// Plural variant some payers publish instead
    pub allowed_amount_files: Option<Vec<FileLocation>>,
}

/// Plan metadata from a reporting structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportingPlan {
    pub plan_name: Option<String>,
    pub plan_id_type: Option<String>,
    pub plan_id: Option<String>,
    pub plan_market_type: Option<String>,
}

/// File location inside a reporting structure.
#[derive(Debug, Clone, Deserialize)]
pub struct FileLocation {
    pub description: Option<String>,
    pub location: String,
}

/// Entry in a legacy blob index.
#[derive(Debug, Clone, Deserialize)]
pub struct BlobEntry {
    pub name: String,

    #[serde(rename = "downloadUrl", alias = "download_url")]
    pub download_url: String,

    pub size: Option<u64>,
}
