//! Canonical relational model emitted by the engine
//!
//! Identifier fields are UUIDs derived deterministically (see the identity
//! module); nested objects are persisted as JSON-string columns, so every
//! nested struct here round-trips through `serde_json` exactly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One payer per configured endpoint, created once per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayerRow {
    pub payer_uuid: Uuid,
    pub name: String,
    pub index_url: String,
    pub last_scraped: DateTime<Utc>,
}

/// An organization keyed by TIN. Multiple NPIs map to one organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationRow {
    pub organization_uuid: Uuid,
    pub tin: String,
    pub organization_name: Option<String>,
    pub npi_count: u32,
    pub is_facility: bool,
}

/// A provider keyed by NPI, bound to the organization it was first seen under.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRow {
    pub provider_uuid: Uuid,
    pub npi: String,
    pub organization_uuid: Uuid,
    pub specialties: Vec<String>,
    pub addresses: Vec<String>,
    pub is_active: bool,
}

/// A single negotiated rate in canonical form.
///
/// `service_code` is the procedure code (the raw `billing_code`); the CMS
/// place-of-service array is carried in `service_codes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateRow {
    pub rate_uuid: Uuid,
    pub payer_uuid: Uuid,
    pub organization_uuid: Uuid,
    pub service_code: String,
    pub billing_code_type: String,
    pub negotiated_rate: f64,
    pub billing_class: String,
    pub rate_type: String,
    pub service_codes: Vec<String>,
    pub plan_details: PlanDetails,
    pub contract_period: ContractPeriod,
    pub data_lineage: DataLineage,
}

/// Plan metadata attached to a rate, from the TOC entry or the file header.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PlanDetails {
    pub reporting_entity_name: Option<String>,
    pub plan_name: Option<String>,
    pub plan_id: Option<String>,
    pub plan_id_type: Option<String>,
    pub plan_market_type: Option<String>,
    pub plan_fingerprint: String,
}

/// Validity window of the negotiated agreement.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ContractPeriod {
    /// ISO 8601; "9999-12-31" means no expiration
    pub expiration_date: Option<String>,
    pub last_updated_on: Option<String>,
}

/// Provenance of a rate row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataLineage {
    pub source_url: String,
    pub payer_name: String,
    pub ingested_at: DateTime<Utc>,
    #[serde(default)]
    pub billing_code_modifiers: Vec<String>,
    pub description: Option<String>,
}

/// End-of-run aggregate per (service_code, geographic_scope).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsRow {
    pub service_code: String,
    pub geographic_scope: String,
    pub rate_count: u64,
    pub min_rate: f64,
    pub max_rate: f64,
    pub mean_rate: f64,
    pub stddev_rate: f64,
}

macro_rules! json_string_column {
    ($ty:ty) => {
        impl $ty {
            /// Encoding used for the nested Parquet column.
            pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
                serde_json::to_string(self)
            }

            /// Inverse of [`Self::to_json_string`].
            pub fn from_json_string(s: &str) -> Result<Self, serde_json::Error> {
                serde_json::from_str(s)
            }
        }
    };
}

json_string_column!(PlanDetails);
json_string_column!(ContractPeriod);
json_string_column!(DataLineage);
