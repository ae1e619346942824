//! In-network rate file wire types
//!
//! Fields the CMS schema marks required are still modeled as `Option` here:
//! the quality gate scores missing fields instead of failing the whole item,
//! and real files omit them often enough that strict parsing would discard
//! usable rates.

use serde::{Deserialize, Serialize};

use super::common::{
    BillingClass, BillingCodeType, NegotiatedType, NegotiationArrangement, ProviderGroup,
};

/// Scalar header fields of an in-network file, collected while streaming.
///
/// The file root is never materialized; the stream parser fills this in as it
/// encounters top-level keys on its way to the `in_network` array.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InNetworkHeader {
    pub reporting_entity_name: Option<String>,
    pub reporting_entity_type: Option<String>,
    pub plan_name: Option<String>,
    pub plan_id_type: Option<String>,
    pub plan_id: Option<String>,
    pub plan_market_type: Option<String>,
    pub last_updated_on: Option<String>,
    pub version: Option<String>,
}

/// One element of the `in_network` array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawInNetworkItem {
    /// Reimbursement arrangement (ffs, bundle, or capitation)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negotiation_arrangement: Option<NegotiationArrangement>,

    /// Name of the item/service that is offered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// The code used to identify the health care item or service
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_code: Option<String>,

    /// Vocabulary of the billing code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_code_type: Option<BillingCodeType>,

    /// Version of the billing code vocabulary (e.g., "2024" for CPT)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_code_type_version: Option<String>,

    /// Brief description of the item/service
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Negotiated rate blocks
    #[serde(default)]
    pub negotiated_rates: Vec<RawNegotiatedRate>,

    /// Services covered under a capitation arrangement
    #[serde(skip_serializing_if = "Option::is_none")]
    pub covered_services: Option<Vec<RawCoveredService>>,
}

/// A negotiated rate block: prices plus the providers they apply to.
///
/// Providers arrive either inline (`provider_groups`) or deferred
/// (`provider_references` citing the file's top-level reference table).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawNegotiatedRate {
    #[serde(default)]
    pub negotiated_prices: Vec<RawNegotiatedPrice>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_groups: Option<Vec<ProviderGroup>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_references: Option<Vec<i64>>,
}

/// A single negotiated price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawNegotiatedPrice {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negotiated_type: Option<NegotiatedType>,

    /// Dollar amount, or a whole-number percentage for percentage types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negotiated_rate: Option<f64>,

    /// ISO 8601 date; "9999-12-31" means no expiration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_class: Option<BillingClass>,

    /// CMS two-digit place of service codes; required for professional
    /// billing, `["CSTM-00"]` when the rate applies everywhere
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_code: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_code_modifier: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_information: Option<String>,
}

/// Covered service for capitation arrangements.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCoveredService {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_code_type: Option<BillingCodeType>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_code_type_version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_code: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// One element of a file's top-level `provider_references` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawProviderReference {
    /// Primary key cited by `RawNegotiatedRate::provider_references`
    pub provider_group_id: i64,

    /// Inline provider groups (mutually exclusive with `location`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_groups: Option<Vec<ProviderGroup>>,

    /// URL where the provider group data can be downloaded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_with_inline_groups_parses() {
        let json = r#"{
            "negotiation_arrangement": "ffs",
            "billing_code": "99213",
            "billing_code_type": "CPT",
            "description": "Office visit",
            "negotiated_rates": [{
                "provider_groups": [{"npi": ["1234567893"], "tin": {"type": "ein", "value": "12-3456789"}}],
                "negotiated_prices": [{
                    "negotiated_type": "negotiated",
                    "negotiated_rate": 81.84,
                    "service_code": ["11"],
                    "billing_class": "professional",
                    "expiration_date": "9999-12-31"
                }]
            }]
        }"#;

        let item: RawInNetworkItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.billing_code.as_deref(), Some("99213"));
        assert_eq!(item.billing_code_type, Some(BillingCodeType::CPT));
        let block = &item.negotiated_rates[0];
        assert!(block.provider_references.is_none());
        assert_eq!(block.negotiated_prices[0].negotiated_rate, Some(81.84));
    }

    #[test]
    fn item_with_references_parses() {
        let json = r#"{
            "billing_code": "J1100",
            "billing_code_type": "HCPCS",
            "negotiated_rates": [{
                "provider_references": [7, 9],
                "negotiated_prices": [{"negotiated_rate": 12.5, "billing_class": "institutional"}]
            }]
        }"#;

        let item: RawInNetworkItem = serde_json::from_str(json).unwrap();
        assert_eq!(
            item.negotiated_rates[0].provider_references,
            Some(vec![7, 9])
        );
    }

    #[test]
    fn missing_required_fields_do_not_fail_parse() {
        let item: RawInNetworkItem = serde_json::from_str(r#"{"billing_code": "99213"}"#).unwrap();
        assert!(item.billing_code_type.is_none());
        assert!(item.negotiated_rates.is_empty());
    }
}
