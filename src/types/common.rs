//! Common types shared across the MRF wire formats

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Common billing code types used in healthcare.
///
/// Only the vocabularies required by the canonical model are distinguished;
/// everything else collapses into `Other` and is filtered out by the
/// normalizer rather than failing deserialization.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BillingCodeType {
    /// Current Procedural Terminology - American Medical Association
    CPT,

    /// Healthcare Common Procedural Coding System - CMS HCPCS
    HCPCS,

    /// International Classification of Diseases
    ICD,

    /// Medicare Severity Diagnosis Related Groups - CMS DRGs
    #[serde(rename = "MS-DRG")]
    MSDRG,

    /// Payer-defined codes outside the standard vocabularies
    LOCAL,

    /// Custom code types declared by the reporting entity
    #[serde(rename = "CUSTOM")]
    #[serde(alias = "CSTM-ALL")]
    Custom,

    /// Any billing code type outside the canonical model
    #[serde(other)]
    Other,
}

impl BillingCodeType {
    /// String form used in canonical output columns.
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingCodeType::CPT => "CPT",
            BillingCodeType::HCPCS => "HCPCS",
            BillingCodeType::ICD => "ICD",
            BillingCodeType::MSDRG => "MS-DRG",
            BillingCodeType::LOCAL => "LOCAL",
            BillingCodeType::Custom => "CUSTOM",
            BillingCodeType::Other => "OTHER",
        }
    }

    /// Whether the vocabulary is part of the canonical model.
    pub fn is_recognized(&self) -> bool {
        !matches!(self, BillingCodeType::Other)
    }
}

/// Type of negotiated rate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NegotiatedType {
    /// Contractually agreed dollar amount
    Negotiated,

    /// Price assigned for internal accounting or reconciliation
    Derived,

    /// Rate used to determine cost-sharing liability
    #[serde(rename = "fee schedule")]
    FeeSchedule,

    /// Percentage of billed charges
    Percentage,

    /// Per diem daily dollar rate
    #[serde(rename = "per diem")]
    PerDiem,
}

impl NegotiatedType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NegotiatedType::Negotiated => "negotiated",
            NegotiatedType::Derived => "derived",
            NegotiatedType::FeeSchedule => "fee schedule",
            NegotiatedType::Percentage => "percentage",
            NegotiatedType::PerDiem => "per diem",
        }
    }
}

/// Billing class for services.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BillingClass {
    /// Professional services (e.g., physician services)
    Professional,

    /// Institutional services (e.g., hospital services)
    Institutional,

    /// Both professional and institutional
    Both,
}

impl BillingClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingClass::Professional => "professional",
            BillingClass::Institutional => "institutional",
            BillingClass::Both => "both",
        }
    }
}

/// Type of negotiation arrangement.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NegotiationArrangement {
    /// Fee-for-service arrangement
    Ffs,

    /// Bundled payment arrangement
    Bundle,

    /// Capitation arrangement
    Capitation,
}

/// Type of tax identifier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaxIdType {
    /// Employer Identification Number issued by the IRS
    Ein,

    /// National Provider Identifier (used when an SSN would otherwise appear)
    Npi,
}

/// Tax identifier for a provider group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaxIdentifier {
    /// Type of tax identifier (ein or npi)
    #[serde(rename = "type", default = "TaxIdentifier::default_type")]
    pub id_type: TaxIdType,

    /// The identifier value (EIN or NPI number)
    pub value: String,
}

impl TaxIdentifier {
    fn default_type() -> TaxIdType {
        TaxIdType::Ein
    }
}

/// A National Provider Identifier as found on the wire.
///
/// Published files carry NPIs as JSON numbers or strings depending on the
/// payer; both forms deserialize into the canonical string representation.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Npi(pub String);

impl Npi {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Npi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Npi {
    fn from(value: &str) -> Self {
        Npi(value.to_string())
    }
}

impl<'de> Deserialize<'de> for Npi {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct NpiVisitor;

        impl<'de> Visitor<'de> for NpiVisitor {
            type Value = Npi;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("an NPI as a string or integer")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Npi, E> {
                Ok(Npi(v.trim().to_string()))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Npi, E> {
                Ok(Npi(v.to_string()))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Npi, E> {
                Ok(Npi(v.to_string()))
            }
        }

        deserializer.deserialize_any(NpiVisitor)
    }
}

/// Provider group information: the NPIs billing under one TIN.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderGroup {
    /// National Provider Identifiers, Type 1 and Type 2 mixed.
    /// Payers publish `[0]` when NPIs are unknown at the TIN level.
    #[serde(default)]
    pub npi: Vec<Npi>,

    /// Tax identification for the group
    pub tin: TaxIdentifier,
}
