//! Deterministic identity assignment
//!
//! Every canonical entity gets a UUIDv5 derived under one fixed project
//! namespace, so re-running the pipeline on byte-identical input reproduces
//! the same identifiers regardless of processing order. Derivation inputs
//! are canonicalized as lowercase UTF-8 joined with `|`.

use uuid::{uuid, Uuid};

/// Fixed namespace for every UUIDv5 derivation in this project.
///
/// Stable across releases; changing it would re-key every emitted entity.
pub const IDENTITY_NAMESPACE: Uuid = uuid!("8f1a72e5-43bd-5c19-9a0e-2d64f08c7b3a");

fn derive(parts: &[&str]) -> Uuid {
    let name = parts.join("|").to_lowercase();
    Uuid::new_v5(&IDENTITY_NAMESPACE, name.as_bytes())
}

/// Identity of a configured payer endpoint.
pub fn payer_uuid(name: &str, index_url: &str) -> Uuid {
    derive(&["payer", name, index_url])
}

/// Organizations are keyed by TIN only.
pub fn organization_uuid(tin: &str) -> Uuid {
    derive(&["organization", tin])
}

/// Providers are keyed by NPI only.
pub fn provider_uuid(npi: &str) -> Uuid {
    derive(&["provider", npi])
}

/// Fingerprint of the plan a file reports for.
///
/// Empty components are included so files without plan metadata still
/// fingerprint deterministically.
pub fn plan_fingerprint(
    reporting_entity_name: &str,
    plan_name: &str,
    plan_id: &str,
    plan_market_type: &str,
) -> Uuid {
    derive(&[
        "plan",
        reporting_entity_name,
        plan_name,
        plan_id,
        plan_market_type,
    ])
}

/// Identity of a single negotiated rate.
///
/// The tuple is the natural key of the canonical rate model; two rows that
/// collapse to the same tuple are the same rate.
#[allow(clippy::too_many_arguments)]
pub fn rate_uuid(
    payer: &Uuid,
    organization: &Uuid,
    service_code: &str,
    billing_code_type: &str,
    negotiated_rate: f64,
    billing_class: &str,
    rate_type: &str,
    plan_fingerprint: &Uuid,
) -> Uuid {
    let payer = payer.to_string();
    let organization = organization.to_string();
    let rate = format_rate(negotiated_rate);
    let fingerprint = plan_fingerprint.to_string();
    derive(&[
        "rate",
        &payer,
        &organization,
        service_code,
        billing_code_type,
        &rate,
        billing_class,
        rate_type,
        &fingerprint,
    ])
}

/// Canonical text form of a rate for identity derivation.
///
/// Rust's shortest-round-trip float formatting is deterministic, so equal
/// f64 inputs always canonicalize to equal text.
fn format_rate(rate: f64) -> String {
    format!("{rate}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivations_are_stable() {
        assert_eq!(organization_uuid("12-3456789"), organization_uuid("12-3456789"));
        assert_eq!(provider_uuid("1234567893"), provider_uuid("1234567893"));
        assert_ne!(organization_uuid("12-3456789"), organization_uuid("98-7654321"));
    }

    #[test]
    fn derivation_is_case_insensitive() {
        assert_eq!(
            payer_uuid("Acme Health", "https://example.com/INDEX.json"),
            payer_uuid("acme health", "https://example.com/index.json"),
        );
    }

    #[test]
    fn rate_uuid_varies_with_each_tuple_component() {
        let payer = payer_uuid("acme", "https://example.com/index.json");
        let org = organization_uuid("12-3456789");
        let plan = plan_fingerprint("acme", "ppo", "510540405", "group");

        let base = rate_uuid(&payer, &org, "99213", "CPT", 81.84, "professional", "negotiated", &plan);
        assert_eq!(
            base,
            rate_uuid(&payer, &org, "99213", "CPT", 81.84, "professional", "negotiated", &plan),
        );
        assert_ne!(
            base,
            rate_uuid(&payer, &org, "99214", "CPT", 81.84, "professional", "negotiated", &plan),
        );
        assert_ne!(
            base,
            rate_uuid(&payer, &org, "99213", "CPT", 81.85, "professional", "negotiated", &plan),
        );
        assert_ne!(
            base,
            rate_uuid(&payer, &org, "99213", "CPT", 81.84, "institutional", "negotiated", &plan),
        );
    }

    #[test]
    fn float_canonicalization_distinguishes_close_rates() {
        assert_ne!(format_rate(81.84), format_rate(81.840001));
        assert_eq!(format_rate(81.84), format_rate(81.84));
    }
}
