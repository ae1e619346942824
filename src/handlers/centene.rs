//! Centene / Fidelis structural variant
//!
//! Centene publishes capitation arrangements as a single item whose
//! `covered_services` list the actual billable codes, with the item-level
//! billing code set to a contract-wide custom code. Expanding each covered
//! service into its own item lets the normal rate emission path handle the
//! arrangement without special cases downstream.

use crate::types::{NegotiationArrangement, RawInNetworkItem};

use super::{HandlerError, PayerHandler};

pub struct CenteneHandler;

impl PayerHandler for CenteneHandler {
    fn name(&self) -> &'static str {
        "centene"
    }

    fn parse_in_network(
        &self,
        mut item: RawInNetworkItem,
    ) -> Result<Vec<RawInNetworkItem>, HandlerError> {
        let is_capitation = item.negotiation_arrangement == Some(NegotiationArrangement::Capitation);
        let covered = item.covered_services.take();

        match (is_capitation, covered) {
            (true, Some(services)) if !services.is_empty() => {
                let expanded = services
                    .into_iter()
                    .map(|service| {
                        let mut clone = item.clone();
                        clone.billing_code = service.billing_code.or(clone.billing_code);
                        clone.billing_code_type = service.billing_code_type.or(clone.billing_code_type);
                        clone.billing_code_type_version = service
                            .billing_code_type_version
                            .or(clone.billing_code_type_version);
                        clone.description = service.description.or(clone.description);
                        clone
                    })
                    .collect();
                Ok(expanded)
            }
            _ => Ok(vec![item]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BillingCodeType;

    #[test]
    fn expands_capitation_covered_services() {
        let item: RawInNetworkItem = serde_json::from_str(
            r#"{
                "negotiation_arrangement": "capitation",
                "billing_code": "CSTM-PCP",
                "billing_code_type": "CUSTOM",
                "covered_services": [
                    {"billing_code": "99213", "billing_code_type": "CPT"},
                    {"billing_code": "99214", "billing_code_type": "CPT"}
                ],
                "negotiated_rates": [{"negotiated_prices": [{"negotiated_rate": 35.0}]}]
            }"#,
        )
        .unwrap();

        let out = CenteneHandler.parse_in_network(item).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].billing_code.as_deref(), Some("99213"));
        assert_eq!(out[1].billing_code.as_deref(), Some("99214"));
        assert_eq!(out[0].billing_code_type, Some(BillingCodeType::CPT));
        assert_eq!(out[0].negotiated_rates.len(), 1);
        assert!(out[0].covered_services.is_none());
    }

    #[test]
    fn ffs_items_pass_through() {
        let item: RawInNetworkItem = serde_json::from_str(
            r#"{"negotiation_arrangement": "ffs", "billing_code": "99213"}"#,
        )
        .unwrap();
        let out = CenteneHandler.parse_in_network(item).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].billing_code.as_deref(), Some("99213"));
    }
}
