//! BCBS Illinois structural variant
//!
//! BCBS-IL files mix standard CPT/HCPCS items with payer-defined `LOCAL`
//! codes and pad billing codes with stray whitespace. LOCAL codes pass
//! through verbatim; they are a real part of the payer's fee schedule and
//! remapping them to a standard vocabulary would fabricate meaning.

use crate::types::RawInNetworkItem;

use super::{HandlerError, PayerHandler};

pub struct BcbsIlHandler;

impl PayerHandler for BcbsIlHandler {
    fn name(&self) -> &'static str {
        "bcbs_il"
    }

    fn parse_in_network(
        &self,
        mut item: RawInNetworkItem,
    ) -> Result<Vec<RawInNetworkItem>, HandlerError> {
        if let Some(code) = item.billing_code.take() {
            let trimmed = code.trim();
            if trimmed.is_empty() {
                return Err(HandlerError::Malformed("empty billing_code".into()));
            }
            item.billing_code = Some(trimmed.to_string());
        }

        // Blocks without prices occur in their LOCAL fee schedules; they
        // carry no rate information and only inflate rejection counters.
        item.negotiated_rates
            .retain(|block| !block.negotiated_prices.is_empty());

        Ok(vec![item])
    }
}
