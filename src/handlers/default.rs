//! Identity handler for schema-conforming payers

use crate::types::RawInNetworkItem;

use super::{HandlerError, PayerHandler};

/// Passes items through untouched. Used for every payer without a
/// registered structural variant.
pub struct DefaultHandler;

impl PayerHandler for DefaultHandler {
    fn name(&self) -> &'static str {
        "default"
    }

    fn parse_in_network(
        &self,
        item: RawInNetworkItem,
    ) -> Result<Vec<RawInNetworkItem>, HandlerError> {
        Ok(vec![item])
    }
}
