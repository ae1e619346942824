//! Payer handler registry
//!
//! Payers deviate from the CMS schemas in payer-specific ways. A
//! `PayerHandler` adapts one payer's structural variant back into the
//! canonical raw shape before normalization; the registry maps payer
//! identifiers to handlers and falls back to the identity handler for
//! everyone else. The registry is populated once at startup and read-only
//! afterwards.

mod bcbs_il;
mod centene;
mod default;

pub use bcbs_il::BcbsIlHandler;
pub use centene::CenteneHandler;
pub use default::DefaultHandler;

use std::collections::HashMap;
use std::sync::Arc;

use crate::types::{RawInNetworkItem, TocEntry};

/// Error type for handler operations. Treated exactly like a parse error:
/// the offending file is skipped, the payer stays alive.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("handler rejected item: {0}")]
    Malformed(String),
}

/// Capability set a payer adapter provides.
///
/// `parse_in_network` may split, rewrite, or drop an item; outputs must
/// preserve the `RawInNetworkItem` contract. `preprocess_toc` may rewrite
/// index entries (URL fixups, plan metadata repair) before fetching.
pub trait PayerHandler: Send + Sync {
    /// Stable identifier this handler registers under.
    fn name(&self) -> &'static str;

    /// Adapt one raw item into zero or more canonical raw items.
    fn parse_in_network(
        &self,
        item: RawInNetworkItem,
    ) -> Result<Vec<RawInNetworkItem>, HandlerError> {
        Ok(vec![item])
    }

    /// Adjust a TOC entry before the file behind it is fetched.
    fn preprocess_toc(&self, entry: TocEntry) -> Result<TocEntry, HandlerError> {
        Ok(entry)
    }
}

/// Name-to-handler lookup with a default fallback.
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn PayerHandler>>,
    fallback: Arc<dyn PayerHandler>,
}

impl HandlerRegistry {
    /// Registry with every builtin handler registered under its name.
    pub fn with_builtins() -> Self {
        let mut registry = Self {
            handlers: HashMap::new(),
            fallback: Arc::new(DefaultHandler),
        };
        for name in Self::builtin_names() {
            if let Some(handler) = Self::builtin(name) {
                registry.handlers.insert(name.to_string(), handler);
            }
        }
        registry
    }

    /// Names of the handlers compiled into this build. This is the
    /// discovery surface: embedders enumerate what exists and wire payers
    /// to handlers by name, no dynamic loading involved.
    pub fn builtin_names() -> &'static [&'static str] {
        &["default", "bcbs_il", "centene"]
    }

    /// Instantiate a builtin handler by name.
    pub fn builtin(name: &str) -> Option<Arc<dyn PayerHandler>> {
        match name {
            "default" => Some(Arc::new(DefaultHandler)),
            "bcbs_il" => Some(Arc::new(BcbsIlHandler)),
            "centene" => Some(Arc::new(CenteneHandler)),
            _ => None,
        }
    }

    /// Register (or override) the handler for a payer identifier.
    pub fn register(&mut self, payer: &str, handler: Arc<dyn PayerHandler>) {
        self.handlers.insert(normalize_identifier(payer), handler);
    }

    /// Resolve a payer identifier. Unknown identifiers get the default
    /// handler.
    pub fn resolve(&self, payer: &str) -> Arc<dyn PayerHandler> {
        self.handlers
            .get(&normalize_identifier(payer))
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.fallback))
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Payer identifiers compare case-insensitively with separators collapsed,
/// so `BCBS-IL`, `bcbs il`, and `bcbs_il` all hit the same handler.
fn normalize_identifier(payer: &str) -> String {
    payer
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == '-' || c == ' ' { '_' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_payers_resolve_to_default() {
        let registry = HandlerRegistry::with_builtins();
        assert_eq!(registry.resolve("some_new_payer").name(), "default");
    }

    #[test]
    fn identifier_normalization_hits_registered_handlers() {
        let registry = HandlerRegistry::with_builtins();
        assert_eq!(registry.resolve("bcbs_il").name(), "bcbs_il");
        assert_eq!(registry.resolve("BCBS-IL").name(), "bcbs_il");
        assert_eq!(registry.resolve("Bcbs Il").name(), "bcbs_il");
    }

    #[test]
    fn overrides_replace_builtins() {
        let mut registry = HandlerRegistry::with_builtins();
        registry.register("centene", Arc::new(DefaultHandler));
        assert_eq!(registry.resolve("centene").name(), "default");
    }

    #[test]
    fn every_builtin_name_instantiates() {
        for name in HandlerRegistry::builtin_names() {
            let handler = HandlerRegistry::builtin(name).unwrap();
            assert_eq!(handler.name(), *name);
        }
        assert!(HandlerRegistry::builtin("nope").is_none());
    }
}
