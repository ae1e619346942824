//! Lazy iteration over in-network rate files
//!
//! `InNetworkStream` yields one `RawInNetworkItem` at a time while
//! collecting the file's scalar header fields and its top-level
//! `provider_references` table along the way. A reference table that occurs
//! before the `in_network` array (the CMS schema ordering) is available to
//! the normalizer from the first item; one that occurs after it is still
//! parsed, and the stream flags it so the orchestrator can run the
//! two-pass resolution protocol.

use tokio::io::AsyncRead;

use crate::normalize::ProviderReferenceMap;
use crate::types::{InNetworkHeader, RawInNetworkItem, RawProviderReference};

use super::scanner::DocumentScanner;
use super::{parse_slice, ParseError};

const KEY_IN_NETWORK: &str = "in_network";
const KEY_PROVIDER_REFERENCES: &str = "provider_references";

enum StreamState {
    InItems,
    Drained,
}

/// Streaming reader for one in-network rates file.
pub struct InNetworkStream<R> {
    doc: DocumentScanner<R>,
    header: InNetworkHeader,
    references: ProviderReferenceMap,
    state: StreamState,
    references_seen_late: bool,
    items_yielded: u64,
}

impl<R: AsyncRead + Unpin> InNetworkStream<R> {
    /// Open a stream positioned at the start of a rates document.
    ///
    /// Scans header keys (and an early `provider_references` table) until the
    /// `in_network` array begins. A document with no `in_network` key is an
    /// unsupported shape.
    pub async fn open(reader: R) -> Result<Self, ParseError> {
        let mut doc = DocumentScanner::new(reader);
        doc.begin_document().await?;
        Self::resume(doc, InNetworkHeader::default(), None).await
    }

    /// Continue from a scanner that already consumed part of the root
    /// object (the shape-detection path). `pending_key` is a key whose
    /// value has not been consumed yet.
    pub(crate) async fn resume(
        mut doc: DocumentScanner<R>,
        mut header: InNetworkHeader,
        pending_key: Option<String>,
    ) -> Result<Self, ParseError> {
        let mut references = ProviderReferenceMap::new();

        let mut next = pending_key;
        loop {
            let key = match next.take() {
                Some(key) => key,
                None => match doc.next_key().await? {
                    Some(key) => key,
                    None => {
                        return Err(ParseError::UnsupportedShape(
                            "document has no in_network array".into(),
                        ))
                    }
                },
            };

            match key.as_str() {
                KEY_IN_NETWORK => {
                    doc.begin_array().await?;
                    return Ok(Self {
                        doc,
                        header,
                        references,
                        state: StreamState::InItems,
                        references_seen_late: false,
                        items_yielded: 0,
                    });
                }
                KEY_PROVIDER_REFERENCES => {
                    let offset = doc.offset();
                    let raw = doc.capture_value().await?;
                    let table: Vec<RawProviderReference> = parse_slice(&raw, offset)?;
                    references.load(table);
                }
                other => {
                    if !collect_header_field(&mut doc, &mut header, other).await? {
                        doc.skip_value().await?;
                    }
                }
            }
        }
    }

    /// Yield the next item, or `None` once the array and the document's
    /// trailing keys are exhausted.
    pub async fn next_item(&mut self) -> Result<Option<RawInNetworkItem>, ParseError> {
        match self.state {
            StreamState::Drained => return Ok(None),
            StreamState::InItems => {}
        }

        let offset = self.doc.offset();
        if let Some(raw) = self.doc.next_element().await? {
            let item: RawInNetworkItem = parse_slice(&raw, offset)?;
            self.items_yielded += 1;
            return Ok(Some(item));
        }

        // Array exhausted; drain trailing keys so a late provider_references
        // table is still captured.
        while let Some(key) = self.doc.next_key().await? {
            match key.as_str() {
                KEY_PROVIDER_REFERENCES => {
                    let offset = self.doc.offset();
                    let raw = self.doc.capture_value().await?;
                    let table: Vec<RawProviderReference> = parse_slice(&raw, offset)?;
                    self.references.load(table);
                    self.references_seen_late = true;
                }
                other => {
                    if !collect_header_field(&mut self.doc, &mut self.header, other).await? {
                        self.doc.skip_value().await?;
                    }
                }
            }
        }
        self.state = StreamState::Drained;
        Ok(None)
    }

    pub fn header(&self) -> &InNetworkHeader {
        &self.header
    }

    pub fn references(&self) -> &ProviderReferenceMap {
        &self.references
    }

    /// Take ownership of the reference table, e.g. to seed a second pass.
    pub fn take_references(&mut self) -> ProviderReferenceMap {
        std::mem::take(&mut self.references)
    }

    /// Seed the reference table before iteration (second pass of the
    /// deferred-resolution protocol).
    pub fn set_references(&mut self, references: ProviderReferenceMap) {
        self.references = references;
    }

    /// Whether the reference table appeared after the `in_network` array.
    pub fn references_seen_late(&self) -> bool {
        self.references_seen_late
    }

    pub fn items_yielded(&self) -> u64 {
        self.items_yielded
    }
}

/// Scan a whole document for its `provider_references` table only, skipping
/// the `in_network` array in constant memory. Used when a file must be
/// pre-resolved before item processing.
pub async fn extract_provider_references<R: AsyncRead + Unpin>(
    reader: R,
) -> Result<ProviderReferenceMap, ParseError> {
    let mut doc = DocumentScanner::new(reader);
    doc.begin_document().await?;

    let mut references = ProviderReferenceMap::new();
    while let Some(key) = doc.next_key().await? {
        if key == KEY_PROVIDER_REFERENCES {
            let offset = doc.offset();
            let raw = doc.capture_value().await?;
            let table: Vec<RawProviderReference> = parse_slice(&raw, offset)?;
            references.load(table);
        } else {
            doc.skip_value().await?;
        }
    }
    Ok(references)
}

/// Assign a scalar header field; returns false when the key is not a header
/// field (the caller skips the value instead).
pub(super) async fn collect_header_field<R: AsyncRead + Unpin>(
    doc: &mut DocumentScanner<R>,
    header: &mut InNetworkHeader,
    key: &str,
) -> Result<bool, ParseError> {
    let slot = match key {
        "reporting_entity_name" => &mut header.reporting_entity_name,
        "reporting_entity_type" => &mut header.reporting_entity_type,
        "plan_name" => &mut header.plan_name,
        "plan_id_type" => &mut header.plan_id_type,
        "plan_id" => &mut header.plan_id,
        "plan_market_type" => &mut header.plan_market_type,
        "last_updated_on" => &mut header.last_updated_on,
        "version" => &mut header.version,
        _ => return Ok(false),
    };

    let offset = doc.offset();
    let raw = doc.capture_value().await?;
    let value: serde_json::Value = parse_slice(&raw, offset)?;
    *slot = scalar_to_string(value);
    Ok(true)
}

fn scalar_to_string(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EARLY_REFS: &str = r#"{
        "reporting_entity_name": "Example Health",
        "reporting_entity_type": "health insurance issuer",
        "last_updated_on": "2025-07-01",
        "version": "1.0.0",
        "provider_references": [
            {"provider_group_id": 7, "provider_groups": [
                {"npi": ["1234567893"], "tin": {"type": "ein", "value": "12-3456789"}}
            ]}
        ],
        "in_network": [
            {"billing_code": "99213", "billing_code_type": "CPT",
             "negotiated_rates": [{"provider_references": [7],
               "negotiated_prices": [{"negotiated_rate": 81.84, "billing_class": "professional", "service_code": ["11"]}]}]}
        ]
    }"#;

    #[tokio::test]
    async fn early_references_are_available_before_items() {
        let mut stream = InNetworkStream::open(EARLY_REFS.as_bytes()).await.unwrap();
        assert_eq!(
            stream.header().reporting_entity_name.as_deref(),
            Some("Example Health")
        );
        assert!(stream.references().contains(7));
        assert!(!stream.references_seen_late());

        let item = stream.next_item().await.unwrap().unwrap();
        assert_eq!(item.billing_code.as_deref(), Some("99213"));
        assert!(stream.next_item().await.unwrap().is_none());
        assert_eq!(stream.items_yielded(), 1);
    }

    #[tokio::test]
    async fn late_references_are_parsed_and_flagged() {
        let json = r#"{
            "in_network": [
                {"billing_code": "99213", "negotiated_rates": [{"provider_references": [7], "negotiated_prices": []}]}
            ],
            "provider_references": [
                {"provider_group_id": 7, "provider_groups": [
                    {"npi": [1234567893], "tin": {"type": "ein", "value": "12-3456789"}}
                ]}
            ]
        }"#;

        let mut stream = InNetworkStream::open(json.as_bytes()).await.unwrap();
        assert!(stream.references().is_empty());
        assert!(stream.next_item().await.unwrap().is_some());
        assert!(stream.next_item().await.unwrap().is_none());
        assert!(stream.references_seen_late());
        assert!(stream.references().contains(7));
    }

    #[tokio::test]
    async fn document_without_in_network_is_unsupported() {
        let err = match InNetworkStream::open(r#"{"version": "1.0.0"}"#.as_bytes()).await {
            Err(e) => e,
            Ok(_) => panic!("expected error"),
        };
        assert!(matches!(err, ParseError::UnsupportedShape(_)));
    }

    #[tokio::test]
    async fn truncated_item_fails_without_losing_prior_items() {
        let json = r#"{"in_network": [{"billing_code": "99213"}, {"billing_code": "#;
        let mut stream = InNetworkStream::open(json.as_bytes()).await.unwrap();
        assert!(stream.next_item().await.unwrap().is_some());
        assert!(stream.next_item().await.is_err());
        assert_eq!(stream.items_yielded(), 1);
    }

    #[tokio::test]
    async fn extract_skips_items_in_constant_memory() {
        let refs = extract_provider_references(EARLY_REFS.as_bytes())
            .await
            .unwrap();
        assert!(refs.contains(7));
        assert_eq!(refs.len(), 1);

        let json = r#"{"in_network": [], "provider_references": []}"#;
        let refs = extract_provider_references(json.as_bytes()).await.unwrap();
        assert!(refs.is_empty());
    }

    #[tokio::test]
    async fn header_scalars_tolerate_numbers() {
        let json = r#"{"plan_id": 510540405, "in_network": []}"#;
        let mut stream = InNetworkStream::open(json.as_bytes()).await.unwrap();
        assert_eq!(stream.header().plan_id.as_deref(), Some("510540405"));
        assert!(stream.next_item().await.unwrap().is_none());
    }
}
