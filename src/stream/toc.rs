//! Lazy table-of-contents iteration
//!
//! A payer endpoint serves one of three document shapes; `detect` sniffs the
//! shape from the first structurally significant top-level key and hands
//! back either a TOC entry iterator or an already-positioned in-network
//! stream, without re-reading any bytes.

use std::collections::VecDeque;

use tokio::io::AsyncRead;
use tracing::{debug, warn};

use crate::types::{BlobEntry, InNetworkHeader, ReportingStructure, TocEntry, TocShape};

use super::in_network::{collect_header_field, InNetworkStream};
use super::scanner::DocumentScanner;
use super::{parse_slice, ParseError};

/// Outcome of shape detection on a payer endpoint's byte stream.
pub enum DetectedStream<R> {
    /// The endpoint is an index; iterate its entries.
    Toc(TocStream<R>),

    /// The endpoint is a rates file; process it directly.
    InNetwork(Box<InNetworkStream<R>>),
}

/// Sniff the document shape and return the matching stream.
pub async fn detect<R: AsyncRead + Unpin>(reader: R) -> Result<DetectedStream<R>, ParseError> {
    let mut doc = DocumentScanner::new(reader);
    doc.begin_document().await?;

    let mut header = InNetworkHeader::default();
    while let Some(key) = doc.next_key().await? {
        match key.as_str() {
            "reporting_structure" => {
                debug!("detected standard table of contents");
                doc.begin_array().await?;
                return Ok(DetectedStream::Toc(TocStream::new(doc, TocShape::Standard)));
            }
            "blobs" => {
                debug!("detected legacy blob index");
                doc.begin_array().await?;
                return Ok(DetectedStream::Toc(TocStream::new(
                    doc,
                    TocShape::LegacyBlobs,
                )));
            }
            "in_network" | "provider_references" => {
                debug!("detected direct in-network file");
                let stream = InNetworkStream::resume(doc, header, Some(key)).await?;
                return Ok(DetectedStream::InNetwork(Box::new(stream)));
            }
            other => {
                if !collect_header_field(&mut doc, &mut header, other).await? {
                    doc.skip_value().await?;
                }
            }
        }
    }

    Err(ParseError::UnsupportedShape(
        "document has none of reporting_structure, blobs, in_network".into(),
    ))
}

/// Lazy iterator over the file references of an index document.
pub struct TocStream<R> {
    doc: DocumentScanner<R>,
    shape: TocShape,
    pending: VecDeque<TocEntry>,
    skipped: u64,
    done: bool,
}

impl<R: AsyncRead + Unpin> TocStream<R> {
    fn new(doc: DocumentScanner<R>, shape: TocShape) -> Self {
        Self {
            doc,
            shape,
            pending: VecDeque::new(),
            skipped: 0,
            done: false,
        }
    }

    pub fn shape(&self) -> TocShape {
        self.shape
    }

    /// Entries skipped because they were not in-network files (allowed
    /// amounts, nested indexes).
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Yield the next in-network file reference.
    pub async fn next_entry(&mut self) -> Result<Option<TocEntry>, ParseError> {
        loop {
            if let Some(entry) = self.pending.pop_front() {
                return Ok(Some(entry));
            }
            if self.done {
                return Ok(None);
            }

            let offset = self.doc.offset();
            match self.doc.next_element().await? {
                None => {
                    while self.doc.next_key().await?.is_some() {
                        self.doc.skip_value().await?;
                    }
                    self.done = true;
                }
                Some(raw) => match self.shape {
                    TocShape::Standard => {
                        let structure: ReportingStructure = parse_slice(&raw, offset)?;
                        self.expand_structure(structure);
                    }
                    TocShape::LegacyBlobs => {
                        let blob: BlobEntry = parse_slice(&raw, offset)?;
                        self.classify_blob(blob);
                    }
                    TocShape::DirectInNetwork => unreachable!("direct files bypass TOC iteration"),
                },
            }
        }
    }

    fn expand_structure(&mut self, structure: ReportingStructure) {
        let plan = structure.reporting_plans.first().cloned();
        let allowed_amount_url = structure
            .allowed_amount_file
            .map(|f| f.location)
            .or_else(|| {
                structure
                    .allowed_amount_files
                    .and_then(|files| files.into_iter().next().map(|f| f.location))
            });

        for file in structure.in_network_files.unwrap_or_default() {
            self.pending.push_back(TocEntry {
                plan: plan.clone(),
                description: file.description,
                in_network_url: file.location,
                allowed_amount_url: allowed_amount_url.clone(),
            });
        }
    }

    /// Legacy indexes mix in-network files with allowed-amount files and
    /// nested index blobs; only the in-network files are processable here.
    fn classify_blob(&mut self, blob: BlobEntry) {
        let name = blob.name.to_lowercase();
        if name.contains("allowed") {
            self.skipped += 1;
        } else if name.contains("index") || name.contains("toc") {
            warn!(blob = %blob.name, "skipping nested index blob");
            self.skipped += 1;
        } else {
            self.pending.push_back(TocEntry {
                plan: None,
                description: Some(blob.name),
                in_network_url: blob.download_url,
                allowed_amount_url: None,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn collect_entries<R: AsyncRead + Unpin>(mut toc: TocStream<R>) -> Vec<TocEntry> {
        let mut entries = Vec::new();
        while let Some(entry) = toc.next_entry().await.unwrap() {
            entries.push(entry);
        }
        entries
    }

    #[tokio::test]
    async fn standard_toc_expands_reporting_structures() {
        let json = r#"{
            "reporting_entity_name": "Example Health",
            "reporting_entity_type": "health insurance issuer",
            "reporting_structure": [
                {
                    "reporting_plans": [{"plan_name": "PPO", "plan_id_type": "EIN", "plan_id": "510540405", "plan_market_type": "group"}],
                    "in_network_files": [
                        {"description": "primary", "location": "https://example.com/a.json.gz"},
                        {"description": "secondary", "location": "https://example.com/b.json.gz"}
                    ],
                    "allowed_amount_file": {"description": "oon", "location": "https://example.com/oon.json.gz"}
                },
                {
                    "in_network_files": [{"location": "https://example.com/c.json"}]
                }
            ],
            "version": "1.0.0"
        }"#;

        let toc = match detect(json.as_bytes()).await.unwrap() {
            DetectedStream::Toc(toc) => toc,
            DetectedStream::InNetwork(_) => panic!("expected TOC"),
        };
        assert_eq!(toc.shape(), TocShape::Standard);

        let entries = collect_entries(toc).await;
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].in_network_url, "https://example.com/a.json.gz");
        assert_eq!(
            entries[0].plan.as_ref().unwrap().plan_id.as_deref(),
            Some("510540405")
        );
        assert_eq!(
            entries[0].allowed_amount_url.as_deref(),
            Some("https://example.com/oon.json.gz")
        );
        assert!(entries[2].plan.is_none());
        assert!(entries[2].allowed_amount_url.is_none());
    }

    #[tokio::test]
    async fn legacy_blobs_classify_by_name() {
        let json = r#"{
            "blobs": [
                {"name": "2025-07-01_in-network.json.gz", "downloadUrl": "https://cdn.example.com/in.json.gz", "size": 100},
                {"name": "2025-07-01_allowed-amounts.json.gz", "downloadUrl": "https://cdn.example.com/aa.json.gz", "size": 50},
                {"name": "2025-07-01_index.json", "downloadUrl": "https://cdn.example.com/idx.json", "size": 10}
            ]
        }"#;

        let toc = match detect(json.as_bytes()).await.unwrap() {
            DetectedStream::Toc(toc) => toc,
            DetectedStream::InNetwork(_) => panic!("expected TOC"),
        };
        assert_eq!(toc.shape(), TocShape::LegacyBlobs);

        let mut toc = toc;
        let mut entries = Vec::new();
        while let Some(entry) = toc.next_entry().await.unwrap() {
            entries.push(entry);
        }
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].in_network_url, "https://cdn.example.com/in.json.gz");
        assert_eq!(toc.skipped(), 2);
    }

    #[tokio::test]
    async fn direct_in_network_detection_hands_back_the_stream() {
        let json = r#"{
            "reporting_entity_name": "Example Health",
            "in_network": [{"billing_code": "99213"}]
        }"#;

        let mut stream = match detect(json.as_bytes()).await.unwrap() {
            DetectedStream::InNetwork(stream) => stream,
            DetectedStream::Toc(_) => panic!("expected in-network"),
        };
        assert_eq!(
            stream.header().reporting_entity_name.as_deref(),
            Some("Example Health")
        );
        let item = stream.next_item().await.unwrap().unwrap();
        assert_eq!(item.billing_code.as_deref(), Some("99213"));
    }

    #[tokio::test]
    async fn unrecognized_shape_is_an_error() {
        let err = match detect(r#"{"something_else": []}"#.as_bytes()).await {
            Err(e) => e,
            Ok(_) => panic!("expected error"),
        };
        assert!(matches!(err, ParseError::UnsupportedShape(_)));
    }
}
