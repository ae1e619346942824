//! Deferred provider-reference resolution
//!
//! Large files hoist provider groups into a top-level `provider_references`
//! table and have rate blocks cite them by integer id. The table is held in
//! memory for the duration of one file only.

use std::collections::HashMap;

use tracing::warn;

use crate::types::{ProviderGroup, RawProviderReference};

/// The `group_id -> provider_group[]` table of a single file.
#[derive(Debug, Default, Clone)]
pub struct ProviderReferenceMap {
    groups: HashMap<i64, Vec<ProviderGroup>>,
}

impl ProviderReferenceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the parsed reference table. References that point at an external
    /// `location` URL instead of inline groups are skipped; fetching nested
    /// provider files is not part of the in-file resolution pass.
    pub fn load(&mut self, references: Vec<RawProviderReference>) {
        for reference in references {
            match reference.provider_groups {
                Some(groups) => {
                    self.groups.insert(reference.provider_group_id, groups);
                }
                None => {
                    warn!(
                        group_id = reference.provider_group_id,
                        location = reference.location.as_deref().unwrap_or(""),
                        "skipping location-only provider reference"
                    );
                }
            }
        }
    }

    /// Resolve cited group ids to their provider groups, flattened.
    /// Unknown ids resolve to nothing.
    pub fn resolve(&self, ids: &[i64]) -> Vec<&ProviderGroup> {
        ids.iter()
            .filter_map(|id| self.groups.get(id))
            .flat_map(|groups| groups.iter())
            .collect()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.groups.contains_key(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Npi, TaxIdType, TaxIdentifier};

    fn group(npi: &str, tin: &str) -> ProviderGroup {
        ProviderGroup {
            npi: vec![Npi::from(npi)],
            tin: TaxIdentifier {
                id_type: TaxIdType::Ein,
                value: tin.to_string(),
            },
        }
    }

    #[test]
    fn resolves_and_flattens_cited_groups() {
        let mut map = ProviderReferenceMap::new();
        map.load(vec![
            RawProviderReference {
                provider_group_id: 7,
                provider_groups: Some(vec![group("1234567893", "12-3456789")]),
                location: None,
            },
            RawProviderReference {
                provider_group_id: 9,
                provider_groups: Some(vec![
                    group("1679576722", "98-7654321"),
                    group("1234567893", "12-3456789"),
                ]),
                location: None,
            },
        ]);

        assert_eq!(map.len(), 2);
        assert_eq!(map.resolve(&[7]).len(), 1);
        assert_eq!(map.resolve(&[7, 9]).len(), 3);
        assert!(map.resolve(&[42]).is_empty());
    }

    #[test]
    fn location_only_references_are_skipped() {
        let mut map = ProviderReferenceMap::new();
        map.load(vec![RawProviderReference {
            provider_group_id: 1,
            provider_groups: None,
            location: Some("https://example.com/pr.json".into()),
        }]);
        assert!(map.is_empty());
        assert!(!map.contains(1));
    }
}
