//! Canonicalization of raw in-network items
//!
//! The normalizer turns one raw item into zero or more canonical rows:
//! an Organization per first-seen TIN, a Provider per first-seen valid NPI,
//! and a Rate per admitted negotiated price. Deduplication indexes are
//! pipeline-local; entities are emitted exactly once, at first sight, which
//! keeps every Rate's organization reference satisfiable within the run.
//!
//! Filters run in a fixed order: billing-code whitelist, rate bounds
//! (global and per-code ceiling), billing-code-type recognition, then the
//! quality gate. Every rejection increments a counter and nothing aborts.

mod npi;
mod provider_refs;

pub use npi::{is_valid_npi, is_valid_tin};
pub use provider_refs::ProviderReferenceMap;

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::identity;
use crate::output::EntityRow;
use crate::quality::{rate_is_sane, AccuracyFactors, Admission, QualityCounters, QualityGate};
use crate::types::{
    ContractPeriod, DataLineage, InNetworkHeader, OrganizationRow, PlanDetails, ProviderGroup,
    ProviderRow, RateRow, RawInNetworkItem, RawNegotiatedPrice, ReportingPlan, TaxIdType,
};

/// Number of fields the completeness score is computed over.
const REQUIRED_FIELDS: usize = 8;

/// Which provider-resolution strategies apply on the current pass.
///
/// `InlineOnly` and `DeferredOnly` implement the two-pass protocol for
/// files whose reference table trails the item array: pass one emits the
/// inline-group blocks and counts the cited ones as deferred, pass two
/// re-reads the file and emits only the cited blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionMode {
    /// Resolve inline groups and cited references
    Full,

    /// Resolve inline groups; count reference-citing blocks as deferred
    InlineOnly,

    /// Resolve cited references; skip inline blocks silently
    DeferredOnly,
}

/// Everything known about the file currently being normalized.
#[derive(Debug, Clone)]
pub struct FileContext {
    pub source_url: String,
    pub header: InNetworkHeader,
    pub plan: Option<ReportingPlan>,
    pub ingested_at: DateTime<Utc>,
}

impl FileContext {
    /// Plan identity, preferring TOC plan metadata over the file header.
    fn plan_field<'a>(
        &'a self,
        from_plan: impl Fn(&'a ReportingPlan) -> Option<&'a String>,
        from_header: Option<&'a String>,
    ) -> Option<&'a str> {
        self.plan
            .as_ref()
            .and_then(from_plan)
            .or(from_header)
            .map(String::as_str)
    }

    pub fn plan_fingerprint(&self) -> Uuid {
        identity::plan_fingerprint(
            self.header.reporting_entity_name.as_deref().unwrap_or(""),
            self.plan_field(|p| p.plan_name.as_ref(), self.header.plan_name.as_ref())
                .unwrap_or(""),
            self.plan_field(|p| p.plan_id.as_ref(), self.header.plan_id.as_ref())
                .unwrap_or(""),
            self.plan_field(
                |p| p.plan_market_type.as_ref(),
                self.header.plan_market_type.as_ref(),
            )
            .unwrap_or(""),
        )
    }

    fn plan_details(&self, fingerprint: Uuid) -> PlanDetails {
        PlanDetails {
            reporting_entity_name: self.header.reporting_entity_name.clone(),
            plan_name: self
                .plan_field(|p| p.plan_name.as_ref(), self.header.plan_name.as_ref())
                .map(str::to_string),
            plan_id: self
                .plan_field(|p| p.plan_id.as_ref(), self.header.plan_id.as_ref())
                .map(str::to_string),
            plan_id_type: self
                .plan_field(
                    |p| p.plan_id_type.as_ref(),
                    self.header.plan_id_type.as_ref(),
                )
                .map(str::to_string),
            plan_market_type: self
                .plan_field(
                    |p| p.plan_market_type.as_ref(),
                    self.header.plan_market_type.as_ref(),
                )
                .map(str::to_string),
            plan_fingerprint: fingerprint.to_string(),
        }
    }
}

/// Filter thresholds lifted out of the run configuration.
#[derive(Debug, Clone)]
pub struct NormalizerSettings {
    pub whitelist: Option<HashSet<String>>,
    pub min_rate: f64,
    pub max_rate: f64,
    pub per_code_ceilings: BTreeMap<String, f64>,
    pub gate: QualityGate,
}

impl NormalizerSettings {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            whitelist: config
                .cpt_whitelist
                .as_ref()
                .map(|codes| codes.iter().cloned().collect()),
            min_rate: config.quality_rules.rates.min_rate,
            max_rate: config.quality_rules.rates.max_rate,
            per_code_ceilings: config
                .quality_rules
                .high_cost_procedures
                .max_reasonable_rates
                .clone(),
            gate: QualityGate::from_processing(&config.processing),
        }
    }
}

/// Output of normalizing one item.
#[derive(Debug, Default)]
pub struct NormalizedOutput {
    pub rows: Vec<EntityRow>,

    /// Rate blocks skipped because their provider references could not be
    /// resolved on this pass.
    pub deferred_blocks: u64,
}

/// Per-payer normalizer holding the run's deduplication indexes.
pub struct Normalizer {
    payer_uuid: Uuid,
    payer_name: String,
    settings: NormalizerSettings,

    /// TIN -> organization identity, first sight emits the row
    organizations: HashMap<String, Uuid>,

    /// NPI -> organization the provider was first bound to
    providers: HashMap<String, Uuid>,

    emitted_rates: HashSet<Uuid>,
    pub counters: QualityCounters,
}

impl Normalizer {
    pub fn new(payer_uuid: Uuid, payer_name: String, settings: NormalizerSettings) -> Self {
        Self {
            payer_uuid,
            payer_name,
            settings,
            organizations: HashMap::new(),
            providers: HashMap::new(),
            emitted_rates: HashSet::new(),
            counters: QualityCounters::default(),
        }
    }

    pub fn organizations_emitted(&self) -> u64 {
        self.organizations.len() as u64
    }

    pub fn providers_emitted(&self) -> u64 {
        self.providers.len() as u64
    }

    /// Canonicalize one raw item.
    pub fn normalize_item(
        &mut self,
        item: &RawInNetworkItem,
        file: &FileContext,
        mode: ResolutionMode,
        references: &ProviderReferenceMap,
    ) -> NormalizedOutput {
        let mut out = NormalizedOutput::default();

        // Filter 1: billing-code whitelist, once per item.
        if let Some(whitelist) = &self.settings.whitelist {
            let admitted = item
                .billing_code
                .as_deref()
                .map(|code| whitelist.contains(code))
                .unwrap_or(false);
            if !admitted {
                self.counters.rejected_whitelist += 1;
                return out;
            }
        }

        let fingerprint = file.plan_fingerprint();

        for block in &item.negotiated_rates {
            let mut groups: Vec<ProviderGroup> = Vec::new();

            if matches!(mode, ResolutionMode::Full | ResolutionMode::InlineOnly) {
                if let Some(inline) = &block.provider_groups {
                    groups.extend(inline.iter().cloned());
                }
            }

            if let Some(cited) = block
                .provider_references
                .as_deref()
                .filter(|ids| !ids.is_empty())
            {
                match mode {
                    ResolutionMode::InlineOnly => {
                        out.deferred_blocks += 1;
                        self.counters.deferred_references += 1;
                    }
                    ResolutionMode::Full | ResolutionMode::DeferredOnly => {
                        let resolved = references.resolve(cited);
                        if resolved.is_empty() {
                            self.counters.deferred_references += 1;
                        } else {
                            groups.extend(resolved.into_iter().cloned());
                        }
                    }
                }
            }

            for group in &groups {
                self.normalize_group(item, block.negotiated_prices.as_slice(), group, file, fingerprint, &mut out);
            }
        }

        out
    }

    fn normalize_group(
        &mut self,
        item: &RawInNetworkItem,
        prices: &[RawNegotiatedPrice],
        group: &ProviderGroup,
        file: &FileContext,
        fingerprint: Uuid,
        out: &mut NormalizedOutput,
    ) {
        let tin = group.tin.value.as_str();
        let organization_uuid = self.intern_organization(group, out);
        let npi_all_valid = self.intern_providers(group, organization_uuid, out);

        for price in prices {
            self.normalize_price(
                item,
                price,
                tin,
                organization_uuid,
                npi_all_valid,
                file,
                fingerprint,
                out,
            );
        }
    }

    /// Emit the organization at first sight of its TIN.
    fn intern_organization(&mut self, group: &ProviderGroup, out: &mut NormalizedOutput) -> Uuid {
        let tin = group.tin.value.as_str();
        if let Some(&uuid) = self.organizations.get(tin) {
            return uuid;
        }
        let uuid = identity::organization_uuid(tin);
        self.organizations.insert(tin.to_string(), uuid);
        out.rows.push(EntityRow::Organization(OrganizationRow {
            organization_uuid: uuid,
            tin: tin.to_string(),
            organization_name: None,
            npi_count: group.npi.len() as u32,
            is_facility: group.tin.id_type == TaxIdType::Npi,
        }));
        uuid
    }

    /// Emit each first-seen, Luhn-valid NPI; returns whether every NPI in
    /// the group validated. A duplicate NPI seen under a second TIN keeps
    /// its first organization binding.
    fn intern_providers(
        &mut self,
        group: &ProviderGroup,
        organization_uuid: Uuid,
        out: &mut NormalizedOutput,
    ) -> bool {
        let mut all_valid = true;
        for npi in &group.npi {
            let npi = npi.as_str();
            if !is_valid_npi(npi) {
                all_valid = false;
                self.counters.rejected_invalid_npi += 1;
                continue;
            }
            if self.providers.contains_key(npi) {
                continue;
            }
            self.providers.insert(npi.to_string(), organization_uuid);
            out.rows.push(EntityRow::Provider(ProviderRow {
                provider_uuid: identity::provider_uuid(npi),
                npi: npi.to_string(),
                organization_uuid,
                specialties: Vec::new(),
                addresses: Vec::new(),
                is_active: true,
            }));
        }
        all_valid
    }

    #[allow(clippy::too_many_arguments)]
    fn normalize_price(
        &mut self,
        item: &RawInNetworkItem,
        price: &RawNegotiatedPrice,
        tin: &str,
        organization_uuid: Uuid,
        npi_all_valid: bool,
        file: &FileContext,
        fingerprint: Uuid,
        out: &mut NormalizedOutput,
    ) {
        // A row needs a procedure code and a rate to mean anything.
        let (Some(billing_code), Some(rate)) = (item.billing_code.as_deref(), price.negotiated_rate)
        else {
            self.counters.rejected_completeness += 1;
            return;
        };

        // Filter 2: global bounds plus the per-code ceiling.
        let ceiling = self.settings.per_code_ceilings.get(billing_code);
        if rate < self.settings.min_rate
            || rate > self.settings.max_rate
            || ceiling.is_some_and(|&max| rate > max)
        {
            self.counters.rejected_bounds += 1;
            return;
        }

        // Filter 3: recognized billing code vocabulary.
        if let Some(code_type) = item.billing_code_type {
            if !code_type.is_recognized() {
                self.counters.rejected_code_type += 1;
                return;
            }
        }

        let service_codes = price.service_code.clone().unwrap_or_default();

        let present = [
            true, // billing_code, required above
            item.billing_code_type.is_some(),
            true, // negotiated_rate, required above
            price.negotiated_type.is_some(),
            price.billing_class.is_some(),
            !service_codes.is_empty(),
            price.expiration_date.is_some(),
            !tin.is_empty(),
        ]
        .iter()
        .filter(|&&p| p)
        .count();
        let completeness = crate::quality::completeness(present, REQUIRED_FIELDS);

        let factors = AccuracyFactors {
            npi_valid: npi_all_valid,
            rate_sane: rate_is_sane(rate),
            tin_valid: is_valid_tin(tin),
        };

        match self.settings.gate.assess(completeness, &factors) {
            Admission::Admitted => {}
            Admission::RejectedCompleteness => {
                self.counters.rejected_completeness += 1;
                return;
            }
            Admission::RejectedAccuracy => {
                self.counters.rejected_accuracy += 1;
                return;
            }
        }

        let billing_code_type = item
            .billing_code_type
            .map(|t| t.as_str().to_string())
            .unwrap_or_else(|| "OTHER".to_string());
        let billing_class = price
            .billing_class
            .map(|c| c.as_str().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let rate_type = price
            .negotiated_type
            .map(|t| t.as_str().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        // One candidate per place-of-service entry. Entries that collapse
        // to the same identity tuple deduplicate here, which is what keeps
        // the run's rate_uuid set unique.
        let expansion = if service_codes.is_empty() { 1 } else { service_codes.len() };
        for _ in 0..expansion {
            let rate_uuid = identity::rate_uuid(
                &self.payer_uuid,
                &organization_uuid,
                billing_code,
                &billing_code_type,
                rate,
                &billing_class,
                &rate_type,
                &fingerprint,
            );
            if !self.emitted_rates.insert(rate_uuid) {
                self.counters.duplicate_rate_uuids += 1;
                debug!(%rate_uuid, billing_code, "duplicate rate identity, keeping first");
                continue;
            }
            self.counters.admitted += 1;
            out.rows.push(EntityRow::Rate(RateRow {
                rate_uuid,
                payer_uuid: self.payer_uuid,
                organization_uuid,
                service_code: billing_code.to_string(),
                billing_code_type: billing_code_type.clone(),
                negotiated_rate: rate,
                billing_class: billing_class.clone(),
                rate_type: rate_type.clone(),
                service_codes: service_codes.clone(),
                plan_details: file.plan_details(fingerprint),
                contract_period: ContractPeriod {
                    expiration_date: price.expiration_date.clone(),
                    last_updated_on: file.header.last_updated_on.clone(),
                },
                data_lineage: DataLineage {
                    source_url: file.source_url.clone(),
                    payer_name: self.payer_name.clone(),
                    ingested_at: file.ingested_at,
                    billing_code_modifiers: price
                        .billing_code_modifier
                        .clone()
                        .unwrap_or_default(),
                    description: item.description.clone(),
                },
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::EntityKind;

    fn settings() -> NormalizerSettings {
        NormalizerSettings {
            whitelist: None,
            min_rate: 0.01,
            max_rate: 1_000_000.0,
            per_code_ceilings: BTreeMap::new(),
            gate: QualityGate::new(0.8, 0.5),
        }
    }

    fn normalizer(settings: NormalizerSettings) -> Normalizer {
        Normalizer::new(
            identity::payer_uuid("acme", "https://example.com/index.json"),
            "acme".into(),
            settings,
        )
    }

    fn file_context() -> FileContext {
        FileContext {
            source_url: "https://example.com/rates.json".into(),
            header: InNetworkHeader {
                reporting_entity_name: Some("Acme Health".into()),
                last_updated_on: Some("2025-07-01".into()),
                ..Default::default()
            },
            plan: None,
            ingested_at: "2025-07-01T00:00:00Z".parse().unwrap(),
        }
    }

    fn standard_item() -> RawInNetworkItem {
        serde_json::from_str(
            r#"{
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
            }"#,
        )
        .unwrap()
    }

    fn kinds(rows: &[EntityRow]) -> Vec<EntityKind> {
        rows.iter().map(EntityRow::kind).collect()
    }

    #[test]
    fn standard_item_emits_org_provider_and_rate() {
        let mut n = normalizer(settings());
        let out = n.normalize_item(
            &standard_item(),
            &file_context(),
            ResolutionMode::Full,
            &ProviderReferenceMap::new(),
        );

        assert_eq!(
            kinds(&out.rows),
            vec![
                EntityKind::Organizations,
                EntityKind::Providers,
                EntityKind::Rates
            ]
        );
        assert_eq!(n.counters.admitted, 1);
        assert_eq!(out.deferred_blocks, 0);

        let EntityRow::Rate(rate) = &out.rows[2] else { panic!() };
        assert_eq!(rate.service_code, "99213");
        assert_eq!(rate.negotiated_rate, 81.84);
        assert_eq!(rate.service_codes, vec!["11".to_string()]);
        assert_eq!(rate.organization_uuid, identity::organization_uuid("12-3456789"));
    }

    #[test]
    fn reruns_produce_identical_rate_uuids() {
        let run = || {
            let mut n = normalizer(settings());
            let out = n.normalize_item(
                &standard_item(),
                &file_context(),
                ResolutionMode::Full,
                &ProviderReferenceMap::new(),
            );
            out.rows
                .into_iter()
                .filter_map(|row| match row {
                    EntityRow::Rate(r) => Some(r.rate_uuid),
                    _ => None,
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn duplicate_entities_emit_once() {
        let mut n = normalizer(settings());
        let ctx = file_context();
        let refs = ProviderReferenceMap::new();
        let first = n.normalize_item(&standard_item(), &ctx, ResolutionMode::Full, &refs);
        let second = n.normalize_item(&standard_item(), &ctx, ResolutionMode::Full, &refs);

        assert_eq!(first.rows.len(), 3);
        // Same TIN, NPI, and rate tuple: nothing new to emit.
        assert!(second.rows.is_empty());
        assert_eq!(n.counters.duplicate_rate_uuids, 1);
        assert_eq!(n.organizations_emitted(), 1);
        assert_eq!(n.providers_emitted(), 1);
    }

    #[test]
    fn whitelist_rejects_unlisted_codes() {
        let mut s = settings();
        s.whitelist = Some(["99214".to_string()].into_iter().collect());
        let mut n = normalizer(s);
        let out = n.normalize_item(
            &standard_item(),
            &file_context(),
            ResolutionMode::Full,
            &ProviderReferenceMap::new(),
        );
        assert!(out.rows.is_empty());
        assert_eq!(n.counters.rejected_whitelist, 1);
        assert_eq!(n.counters.admitted, 0);
    }

    #[test]
    fn negative_rate_rejected_by_bounds() {
        let mut item = standard_item();
        item.negotiated_rates[0].negotiated_prices[0].negotiated_rate = Some(-5.0);
        let mut n = normalizer(settings());
        let out = n.normalize_item(
            &item,
            &file_context(),
            ResolutionMode::Full,
            &ProviderReferenceMap::new(),
        );
        assert!(!kinds(&out.rows).contains(&EntityKind::Rates));
        assert_eq!(n.counters.rejected_bounds, 1);
    }

    #[test]
    fn boundary_rate_is_admitted_at_min_and_rejected_below() {
        let mut s = settings();
        s.min_rate = 1.0;
        let mut n = normalizer(s.clone());
        let mut item = standard_item();
        item.negotiated_rates[0].negotiated_prices[0].negotiated_rate = Some(1.0);
        let out = n.normalize_item(
            &item,
            &file_context(),
            ResolutionMode::Full,
            &ProviderReferenceMap::new(),
        );
        assert_eq!(n.counters.admitted, 1);
        assert!(kinds(&out.rows).contains(&EntityKind::Rates));

        let mut n = normalizer(s);
        item.negotiated_rates[0].negotiated_prices[0].negotiated_rate = Some(0.999);
        n.normalize_item(
            &item,
            &file_context(),
            ResolutionMode::Full,
            &ProviderReferenceMap::new(),
        );
        assert_eq!(n.counters.rejected_bounds, 1);
    }

    #[test]
    fn per_code_ceiling_applies() {
        let mut s = settings();
        s.per_code_ceilings.insert("99213".into(), 50.0);
        let mut n = normalizer(s);
        n.normalize_item(
            &standard_item(),
            &file_context(),
            ResolutionMode::Full,
            &ProviderReferenceMap::new(),
        );
        assert_eq!(n.counters.rejected_bounds, 1);
    }

    #[test]
    fn luhn_invalid_npi_degrades_accuracy_but_keeps_the_org() {
        let mut item = standard_item();
        item.negotiated_rates[0].provider_groups.as_mut().unwrap()[0].npi =
            vec![crate::types::Npi::from("1234567890")];

        // Accuracy 0.5 passes a 0.5 threshold; no provider row, org stays.
        let mut n = normalizer(settings());
        let out = n.normalize_item(
            &item,
            &file_context(),
            ResolutionMode::Full,
            &ProviderReferenceMap::new(),
        );
        assert_eq!(
            kinds(&out.rows),
            vec![EntityKind::Organizations, EntityKind::Rates]
        );
        assert_eq!(n.counters.rejected_invalid_npi, 1);
        assert_eq!(n.counters.admitted, 1);

        // A stricter gate rejects the row.
        let mut s = settings();
        s.gate = QualityGate::new(0.8, 0.6);
        let mut n = normalizer(s);
        let out = n.normalize_item(
            &item,
            &file_context(),
            ResolutionMode::Full,
            &ProviderReferenceMap::new(),
        );
        assert!(!kinds(&out.rows).contains(&EntityKind::Rates));
        assert_eq!(n.counters.rejected_accuracy, 1);
    }

    #[test]
    fn cited_references_resolve_like_inline_groups() {
        let item: RawInNetworkItem = serde_json::from_str(
            r#"{
                "billing_code": "99213",
                "billing_code_type": "CPT",
                "negotiated_rates": [{
                    "provider_references": [7],
                    "negotiated_prices": [{
                        "negotiated_type": "negotiated",
                        "negotiated_rate": 81.84,
                        "service_code": ["11"],
                        "billing_class": "professional",
                        "expiration_date": "9999-12-31"
                    }]
                }]
            }"#,
        )
        .unwrap();

        let mut refs = ProviderReferenceMap::new();
        refs.load(
            serde_json::from_str(
                r#"[{"provider_group_id": 7, "provider_groups": [
                    {"npi": ["1234567893"], "tin": {"type": "ein", "value": "12-3456789"}}
                ]}]"#,
            )
            .unwrap(),
        );

        let mut n = normalizer(settings());
        let out = n.normalize_item(&item, &file_context(), ResolutionMode::Full, &refs);
        assert_eq!(
            kinds(&out.rows),
            vec![
                EntityKind::Organizations,
                EntityKind::Providers,
                EntityKind::Rates
            ]
        );

        // Same input through inline-only mode defers the block instead.
        let mut n = normalizer(settings());
        let out = n.normalize_item(&item, &file_context(), ResolutionMode::InlineOnly, &refs);
        assert!(out.rows.is_empty());
        assert_eq!(out.deferred_blocks, 1);

        // Deferred-only emits it, and skips inline blocks.
        let mut n = normalizer(settings());
        let out = n.normalize_item(&item, &file_context(), ResolutionMode::DeferredOnly, &refs);
        assert_eq!(out.rows.len(), 3);
        let out = n.normalize_item(
            &standard_item(),
            &file_context(),
            ResolutionMode::DeferredOnly,
            &refs,
        );
        assert!(out.rows.is_empty());
    }

    #[test]
    fn place_of_service_expansion_dedupes_to_one_uuid() {
        let mut item = standard_item();
        item.negotiated_rates[0].negotiated_prices[0].service_code =
            Some(vec!["11".into(), "22".into()]);
        let mut n = normalizer(settings());
        let out = n.normalize_item(
            &item,
            &file_context(),
            ResolutionMode::Full,
            &ProviderReferenceMap::new(),
        );
        let rates: Vec<_> = out
            .rows
            .iter()
            .filter(|r| r.kind() == EntityKind::Rates)
            .collect();
        assert_eq!(rates.len(), 1);
        assert_eq!(n.counters.admitted, 1);
        assert_eq!(n.counters.duplicate_rate_uuids, 1);
    }

    #[test]
    fn empty_negotiated_rates_is_a_no_op() {
        let item: RawInNetworkItem = serde_json::from_str(r#"{"billing_code": "99213"}"#).unwrap();
        let mut n = normalizer(settings());
        let out = n.normalize_item(
            &item,
            &file_context(),
            ResolutionMode::Full,
            &ProviderReferenceMap::new(),
        );
        assert!(out.rows.is_empty());
        assert_eq!(n.counters, QualityCounters::default());
    }
}
