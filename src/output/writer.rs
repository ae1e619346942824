//! Parquet encoding and partitioned writes
//!
//! One flush produces one Parquet part file. Same-partition writes
//! serialize behind a per-partition lock so part numbers stay dense;
//! different partitions flush in parallel. A put is atomic at the file
//! level: the object store stages the upload and renames on completion.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray, Float64Array, StringArray, UInt32Array, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use object_store::path::Path;
use object_store::ObjectStore;
use parquet::arrow::ArrowWriter;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{sanitize_payer, EntityKind, EntityRow, WriteError};

struct PartitionState {
    /// Guards the part counter and serializes same-partition flushes.
    next_part: Mutex<u32>,
    failed: AtomicBool,
}

/// Shared columnar writer. One instance serves every payer pipeline.
pub struct ColumnWriter {
    store: Arc<dyn ObjectStore>,
    prefix: Path,
    max_retries: u32,
    partitions: std::sync::Mutex<HashMap<String, Arc<PartitionState>>>,
}

impl ColumnWriter {
    pub fn new(store: Arc<dyn ObjectStore>, prefix: Path, max_retries: u32) -> Self {
        Self {
            store,
            prefix,
            max_retries,
            partitions: std::sync::Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    /// Write one batch of same-entity rows as the partition's next part
    /// file. Returns the number of rows written.
    pub async fn write_rows(
        &self,
        entity: EntityKind,
        payer: &str,
        date: NaiveDate,
        rows: &[EntityRow],
    ) -> Result<usize, WriteError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let partition = format!(
            "{}/payer={}/date={}",
            entity.as_str(),
            sanitize_payer(payer),
            date.format("%Y-%m-%d"),
        );

        let state = {
            let mut partitions = self.partitions.lock().expect("partition map poisoned");
            Arc::clone(partitions.entry(partition.clone()).or_insert_with(|| {
                Arc::new(PartitionState {
                    next_part: Mutex::new(0),
                    failed: AtomicBool::new(false),
                })
            }))
        };

        if state.failed.load(Ordering::Acquire) {
            return Err(WriteError::PartitionFailed(partition));
        }

        let bytes = bytes::Bytes::from(encode(entity, rows)?);

        let mut part = state.next_part.lock().await;
        let location = self.location(&format!("{partition}/part-{:04}.parquet", *part));

        let mut attempt = 0u32;
        loop {
            match self.store.put(&location, bytes.clone().into()).await {
                Ok(_) => {
                    debug!(%location, rows = rows.len(), "flushed partition part");
                    *part += 1;
                    return Ok(rows.len());
                }
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!(%location, attempt, "write failed, retrying: {e}");
                    tokio::time::sleep(std::time::Duration::from_millis(250 * attempt as u64))
                        .await;
                }
                Err(e) => {
                    state.failed.store(true, Ordering::Release);
                    warn!(%location, "write failed persistently, marking partition failed: {e}");
                    return Err(WriteError::PartitionFailed(format!("{partition}: {e}")));
                }
            }
        }
    }

    pub(super) fn location(&self, relative: &str) -> Path {
        if self.prefix.as_ref().is_empty() {
            Path::from(relative)
        } else {
            Path::from(format!("{}/{relative}", self.prefix.as_ref()))
        }
    }
}

fn encode(entity: EntityKind, rows: &[EntityRow]) -> Result<Vec<u8>, WriteError> {
    let batch = match entity {
        EntityKind::Rates => encode_rates(rows)?,
        EntityKind::Organizations => encode_organizations(rows)?,
        EntityKind::Providers => encode_providers(rows)?,
        EntityKind::Analytics => encode_analytics(rows)?,
    };

    let mut buf = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buf, batch.schema(), None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(buf)
}

fn rates_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("rate_uuid", DataType::Utf8, false),
        Field::new("payer_uuid", DataType::Utf8, false),
        Field::new("organization_uuid", DataType::Utf8, false),
        Field::new("service_code", DataType::Utf8, false),
        Field::new("billing_code_type", DataType::Utf8, false),
        Field::new("negotiated_rate", DataType::Float64, false),
        Field::new("billing_class", DataType::Utf8, false),
        Field::new("rate_type", DataType::Utf8, false),
        Field::new("service_codes", DataType::Utf8, false),
        Field::new("plan_details", DataType::Utf8, false),
        Field::new("contract_period", DataType::Utf8, false),
        Field::new("data_lineage", DataType::Utf8, false),
    ]))
}

fn encode_rates(rows: &[EntityRow]) -> Result<RecordBatch, WriteError> {
    let mut rate_uuid = Vec::with_capacity(rows.len());
    let mut payer_uuid = Vec::with_capacity(rows.len());
    let mut organization_uuid = Vec::with_capacity(rows.len());
    let mut service_code = Vec::with_capacity(rows.len());
    let mut billing_code_type = Vec::with_capacity(rows.len());
    let mut negotiated_rate = Vec::with_capacity(rows.len());
    let mut billing_class = Vec::with_capacity(rows.len());
    let mut rate_type = Vec::with_capacity(rows.len());
    let mut service_codes = Vec::with_capacity(rows.len());
    let mut plan_details = Vec::with_capacity(rows.len());
    let mut contract_period = Vec::with_capacity(rows.len());
    let mut data_lineage = Vec::with_capacity(rows.len());

    for row in rows {
        let EntityRow::Rate(r) = row else { continue };
        rate_uuid.push(r.rate_uuid.to_string());
        payer_uuid.push(r.payer_uuid.to_string());
        organization_uuid.push(r.organization_uuid.to_string());
        service_code.push(r.service_code.clone());
        billing_code_type.push(r.billing_code_type.clone());
        negotiated_rate.push(r.negotiated_rate);
        billing_class.push(r.billing_class.clone());
        rate_type.push(r.rate_type.clone());
        service_codes.push(serde_json::to_string(&r.service_codes)?);
        plan_details.push(r.plan_details.to_json_string()?);
        contract_period.push(r.contract_period.to_json_string()?);
        data_lineage.push(r.data_lineage.to_json_string()?);
    }

    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(rate_uuid)),
        Arc::new(StringArray::from(payer_uuid)),
        Arc::new(StringArray::from(organization_uuid)),
        Arc::new(StringArray::from(service_code)),
        Arc::new(StringArray::from(billing_code_type)),
        Arc::new(Float64Array::from(negotiated_rate)),
        Arc::new(StringArray::from(billing_class)),
        Arc::new(StringArray::from(rate_type)),
        Arc::new(StringArray::from(service_codes)),
        Arc::new(StringArray::from(plan_details)),
        Arc::new(StringArray::from(contract_period)),
        Arc::new(StringArray::from(data_lineage)),
    ];
    Ok(RecordBatch::try_new(rates_schema(), columns)?)
}

fn organizations_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("organization_uuid", DataType::Utf8, false),
        Field::new("tin", DataType::Utf8, false),
        Field::new("organization_name", DataType::Utf8, true),
        Field::new("npi_count", DataType::UInt32, false),
        Field::new("is_facility", DataType::Boolean, false),
    ]))
}

fn encode_organizations(rows: &[EntityRow]) -> Result<RecordBatch, WriteError> {
    let mut organization_uuid = Vec::with_capacity(rows.len());
    let mut tin = Vec::with_capacity(rows.len());
    let mut organization_name = Vec::with_capacity(rows.len());
    let mut npi_count = Vec::with_capacity(rows.len());
    let mut is_facility = Vec::with_capacity(rows.len());

    for row in rows {
        let EntityRow::Organization(o) = row else { continue };
        organization_uuid.push(o.organization_uuid.to_string());
        tin.push(o.tin.clone());
        organization_name.push(o.organization_name.clone());
        npi_count.push(o.npi_count);
        is_facility.push(o.is_facility);
    }

    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(organization_uuid)),
        Arc::new(StringArray::from(tin)),
        Arc::new(StringArray::from(organization_name)),
        Arc::new(UInt32Array::from(npi_count)),
        Arc::new(BooleanArray::from(is_facility)),
    ];
    Ok(RecordBatch::try_new(organizations_schema(), columns)?)
}

fn providers_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("provider_uuid", DataType::Utf8, false),
        Field::new("npi", DataType::Utf8, false),
        Field::new("organization_uuid", DataType::Utf8, false),
        Field::new("specialties", DataType::Utf8, false),
        Field::new("addresses", DataType::Utf8, false),
        Field::new("is_active", DataType::Boolean, false),
    ]))
}

fn encode_providers(rows: &[EntityRow]) -> Result<RecordBatch, WriteError> {
    let mut provider_uuid = Vec::with_capacity(rows.len());
    let mut npi = Vec::with_capacity(rows.len());
    let mut organization_uuid = Vec::with_capacity(rows.len());
    let mut specialties = Vec::with_capacity(rows.len());
    let mut addresses = Vec::with_capacity(rows.len());
    let mut is_active = Vec::with_capacity(rows.len());

    for row in rows {
        let EntityRow::Provider(p) = row else { continue };
        provider_uuid.push(p.provider_uuid.to_string());
        npi.push(p.npi.clone());
        organization_uuid.push(p.organization_uuid.to_string());
        specialties.push(serde_json::to_string(&p.specialties)?);
        addresses.push(serde_json::to_string(&p.addresses)?);
        is_active.push(p.is_active);
    }

    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(provider_uuid)),
        Arc::new(StringArray::from(npi)),
        Arc::new(StringArray::from(organization_uuid)),
        Arc::new(StringArray::from(specialties)),
        Arc::new(StringArray::from(addresses)),
        Arc::new(BooleanArray::from(is_active)),
    ];
    Ok(RecordBatch::try_new(providers_schema(), columns)?)
}

fn analytics_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("service_code", DataType::Utf8, false),
        Field::new("geographic_scope", DataType::Utf8, false),
        Field::new("rate_count", DataType::UInt64, false),
        Field::new("min_rate", DataType::Float64, false),
        Field::new("max_rate", DataType::Float64, false),
        Field::new("mean_rate", DataType::Float64, false),
        Field::new("stddev_rate", DataType::Float64, false),
    ]))
}

fn encode_analytics(rows: &[EntityRow]) -> Result<RecordBatch, WriteError> {
    let mut service_code = Vec::with_capacity(rows.len());
    let mut geographic_scope = Vec::with_capacity(rows.len());
    let mut rate_count = Vec::with_capacity(rows.len());
    let mut min_rate = Vec::with_capacity(rows.len());
    let mut max_rate = Vec::with_capacity(rows.len());
    let mut mean_rate = Vec::with_capacity(rows.len());
    let mut stddev_rate = Vec::with_capacity(rows.len());

    for row in rows {
        let EntityRow::Analytics(a) = row else { continue };
        service_code.push(a.service_code.clone());
        geographic_scope.push(a.geographic_scope.clone());
        rate_count.push(a.rate_count);
        min_rate.push(a.min_rate);
        max_rate.push(a.max_rate);
        mean_rate.push(a.mean_rate);
        stddev_rate.push(a.stddev_rate);
    }

    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(service_code)),
        Arc::new(StringArray::from(geographic_scope)),
        Arc::new(UInt64Array::from(rate_count)),
        Arc::new(Float64Array::from(min_rate)),
        Arc::new(Float64Array::from(max_rate)),
        Arc::new(Float64Array::from(mean_rate)),
        Arc::new(Float64Array::from(stddev_rate)),
    ];
    Ok(RecordBatch::try_new(analytics_schema(), columns)?)
}
