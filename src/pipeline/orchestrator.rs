//! Per-payer pipeline execution
//!
//! Each payer runs as one worker under a `buffer_unordered` pool. A worker
//! owns its normalizer, analytics accumulator, and batcher task; the only
//! shared pieces are the fetcher, the column writer, and the read-only
//! handler registry. Rows flow from the normalizer to the batcher over a
//! bounded channel, so a slow writer backpressures parsing instead of
//! letting rows pile up.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{NaiveDate, Utc};
use futures_util::stream::{self, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::analytics::AnalyticsAccumulator;
use crate::config::PipelineConfig;
use crate::fetch::{ByteStream, FetchError, Fetcher};
use crate::handlers::{HandlerError, HandlerRegistry, PayerHandler};
use crate::identity;
use crate::normalize::{FileContext, Normalizer, NormalizerSettings, ResolutionMode};
use crate::output::{
    build_store, write_manifest, Batcher, ColumnWriter, EntityKind, EntityRow,
    ProcessingStatistics,
};
use crate::stream::{detect, DetectedStream, InNetworkStream, ParseError};
use crate::types::{PayerRow, ReportingPlan, TocEntry};

use super::state::{PayerEvent, PayerState};
use super::{PayerOutcome, PipelineError, RunReport};

/// One configured run: shared clients plus the payer endpoints to walk.
pub struct Pipeline {
    config: Arc<PipelineConfig>,
    registry: Arc<HandlerRegistry>,
    fetcher: Fetcher,
    writer: Arc<ColumnWriter>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        Self::with_registry(config, HandlerRegistry::with_builtins())
    }

    /// Build a pipeline with a caller-assembled handler registry.
    pub fn with_registry(
        config: PipelineConfig,
        registry: HandlerRegistry,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        let (store, prefix) = build_store(&config.output)?;
        let writer = Arc::new(ColumnWriter::new(
            store,
            prefix,
            config.processing.max_retries,
        ));
        let fetcher = Fetcher::new(
            Duration::from_secs(config.processing.request_timeout_secs),
            config.processing.max_retries,
        )?;
        Ok(Self {
            config: Arc::new(config),
            registry: Arc::new(registry),
            fetcher,
            writer,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every configured payer under the worker pool and fold the
    /// outcomes into a report. Never fails: post-construction problems are
    /// scoped to payers and recorded in the report.
    pub async fn execute(&self, cancel: CancellationToken) -> RunReport {
        let run_date = Utc::now().date_naive();
        info!(
            payers = self.config.payer_endpoints.len(),
            workers = self.config.processing.parallel_workers,
            %run_date,
            "starting pipeline run"
        );

        let workers = self.config.payer_endpoints.iter().map(|(name, url)| {
            PayerWorker::new(self, name.clone(), url.clone(), run_date, cancel.child_token())
        });

        let mut outcomes: Vec<PayerOutcome> = stream::iter(workers)
            .map(PayerWorker::run)
            .buffer_unordered(self.config.processing.parallel_workers)
            .collect()
            .await;
        outcomes.sort_by(|a, b| a.payer.cmp(&b.payer));

        let report = RunReport {
            run_date,
            payers: outcomes,
            cancelled: cancel.is_cancelled(),
        };
        info!(
            exit_code = report.exit_code(),
            truncated = report.truncated(),
            "pipeline run finished"
        );
        report
    }
}

/// How a single file's processing ended.
enum FileEnd {
    Complete,
    Truncated(&'static str),
}

/// Why a single file's processing failed. All variants except `Cancelled`
/// are scoped to the file: the payer moves on.
enum FileFailure {
    Cancelled,
    Fetch(FetchError),
    Parse(ParseError),
    Handler(HandlerError),
    /// The batcher side of the row channel is gone.
    Sink,
}

impl std::fmt::Display for FileFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileFailure::Cancelled => write!(f, "cancelled"),
            FileFailure::Fetch(e) => write!(f, "{e}"),
            FileFailure::Parse(e) => write!(f, "{e}"),
            FileFailure::Handler(e) => write!(f, "{e}"),
            FileFailure::Sink => write!(f, "row sink closed"),
        }
    }
}

/// Payer-fatal failures.
enum PayerFailure {
    Cancelled,
    Fatal(String),
}

/// Mutable state of one payer pipeline.
struct RunState {
    machine: PayerState,
    normalizer: Normalizer,
    analytics: AnalyticsAccumulator,
    records_processed: u64,
    files_discovered: u64,
    files_processed: u64,
    files_failed: u64,
    truncation: Option<&'static str>,
}

impl RunState {
    fn apply(&mut self, event: PayerEvent) {
        self.machine = self.machine.on(event);
    }
}

struct PayerWorker {
    config: Arc<PipelineConfig>,
    handler: Arc<dyn PayerHandler>,
    fetcher: Fetcher,
    writer: Arc<ColumnWriter>,
    cancel: CancellationToken,
    run_date: NaiveDate,
    payer_name: String,
    index_url: String,
    payer_uuid: Uuid,
    deadline: Option<Instant>,
}

impl PayerWorker {
    fn new(
        pipeline: &Pipeline,
        payer_name: String,
        index_url: String,
        run_date: NaiveDate,
        cancel: CancellationToken,
    ) -> Self {
        let deadline = pipeline
            .config
            .processing
            .max_processing_time_secs
            .map(|secs| Instant::now() + Duration::from_secs(secs));
        Self {
            handler: pipeline.registry.resolve(&payer_name),
            config: Arc::clone(&pipeline.config),
            fetcher: pipeline.fetcher.clone(),
            writer: Arc::clone(&pipeline.writer),
            cancel,
            run_date,
            payer_uuid: identity::payer_uuid(&payer_name, &index_url),
            payer_name,
            index_url,
            deadline,
        }
    }

    async fn run(self) -> PayerOutcome {
        let started_at = Utc::now();
        info!(payer = %self.payer_name, url = %self.index_url, "payer pipeline starting");

        let (tx, mut rx) = mpsc::channel::<EntityRow>(self.config.processing.batch_size.max(1));
        let batcher_task = {
            let writer = Arc::clone(&self.writer);
            let payer = self.payer_name.clone();
            let run_date = self.run_date;
            let batch_size = self.config.processing.batch_size;
            let memory_threshold = self.config.processing.memory_threshold_mb;
            tokio::spawn(async move {
                let mut batcher =
                    Batcher::new(writer, payer, run_date, batch_size, memory_threshold);
                while let Some(row) = rx.recv().await {
                    batcher.push(row).await;
                }
                batcher.flush_all().await;
                batcher
            })
        };

        let mut st = RunState {
            machine: PayerState::Init,
            normalizer: Normalizer::new(
                self.payer_uuid,
                self.payer_name.clone(),
                NormalizerSettings::from_config(&self.config),
            ),
            analytics: AnalyticsAccumulator::new(),
            records_processed: 0,
            files_discovered: 0,
            files_processed: 0,
            files_failed: 0,
            truncation: None,
        };
        st.apply(PayerEvent::Start);

        let failure = match self.drive(&mut st, &tx).await {
            Ok(()) => None,
            Err(PayerFailure::Cancelled) => {
                st.apply(PayerEvent::Cancelled);
                Some("cancelled".to_string())
            }
            Err(PayerFailure::Fatal(reason)) => Some(reason),
        };

        // FINALIZE: hand analytics to the batcher and let it drain. This
        // runs on every exit path so partial progress is flushed.
        for row in std::mem::take(&mut st.analytics).into_rows() {
            if tx.send(EntityRow::Analytics(row)).await.is_err() {
                break;
            }
        }
        drop(tx);

        let (rates, organizations, providers, write_failures) = match batcher_task.await {
            Ok(batcher) => (
                batcher.rows_written(EntityKind::Rates),
                batcher.rows_written(EntityKind::Organizations),
                batcher.rows_written(EntityKind::Providers),
                batcher.write_failures(),
            ),
            Err(e) => {
                warn!(payer = %self.payer_name, "batcher task failed: {e}");
                (0, 0, 0, 1)
            }
        };
        st.apply(PayerEvent::Finalized);

        let completed_at = Utc::now();
        let stats = ProcessingStatistics {
            payer: PayerRow {
                payer_uuid: self.payer_uuid,
                name: self.payer_name.clone(),
                index_url: self.index_url.clone(),
                last_scraped: completed_at,
            },
            run_date: self.run_date.format("%Y-%m-%d").to_string(),
            started_at,
            completed_at,
            truncated: st.truncation.is_some(),
            truncation_reason: st.truncation.map(str::to_string),
            failure: failure.clone(),
            files_discovered: st.files_discovered,
            files_processed: st.files_processed,
            files_failed: st.files_failed,
            records_processed: st.records_processed,
            rates_emitted: rates,
            organizations_emitted: organizations,
            providers_emitted: providers,
            write_failures,
            quality: st.normalizer.counters.clone(),
        };

        if let Err(e) = write_manifest(&self.writer, &stats).await {
            warn!(payer = %self.payer_name, "failed to write manifest: {e}");
        }

        info!(
            payer = %self.payer_name,
            files = st.files_processed,
            records = st.records_processed,
            rates,
            truncated = st.truncation.is_some(),
            "payer pipeline finished"
        );

        PayerOutcome {
            payer: self.payer_name.clone(),
            state: st.machine,
            truncated: st.truncation.is_some(),
            failure,
            stats,
        }
    }

    /// FETCH_TOC through the per-file loop. Returns when the payer is
    /// ready to finalize.
    async fn drive(
        &self,
        st: &mut RunState,
        sink: &mpsc::Sender<EntityRow>,
    ) -> Result<(), PayerFailure> {
        let index_stream = match self.fetcher.open(&self.index_url, &self.cancel).await {
            Ok(stream) => {
                st.apply(PayerEvent::TocFetched);
                stream
            }
            Err(FetchError::Cancelled) => return Err(PayerFailure::Cancelled),
            Err(e) => {
                // Transient retries already happened inside the fetcher.
                st.apply(PayerEvent::TocPermanentError);
                return Err(PayerFailure::Fatal(format!("index fetch failed: {e}")));
            }
        };

        let detected = match detect(index_stream).await {
            Ok(detected) => detected,
            Err(e) => {
                st.apply(PayerEvent::TocPermanentError);
                return Err(PayerFailure::Fatal(format!("index parse failed: {e}")));
            }
        };

        match detected {
            DetectedStream::InNetwork(in_network) => {
                debug!(payer = %self.payer_name, "endpoint is a direct in-network file");
                st.files_discovered = 1;
                st.apply(PayerEvent::FileYielded);
                st.apply(PayerEvent::FileFetched);
                st.apply(PayerEvent::FileParsed);
                match self
                    .process_stream(*in_network, self.index_url.clone(), None, st, sink)
                    .await
                {
                    Ok(FileEnd::Complete) => {
                        st.files_processed += 1;
                        st.apply(PayerEvent::FileWritten);
                        st.apply(PayerEvent::TocExhausted);
                    }
                    Ok(FileEnd::Truncated(reason)) => {
                        st.files_processed += 1;
                        st.truncation = Some(reason);
                        st.apply(PayerEvent::BudgetExhausted);
                    }
                    Err(FileFailure::Cancelled) => return Err(PayerFailure::Cancelled),
                    Err(e) => {
                        st.files_failed += 1;
                        st.apply(PayerEvent::FileFailed);
                        st.apply(PayerEvent::TocExhausted);
                        warn!(payer = %self.payer_name, "direct file failed: {e}");
                    }
                }
                Ok(())
            }
            DetectedStream::Toc(mut toc) => {
                loop {
                    if self.cancel.is_cancelled() {
                        return Err(PayerFailure::Cancelled);
                    }
                    if let Some(reason) = self.budget_breach(st) {
                        st.truncation = Some(reason);
                        st.apply(PayerEvent::BudgetExhausted);
                        return Ok(());
                    }

                    let entry = match toc.next_entry().await {
                        Ok(Some(entry)) => entry,
                        Ok(None) => {
                            st.apply(PayerEvent::TocExhausted);
                            return Ok(());
                        }
                        Err(e) if st.files_processed == 0 => {
                            st.apply(PayerEvent::TocPermanentError);
                            return Err(PayerFailure::Fatal(format!("index parse failed: {e}")));
                        }
                        Err(e) => {
                            // Late enumeration failure; keep what we have.
                            warn!(payer = %self.payer_name, "index enumeration ended early: {e}");
                            st.apply(PayerEvent::TocExhausted);
                            return Ok(());
                        }
                    };

                    let entry = match self.handler.preprocess_toc(entry) {
                        Ok(entry) => entry,
                        Err(e) => {
                            warn!(payer = %self.payer_name, "handler rejected TOC entry: {e}");
                            st.files_failed += 1;
                            continue;
                        }
                    };

                    st.files_discovered += 1;
                    st.apply(PayerEvent::FileYielded);
                    match self.process_file(entry, st, sink).await {
                        Ok(FileEnd::Complete) => {
                            st.files_processed += 1;
                            st.apply(PayerEvent::FileWritten);
                        }
                        Ok(FileEnd::Truncated(reason)) => {
                            st.files_processed += 1;
                            st.truncation = Some(reason);
                            st.apply(PayerEvent::BudgetExhausted);
                            return Ok(());
                        }
                        Err(FileFailure::Cancelled) => return Err(PayerFailure::Cancelled),
                        Err(e) => {
                            st.files_failed += 1;
                            st.apply(PayerEvent::FileFailed);
                            warn!(payer = %self.payer_name, "file failed: {e}");
                        }
                    }
                }
            }
        }
    }

    fn budget_breach(&self, st: &RunState) -> Option<&'static str> {
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Some("max_processing_time");
            }
        }
        if let Some(max) = self.config.processing.max_files_per_payer {
            if (st.files_processed + st.files_failed) as usize >= max {
                return Some("max_files_per_payer");
            }
        }
        None
    }

    async fn process_file(
        &self,
        entry: TocEntry,
        st: &mut RunState,
        sink: &mpsc::Sender<EntityRow>,
    ) -> Result<FileEnd, FileFailure> {
        let url = entry.in_network_url.clone();
        debug!(payer = %self.payer_name, %url, "processing in-network file");

        let bytes = match self.fetcher.open(&url, &self.cancel).await {
            Ok(bytes) => {
                st.apply(PayerEvent::FileFetched);
                bytes
            }
            Err(FetchError::Cancelled) => return Err(FileFailure::Cancelled),
            Err(e) => return Err(FileFailure::Fetch(e)),
        };

        let in_network = InNetworkStream::open(bytes)
            .await
            .map_err(FileFailure::Parse)?;
        st.apply(PayerEvent::FileParsed);

        self.process_stream(in_network, url, entry.plan, st, sink).await
    }

    /// Drain one opened in-network stream, running the deferred-reference
    /// second pass when the file's reference table trailed its items.
    async fn process_stream(
        &self,
        mut in_network: InNetworkStream<ByteStream>,
        url: String,
        plan: Option<ReportingPlan>,
        st: &mut RunState,
        sink: &mpsc::Sender<EntityRow>,
    ) -> Result<FileEnd, FileFailure> {
        let ctx = FileContext {
            source_url: url.clone(),
            header: in_network.header().clone(),
            plan,
            ingested_at: Utc::now(),
        };

        let deferred_before = st.normalizer.counters.deferred_references;
        let end = self
            .drain_items(&mut in_network, &ctx, ResolutionMode::Full, st, sink, true)
            .await?;
        st.apply(PayerEvent::FileNormalized);

        let deferred_delta = st.normalizer.counters.deferred_references - deferred_before;
        if matches!(end, FileEnd::Complete)
            && in_network.references_seen_late()
            && deferred_delta > 0
        {
            debug!(payer = %self.payer_name, %url, deferred = deferred_delta,
                "provider references trailed the items, running deferred pass");
            if let Err(e) = self.deferred_pass(&mut in_network, &ctx, &url, st, sink).await {
                match e {
                    FileFailure::Cancelled => return Err(FileFailure::Cancelled),
                    other => {
                        // First-pass output stands; the deferred blocks stay
                        // counted as deferred.
                        warn!(payer = %self.payer_name, %url, "deferred pass failed: {other}");
                    }
                }
            }
        }

        Ok(end)
    }

    async fn deferred_pass(
        &self,
        first_pass: &mut InNetworkStream<ByteStream>,
        ctx: &FileContext,
        url: &str,
        st: &mut RunState,
        sink: &mpsc::Sender<EntityRow>,
    ) -> Result<(), FileFailure> {
        let references = first_pass.take_references();

        let bytes = match self.fetcher.open(url, &self.cancel).await {
            Ok(bytes) => bytes,
            Err(FetchError::Cancelled) => return Err(FileFailure::Cancelled),
            Err(e) => return Err(FileFailure::Fetch(e)),
        };
        let mut second = InNetworkStream::open(bytes)
            .await
            .map_err(FileFailure::Parse)?;
        second.set_references(references);

        self.drain_items(&mut second, ctx, ResolutionMode::DeferredOnly, st, sink, false)
            .await?;
        Ok(())
    }

    /// The item loop: parse, adapt through the handler, normalize, send.
    /// Yields to the scheduler at every await; observes cancellation and
    /// budgets between items.
    async fn drain_items(
        &self,
        in_network: &mut InNetworkStream<ByteStream>,
        ctx: &FileContext,
        mode: ResolutionMode,
        st: &mut RunState,
        sink: &mpsc::Sender<EntityRow>,
        count_records: bool,
    ) -> Result<FileEnd, FileFailure> {
        let mut items_this_pass = 0u64;
        loop {
            if self.cancel.is_cancelled() {
                return Err(FileFailure::Cancelled);
            }
            if let Some(deadline) = self.deadline {
                if Instant::now() >= deadline {
                    return Ok(FileEnd::Truncated("max_processing_time"));
                }
            }
            if let Some(max) = self.config.processing.max_records_per_file {
                if items_this_pass >= max {
                    return Ok(FileEnd::Truncated("max_records_per_file"));
                }
            }

            let Some(item) = in_network.next_item().await.map_err(FileFailure::Parse)? else {
                return Ok(FileEnd::Complete);
            };
            items_this_pass += 1;
            if count_records {
                st.records_processed += 1;
            }

            let adapted = self
                .handler
                .parse_in_network(item)
                .map_err(FileFailure::Handler)?;

            for raw in adapted {
                let out = st
                    .normalizer
                    .normalize_item(&raw, ctx, mode, in_network.references());
                for row in out.rows {
                    if let EntityRow::Rate(rate) = &row {
                        st.analytics
                            .observe_national(&rate.service_code, rate.negotiated_rate);
                    }
                    if sink.send(row).await.is_err() {
                        return Err(FileFailure::Sink);
                    }
                }
            }
        }
    }
}
