//! Batch migration orchestrator
//!
//! Drives one run end to end: builds the variant map, walks the source
//! store's orders page by page, submits each page in fixed-size batches and
//! records one ledger row per order. Orders are processed strictly one after
//! another so that the destination's rate state is always current.

use std::sync::Arc;

use serde_json::Value;

use shared::logging::{log_error, log_startup, log_success};
use shared::{OutcomeRecord, RunId, run_debug, run_info, run_warn};

use crate::config::MigrationConfig;
use crate::core::paginator::{CursorPaginator, Page};
use crate::core::rate_governor::RateGovernor;
use crate::core::transformer::{OrderTransformer, order_id_of};
use crate::core::variant_mapper::{VariantIdentityMapper, VariantMap};
use crate::error::{ErrorKind, MigrationError, MigrationResult};
use crate::traits::{OutcomeLedger, Sleeper, StoreApi};
use crate::types::{RunPhase, RunSummary};

/// Path orders are created at on the destination store
pub const ORDER_CREATE_PATH: &str = "/orders.json";

/// One migration run from `source` to `destination`
pub struct BatchMigrationOrchestrator<S, D, L>
where
    S: StoreApi,
    D: StoreApi,
    L: OutcomeLedger,
{
    run_id: RunId,
    source: S,
    destination: D,
    ledger: L,
    config: MigrationConfig,
    governor: RateGovernor,
    transformer: OrderTransformer,
    sleeper: Arc<dyn Sleeper>,
    summary: RunSummary,
}

impl<S, D, L> BatchMigrationOrchestrator<S, D, L>
where
    S: StoreApi,
    D: StoreApi,
    L: OutcomeLedger,
{
    pub fn new(run_id: RunId, source: S, destination: D, ledger: L, config: MigrationConfig, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            run_id,
            governor: RateGovernor::new(config.governor.clone()),
            source,
            destination,
            ledger,
            config,
            transformer: OrderTransformer::default(),
            sleeper,
            summary: RunSummary::new(run_id),
        }
    }

    pub fn with_transformer(mut self, transformer: OrderTransformer) -> Self {
        self.transformer = transformer;
        self
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn phase(&self) -> RunPhase {
        self.summary.phase
    }

    /// Counters so far; final once `run` returned
    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// Execute the run to completion
    ///
    /// Per-order failures are recorded and never abort the run. Map-building
    /// failures, transport failures on submission and ledger failures do, and
    /// leave the run in [`RunPhase::Failed`]. A run is never retried here.
    pub async fn run(&mut self) -> MigrationResult<RunSummary> {
        if matches!(self.summary.phase, RunPhase::Done | RunPhase::Failed) {
            return Err(MigrationError::config(format!("run {} already finished", self.run_id)));
        }

        log_startup(
            &self.run_id,
            &format!(
                "order migration {} -> {}",
                self.source.store_label(),
                self.destination.store_label()
            ),
        );

        let outcome = match self.config.validate() {
            Ok(()) => self.execute().await,
            Err(error) => Err(error),
        };

        match outcome {
            Ok(()) => {
                advance(self.run_id, &mut self.summary, RunPhase::Done);
                log_success(
                    &self.run_id,
                    &format!(
                        "Migrated {} orders, {} failed ({} unmapped, {} rate limited) over {} pages",
                        self.summary.succeeded,
                        self.summary.failed,
                        self.summary.unmapped,
                        self.summary.rate_limited,
                        self.summary.pages
                    ),
                );
                Ok(self.summary.clone())
            }
            Err(error) => {
                advance(self.run_id, &mut self.summary, RunPhase::Failed);
                log_error(&self.run_id, "Migration run", &error);
                if let Some(last) = &self.summary.last_migrated_order {
                    run_warn!(self.run_id, "Last migrated order before failure: {}", last);
                }
                Err(error)
            }
        }
    }

    async fn execute(&mut self) -> MigrationResult<()> {
        let Self {
            run_id,
            source,
            destination,
            ledger,
            config,
            governor,
            transformer,
            sleeper,
            summary,
        } = self;
        let run_id = *run_id;

        let mapper = VariantIdentityMapper::new(config.page_size, config.page_retry.clone(), sleeper.clone());
        let map = mapper.build(&mut *source, &mut *destination).await?;
        summary.variants_mapped = map.len();
        if map.is_empty() {
            run_warn!(run_id, "⚠️ No variants matched by SKU, every order will be recorded as unmapped");
        }

        advance(run_id, summary, RunPhase::Paginating);
        let mut orders = CursorPaginator::new(&mut *source, "orders", sleeper.clone())
            .with_page_size(config.page_size)
            .with_filter("status", config.order_status.clone())
            .with_failure_policy(config.order_page_failure)
            .with_retry(config.page_retry.clone());

        let mut submitter = BatchSubmitter {
            run_id,
            destination: &mut *destination,
            ledger: &*ledger,
            config: &*config,
            governor: &*governor,
            transformer: &*transformer,
            sleeper: &**sleeper,
            summary: &mut *summary,
        };

        while let Some(page) = orders.next_page().await? {
            submitter.summary.pages += 1;
            submitter.submit_page(page, &map).await?;
        }

        Ok(())
    }
}

fn advance(run_id: RunId, summary: &mut RunSummary, next: RunPhase) {
    if summary.phase == next {
        return;
    }
    debug_assert!(
        summary.phase.can_transition_to(next),
        "illegal phase change {} -> {}",
        summary.phase,
        next
    );
    run_debug!(run_id, "🔀 Phase {} -> {}", summary.phase, next);
    summary.phase = next;
}

/// Submission side of a run, borrowing the parts the order walk does not
struct BatchSubmitter<'r, D: StoreApi, L: OutcomeLedger> {
    run_id: RunId,
    destination: &'r mut D,
    ledger: &'r L,
    config: &'r MigrationConfig,
    governor: &'r RateGovernor,
    transformer: &'r OrderTransformer,
    sleeper: &'r dyn Sleeper,
    summary: &'r mut RunSummary,
}

impl<D: StoreApi, L: OutcomeLedger> BatchSubmitter<'_, D, L> {
    async fn submit_page(&mut self, page: Page, map: &VariantMap) -> MigrationResult<()> {
        if page.is_empty() {
            return Ok(());
        }

        let batch_size = self.config.batch_size;
        let batches = page.len().div_ceil(batch_size);
        let page_number = self.summary.pages;
        let mut orders = page.into_iter();

        for batch in 1..=batches {
            advance(self.run_id, self.summary, RunPhase::Submitting);
            for raw in orders.by_ref().take(batch_size) {
                self.submit_order(raw, map).await?;
            }

            advance(self.run_id, self.summary, RunPhase::Pacing);
            let pause = self
                .governor
                .batch_pause(&self.destination.rate_state(), self.config.batch_delay);
            run_info!(
                self.run_id,
                "⏸️ Page {} batch {}/{} done ({} ok, {} failed so far), pausing {}ms",
                page_number,
                batch,
                batches,
                self.summary.succeeded,
                self.summary.failed,
                pause.as_millis()
            );
            self.sleeper.sleep(pause).await;
        }

        advance(self.run_id, self.summary, RunPhase::Paginating);
        Ok(())
    }

    /// Transform, submit and record one order
    ///
    /// Returns `Err` only for failures that must end the run.
    async fn submit_order(&mut self, raw: Value, map: &VariantMap) -> MigrationResult<()> {
        self.summary.orders_seen += 1;
        let order_id = order_id_of(&raw);

        let body = match self
            .transformer
            .transform_value(raw, map)
            .and_then(|payload| payload.to_request_body())
        {
            Ok(body) => body,
            Err(error) => {
                if error.kind() == ErrorKind::MissingVariantMapping {
                    self.summary.unmapped += 1;
                }
                run_warn!(self.run_id, "⏭️ Skipping order {}: {}", order_id, error);
                return self.record_failure(&order_id, &error).await;
            }
        };

        match self.destination.post(ORDER_CREATE_PATH, &body).await {
            Ok(response) => {
                let created = created_order_id(&response.body);
                run_debug!(
                    self.run_id,
                    "✅ Order {} created as {}",
                    order_id,
                    created.as_deref().unwrap_or("<unknown>")
                );
                self.record(OutcomeRecord::success(order_id.clone(), self.run_id, created))
                    .await?;
                self.summary.last_migrated_order = Some(order_id);
            }
            Err(error) => {
                self.record_failure(&order_id, &error).await?;
                match error.kind() {
                    ErrorKind::TransientRateLimit => {
                        self.summary.rate_limited += 1;
                        let wait = error.retry_after().unwrap_or(self.config.default_retry_after);
                        run_warn!(
                            self.run_id,
                            "🚦 Rate limited on order {}, waiting {}ms",
                            order_id,
                            wait.as_millis()
                        );
                        self.sleeper.sleep(wait).await;
                    }
                    ErrorKind::TransportFailure => return Err(error),
                    _ => run_warn!(self.run_id, "❌ Order {} rejected: {}", order_id, error),
                }
            }
        }

        self.sleeper.sleep(self.config.item_delay).await;
        Ok(())
    }

    async fn record_failure(&mut self, order_id: &str, error: &MigrationError) -> MigrationResult<()> {
        self.record(OutcomeRecord::failed(order_id, self.run_id, error.ledger_detail()))
            .await
    }

    async fn record(&mut self, record: OutcomeRecord) -> MigrationResult<()> {
        let success = record.is_success();
        self.ledger.append(record).await?;
        if success {
            self.summary.succeeded += 1;
        } else {
            self.summary.failed += 1;
        }
        Ok(())
    }
}

/// Id the destination assigned to a created order
fn created_order_id(body: &Value) -> Option<String> {
    match body.get("order")?.get("id")? {
        Value::Number(id) => Some(id.to_string()),
        Value::String(id) => Some(id.clone()),
        _ => None,
    }
}
