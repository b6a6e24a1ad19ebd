//! Migration of aggregates to the permissioned ledger.
//!
//! Each aggregate is retried on its own; a failure is recorded in the batch
//! result and never aborts the rest of the batch.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::CoreResult;
use crate::model::{RegionLabel, RegionalAggregate, StoredAggregate};
use crate::runtime::Clock;
use crate::storage::PermissionedLedger;
use crate::{log_debug, log_info, log_warn};

use super::context::RunContext;
use super::retry::RetryPolicy;

/// Outcome for one aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationItemResult {
    pub region: RegionLabel,
    pub content_hash: String,
    pub record_id: Option<String>,
    pub attempts: u32,
    pub error: Option<String>,
}

impl MigrationItemResult {
    pub fn succeeded(&self) -> bool {
        self.record_id.is_some()
    }
}

/// Result of a migration batch.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationResult {
    /// Aggregates handed to the batch.
    pub total: usize,
    pub success_count: usize,
    pub failure_count: usize,
    /// Aggregates not attempted because the run was cancelled or hit its
    /// deadline.
    pub deferred_count: usize,
    pub per_item_results: Vec<MigrationItemResult>,
}

/// Everything a batch produced, including what must be kept for later.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub result: MigrationResult,
    pub migrated: Vec<StoredAggregate>,
    /// Failed and deferred aggregates, in their original order.
    pub unmigrated: Vec<RegionalAggregate>,
}

pub struct Migrator {
    ledger: Arc<dyn PermissionedLedger>,
    clock: Arc<dyn Clock>,
    policy: RetryPolicy,
}

impl Migrator {
    pub fn new(ledger: Arc<dyn PermissionedLedger>, clock: Arc<dyn Clock>, policy: RetryPolicy) -> Self {
        Self {
            ledger,
            clock,
            policy,
        }
    }

    /// Migrate one aggregate with retries. The content hash is the ledger's
    /// dedup key, so a retry after an ambiguous failure cannot create a second
    /// record.
    pub fn migrate(&self, ctx: &RunContext, aggregate: &RegionalAggregate) -> CoreResult<MigrationItemResult> {
        let log_ctx = ctx.region_context(&aggregate.label());
        let content_hash = aggregate.content_hash()?;
        let max_attempts = self.policy.max_attempts.max(1);

        let mut attempts = 0;
        let mut last_error = None;
        while attempts < max_attempts {
            attempts += 1;
            match self.ledger.create_network_data_record(aggregate, &content_hash) {
                Ok(record_id) => {
                    log_debug!(log_ctx, "AGGREGATE_MIGRATED", record_id = record_id, attempts = attempts);
                    return Ok(MigrationItemResult {
                        region: aggregate.label(),
                        content_hash,
                        record_id: Some(record_id),
                        attempts,
                        error: None,
                    });
                }
                Err(e) => {
                    log_warn!(log_ctx, "MIGRATION_ATTEMPT_FAILED", attempt = attempts, error = e.to_string());
                    last_error = Some(e.to_string());
                    if attempts < max_attempts {
                        self.clock.sleep(self.policy.strategy.delay_for_attempt(attempts));
                    }
                }
            }
        }

        Ok(MigrationItemResult {
            region: aggregate.label(),
            content_hash,
            record_id: None,
            attempts,
            error: last_error,
        })
    }

    /// Migrate aggregates in order, stopping between items once the run is
    /// cancelled or past its deadline.
    pub fn migrate_batch(&self, ctx: &RunContext, aggregates: Vec<RegionalAggregate>) -> BatchOutcome {
        let mut outcome = BatchOutcome {
            result: MigrationResult {
                total: aggregates.len(),
                ..MigrationResult::default()
            },
            ..BatchOutcome::default()
        };

        let mut queue = aggregates.into_iter();
        for aggregate in queue.by_ref() {
            if ctx.should_stop(self.clock.now()) {
                outcome.result.deferred_count += 1;
                outcome.unmigrated.push(aggregate);
                break;
            }

            let item = match self.migrate(ctx, &aggregate) {
                Ok(item) => item,
                Err(e) => MigrationItemResult {
                    region: aggregate.label(),
                    content_hash: String::new(),
                    record_id: None,
                    attempts: 0,
                    error: Some(e.to_string()),
                },
            };

            match &item.record_id {
                Some(record_id) => {
                    outcome.result.success_count += 1;
                    outcome.migrated.push(StoredAggregate {
                        record_id: record_id.clone(),
                        content_hash: item.content_hash.clone(),
                        aggregate,
                    });
                }
                None => {
                    outcome.result.failure_count += 1;
                    outcome.unmigrated.push(aggregate);
                }
            }
            outcome.result.per_item_results.push(item);
        }

        for aggregate in queue {
            outcome.result.deferred_count += 1;
            outcome.unmigrated.push(aggregate);
        }

        log_info!(
            ctx.log_context(),
            "MIGRATION_BATCH_COMPLETE",
            total = outcome.result.total,
            succeeded = outcome.result.success_count,
            failed = outcome.result.failure_count,
            deferred = outcome.result.deferred_count
        );
        outcome
    }
}
