//! Permissioned-layer collaborator.
//!
//! The core only writes wire-format JSON records here; consensus, signing and
//! custody live on the other side of this trait. [`InMemoryLedger`] is the
//! simulated ledger used by the simulation binary and the tests.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::error::{CoreError, CoreResult};
use crate::log_debug;
use crate::logging::structured::LogContext;
use crate::model::{InfrastructureContract, RegionalAggregate, RoamingAgreement, StoredAggregate};
use crate::runtime::IdGenerator;
use crate::settlement::InfrastructureCostResult;

pub trait PermissionedLedger: Send + Sync {
    /// Record an anonymized aggregate and return its record id. Submitting the
    /// same content hash again returns the original id.
    fn create_network_data_record(
        &self,
        aggregate: &RegionalAggregate,
        content_hash: &str,
    ) -> CoreResult<String>;

    /// Record a new version of a roaming agreement.
    fn record_agreement(&self, agreement: &RoamingAgreement) -> CoreResult<()>;

    /// Record a new version of an infrastructure contract.
    fn record_contract(&self, contract: &InfrastructureContract) -> CoreResult<()>;

    /// Record a settled contract version together with its settlement. Both
    /// are written or neither is.
    fn record_settlement(
        &self,
        contract: &InfrastructureContract,
        settlement: &InfrastructureCostResult,
    ) -> CoreResult<()>;
}

#[derive(Debug, Default)]
struct LedgerState {
    aggregates: HashMap<String, StoredAggregate>,
    by_hash: HashMap<String, String>,
    agreements: Vec<Value>,
    contracts: Vec<Value>,
    settlements: Vec<Value>,
    fail_next: u32,
    unavailable: bool,
}

pub struct InMemoryLedger {
    ids: Arc<dyn IdGenerator>,
    state: Mutex<LedgerState>,
}

impl InMemoryLedger {
    pub fn new(ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            ids,
            state: Mutex::new(LedgerState::default()),
        }
    }

    /// Make the next `n` aggregate writes fail.
    pub fn fail_next(&self, n: u32) {
        self.state.lock().fail_next = n;
    }

    /// Reject every write until called again with `false`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unavailable = unavailable;
    }

    pub fn aggregate(&self, record_id: &str) -> Option<StoredAggregate> {
        self.state.lock().aggregates.get(record_id).cloned()
    }

    pub fn aggregate_count(&self) -> usize {
        self.state.lock().aggregates.len()
    }

    /// Every agreement version written, in write order.
    pub fn agreement_records(&self) -> Vec<Value> {
        self.state.lock().agreements.clone()
    }

    pub fn contract_records(&self) -> Vec<Value> {
        self.state.lock().contracts.clone()
    }

    pub fn settlement_records(&self) -> Vec<Value> {
        self.state.lock().settlements.clone()
    }

    fn check_available(state: &LedgerState) -> CoreResult<()> {
        if state.unavailable {
            return Err(CoreError::Ledger("ledger unavailable".to_string()));
        }
        Ok(())
    }
}

impl PermissionedLedger for InMemoryLedger {
    fn create_network_data_record(
        &self,
        aggregate: &RegionalAggregate,
        content_hash: &str,
    ) -> CoreResult<String> {
        let mut state = self.state.lock();
        Self::check_available(&state)?;

        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(CoreError::Ledger(format!(
                "transient write failure for region {}",
                aggregate.label()
            )));
        }

        if let Some(existing) = state.by_hash.get(content_hash) {
            log_debug!(
                LogContext::new("ledger").with_item(existing),
                "LEDGER_DEDUP",
                hash = &content_hash[..content_hash.len().min(12)]
            );
            return Ok(existing.clone());
        }

        let record_id = self.ids.next_id("ndr");
        state
            .by_hash
            .insert(content_hash.to_string(), record_id.clone());
        state.aggregates.insert(
            record_id.clone(),
            StoredAggregate {
                record_id: record_id.clone(),
                content_hash: content_hash.to_string(),
                aggregate: aggregate.clone(),
            },
        );
        Ok(record_id)
    }

    fn record_agreement(&self, agreement: &RoamingAgreement) -> CoreResult<()> {
        let value = serde_json::to_value(agreement)?;
        let mut state = self.state.lock();
        Self::check_available(&state)?;
        state.agreements.push(value);
        Ok(())
    }

    fn record_contract(&self, contract: &InfrastructureContract) -> CoreResult<()> {
        let value = serde_json::to_value(contract)?;
        let mut state = self.state.lock();
        Self::check_available(&state)?;
        state.contracts.push(value);
        Ok(())
    }

    fn record_settlement(
        &self,
        contract: &InfrastructureContract,
        settlement: &InfrastructureCostResult,
    ) -> CoreResult<()> {
        let version = serde_json::to_value(contract)?;
        let value = serde_json::json!({
            "contractId": contract.id,
            "version": contract.version,
            "settlement": serde_json::to_value(settlement)?,
        });
        let mut state = self.state.lock();
        Self::check_available(&state)?;
        state.contracts.push(version);
        state.settlements.push(value);
        Ok(())
    }
}
