//! Infrastructure contract lifecycle.
//!
//! Same shape as roaming agreements, plus `Settle`, which is independent of
//! `Execute` and keeps its own strictly increasing timestamp.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, EntityKind};
use crate::logging::structured::LogContext;
use crate::model::{
    check_contract_terms, strictly_after, ContractTerms, ContractType, InfrastructureContract,
    LifecycleStatus, NetworkRequirements,
};
use crate::rewards::validate_partner_id;
use crate::runtime::{Clock, IdGenerator};
use crate::settlement::{infrastructure_cost, usage_cost, InfrastructureCostResult, InfrastructureUsage};
use crate::storage::{PermissionedLedger, Versioned, VersionedRegistry};
use crate::{log_info, log_warn};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContractCommand {
    Activate,
    Suspend,
    Execute,
    Settle { usage: InfrastructureUsage },
    Terminate,
    Expire,
}

impl ContractCommand {
    fn name(&self) -> &'static str {
        match self {
            ContractCommand::Activate => "activate",
            ContractCommand::Suspend => "suspend",
            ContractCommand::Execute => "execute",
            ContractCommand::Settle { .. } => "settle",
            ContractCommand::Terminate => "terminate",
            ContractCommand::Expire => "expire",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ContractEffects {
    StatusChanged {
        from: LifecycleStatus,
        to: LifecycleStatus,
    },
    Executed {
        cost: f64,
    },
    Settled {
        settlement: InfrastructureCostResult,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewContract {
    pub partner_id: String,
    pub contract_type: ContractType,
    pub terms: ContractTerms,
    pub network_requirements: NetworkRequirements,
}

impl Versioned for InfrastructureContract {
    fn id(&self) -> &str {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

pub fn new_contract(id: &str, request: NewContract, now: DateTime<Utc>) -> CoreResult<InfrastructureContract> {
    validate_partner_id(&request.partner_id)?;
    check_contract_terms(&request.terms, &request.network_requirements)
        .map_err(|reason| CoreError::validation(id, reason))?;

    Ok(InfrastructureContract {
        id: id.to_string(),
        partner_id: request.partner_id,
        contract_type: request.contract_type,
        terms: request.terms,
        network_requirements: request.network_requirements,
        status: LifecycleStatus::Pending,
        creation_time: now,
        last_execution_time: now,
        last_settlement_time: None,
        termination_time: None,
        version: 1,
    })
}

fn require(
    state: &InfrastructureContract,
    now: DateTime<Utc>,
    allowed: &[LifecycleStatus],
    command: &str,
) -> CoreResult<()> {
    if !allowed.contains(&state.status) {
        return Err(CoreError::invalid_state(
            &state.id,
            format!("cannot {} while {}", command, state.status),
        ));
    }
    if state.is_expired(now) {
        return Err(CoreError::invalid_state(
            &state.id,
            format!("cannot {}: contract expired", command),
        ));
    }
    Ok(())
}

fn successor(state: &InfrastructureContract, status: LifecycleStatus) -> InfrastructureContract {
    InfrastructureContract {
        status,
        version: state.version + 1,
        ..state.clone()
    }
}

pub fn step(
    state: &InfrastructureContract,
    command: ContractCommand,
    now: DateTime<Utc>,
) -> CoreResult<(InfrastructureContract, ContractEffects)> {
    use LifecycleStatus::*;

    let from = state.status;
    let next = match command {
        ContractCommand::Activate => {
            require(state, now, &[Pending, Suspended], command.name())?;
            let mut next = successor(state, Active);
            next.last_execution_time = strictly_after(Some(state.last_execution_time), now);
            next
        }
        ContractCommand::Suspend => {
            require(state, now, &[Active], command.name())?;
            successor(state, Suspended)
        }
        ContractCommand::Execute => {
            require(state, now, &[Active], command.name())?;
            let mut next = successor(state, Active);
            next.last_execution_time = strictly_after(Some(state.last_execution_time), now);
            let cost = infrastructure_cost(&next);
            return Ok((next, ContractEffects::Executed { cost }));
        }
        ContractCommand::Settle { usage } => {
            require(state, now, &[Active], command.name())?;
            let mut next = successor(state, Active);
            next.last_settlement_time = Some(strictly_after(state.last_settlement_time, now));
            let settlement = usage_cost(&next, &usage);
            return Ok((next, ContractEffects::Settled { settlement }));
        }
        ContractCommand::Terminate => {
            if state.status != Active {
                return Err(CoreError::invalid_state(
                    &state.id,
                    format!("cannot terminate while {}", state.status),
                ));
            }
            let mut next = successor(state, Terminated);
            next.termination_time = Some(now);
            next
        }
        ContractCommand::Expire => {
            if state.status.is_terminal() {
                return Err(CoreError::invalid_state(
                    &state.id,
                    format!("cannot expire a {} contract", state.status),
                ));
            }
            if !state.is_expired(now) {
                return Err(CoreError::invalid_state(&state.id, "duration has not elapsed"));
            }
            successor(state, Expired)
        }
    };

    let effects = ContractEffects::StatusChanged {
        from,
        to: next.status,
    };
    Ok((next, effects))
}

pub struct ContractRegistry {
    versions: VersionedRegistry<InfrastructureContract>,
    ledger: Arc<dyn PermissionedLedger>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl ContractRegistry {
    pub fn new(ledger: Arc<dyn PermissionedLedger>, clock: Arc<dyn Clock>, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            versions: VersionedRegistry::new(EntityKind::Contract),
            ledger,
            clock,
            ids,
        }
    }

    pub fn create(&self, request: NewContract) -> CoreResult<InfrastructureContract> {
        let id = self.ids.next_id("ctr");
        let contract = new_contract(&id, request, self.clock.now())?;
        self.ledger.record_contract(&contract)?;
        self.versions.insert(contract.clone())?;

        log_info!(
            LogContext::new("contracts").with_item(&id),
            "CONTRACT_CREATED",
            partner = contract.partner_id,
            contract_type = contract.contract_type.as_str()
        );
        Ok(contract)
    }

    pub fn apply(
        &self,
        id: &str,
        command: ContractCommand,
    ) -> CoreResult<(InfrastructureContract, ContractEffects)> {
        let now = self.clock.now();
        let ctx = LogContext::new("contracts").with_item(id);
        let result = self.versions.apply(id, |current| {
            let (next, effects) = step(current, command, now)?;
            match &effects {
                ContractEffects::Settled { settlement } => {
                    self.ledger.record_settlement(&next, settlement)?
                }
                _ => self.ledger.record_contract(&next)?,
            }
            Ok((next, effects))
        });

        match &result {
            Ok((next, _)) => {
                log_info!(
                    ctx,
                    "CONTRACT_COMMAND_APPLIED",
                    command = command.name(),
                    status = next.status,
                    version = next.version
                );
            }
            Err(e) => {
                log_warn!(
                    ctx,
                    "CONTRACT_COMMAND_REJECTED",
                    command = command.name(),
                    error = e.to_string()
                );
            }
        }
        result
    }

    pub fn activate(&self, id: &str) -> CoreResult<InfrastructureContract> {
        self.apply(id, ContractCommand::Activate).map(|(c, _)| c)
    }

    pub fn suspend(&self, id: &str) -> CoreResult<InfrastructureContract> {
        self.apply(id, ContractCommand::Suspend).map(|(c, _)| c)
    }

    /// Returns the new version and the infrastructure cost for this execution.
    pub fn execute(&self, id: &str) -> CoreResult<(InfrastructureContract, f64)> {
        let (contract, effects) = self.apply(id, ContractCommand::Execute)?;
        let cost = match effects {
            ContractEffects::Executed { cost } => cost,
            _ => 0.0,
        };
        Ok((contract, cost))
    }

    pub fn settle(
        &self,
        id: &str,
        usage: InfrastructureUsage,
    ) -> CoreResult<(InfrastructureContract, InfrastructureCostResult)> {
        let (contract, effects) = self.apply(id, ContractCommand::Settle { usage })?;
        match effects {
            ContractEffects::Settled { settlement } => Ok((contract, settlement)),
            _ => Err(CoreError::invalid_state(id, "settle produced no settlement")),
        }
    }

    pub fn terminate(&self, id: &str) -> CoreResult<InfrastructureContract> {
        self.apply(id, ContractCommand::Terminate).map(|(c, _)| c)
    }

    pub fn expire(&self, id: &str) -> CoreResult<InfrastructureContract> {
        self.apply(id, ContractCommand::Expire).map(|(c, _)| c)
    }

    pub fn get(&self, id: &str) -> CoreResult<InfrastructureContract> {
        self.versions
            .current(id)
            .ok_or_else(|| CoreError::not_found(EntityKind::Contract, id))
    }

    pub fn history(&self, id: &str) -> CoreResult<Vec<InfrastructureContract>> {
        self.versions
            .history(id)
            .ok_or_else(|| CoreError::not_found(EntityKind::Contract, id))
    }

    pub fn active(&self, now: DateTime<Utc>) -> Vec<InfrastructureContract> {
        let mut active: Vec<InfrastructureContract> = self
            .versions
            .list_current()
            .into_iter()
            .filter(|c| c.status_at(now) == LifecycleStatus::Active)
            .collect();
        active.sort_by(|a, b| a.id.cmp(&b.id));
        active
    }

    pub fn sweep_expired(&self, now: DateTime<Utc>) -> Vec<String> {
        let mut candidates: Vec<String> = self
            .versions
            .list_current()
            .into_iter()
            .filter(|c| !c.status.is_terminal() && c.is_expired(now))
            .map(|c| c.id)
            .collect();
        candidates.sort();
        candidates
            .into_iter()
            .filter(|id| self.apply(id, ContractCommand::Expire).is_ok())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}
