//! Roaming agreement lifecycle.
//!
//! `step` is the single chokepoint for transitions: it takes one version and a
//! command and returns the successor plus the effects to report. Guards run
//! before anything is built, so a rejected command produces nothing.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, EntityKind};
use crate::logging::structured::LogContext;
use crate::model::{
    strictly_after, AgreementTerms, LifecycleStatus, NetworkDataSnapshot, Region, RoamingAgreement,
};
use crate::rewards::validate_partner_id;
use crate::runtime::{Clock, IdGenerator};
use crate::settlement::agreement_revenue;
use crate::storage::{PermissionedLedger, Versioned, VersionedRegistry};
use crate::{log_info, log_warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgreementCommand {
    Activate,
    Suspend,
    Execute,
    Terminate,
    Expire,
}

/// Reported to the caller; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum AgreementEffects {
    StatusChanged {
        from: LifecycleStatus,
        to: LifecycleStatus,
    },
    Executed {
        revenue: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAgreement {
    pub partner_id: String,
    pub region: Region,
    pub terms: AgreementTerms,
    pub network_data: NetworkDataSnapshot,
}

impl Versioned for RoamingAgreement {
    fn id(&self) -> &str {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Build the first version. Terms are validated; nothing is stored.
pub fn new_agreement(id: &str, request: NewAgreement, now: DateTime<Utc>) -> CoreResult<RoamingAgreement> {
    validate_partner_id(&request.partner_id)?;
    request
        .terms
        .check()
        .map_err(|reason| CoreError::validation(id, reason))?;

    Ok(RoamingAgreement {
        id: id.to_string(),
        partner_id: request.partner_id,
        region: request.region,
        terms: request.terms,
        network_data: request.network_data,
        status: LifecycleStatus::Pending,
        creation_time: now,
        last_execution_time: now,
        termination_time: None,
        version: 1,
    })
}

fn guard(state: &RoamingAgreement, now: DateTime<Utc>, allowed: &[LifecycleStatus], command: &str) -> CoreResult<()> {
    if state.status.is_terminal() {
        return Err(CoreError::invalid_state(
            &state.id,
            format!("cannot {} a {} agreement", command, state.status),
        ));
    }
    if !allowed.contains(&state.status) {
        return Err(CoreError::invalid_state(
            &state.id,
            format!("cannot {} while {}", command, state.status),
        ));
    }
    if state.is_expired(now) {
        return Err(CoreError::invalid_state(
            &state.id,
            format!("cannot {}: agreement expired", command),
        ));
    }
    Ok(())
}

fn successor(state: &RoamingAgreement, status: LifecycleStatus) -> RoamingAgreement {
    RoamingAgreement {
        status,
        version: state.version + 1,
        ..state.clone()
    }
}

pub fn step(
    state: &RoamingAgreement,
    command: AgreementCommand,
    now: DateTime<Utc>,
) -> CoreResult<(RoamingAgreement, AgreementEffects)> {
    use LifecycleStatus::*;

    let from = state.status;
    let next = match command {
        AgreementCommand::Activate => {
            guard(state, now, &[Pending, Suspended], "activate")?;
            let mut next = successor(state, Active);
            next.last_execution_time = strictly_after(Some(state.last_execution_time), now);
            next
        }
        AgreementCommand::Suspend => {
            guard(state, now, &[Active], "suspend")?;
            successor(state, Suspended)
        }
        AgreementCommand::Execute => {
            guard(state, now, &[Active], "execute")?;
            let mut next = successor(state, Active);
            next.last_execution_time = strictly_after(Some(state.last_execution_time), now);
            let revenue = agreement_revenue(&next);
            return Ok((next, AgreementEffects::Executed { revenue }));
        }
        AgreementCommand::Terminate => {
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
        AgreementCommand::Expire => {
            if state.status.is_terminal() {
                return Err(CoreError::invalid_state(
                    &state.id,
                    format!("cannot expire a {} agreement", state.status),
                ));
            }
            if !state.is_expired(now) {
                return Err(CoreError::invalid_state(&state.id, "duration has not elapsed"));
            }
            successor(state, Expired)
        }
    };

    let effects = AgreementEffects::StatusChanged {
        from,
        to: next.status,
    };
    Ok((next, effects))
}

/// Agreement store. Commands on one id are serialized; a version is committed
/// only after the permissioned ledger accepted it.
pub struct AgreementRegistry {
    versions: VersionedRegistry<RoamingAgreement>,
    ledger: Arc<dyn PermissionedLedger>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl AgreementRegistry {
    pub fn new(ledger: Arc<dyn PermissionedLedger>, clock: Arc<dyn Clock>, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            versions: VersionedRegistry::new(EntityKind::Agreement),
            ledger,
            clock,
            ids,
        }
    }

    pub fn create(&self, request: NewAgreement) -> CoreResult<RoamingAgreement> {
        let id = self.ids.next_id("agr");
        let agreement = new_agreement(&id, request, self.clock.now())?;
        self.ledger.record_agreement(&agreement)?;
        self.versions.insert(agreement.clone())?;

        log_info!(
            LogContext::new("agreements").with_item(&id),
            "AGREEMENT_CREATED",
            partner = agreement.partner_id,
            region = agreement.region.label().to_string()
        );
        Ok(agreement)
    }

    pub fn apply(&self, id: &str, command: AgreementCommand) -> CoreResult<(RoamingAgreement, AgreementEffects)> {
        let now = self.clock.now();
        let ctx = LogContext::new("agreements").with_item(id);
        let result = self.versions.apply(id, |current| {
            let (next, effects) = step(current, command, now)?;
            self.ledger.record_agreement(&next)?;
            Ok((next, effects))
        });

        match &result {
            Ok((next, _)) => {
                log_info!(
                    ctx,
                    "AGREEMENT_COMMAND_APPLIED",
                    command = command,
                    status = next.status,
                    version = next.version
                );
            }
            Err(e) => {
                log_warn!(ctx, "AGREEMENT_COMMAND_REJECTED", command = command, error = e.to_string());
            }
        }
        result
    }

    pub fn activate(&self, id: &str) -> CoreResult<RoamingAgreement> {
        self.apply(id, AgreementCommand::Activate).map(|(a, _)| a)
    }

    pub fn suspend(&self, id: &str) -> CoreResult<RoamingAgreement> {
        self.apply(id, AgreementCommand::Suspend).map(|(a, _)| a)
    }

    /// Returns the new version and the revenue computed for this execution.
    pub fn execute(&self, id: &str) -> CoreResult<(RoamingAgreement, f64)> {
        let (agreement, effects) = self.apply(id, AgreementCommand::Execute)?;
        let revenue = match effects {
            AgreementEffects::Executed { revenue } => revenue,
            AgreementEffects::StatusChanged { .. } => 0.0,
        };
        Ok((agreement, revenue))
    }

    pub fn terminate(&self, id: &str) -> CoreResult<RoamingAgreement> {
        self.apply(id, AgreementCommand::Terminate).map(|(a, _)| a)
    }

    pub fn expire(&self, id: &str) -> CoreResult<RoamingAgreement> {
        self.apply(id, AgreementCommand::Expire).map(|(a, _)| a)
    }

    pub fn get(&self, id: &str) -> CoreResult<RoamingAgreement> {
        self.versions
            .current(id)
            .ok_or_else(|| CoreError::not_found(EntityKind::Agreement, id))
    }

    pub fn history(&self, id: &str) -> CoreResult<Vec<RoamingAgreement>> {
        self.versions
            .history(id)
            .ok_or_else(|| CoreError::not_found(EntityKind::Agreement, id))
    }

    /// Agreements that read as ACTIVE at `now`, sorted by id.
    pub fn active(&self, now: DateTime<Utc>) -> Vec<RoamingAgreement> {
        let mut active: Vec<RoamingAgreement> = self
            .versions
            .list_current()
            .into_iter()
            .filter(|a| a.status_at(now) == LifecycleStatus::Active)
            .collect();
        active.sort_by(|a, b| a.id.cmp(&b.id));
        active
    }

    /// Persist EXPIRED for every non-terminal agreement past its duration.
    /// Returns the ids that were expired.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> Vec<String> {
        let mut candidates: Vec<String> = self
            .versions
            .list_current()
            .into_iter()
            .filter(|a| !a.status.is_terminal() && a.is_expired(now))
            .map(|a| a.id)
            .collect();
        candidates.sort();
        candidates
            .into_iter()
            .filter(|id| self.apply(id, AgreementCommand::Expire).is_ok())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}
