//! Restriction gate: per-environment quota check run before admission.
//!
//! Counts every machine operation ever recorded under the template, groups the
//! counts by the machine's environment, and fails when any environment with a
//! limit `L > 0` already holds `>= L` rows. Machines without an environment,
//! and machines that no longer exist, are exempt.
//!
//! The check reads committed rows only and reserves nothing. Two callers can
//! both pass it and jointly overshoot; `OperationAdmitter` serializes
//! admissions per template within one process.

use std::collections::HashMap;
use std::sync::Arc;

use db::{Store, models::OperationTemplateRow};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::{EngineError, RestrictionSet};

pub struct RestrictionGate {
    store: Arc<dyn Store>,
}

impl RestrictionGate {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Admit or refuse `candidate_machine_ids` under the template's restrictions.
    ///
    /// # Errors
    /// - [`EngineError::QuotaExceeded`] naming the first exhausted environment.
    #[instrument(
        skip(self, template, candidate_machine_ids),
        fields(template_id = %template.id, candidates = candidate_machine_ids.len())
    )]
    pub async fn check(
        &self,
        template: &OperationTemplateRow,
        candidate_machine_ids: &[Uuid],
    ) -> Result<(), EngineError> {
        let restrictions = RestrictionSet::new(self.store.list_restrictions(template.id).await?);
        let limits = restrictions.active_limits();
        if limits.is_empty() {
            debug!("no active restrictions");
            return Ok(());
        }

        let per_machine = self.store.machine_operation_counts(template.id).await?;
        let machine_ids: Vec<Uuid> = per_machine.keys().copied().collect();
        let environments = self.store.machine_environments(&machine_ids).await?;

        let per_environment = count_by_environment(&per_machine, &environments);
        check_limits(&limits, &per_environment)
    }
}

/// Sum per-machine counts into per-environment counts.
pub fn count_by_environment(
    per_machine: &HashMap<Uuid, i64>,
    environments: &HashMap<Uuid, Option<Uuid>>,
) -> HashMap<Uuid, i64> {
    let mut per_environment = HashMap::new();
    for (machine_id, count) in per_machine {
        if let Some(Some(env_id)) = environments.get(machine_id) {
            *per_environment.entry(*env_id).or_insert(0) += count;
        }
    }
    per_environment
}

/// Fail on the first (lowest id) environment whose count reached its limit.
pub fn check_limits(
    limits: &HashMap<Uuid, i64>,
    per_environment: &HashMap<Uuid, i64>,
) -> Result<(), EngineError> {
    let mut exhausted: Vec<(Uuid, i64, i64)> = limits
        .iter()
        .filter(|(_, &limit)| limit > 0)
        .filter_map(|(env_id, &limit)| {
            let count = per_environment.get(env_id).copied().unwrap_or(0);
            (count >= limit).then_some((*env_id, count, limit))
        })
        .collect();
    exhausted.sort();

    match exhausted.first() {
        Some(&(env_id, count, limit)) => Err(EngineError::QuotaExceeded { env_id, count, limit }),
        None => Ok(()),
    }
}
