//! Group scheduler: splits the requester's machines into ordered groups and
//! chains one admission per group through `previous_id`.
//!
//! Only the first operation is released once every group is admitted. A
//! failing group stops the loop; groups admitted before it stay admitted.

use std::sync::Arc;

use db::{Store, models::OperationRow};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{EngineError, OperationAdmitter, StartMode};

/// Split `machine_ids` into contiguous groups of `ceil(len / group_count)`.
/// The last group may be smaller; there may be fewer than `group_count` groups.
///
/// # Errors
/// - [`EngineError::InvalidGroupCount`] when `group_count == 0`.
pub fn partition(machine_ids: &[Uuid], group_count: usize) -> Result<Vec<Vec<Uuid>>, EngineError> {
    if group_count == 0 {
        return Err(EngineError::InvalidGroupCount);
    }
    if machine_ids.is_empty() {
        return Ok(Vec::new());
    }

    let group_size = machine_ids.len().div_ceil(group_count);
    Ok(machine_ids.chunks(group_size).map(<[Uuid]>::to_vec).collect())
}

pub struct GroupScheduler {
    store: Arc<dyn Store>,
    admitter: Arc<OperationAdmitter>,
}

impl GroupScheduler {
    pub fn new(store: Arc<dyn Store>, admitter: Arc<OperationAdmitter>) -> Self {
        Self { store, admitter }
    }

    /// Admit every machine the requester may operate on, in `group_count` chained groups.
    ///
    /// # Errors
    /// - [`EngineError::NoPermittedMachines`] when the requester has no machines.
    /// - [`EngineError::PartialSchedule`] when a group after the first fails.
    /// - Any admission error of the first group, unchanged.
    #[instrument(skip(self))]
    pub async fn schedule(
        &self,
        requester: Uuid,
        template_id: Uuid,
        group_count: usize,
        hold: bool,
    ) -> Result<Vec<OperationRow>, EngineError> {
        let template = self
            .store
            .find_template(template_id)
            .await?
            .ok_or(EngineError::TemplateNotFound(template_id))?;

        let machines = self
            .store
            .available_machines(requester, template.app_id, template.id)
            .await?;
        let groups = partition(&machines, group_count)?;
        if groups.is_empty() {
            return Err(EngineError::NoPermittedMachines);
        }

        let mode = StartMode::from_hold(hold);
        let mut operations: Vec<OperationRow> = Vec::with_capacity(groups.len());

        for (index, group) in groups.iter().enumerate() {
            let previous_id = operations.last().map(|op| op.id);
            match self
                .admitter
                .admit_with_template(&template, requester, group, previous_id, mode)
                .await
            {
                Ok(operation) => operations.push(operation),
                Err(e) if operations.is_empty() => return Err(e),
                Err(e) => {
                    warn!("group {} of {} failed, earlier groups stay admitted: {}", index + 1, groups.len(), e);
                    return Err(EngineError::PartialSchedule {
                        admitted: operations.iter().map(|op| op.id).collect(),
                        source: Box::new(e),
                    });
                }
            }
        }

        if let Some(first) = operations.first_mut() {
            *first = self.admitter.release(first.id).await?;
        }

        info!("scheduled {} chained operations", operations.len());
        Ok(operations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<Uuid> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    fn sizes(groups: &[Vec<Uuid>]) -> Vec<usize> {
        groups.iter().map(Vec::len).collect()
    }

    #[test]
    fn ten_machines_in_three_groups() {
        let machines = ids(10);
        let groups = partition(&machines, 3).unwrap();
        assert_eq!(sizes(&groups), vec![4, 4, 2]);
        assert_eq!(groups.concat(), machines);
    }

    #[test]
    fn more_groups_than_machines_yields_singletons() {
        let groups = partition(&ids(3), 5).unwrap();
        assert_eq!(sizes(&groups), vec![1, 1, 1]);
    }

    #[test]
    fn exact_division() {
        assert_eq!(sizes(&partition(&ids(9), 3).unwrap()), vec![3, 3, 3]);
        assert_eq!(sizes(&partition(&ids(9), 1).unwrap()), vec![9]);
    }

    #[test]
    fn zero_groups_is_rejected() {
        assert!(matches!(partition(&ids(4), 0), Err(EngineError::InvalidGroupCount)));
    }

    #[test]
    fn no_machines_no_groups() {
        assert!(partition(&[], 3).unwrap().is_empty());
    }
}
