//! Operation admitter.
//!
//! `admit` runs, in this order:
//! 1. intersect the requested machines with those the requester may operate on,
//! 2. run the restriction gate,
//! 3. run the template's pre-admission hook (chain heads only),
//! 4. create the operation in the state derived from [`StartMode`],
//! 5. record one machine operation per admitted machine,
//! 6. build the directive plan,
//! 7. hand the operation to the dispatcher without waiting for it.
//!
//! Step 5 must commit before the next `admit` on the same template runs its
//! gate, so admissions are serialized per template inside this process.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use db::{
    Store,
    models::{DirectiveState, MachineOperationRow, OperationRow, OperationState, OperationTemplateRow},
};
use queue::{DispatchRequest, Dispatcher};
use serde::Deserialize;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::{
    AdmissionContext, DirectivePlanBuilder, EngineError, HookRegistry, RestrictionGate, StartMode,
    StepSequence,
};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tuning knobs for admission.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Hold a per-template lock from the gate through record creation.
    pub serialize_admissions: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            serialize_admissions: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Single-operation admission input.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AdmissionRequest {
    pub requester: Uuid,
    pub template_id: Uuid,
    pub machine_ids: Vec<Uuid>,
    #[serde(default)]
    pub previous_id: Option<Uuid>,
    #[serde(default)]
    pub mode: StartMode,
}

// ---------------------------------------------------------------------------
// OperationAdmitter
// ---------------------------------------------------------------------------

pub struct OperationAdmitter {
    store: Arc<dyn Store>,
    gate: RestrictionGate,
    planner: DirectivePlanBuilder,
    dispatcher: Arc<dyn Dispatcher>,
    hooks: HookRegistry,
    config: EngineConfig,
    template_locks: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

impl OperationAdmitter {
    pub fn new(
        store: Arc<dyn Store>,
        planner: DirectivePlanBuilder,
        dispatcher: Arc<dyn Dispatcher>,
        hooks: HookRegistry,
        config: EngineConfig,
    ) -> Self {
        Self {
            gate: RestrictionGate::new(store.clone()),
            store,
            planner,
            dispatcher,
            hooks,
            config,
            template_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Admit one operation.
    ///
    /// # Errors
    /// - [`EngineError::TemplateNotFound`] for an unknown template.
    /// - [`EngineError::NoPermittedMachines`] / [`EngineError::QuotaExceeded`] /
    ///   [`EngineError::HookRejected`] when the admission is refused; nothing
    ///   is recorded in that case.
    pub async fn admit(&self, request: AdmissionRequest) -> Result<OperationRow, EngineError> {
        let template = self
            .store
            .find_template(request.template_id)
            .await?
            .ok_or(EngineError::TemplateNotFound(request.template_id))?;

        self.admit_with_template(
            &template,
            request.requester,
            &request.machine_ids,
            request.previous_id,
            request.mode,
        )
        .await
    }

    #[instrument(
        skip(self, template, machine_ids),
        fields(template_id = %template.id, requested = machine_ids.len())
    )]
    pub(crate) async fn admit_with_template(
        &self,
        template: &OperationTemplateRow,
        requester: Uuid,
        machine_ids: &[Uuid],
        previous_id: Option<Uuid>,
        mode: StartMode,
    ) -> Result<OperationRow, EngineError> {
        let _guard = if self.config.serialize_admissions {
            Some(self.lock_for(template.id).lock_owned().await)
        } else {
            None
        };

        // ------------------------------------------------------------------
        // Permission and quota
        // ------------------------------------------------------------------
        let permitted: HashSet<Uuid> = self
            .store
            .available_machines(requester, template.app_id, template.id)
            .await?
            .into_iter()
            .collect();
        let admitted = permitted_in_order(machine_ids, &permitted);
        if admitted.is_empty() {
            return Err(EngineError::NoPermittedMachines);
        }
        if admitted.len() < machine_ids.len() {
            debug!("{} requested machines dropped as not permitted", machine_ids.len() - admitted.len());
        }

        self.gate.check(template, &admitted).await?;

        if previous_id.is_none() {
            if let Some(hook) = &template.pre_hook {
                let ctx = AdmissionContext {
                    template,
                    requester,
                    machine_ids: &admitted,
                    mode,
                };
                self.hooks.run(hook, &ctx)?;
            }
        }

        // ------------------------------------------------------------------
        // Records
        // ------------------------------------------------------------------
        let now = Utc::now();
        let operation = OperationRow {
            id: Uuid::new_v4(),
            operation_template_id: template.id,
            operator_id: requester,
            name: template.name.clone(),
            app_id: template.app_id,
            state: mode.initial_state(),
            previous_id,
            created_at: now,
        };
        self.store.insert_operation(&operation).await?;

        let machine_operations: Vec<MachineOperationRow> = admitted
            .iter()
            .map(|&machine_id| MachineOperationRow {
                id: Uuid::new_v4(),
                machine_id,
                operation_id: operation.id,
                operation_template_id: template.id,
                created_at: now,
            })
            .collect();
        self.store.insert_machine_operations(&machine_operations).await?;

        // ------------------------------------------------------------------
        // Plan, then hand off
        // ------------------------------------------------------------------
        // Chained operations wait for their predecessor, so their heads stay held.
        let hold_plan = mode == StartMode::Hold || previous_id.is_some();
        let steps = StepSequence::parse(&template.expression);
        self.planner.build(&operation, &steps, &admitted, hold_plan).await?;

        self.dispatcher
            .dispatch(DispatchRequest {
                operation_id: operation.id,
                machine_ids: admitted.clone(),
                should_run_now: operation.state != OperationState::Init,
            })
            .await?;

        info!(
            "admitted operation {} on {} machines (state={})",
            operation.id,
            admitted.len(),
            operation.state
        );
        Ok(operation)
    }

    /// Release a `hold` or `wait` operation: mark it `ready` and enable its
    /// chain heads. Releasing a `ready` operation returns it unchanged.
    ///
    /// # Errors
    /// - [`EngineError::NotReleasable`] for an operation in `init`.
    #[instrument(skip(self))]
    pub async fn release(&self, operation_id: Uuid) -> Result<OperationRow, EngineError> {
        let mut operation = self
            .store
            .find_operation(operation_id)
            .await?
            .ok_or(EngineError::OperationNotFound(operation_id))?;

        match operation.state {
            OperationState::Hold | OperationState::Wait => {}
            OperationState::Ready => {
                debug!("operation {} already released", operation_id);
                return Ok(operation);
            }
            state @ OperationState::Init => {
                return Err(EngineError::NotReleasable { operation_id, state });
            }
        }
        let previous = operation.state;

        let directives = self.store.list_directives(operation_id).await?;
        let mut first_step: HashMap<Uuid, i32> = HashMap::new();
        for d in &directives {
            let step = first_step.entry(d.machine_id).or_insert(d.step_index);
            *step = (*step).min(d.step_index);
        }
        let heads: Vec<Uuid> = directives
            .iter()
            .filter(|d| first_step.get(&d.machine_id) == Some(&d.step_index))
            .filter(|d| d.state == DirectiveState::Hold)
            .map(|d| d.id)
            .collect();

        if !heads.is_empty() {
            self.store
                .update_directive_states(&heads, DirectiveState::Enabled)
                .await?;
        }
        self.store
            .update_operation_state(operation_id, OperationState::Ready)
            .await?;
        operation.state = OperationState::Ready;

        info!(
            "released operation {} from {} ({} heads enabled)",
            operation_id,
            previous,
            heads.len()
        );
        Ok(operation)
    }

    /// Lock shared by every admission on `template_id`.
    ///
    /// Entries nobody else holds or waits on are pruned here, so the map
    /// only keeps templates with admissions in flight.
    fn lock_for(&self, template_id: Uuid) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .template_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        locks.retain(|id, lock| *id == template_id || Arc::strong_count(lock) > 1);
        locks.entry(template_id).or_default().clone()
    }

    #[cfg(test)]
    pub(crate) fn tracked_locks(&self) -> usize {
        self.template_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Requested machines that are permitted, in request order, without duplicates.
fn permitted_in_order(requested: &[Uuid], permitted: &HashSet<Uuid>) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    requested
        .iter()
        .copied()
        .filter(|id| permitted.contains(id) && seen.insert(*id))
        .collect()
}
