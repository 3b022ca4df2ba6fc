//! End-to-end tests for template save, admission, planning and grouping.
//!
//! Everything runs against `MemoryStore`, `MockFactory` and
//! `RecordingDispatcher`, so no Postgres connection is required.

use std::collections::HashMap;
use std::sync::Arc;

use db::{
    MemoryStore, Store,
    models::{DirectiveRow, DirectiveState, OperationState, OperationTemplateRow},
};
use directives::{CatalogFactory, mock::MockFactory};
use queue::RecordingDispatcher;
use uuid::Uuid;

use crate::{
    AdmissionRequest, BatchCeiling, EngineConfig, EngineError, HookRegistry, Orchestrator,
    StartMode, StepSource, TemplateDraft,
};

// ---------------------------------------------------------------------------
// Fixture
// ---------------------------------------------------------------------------

/// Directive templates known to the mock factory.
struct Catalog {
    mandatory: Uuid,
    pluggable: Uuid,
    pluggable_2: Uuid,
    mandatory_2: Uuid,
}

struct Fixture {
    store: Arc<MemoryStore>,
    dispatcher: RecordingDispatcher,
    factory: Arc<MockFactory>,
    orchestrator: Orchestrator,
    catalog: Catalog,
    app: Uuid,
    user: Uuid,
    env: Uuid,
}

impl Fixture {
    fn new() -> Self {
        Self::with(|factory| factory, HookRegistry::new())
    }

    fn with(customize: impl FnOnce(MockFactory) -> MockFactory, hooks: HookRegistry) -> Self {
        let catalog = Catalog {
            mandatory: Uuid::new_v4(),
            pluggable: Uuid::new_v4(),
            pluggable_2: Uuid::new_v4(),
            mandatory_2: Uuid::new_v4(),
        };
        let factory = Arc::new(customize(MockFactory::with_templates([
            (catalog.mandatory, false),
            (catalog.pluggable, true),
            (catalog.pluggable_2, true),
            (catalog.mandatory_2, false),
        ])));

        let store = Arc::new(MemoryStore::new());
        let dispatcher = RecordingDispatcher::new();
        let app = Uuid::new_v4();
        let env = store.add_environment(app);

        let orchestrator = Orchestrator::new(
            store.clone(),
            factory.clone(),
            Arc::new(dispatcher.clone()),
            hooks,
            EngineConfig::default(),
        );

        Self {
            store,
            dispatcher,
            factory,
            orchestrator,
            catalog,
            app,
            user: Uuid::new_v4(),
            env,
        }
    }

    /// Register `n` machines in `env` that the fixture user may operate on.
    fn machines(&self, n: usize, env: Option<Uuid>) -> Vec<Uuid> {
        (0..n)
            .map(|_| {
                let id = self.store.add_machine(self.app, env);
                self.store.grant(self.user, id, None);
                id
            })
            .collect()
    }

    fn draft(&self, steps: &[(Uuid, bool)]) -> TemplateDraft {
        TemplateDraft {
            id: None,
            app_id: self.app,
            name: format!("template-{}", Uuid::new_v4()),
            steps: steps
                .iter()
                .map(|&(directive_template_id, ignorable_on_failure)| StepSource {
                    directive_template_id,
                    ignorable_on_failure,
                })
                .collect(),
            restrictions: None,
            pre_hook: None,
        }
    }

    async fn template(&self, steps: &[(Uuid, bool)]) -> OperationTemplateRow {
        self.orchestrator
            .templates
            .save(self.draft(steps))
            .await
            .expect("template should save")
    }

    async fn limited_template(&self, steps: &[(Uuid, bool)], limit: i64) -> OperationTemplateRow {
        let mut draft = self.draft(steps);
        draft.restrictions = Some(HashMap::from([(self.env, limit)]));
        self.orchestrator.templates.save(draft).await.expect("template should save")
    }

    fn request(&self, template: &OperationTemplateRow, machines: &[Uuid], mode: StartMode) -> AdmissionRequest {
        AdmissionRequest {
            requester: self.user,
            template_id: template.id,
            machine_ids: machines.to_vec(),
            previous_id: None,
            mode,
        }
    }

    fn directives_of(&self, operation_id: Uuid) -> Vec<DirectiveRow> {
        self.store
            .directives()
            .into_iter()
            .filter(|d| d.operation_id == operation_id)
            .collect()
    }
}

fn enabled(directives: &[DirectiveRow]) -> Vec<&DirectiveRow> {
    directives.iter().filter(|d| d.state == DirectiveState::Enabled).collect()
}

/// One machine's directives, by step.
fn chain_for(directives: &[DirectiveRow], machine: Uuid) -> Vec<DirectiveRow> {
    let mut own: Vec<DirectiveRow> =
        directives.iter().filter(|d| d.machine_id == machine).cloned().collect();
    own.sort_by_key(|d| d.step_index);
    own
}

// ============================================================
// Single admission
// ============================================================

#[tokio::test]
async fn two_steps_two_machines_without_hold() {
    let fx = Fixture::new();
    let template = fx.template(&[(fx.catalog.mandatory, false), (fx.catalog.pluggable, true)]).await;
    let machines = fx.machines(2, Some(fx.env));

    let operation = fx
        .orchestrator
        .admitter
        .admit(fx.request(&template, &machines, StartMode::from_hold(false)))
        .await
        .expect("admission should succeed");

    assert_eq!(operation.state, OperationState::Wait);
    assert_eq!(operation.previous_id, None);
    assert_eq!(operation.name, template.name);
    assert_eq!(fx.store.machine_operations().len(), 2);

    let directives = fx.directives_of(operation.id);
    assert_eq!(directives.len(), 4);

    let heads = enabled(&directives);
    assert_eq!(heads.len(), 2);
    assert!(heads.iter().all(|d| d.step_index == 0));

    // Mandatory → pluggable links forward.
    for &machine in &machines {
        let chain = chain_for(&directives, machine);
        assert_eq!(chain[0].next_id, Some(chain[1].id));
        assert_eq!(chain[1].pre_id, None);
        assert!(chain[1].ignorable_on_failure);
    }

    let requests = fx.dispatcher.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].operation_id, operation.id);
    assert_eq!(requests[0].machine_ids, machines);
    assert!(requests[0].should_run_now);
}

#[tokio::test]
async fn init_mode_is_dispatched_without_running_now() {
    let fx = Fixture::new();
    let template = fx.template(&[(fx.catalog.mandatory, false)]).await;
    let machines = fx.machines(1, None);

    let operation = fx
        .orchestrator
        .admitter
        .admit(fx.request(&template, &machines, StartMode::Init))
        .await
        .unwrap();

    assert_eq!(operation.state, OperationState::Init);
    assert_eq!(enabled(&fx.directives_of(operation.id)).len(), 1);
    assert!(!fx.dispatcher.requests()[0].should_run_now);
}

#[tokio::test]
async fn hold_mode_keeps_everything_on_hold_until_released() {
    let fx = Fixture::new();
    let template = fx.template(&[(fx.catalog.mandatory, false), (fx.catalog.mandatory_2, false)]).await;
    let machines = fx.machines(3, Some(fx.env));

    let operation = fx
        .orchestrator
        .admitter
        .admit(fx.request(&template, &machines, StartMode::Hold))
        .await
        .unwrap();

    assert_eq!(operation.state, OperationState::Hold);
    assert!(enabled(&fx.directives_of(operation.id)).is_empty());

    let released = fx.orchestrator.admitter.release(operation.id).await.unwrap();
    assert_eq!(released.state, OperationState::Ready);

    let directives = fx.directives_of(operation.id);
    let heads = enabled(&directives);
    assert_eq!(heads.len(), 3);
    assert!(heads.iter().all(|d| d.step_index == 0));

    let stored = fx.store.find_operation(operation.id).await.unwrap().unwrap();
    assert_eq!(stored.state, OperationState::Ready);
}

#[tokio::test]
async fn release_of_unknown_operation_is_not_found() {
    let fx = Fixture::new();
    let missing = Uuid::new_v4();
    assert!(matches!(
        fx.orchestrator.admitter.release(missing).await,
        Err(EngineError::OperationNotFound(id)) if id == missing
    ));
}

#[tokio::test]
async fn init_operations_cannot_be_released() {
    let fx = Fixture::new();
    let template = fx.template(&[(fx.catalog.mandatory, false)]).await;
    let machines = fx.machines(1, None);

    let operation = fx
        .orchestrator
        .admitter
        .admit(fx.request(&template, &machines, StartMode::Init))
        .await
        .unwrap();

    assert!(matches!(
        fx.orchestrator.admitter.release(operation.id).await,
        Err(EngineError::NotReleasable { state: OperationState::Init, .. })
    ));
    let stored = fx.store.find_operation(operation.id).await.unwrap().unwrap();
    assert_eq!(stored.state, OperationState::Init);
}

#[tokio::test]
async fn releasing_twice_leaves_the_operation_ready() {
    let fx = Fixture::new();
    let template = fx.template(&[(fx.catalog.mandatory, false)]).await;
    let machines = fx.machines(2, None);

    let operation = fx
        .orchestrator
        .admitter
        .admit(fx.request(&template, &machines, StartMode::Hold))
        .await
        .unwrap();

    let first = fx.orchestrator.admitter.release(operation.id).await.unwrap();
    let second = fx.orchestrator.admitter.release(operation.id).await.unwrap();
    assert_eq!(first.state, OperationState::Ready);
    assert_eq!(second, first);
    assert_eq!(enabled(&fx.directives_of(operation.id)).len(), 2);
}

#[tokio::test]
async fn idle_template_locks_are_dropped() {
    let fx = Fixture::new();
    let first = fx.template(&[(fx.catalog.mandatory, false)]).await;
    let second = fx.template(&[(fx.catalog.mandatory, false)]).await;
    let machines = fx.machines(1, None);

    for template in [&first, &second, &first] {
        fx.orchestrator
            .admitter
            .admit(fx.request(template, &machines, StartMode::Init))
            .await
            .unwrap();
        assert_eq!(fx.orchestrator.admitter.tracked_locks(), 1);
    }
}

#[tokio::test]
async fn catalog_sees_directive_templates_created_after_startup() {
    let store = Arc::new(MemoryStore::new());
    let dispatcher = RecordingDispatcher::new();
    let orchestrator = Orchestrator::new(
        store.clone(),
        Arc::new(CatalogFactory::new(store.clone())),
        Arc::new(dispatcher.clone()),
        HookRegistry::new(),
        EngineConfig::default(),
    );

    let (app, user) = (Uuid::new_v4(), Uuid::new_v4());
    let machine = store.add_machine(app, None);
    store.grant(user, machine, None);

    // Created once the orchestrator is already running.
    let step = store.add_directive_template(app, "restart", false);
    let template = orchestrator
        .templates
        .save(TemplateDraft {
            id: None,
            app_id: app,
            name: "restart".into(),
            steps: vec![StepSource { directive_template_id: step, ignorable_on_failure: false }],
            restrictions: None,
            pre_hook: None,
        })
        .await
        .unwrap();

    let operation = orchestrator
        .admitter
        .admit(AdmissionRequest {
            requester: user,
            template_id: template.id,
            machine_ids: vec![machine],
            previous_id: None,
            mode: StartMode::Wait,
        })
        .await
        .unwrap();

    let directives = orchestrator.directives(operation.id).await.unwrap();
    assert_eq!(directives.len(), 1);
    assert_eq!(directives[0].directive_template_id, step);
    assert_eq!(directives[0].state, DirectiveState::Enabled);
}

#[tokio::test]
async fn unpermitted_machines_are_rejected_without_records() {
    let fx = Fixture::new();
    let template = fx.template(&[(fx.catalog.mandatory, false)]).await;
    let stranger = fx.store.add_machine(fx.app, Some(fx.env));

    let result = fx
        .orchestrator
        .admitter
        .admit(fx.request(&template, &[stranger], StartMode::Init))
        .await;

    assert!(matches!(result, Err(EngineError::NoPermittedMachines)));
    assert!(result.unwrap_err().is_rejection());
    assert!(fx.store.operations().is_empty());
    assert!(fx.store.machine_operations().is_empty());
    assert!(fx.dispatcher.requests().is_empty());
}

#[tokio::test]
async fn only_permitted_machines_are_admitted() {
    let fx = Fixture::new();
    let template = fx.template(&[(fx.catalog.mandatory, false)]).await;
    let mine = fx.machines(2, None);
    let stranger = fx.store.add_machine(fx.app, None);

    let operation = fx
        .orchestrator
        .admitter
        .admit(fx.request(&template, &[mine[0], stranger, mine[1]], StartMode::Init))
        .await
        .unwrap();

    let recorded: Vec<Uuid> = fx.store.machine_operations().iter().map(|m| m.machine_id).collect();
    assert_eq!(recorded, mine);
    assert_eq!(fx.directives_of(operation.id).len(), 2);
    assert_eq!(fx.dispatcher.requests()[0].machine_ids, mine);
}

#[tokio::test]
async fn unknown_template_is_not_found() {
    let fx = Fixture::new();
    let result = fx
        .orchestrator
        .admitter
        .admit(AdmissionRequest {
            requester: fx.user,
            template_id: Uuid::new_v4(),
            machine_ids: vec![],
            previous_id: None,
            mode: StartMode::Init,
        })
        .await;
    assert!(matches!(result, Err(EngineError::TemplateNotFound(_))));
}

#[tokio::test]
async fn repeated_admission_creates_independent_operations() {
    let fx = Fixture::new();
    let template = fx.template(&[(fx.catalog.mandatory, false)]).await;
    let machines = fx.machines(2, Some(fx.env));

    let first = fx
        .orchestrator
        .admitter
        .admit(fx.request(&template, &machines, StartMode::Init))
        .await
        .unwrap();
    let second = fx
        .orchestrator
        .admitter
        .admit(fx.request(&template, &machines, StartMode::Init))
        .await
        .unwrap();

    assert_ne!(first.id, second.id);
    assert_eq!(fx.store.operations().len(), 2);
    assert_eq!(fx.store.machine_operations().len(), 4);
    assert_eq!(fx.directives_of(first.id).len(), 2);
    assert_eq!(fx.directives_of(second.id).len(), 2);
}

// ============================================================
// Quota
// ============================================================

#[tokio::test]
async fn quota_is_enforced_per_environment() {
    let fx = Fixture::new();
    let template = fx.limited_template(&[(fx.catalog.mandatory, false)], 2).await;
    let machines = fx.machines(2, Some(fx.env));

    fx.orchestrator
        .admitter
        .admit(fx.request(&template, &machines[..1], StartMode::Init))
        .await
        .expect("1 of 2 used");

    fx.orchestrator
        .admitter
        .admit(fx.request(&template, &machines[1..], StartMode::Init))
        .await
        .expect("count 1 is still below 2");

    let result = fx
        .orchestrator
        .admitter
        .admit(fx.request(&template, &machines, StartMode::Init))
        .await;
    assert!(matches!(
        result,
        Err(EngineError::QuotaExceeded { env_id, count: 2, limit: 2 }) if env_id == fx.env
    ));
    assert_eq!(fx.store.operations().len(), 2);
    assert_eq!(fx.store.machine_operations().len(), 2);
}

#[tokio::test]
async fn machines_without_environment_are_exempt() {
    let fx = Fixture::new();
    let template = fx.limited_template(&[(fx.catalog.mandatory, false)], 1).await;
    let machines = fx.machines(1, None);

    for _ in 0..3 {
        fx.orchestrator
            .admitter
            .admit(fx.request(&template, &machines, StartMode::Init))
            .await
            .expect("unassigned machines never count");
    }
}

#[tokio::test]
async fn other_templates_do_not_consume_quota() {
    let fx = Fixture::new();
    let limited = fx.limited_template(&[(fx.catalog.mandatory, false)], 1).await;
    let other = fx.template(&[(fx.catalog.mandatory, false)]).await;
    let machines = fx.machines(1, Some(fx.env));

    for _ in 0..2 {
        fx.orchestrator
            .admitter
            .admit(fx.request(&other, &machines, StartMode::Init))
            .await
            .unwrap();
    }
    fx.orchestrator
        .admitter
        .admit(fx.request(&limited, &machines, StartMode::Init))
        .await
        .expect("history of another template does not count");
}

#[tokio::test]
async fn concurrent_admissions_on_one_template_are_serialized() {
    let fx = Fixture::new();
    let template = fx.limited_template(&[(fx.catalog.mandatory, false)], 1).await;
    let machines = fx.machines(2, Some(fx.env));

    let admitter = &fx.orchestrator.admitter;
    let (a, b) = tokio::join!(
        admitter.admit(fx.request(&template, &machines[..1], StartMode::Init)),
        admitter.admit(fx.request(&template, &machines[1..], StartMode::Init)),
    );

    let outcomes = [a.is_ok(), b.is_ok()];
    assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
    assert_eq!(fx.store.machine_operations().len(), 1);
}

// ============================================================
// Directive chains
// ============================================================

#[tokio::test]
async fn every_step_is_one_hop_from_the_step_before() {
    let fx = Fixture::new();
    let c = &fx.catalog;
    // mandatory → pluggable → pluggable → mandatory → mandatory → pluggable
    let steps = [
        (c.mandatory, false),
        (c.pluggable, false),
        (c.pluggable_2, true),
        (c.mandatory_2, false),
        (c.mandatory, false),
        (c.pluggable, false),
    ];
    let template = fx.template(&steps).await;
    let machines = fx.machines(2, None);

    let operation = fx
        .orchestrator
        .admitter
        .admit(fx.request(&template, &machines, StartMode::Init))
        .await
        .unwrap();
    let directives = fx.directives_of(operation.id);
    assert_eq!(directives.len(), steps.len() * machines.len());

    for &machine in &machines {
        let chain = chain_for(&directives, machine);
        assert_eq!(chain.len(), steps.len());
        assert_eq!(chain[0].pre_id, None);
        assert_eq!(chain[0].state, DirectiveState::Enabled);

        for pair in chain.windows(2) {
            let (pre, cur) = (&pair[0], &pair[1]);
            assert_eq!(cur.state, DirectiveState::Hold);
            if pre.pluggable && !cur.pluggable {
                assert_eq!(cur.pre_id, Some(pre.id));
            } else {
                assert_eq!(pre.next_id, Some(cur.id));
            }
        }

        // The pluggable → mandatory hop at index 2 → 3 anchors backwards.
        assert_eq!(chain[3].pre_id, Some(chain[2].id));
        assert_eq!(chain[2].next_id, None);
    }
}

#[tokio::test]
async fn steps_with_missing_directive_templates_are_skipped() {
    let fx = Fixture::new();
    let gone = Uuid::new_v4();
    let template = fx
        .template(&[(gone, false), (fx.catalog.mandatory, false), (gone, true), (fx.catalog.mandatory_2, false)])
        .await;
    let machines = fx.machines(1, None);

    let operation = fx
        .orchestrator
        .admitter
        .admit(fx.request(&template, &machines, StartMode::Init))
        .await
        .unwrap();

    let chain = chain_for(&fx.directives_of(operation.id), machines[0]);
    assert_eq!(chain.len(), 2);
    assert_eq!(chain[0].step_index, 1);
    assert_eq!(chain[1].step_index, 3);
    assert_eq!(chain[0].next_id, Some(chain[1].id));
    assert_eq!(chain[0].state, DirectiveState::Enabled);
    assert_eq!(fx.factory.call_count(), 4);
}

#[tokio::test]
async fn factory_failure_propagates() {
    let failing = Uuid::new_v4();
    let fx = Fixture::with(move |factory| factory.failing_on(failing), HookRegistry::new());
    let template = fx.template(&[(fx.catalog.mandatory, false), (failing, false)]).await;
    let machines = fx.machines(1, None);

    let result = fx
        .orchestrator
        .admitter
        .admit(fx.request(&template, &machines, StartMode::Init))
        .await;

    assert!(matches!(result, Err(EngineError::Factory(_))));
    assert!(fx.dispatcher.requests().is_empty());
}

// ============================================================
// Hooks
// ============================================================

#[tokio::test]
async fn pre_admission_hook_runs_for_chain_heads_only() {
    let mut hooks = HookRegistry::new();
    hooks.register("at_most_one", Arc::new(BatchCeiling::new(1)));
    let fx = Fixture::with(|factory| factory, hooks);

    let mut draft = fx.draft(&[(fx.catalog.mandatory, false)]);
    draft.pre_hook = Some("at_most_one".into());
    let template = fx.orchestrator.templates.save(draft).await.unwrap();
    let machines = fx.machines(2, None);

    let refused = fx
        .orchestrator
        .admitter
        .admit(fx.request(&template, &machines, StartMode::Init))
        .await;
    assert!(matches!(refused, Err(EngineError::HookRejected { .. })));
    assert!(fx.store.operations().is_empty());

    let head = fx
        .orchestrator
        .admitter
        .admit(fx.request(&template, &machines[..1], StartMode::Init))
        .await
        .unwrap();

    let mut chained = fx.request(&template, &machines, StartMode::Wait);
    chained.previous_id = Some(head.id);
    let follower = fx.orchestrator.admitter.admit(chained).await.expect("hook skipped");
    assert_eq!(follower.previous_id, Some(head.id));
    assert!(enabled(&fx.directives_of(follower.id)).is_empty());
}

// ============================================================
// Group scheduling
// ============================================================

#[tokio::test]
async fn ten_machines_in_three_chained_groups() {
    let fx = Fixture::new();
    let template = fx.template(&[(fx.catalog.mandatory, false), (fx.catalog.pluggable, true)]).await;
    let machines = fx.machines(10, Some(fx.env));

    let operations = fx
        .orchestrator
        .scheduler
        .schedule(fx.user, template.id, 3, false)
        .await
        .expect("scheduling should succeed");

    assert_eq!(operations.len(), 3);
    assert_eq!(operations[0].previous_id, None);
    assert_eq!(operations[1].previous_id, Some(operations[0].id));
    assert_eq!(operations[2].previous_id, Some(operations[1].id));

    assert_eq!(operations[0].state, OperationState::Ready);
    assert_eq!(operations[1].state, OperationState::Wait);
    assert_eq!(operations[2].state, OperationState::Wait);

    let sizes: Vec<usize> = fx.dispatcher.requests().iter().map(|r| r.machine_ids.len()).collect();
    assert_eq!(sizes, vec![4, 4, 2]);
    let dispatched: Vec<Uuid> = fx
        .dispatcher
        .requests()
        .into_iter()
        .flat_map(|r| r.machine_ids)
        .collect();
    assert_eq!(dispatched, machines);

    assert_eq!(enabled(&fx.directives_of(operations[0].id)).len(), 4);
    assert!(enabled(&fx.directives_of(operations[1].id)).is_empty());
    assert!(enabled(&fx.directives_of(operations[2].id)).is_empty());
    assert_eq!(fx.store.machine_operations().len(), 10);
}

#[tokio::test]
async fn held_groups_release_only_the_first() {
    let fx = Fixture::new();
    let template = fx.template(&[(fx.catalog.mandatory, false)]).await;
    fx.machines(4, None);

    let operations = fx
        .orchestrator
        .scheduler
        .schedule(fx.user, template.id, 2, true)
        .await
        .unwrap();

    assert_eq!(operations[0].state, OperationState::Ready);
    assert_eq!(operations[1].state, OperationState::Hold);
    assert_eq!(enabled(&fx.directives_of(operations[0].id)).len(), 2);
    assert!(enabled(&fx.directives_of(operations[1].id)).is_empty());
}

#[tokio::test]
async fn later_group_failure_keeps_earlier_groups() {
    let fx = Fixture::new();
    let template = fx.limited_template(&[(fx.catalog.mandatory, false)], 1).await;
    fx.machines(4, Some(fx.env));

    let result = fx.orchestrator.scheduler.schedule(fx.user, template.id, 2, false).await;

    let (admitted, source) = match result {
        Err(EngineError::PartialSchedule { admitted, source }) => (admitted, source),
        other => panic!("expected a partial schedule, got {other:?}"),
    };
    assert_eq!(admitted.len(), 1);
    assert!(matches!(*source, EngineError::QuotaExceeded { .. }));

    let operations = fx.store.operations();
    assert_eq!(operations.len(), 1);
    assert_eq!(operations[0].id, admitted[0]);
    assert_eq!(operations[0].state, OperationState::Wait);
}

#[tokio::test]
async fn scheduling_without_machines_is_rejected() {
    let fx = Fixture::new();
    let template = fx.template(&[(fx.catalog.mandatory, false)]).await;

    let result = fx.orchestrator.scheduler.schedule(fx.user, template.id, 2, false).await;
    assert!(matches!(result, Err(EngineError::NoPermittedMachines)));
}

#[tokio::test]
async fn zero_groups_is_rejected_before_admission() {
    let fx = Fixture::new();
    let template = fx.template(&[(fx.catalog.mandatory, false)]).await;
    fx.machines(2, None);

    let result = fx.orchestrator.scheduler.schedule(fx.user, template.id, 0, false).await;
    assert!(matches!(result, Err(EngineError::InvalidGroupCount)));
    assert!(fx.store.operations().is_empty());
}

// ============================================================
// Template save
// ============================================================

#[tokio::test]
async fn save_encodes_steps_and_creates_restrictions() {
    let fx = Fixture::new();
    let mut draft = fx.draft(&[(fx.catalog.mandatory, false), (fx.catalog.pluggable, true)]);
    draft.name = "  rolling restart ".into();
    draft.restrictions = Some(HashMap::from([(fx.env, 5)]));

    let template = fx.orchestrator.templates.save(draft).await.unwrap();
    assert_eq!(template.name, "rolling restart");
    assert_eq!(
        template.expression,
        format!("{}|false,{}|true", fx.catalog.mandatory, fx.catalog.pluggable)
    );

    let restrictions = fx.store.list_restrictions(template.id).await.unwrap();
    assert_eq!(restrictions.len(), 1);
    assert_eq!(restrictions[0].env_id, fx.env);
    assert_eq!(restrictions[0].limit, 5);
    assert_eq!(restrictions[0].limit_cycle, "W");
}

#[tokio::test]
async fn restrictions_are_updated_in_place() {
    let fx = Fixture::new();
    let template = fx.limited_template(&[(fx.catalog.mandatory, false)], 5).await;
    let original = fx.store.list_restrictions(template.id).await.unwrap();

    let set = fx
        .orchestrator
        .templates
        .update_restrictions(&template, &HashMap::from([(fx.env, 8)]))
        .await
        .unwrap();

    assert_eq!(set.len(), 1);
    let updated = set.by_environment(fx.env).unwrap();
    assert_eq!(updated.id, original[0].id);
    assert_eq!(updated.limit, 8);
}

#[tokio::test]
async fn negative_restriction_writes_nothing() {
    let fx = Fixture::new();
    let template = fx.limited_template(&[(fx.catalog.mandatory, false)], 5).await;
    let other_env = fx.store.add_environment(fx.app);

    let result = fx
        .orchestrator
        .templates
        .update_restrictions(&template, &HashMap::from([(fx.env, -1), (other_env, 3)]))
        .await;

    assert!(matches!(result, Err(EngineError::InvalidRestriction { limit: -1, .. })));
    let restrictions = fx.store.list_restrictions(template.id).await.unwrap();
    assert_eq!(restrictions.len(), 1);
    assert_eq!(restrictions[0].limit, 5);
}

#[tokio::test]
async fn duplicate_name_in_the_same_app_is_rejected() {
    let fx = Fixture::new();
    let mut first = fx.draft(&[(fx.catalog.mandatory, false)]);
    first.name = "reboot".into();
    let saved = fx.orchestrator.templates.save(first.clone()).await.unwrap();

    assert!(matches!(
        fx.orchestrator.templates.save(first.clone()).await,
        Err(EngineError::Validation(_))
    ));

    // Re-saving the same template under its own name is an update.
    let mut edit = first;
    edit.id = Some(saved.id);
    edit.steps.push(StepSource {
        directive_template_id: fx.catalog.pluggable,
        ignorable_on_failure: true,
    });
    let updated = fx.orchestrator.templates.save(edit).await.unwrap();
    assert_eq!(updated.id, saved.id);
    assert_eq!(updated.created_at, saved.created_at);
    assert!(updated.expression.ends_with("|true"));
}

#[tokio::test]
async fn save_rejects_unknown_hooks_and_foreign_environments() {
    let fx = Fixture::new();

    let mut with_hook = fx.draft(&[(fx.catalog.mandatory, false)]);
    with_hook.pre_hook = Some("nope".into());
    assert!(matches!(
        fx.orchestrator.templates.save(with_hook).await,
        Err(EngineError::UnknownHook(_))
    ));

    let foreign_env = fx.store.add_environment(Uuid::new_v4());
    let mut with_env = fx.draft(&[(fx.catalog.mandatory, false)]);
    with_env.restrictions = Some(HashMap::from([(foreign_env, 1)]));
    assert!(matches!(
        fx.orchestrator.templates.save(with_env).await,
        Err(EngineError::UnknownEnvironment(env)) if env == foreign_env
    ));

    let mut empty = fx.draft(&[]);
    empty.name = "empty".into();
    assert!(matches!(
        fx.orchestrator.templates.save(empty).await,
        Err(EngineError::Validation(_))
    ));
}
