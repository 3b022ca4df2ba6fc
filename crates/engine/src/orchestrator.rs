//! `Orchestrator`: wires the core components over one set of collaborators.

use std::sync::Arc;

use db::{Store, models::DirectiveRow};
use directives::DirectiveFactory;
use queue::Dispatcher;
use uuid::Uuid;

use crate::{
    DirectivePlanBuilder, EngineConfig, EngineError, GroupScheduler, HookRegistry,
    OperationAdmitter, TemplateService,
};

pub struct Orchestrator {
    pub templates: TemplateService,
    pub admitter: Arc<OperationAdmitter>,
    pub scheduler: GroupScheduler,
    store: Arc<dyn Store>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn Store>,
        factory: Arc<dyn DirectiveFactory>,
        dispatcher: Arc<dyn Dispatcher>,
        hooks: HookRegistry,
        config: EngineConfig,
    ) -> Self {
        let planner = DirectivePlanBuilder::new(store.clone(), factory);
        let admitter = Arc::new(OperationAdmitter::new(
            store.clone(),
            planner,
            dispatcher,
            hooks.clone(),
            config,
        ));

        Self {
            templates: TemplateService::new(store.clone(), hooks),
            scheduler: GroupScheduler::new(store.clone(), admitter.clone()),
            admitter,
            store,
        }
    }

    /// The directive plan of an operation, ordered by step.
    pub async fn directives(&self, operation_id: Uuid) -> Result<Vec<DirectiveRow>, EngineError> {
        if self.store.find_operation(operation_id).await?.is_none() {
            return Err(EngineError::OperationNotFound(operation_id));
        }
        Ok(self.store.list_directives(operation_id).await?)
    }
}
