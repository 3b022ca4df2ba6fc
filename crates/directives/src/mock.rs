//! `MockFactory`: a test double for `DirectiveFactory`.
//!
//! Compiles steps like [`crate::CatalogFactory`] from a table of
//! `template id → pluggable`, records every step it is asked for, and can be
//! told to fail on one template.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use db::models::{DirectiveRow, DirectiveTemplateRow};
use uuid::Uuid;

use crate::{DirectiveFactory, FactoryError, StepInfo, catalog::compile};

pub struct MockFactory {
    /// Known templates and their pluggable flag.
    pub pluggable: HashMap<Uuid, bool>,
    /// Template that fails to compile, if any.
    pub fail_on: Option<Uuid>,
    /// Every step seen by this factory (in call order).
    pub calls: Arc<Mutex<Vec<StepInfo>>>,
}

impl MockFactory {
    /// Create a mock that knows the given templates.
    pub fn with_templates(templates: impl IntoIterator<Item = (Uuid, bool)>) -> Self {
        Self {
            pluggable: templates.into_iter().collect(),
            fail_on: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Make compiling `template_id` fail.
    pub fn failing_on(mut self, template_id: Uuid) -> Self {
        self.fail_on = Some(template_id);
        self
    }

    /// Number of steps this factory has compiled (or attempted to).
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl DirectiveFactory for MockFactory {
    async fn make_directives(
        &self,
        info: &StepInfo,
        app_id: Uuid,
        machines: &[Uuid],
        on_created: &mut (dyn for<'r> FnMut(&'r DirectiveRow) + Send),
    ) -> Result<Option<Vec<DirectiveRow>>, FactoryError> {
        self.calls.lock().unwrap().push(info.clone());

        if self.fail_on == Some(info.directive_template_id) {
            return Err(FactoryError::Compile {
                template_id: info.directive_template_id,
                message: "mock failure".into(),
            });
        }

        let Some(&pluggable) = self.pluggable.get(&info.directive_template_id) else {
            return Ok(None);
        };

        let template = DirectiveTemplateRow {
            id: info.directive_template_id,
            app_id,
            name: "mock".into(),
            pluggable,
        };
        Ok(Some(compile(info, &template, machines, on_created)))
    }
}
