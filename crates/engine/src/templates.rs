//! Template save path: validation, step encoding and restriction upsert.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use db::{
    Store,
    models::{DEFAULT_LIMIT_CYCLE, OperationTemplateRow, RestrictionRow},
};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::{EngineError, HookRegistry, RestrictionSet, StepSequence, TemplateDraft, models::validate_limits};

pub struct TemplateService {
    store: Arc<dyn Store>,
    hooks: HookRegistry,
}

impl TemplateService {
    pub fn new(store: Arc<dyn Store>, hooks: HookRegistry) -> Self {
        Self { store, hooks }
    }

    /// Create or update a template, then upsert its restrictions.
    ///
    /// Every check runs before the first write, so a rejected draft leaves
    /// the store untouched.
    #[instrument(skip(self, draft), fields(app_id = %draft.app_id, name = %draft.name))]
    pub async fn save(&self, draft: TemplateDraft) -> Result<OperationTemplateRow, EngineError> {
        draft.validate()?;
        let name = draft.name.trim().to_owned();

        if let Some(hook) = &draft.pre_hook {
            if !self.hooks.contains(hook) {
                return Err(EngineError::UnknownHook(hook.clone()));
            }
        }

        let existing = match draft.id {
            Some(id) => {
                let existing = self
                    .store
                    .find_template(id)
                    .await?
                    .ok_or(EngineError::TemplateNotFound(id))?;
                if existing.app_id != draft.app_id {
                    return Err(EngineError::Validation(
                        "a template cannot move to another app".into(),
                    ));
                }
                Some(existing)
            }
            None => None,
        };

        if let Some(clash) = self.store.find_template_by_name(draft.app_id, &name).await? {
            if Some(clash.id) != draft.id {
                return Err(EngineError::Validation(format!(
                    "name '{name}' is already used in this app"
                )));
            }
        }

        if let Some(limits) = &draft.restrictions {
            let environments = self.store.app_environments(draft.app_id).await?;
            let mut unknown: Vec<Uuid> = limits
                .keys()
                .filter(|env| !environments.contains(env))
                .copied()
                .collect();
            unknown.sort();
            if let Some(env) = unknown.first() {
                return Err(EngineError::UnknownEnvironment(*env));
            }
        }

        let now = Utc::now();
        let template = OperationTemplateRow {
            id: draft.id.unwrap_or_else(Uuid::new_v4),
            app_id: draft.app_id,
            name,
            expression: StepSequence::from(draft.steps).encode(),
            pre_hook: draft.pre_hook,
            created_at: existing.map_or(now, |t| t.created_at),
            updated_at: now,
        };
        self.store.upsert_template(&template).await?;

        if let Some(limits) = &draft.restrictions {
            self.update_restrictions(&template, limits).await?;
        }

        info!("saved template {} ('{}')", template.id, template.name);
        Ok(template)
    }

    /// Upsert one restriction per environment in `limits`.
    ///
    /// New environments get a row with the default cycle; existing rows only
    /// have their limit changed, and only when it differs.
    ///
    /// # Errors
    /// - [`EngineError::InvalidRestriction`] for any negative limit, before any write.
    #[instrument(skip(self, template, limits), fields(template_id = %template.id))]
    pub async fn update_restrictions(
        &self,
        template: &OperationTemplateRow,
        limits: &HashMap<Uuid, i64>,
    ) -> Result<RestrictionSet, EngineError> {
        validate_limits(limits)?;

        let current = RestrictionSet::new(self.store.list_restrictions(template.id).await?);

        let mut ordered: Vec<(Uuid, i64)> = limits.iter().map(|(&env, &limit)| (env, limit)).collect();
        ordered.sort();

        for (env_id, limit) in ordered {
            match current.by_environment(env_id) {
                None => {
                    self.store
                        .insert_restriction(&RestrictionRow {
                            id: Uuid::new_v4(),
                            operation_template_id: template.id,
                            env_id,
                            limit,
                            limit_cycle: DEFAULT_LIMIT_CYCLE.to_owned(),
                        })
                        .await?;
                }
                Some(existing) if existing.limit != limit => {
                    self.store.update_restriction_limit(existing.id, limit).await?;
                }
                Some(_) => debug!("restriction for {} unchanged", env_id),
            }
        }

        Ok(RestrictionSet::new(self.store.list_restrictions(template.id).await?))
    }
}
