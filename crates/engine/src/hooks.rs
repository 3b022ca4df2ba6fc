//! Pre-admission hooks.
//!
//! A template may name one hook. It runs after the quota gate and before any
//! record is created, and only for the first operation of a chain. Hooks are
//! pure checks over [`AdmissionContext`]; a refusal aborts the admission.

use std::collections::HashMap;
use std::sync::Arc;

use db::models::OperationTemplateRow;
use uuid::Uuid;

use crate::{EngineError, StartMode};

/// Everything a hook may look at.
#[derive(Debug, Clone, Copy)]
pub struct AdmissionContext<'a> {
    pub template: &'a OperationTemplateRow,
    pub requester: Uuid,
    pub machine_ids: &'a [Uuid],
    pub mode: StartMode,
}

pub trait PreAdmissionHook: Send + Sync {
    /// `Err(reason)` refuses the admission.
    fn before_admit(&self, ctx: &AdmissionContext<'_>) -> Result<(), String>;
}

/// Maps hook names (as stored on templates) to implementations.
pub type HookMap = HashMap<String, Arc<dyn PreAdmissionHook>>;

#[derive(Clone, Default)]
pub struct HookRegistry {
    hooks: HookMap,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in hooks.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register("batch_ceiling_50", Arc::new(BatchCeiling::new(50)));
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, hook: Arc<dyn PreAdmissionHook>) {
        self.hooks.insert(name.into(), hook);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.hooks.contains_key(name)
    }

    pub fn run(&self, name: &str, ctx: &AdmissionContext<'_>) -> Result<(), EngineError> {
        let hook = self
            .hooks
            .get(name)
            .ok_or_else(|| EngineError::UnknownHook(name.to_owned()))?;

        hook.before_admit(ctx).map_err(|reason| EngineError::HookRejected {
            hook: name.to_owned(),
            reason,
        })
    }
}

/// Refuses chains whose first operation would touch more than `max_machines`.
#[derive(Debug, Clone, Copy)]
pub struct BatchCeiling {
    max_machines: usize,
}

impl BatchCeiling {
    pub fn new(max_machines: usize) -> Self {
        Self { max_machines }
    }
}

impl PreAdmissionHook for BatchCeiling {
    fn before_admit(&self, ctx: &AdmissionContext<'_>) -> Result<(), String> {
        if ctx.machine_ids.len() > self.max_machines {
            return Err(format!(
                "{} machines requested, at most {} allowed",
                ctx.machine_ids.len(),
                self.max_machines
            ));
        }
        Ok(())
    }
}
