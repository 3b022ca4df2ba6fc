//! `engine` crate: the orchestration core.
//!
//! Admission gates an operation against per-environment quotas, records it,
//! builds its per-machine directive chains and hands it to the dispatcher.
//! Group scheduling chains several admissions so only the first starts.

pub mod admitter;
pub mod error;
pub mod gate;
pub mod hooks;
pub mod linker;
pub mod models;
pub mod orchestrator;
pub mod planner;
pub mod scheduler;
pub mod templates;

pub use admitter::{AdmissionRequest, EngineConfig, OperationAdmitter};
pub use error::EngineError;
pub use gate::RestrictionGate;
pub use hooks::{AdmissionContext, BatchCeiling, HookRegistry, PreAdmissionHook};
pub use linker::{ChainLinker, Link};
pub use models::{RestrictionSet, StartMode, StepSequence, StepSource, TemplateDraft};
pub use orchestrator::Orchestrator;
pub use planner::{DirectivePlanBuilder, PlanSummary};
pub use scheduler::{GroupScheduler, partition};
pub use templates::TemplateService;

#[cfg(test)]
mod orchestration_tests;
