//! Row structs that map 1-to-1 onto database tables.
//!
//! These are *persistence* models: they carry no orchestration behaviour.
//! Gating, linking and scheduling live in the `engine` crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// operation_templates
// ---------------------------------------------------------------------------

/// A persisted operation template.
///
/// `expression` holds the encoded step list (`"<directive_template_id>|<ignorable>,..."`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct OperationTemplateRow {
    pub id: Uuid,
    pub app_id: Uuid,
    pub name: String,
    pub expression: String,
    /// Name of a registered pre-admission hook, if any.
    pub pre_hook: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// operation_restrictions
// ---------------------------------------------------------------------------

/// Default cycle recorded on newly created restrictions (weekly).
pub const DEFAULT_LIMIT_CYCLE: &str = "W";

/// Per-environment quota owned by one template. `limit == 0` means unlimited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct RestrictionRow {
    pub id: Uuid,
    pub operation_template_id: Uuid,
    pub env_id: Uuid,
    #[sqlx(rename = "quota")]
    pub limit: i64,
    pub limit_cycle: String,
}

// ---------------------------------------------------------------------------
// operations
// ---------------------------------------------------------------------------

/// Lifecycle state of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OperationState {
    /// Created without any hold/wait distinction.
    Init,
    /// Created as part of a chain, waiting for its predecessor.
    Wait,
    /// Created paused; needs an explicit release.
    Hold,
    /// Released; its chain heads are enabled.
    Ready,
}

impl std::fmt::Display for OperationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::Wait => write!(f, "wait"),
            Self::Hold => write!(f, "hold"),
            Self::Ready => write!(f, "ready"),
        }
    }
}

impl std::str::FromStr for OperationState {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "init"  => Ok(Self::Init),
            "wait"  => Ok(Self::Wait),
            "hold"  => Ok(Self::Hold),
            "ready" => Ok(Self::Ready),
            other   => Err(format!("unknown operation state: {other}")),
        }
    }
}

/// One execution instance of a template against a machine set.
///
/// `previous_id` is a weak link to the operation that precedes this one in a
/// group chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct OperationRow {
    pub id: Uuid,
    pub operation_template_id: Uuid,
    pub operator_id: Uuid,
    pub name: String,
    pub app_id: Uuid,
    pub state: OperationState,
    pub previous_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// machine_operations
// ---------------------------------------------------------------------------

/// Join record counted by the restriction gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct MachineOperationRow {
    pub id: Uuid,
    pub machine_id: Uuid,
    pub operation_id: Uuid,
    pub operation_template_id: Uuid,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// directives
// ---------------------------------------------------------------------------

/// Possible states for a planned directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DirectiveState {
    Hold,
    Enabled,
}

impl std::fmt::Display for DirectiveState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hold    => write!(f, "hold"),
            Self::Enabled => write!(f, "enabled"),
        }
    }
}

/// Atomic planned work for one machine at one template step.
///
/// `pre_id` / `next_id` are weak links to directives of the same machine
/// at neighbouring steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct DirectiveRow {
    pub id: Uuid,
    pub operation_id: Uuid,
    pub machine_id: Uuid,
    pub directive_template_id: Uuid,
    pub step_index: i32,
    pub pluggable: bool,
    pub ignorable_on_failure: bool,
    pub state: DirectiveState,
    pub pre_id: Option<Uuid>,
    pub next_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// directive_templates
// ---------------------------------------------------------------------------

/// A directive template as seen by the plan builder: identity plus the
/// pluggable flag every directive compiled from it inherits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct DirectiveTemplateRow {
    pub id: Uuid,
    pub app_id: Uuid,
    pub name: String,
    pub pluggable: bool,
}

// ---------------------------------------------------------------------------
// job_queue
// ---------------------------------------------------------------------------

/// Possible statuses for a queued job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending    => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Completed  => write!(f, "completed"),
            Self::Failed     => write!(f, "failed"),
        }
    }
}

/// A job row handed to the out-of-process executor.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobRow {
    pub id: Uuid,
    pub operation_id: Uuid,
    pub status: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
