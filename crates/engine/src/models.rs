//! Domain inputs of the orchestration core.
//!
//! Records themselves are the `db::models` rows; the types here describe what
//! callers hand the engine and how the step list is encoded on a template.

use std::collections::HashMap;

use db::models::{OperationState, RestrictionRow};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::EngineError;

// ---------------------------------------------------------------------------
// StartMode
// ---------------------------------------------------------------------------

/// How a newly admitted operation starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartMode {
    /// Created paused; needs an explicit release.
    Hold,
    /// Created as part of a chain; waits for its predecessor.
    Wait,
    /// No hold/wait distinction requested.
    #[default]
    Init,
}

impl StartMode {
    /// Mode used by grouped scheduling, where the caller always states a hold flag.
    pub fn from_hold(hold: bool) -> Self {
        if hold { Self::Hold } else { Self::Wait }
    }

    pub fn initial_state(self) -> OperationState {
        match self {
            Self::Hold => OperationState::Hold,
            Self::Wait => OperationState::Wait,
            Self::Init => OperationState::Init,
        }
    }
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

/// One step of a template: which directive template to compile, and whether
/// its failure may be ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSource {
    pub directive_template_id: Uuid,
    #[serde(default)]
    pub ignorable_on_failure: bool,
}

/// The ordered step list of a template.
///
/// Persisted as `"<directive_template_id>|<ignorable>,..."` in the template's
/// `expression` column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepSequence(Vec<StepSource>);

impl StepSequence {
    pub fn new(steps: Vec<StepSource>) -> Self {
        Self(steps)
    }

    /// Decode an expression. Blank items are ignored; items whose id does
    /// not parse are dropped with a warning. Only the literal `true` marks a
    /// step ignorable.
    pub fn parse(expression: &str) -> Self {
        let steps = expression
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .filter_map(|item| {
                let (id, flag) = item.split_once('|').unwrap_or((item, ""));
                match Uuid::parse_str(id.trim()) {
                    Ok(directive_template_id) => Some(StepSource {
                        directive_template_id,
                        ignorable_on_failure: flag.trim() == "true",
                    }),
                    Err(e) => {
                        warn!("dropping malformed step '{}': {}", item, e);
                        None
                    }
                }
            })
            .collect();
        Self(steps)
    }

    pub fn encode(&self) -> String {
        self.0
            .iter()
            .map(|s| format!("{}|{}", s.directive_template_id, s.ignorable_on_failure))
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn iter(&self) -> impl Iterator<Item = &StepSource> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<StepSource>> for StepSequence {
    fn from(steps: Vec<StepSource>) -> Self {
        Self(steps)
    }
}

// ---------------------------------------------------------------------------
// Restrictions
// ---------------------------------------------------------------------------

/// The restrictions of one template, with the two lookups callers need.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestrictionSet(Vec<RestrictionRow>);

impl RestrictionSet {
    pub fn new(rows: Vec<RestrictionRow>) -> Self {
        Self(rows)
    }

    pub fn by_id(&self, id: Uuid) -> Option<&RestrictionRow> {
        self.0.iter().find(|r| r.id == id)
    }

    pub fn by_environment(&self, env_id: Uuid) -> Option<&RestrictionRow> {
        self.0.iter().find(|r| r.env_id == env_id)
    }

    /// `environment → limit` for every restriction that actually limits (`limit > 0`).
    pub fn active_limits(&self) -> HashMap<Uuid, i64> {
        self.0
            .iter()
            .filter(|r| r.limit > 0)
            .map(|r| (r.env_id, r.limit))
            .collect()
    }

    pub fn rows(&self) -> &[RestrictionRow] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Reject any negative limit, reporting the lowest environment id first so
/// the error is deterministic.
pub fn validate_limits(limits: &HashMap<Uuid, i64>) -> Result<(), EngineError> {
    let mut negative: Vec<(Uuid, i64)> = limits
        .iter()
        .filter(|(_, &limit)| limit < 0)
        .map(|(&env_id, &limit)| (env_id, limit))
        .collect();
    negative.sort();

    match negative.first() {
        Some(&(env_id, limit)) => Err(EngineError::InvalidRestriction { env_id, limit }),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// TemplateDraft
// ---------------------------------------------------------------------------

/// What an operator submits when creating or editing a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateDraft {
    /// `None` creates a new template.
    #[serde(default)]
    pub id: Option<Uuid>,
    pub app_id: Uuid,
    pub name: String,
    pub steps: Vec<StepSource>,
    /// `environment → limit`; `None` leaves existing restrictions untouched.
    #[serde(default)]
    pub restrictions: Option<HashMap<Uuid, i64>>,
    #[serde(default)]
    pub pre_hook: Option<String>,
}

impl TemplateDraft {
    /// Checks that need no store: name present, at least one step, no negative limit.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.name.trim().is_empty() {
            return Err(EngineError::Validation("name is required".into()));
        }
        if self.steps.is_empty() {
            return Err(EngineError::Validation(
                "at least one step must be selected".into(),
            ));
        }
        if let Some(limits) = &self.restrictions {
            validate_limits(limits)?;
        }
        Ok(())
    }
}
