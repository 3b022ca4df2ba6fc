//! Chain linker: threads each machine's directives into a singly linked chain.
//!
//! For a machine's directive at step `i` (`current`) and its directive at the
//! previous producing step (`predecessor`):
//!
//! - predecessor pluggable, current not: `current.pre_id = predecessor.id`
//! - anything else: `predecessor.next_id = current.id`
//!
//! The first directive seen for a machine is that machine's chain head.

use std::collections::HashMap;

use db::{DbError, Store, models::DirectiveRow};
use uuid::Uuid;

/// One pointer write produced by linking two neighbours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    /// `directive_id.pre_id = pre_id`
    Anchor { directive_id: Uuid, pre_id: Uuid },
    /// `directive_id.next_id = next_id`
    Forward { directive_id: Uuid, next_id: Uuid },
}

impl Link {
    pub fn between(predecessor: &DirectiveRow, current: &DirectiveRow) -> Self {
        if predecessor.pluggable && !current.pluggable {
            Self::Anchor {
                directive_id: current.id,
                pre_id: predecessor.id,
            }
        } else {
            Self::Forward {
                directive_id: predecessor.id,
                next_id: current.id,
            }
        }
    }

    pub async fn apply(&self, store: &dyn Store) -> Result<(), DbError> {
        match *self {
            Self::Anchor { directive_id, pre_id } => store.set_directive_pre(directive_id, pre_id).await,
            Self::Forward { directive_id, next_id } => {
                store.set_directive_next(directive_id, next_id).await
            }
        }
    }
}

/// Accumulates links as directives are produced, step after step.
#[derive(Debug, Default)]
pub struct ChainLinker {
    latest: HashMap<Uuid, DirectiveRow>,
    pending: Vec<Link>,
    heads: Vec<Uuid>,
}

impl ChainLinker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly produced directive. Must be called in step order.
    pub fn observe(&mut self, directive: &DirectiveRow) {
        match self.latest.insert(directive.machine_id, directive.clone()) {
            Some(predecessor) => self.pending.push(Link::between(&predecessor, directive)),
            None => self.heads.push(directive.id),
        }
    }

    /// Links recorded since the last call.
    pub fn take_links(&mut self) -> Vec<Link> {
        std::mem::take(&mut self.pending)
    }

    /// Ids of chain heads ("top directives"), one per machine, in first-seen order.
    pub fn heads(&self) -> &[Uuid] {
        &self.heads
    }
}
