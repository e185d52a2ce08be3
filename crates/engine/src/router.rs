//! Strategist/Router: the pure decision core of a turn.
//!
//! `Router::decide` looks at per-source progress and returns the next
//! [`Action`]. It never mutates state; the Routing node of the executor
//! applies the returned [`Decision`].
//!
//! Rules, evaluated in order:
//! 1. The first `untried` source (in the configured order) is searched.
//! 2. The first `searched` source with no relevant passages and refinement
//!    budget left gets its query refined, then is searched again.
//! 3. Searched sources with no relevant passages and no budget left are
//!    marked `exhausted`. This is computed before rules 1 and 2 so the
//!    marks travel with whatever action is chosen.
//! 4. Otherwise the turn is synthesized.

use crate::source::{SourceId, SourceState, SourceStatus};
use crate::state::TurnState;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What the executor should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "source", rename_all = "snake_case")]
pub enum Action {
    RefineQuery(SourceId),
    Search(SourceId),
    Synthesize,
}

impl Action {
    pub fn source(&self) -> Option<SourceId> {
        match self {
            Self::RefineQuery(source) | Self::Search(source) => Some(*source),
            Self::Synthesize => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RefineQuery(source) => write!(f, "refine({})", source),
            Self::Search(source) => write!(f, "search({})", source),
            Self::Synthesize => f.write_str("synthesize"),
        }
    }
}

/// Router output: the action plus sources that must now be marked exhausted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub action: Action,
    pub exhausted: Vec<SourceId>,
}

#[derive(Debug, Clone)]
pub struct Router {
    max_refinements: u32,
    order: Vec<SourceId>,
}

impl Router {
    pub fn new(max_refinements: u32, order: Vec<SourceId>) -> Self {
        Self {
            max_refinements,
            order,
        }
    }

    pub fn max_refinements(&self) -> u32 {
        self.max_refinements
    }

    /// Upper bound on Routing steps in one turn.
    pub fn step_bound(&self) -> usize {
        self.order.len() * (self.max_refinements as usize + 2)
    }

    pub fn decide(&self, state: &TurnState) -> Decision {
        let progress = &state.source_progress;

        let exhausted: Vec<SourceId> = self
            .order
            .iter()
            .copied()
            .filter(|id| self.out_of_budget(progress.get(*id)))
            .collect();

        let untried = self
            .order
            .iter()
            .copied()
            .find(|id| progress.get(*id).state == SourceState::Untried);

        let action = if let Some(source) = untried {
            Action::Search(source)
        } else if let Some(source) = self
            .order
            .iter()
            .copied()
            .find(|id| self.can_refine(progress.get(*id)))
        {
            Action::RefineQuery(source)
        } else {
            Action::Synthesize
        };

        Decision { action, exhausted }
    }

    fn can_refine(&self, status: &SourceStatus) -> bool {
        status.state == SourceState::Searched
            && status.relevant_found == 0
            && status.attempts_used < self.max_refinements
    }

    fn out_of_budget(&self, status: &SourceStatus) -> bool {
        status.state == SourceState::Searched
            && status.relevant_found == 0
            && status.attempts_used >= self.max_refinements
    }
}
