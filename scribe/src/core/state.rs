//! Workflow states and the transitions allowed between them.

use std::fmt;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Start,
    ContextLoaded,
    OutlineResolved,
    DraftGenerated,
    Saved,
    Done,
    Cancelled,
}

impl WorkflowState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowState::Start => "start",
            WorkflowState::ContextLoaded => "context_loaded",
            WorkflowState::OutlineResolved => "outline_resolved",
            WorkflowState::DraftGenerated => "draft_generated",
            WorkflowState::Saved => "saved",
            WorkflowState::Done => "done",
            WorkflowState::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowState::Done | WorkflowState::Cancelled)
    }

    /// Legal successor states.
    ///
    /// `Cancelled` is only reachable from the approval gate, which runs while
    /// the context is loaded and the outline is not yet resolved.
    pub fn successors(&self) -> &'static [WorkflowState] {
        match self {
            WorkflowState::Start => &[WorkflowState::ContextLoaded],
            WorkflowState::ContextLoaded => {
                &[WorkflowState::OutlineResolved, WorkflowState::Cancelled]
            }
            WorkflowState::OutlineResolved => &[WorkflowState::DraftGenerated],
            WorkflowState::DraftGenerated => &[WorkflowState::Saved],
            WorkflowState::Saved => &[WorkflowState::Done],
            WorkflowState::Done | WorkflowState::Cancelled => &[],
        }
    }

    pub fn can_transition(&self, next: WorkflowState) -> bool {
        self.successors().contains(&next)
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered record of visited states; rejects illegal moves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateTrace {
    states: Vec<WorkflowState>,
}

impl Default for StateTrace {
    fn default() -> Self {
        Self {
            states: vec![WorkflowState::Start],
        }
    }
}

impl StateTrace {
    pub fn current(&self) -> WorkflowState {
        self.states
            .last()
            .copied()
            .unwrap_or(WorkflowState::Start)
    }

    pub fn advance(&mut self, next: WorkflowState) -> Result<()> {
        let current = self.current();
        if !current.can_transition(next) {
            bail!("illegal workflow transition {current} -> {next}");
        }
        self.states.push(next);
        Ok(())
    }

    pub fn states(&self) -> &[WorkflowState] {
        &self.states
    }

    pub fn into_states(self) -> Vec<WorkflowState> {
        self.states
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_path_is_legal() {
        let mut trace = StateTrace::default();
        for next in [
            WorkflowState::ContextLoaded,
            WorkflowState::OutlineResolved,
            WorkflowState::DraftGenerated,
            WorkflowState::Saved,
            WorkflowState::Done,
        ] {
            trace.advance(next).expect("legal transition");
        }
        assert!(trace.current().is_terminal());
        assert_eq!(trace.states().len(), 6);
    }

    /// Cancellation is only possible at the approval gate.
    #[test]
    fn cancel_only_from_context_loaded() {
        assert!(WorkflowState::ContextLoaded.can_transition(WorkflowState::Cancelled));
        assert!(!WorkflowState::OutlineResolved.can_transition(WorkflowState::Cancelled));
        assert!(!WorkflowState::Start.can_transition(WorkflowState::Cancelled));
    }

    #[test]
    fn skipping_states_is_rejected() {
        let mut trace = StateTrace::default();
        let err = trace.advance(WorkflowState::Saved).unwrap_err();
        assert!(err.to_string().contains("start -> saved"));
        assert_eq!(trace.current(), WorkflowState::Start);
    }
}
