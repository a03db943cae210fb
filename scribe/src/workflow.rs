//! Chapter workflow: one state machine, three modes.
//!
//! ```text
//! Start -> ContextLoaded -> OutlineResolved -> DraftGenerated -> Saved -> Done
//!                       \-> Cancelled (approval gate only)
//! ```
//!
//! - **Legacy**: no gate. An existing outline is used as-is; otherwise the
//!   crew plans, writes and edits in one kickoff.
//! - **Architect**: plan the outline and loop on the approval gate.
//! - **Complete**: the architect phase, a confirmation, then writer + editor.
//!
//! Any agent or I/O failure aborts the invocation. Nothing is rolled back:
//! an outline saved before a failed draft step stays on disk.

use std::fmt;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use tracing::{error, info, instrument};

use crate::agents::crew::{Crew, Kickoff};
use crate::core::state::{StateTrace, WorkflowState};
use crate::core::text::clean_text;
use crate::core::types::{OutlineAction, TaskId};
use crate::core::validator::{ValidationIssue, format_report, validate};
use crate::inputs::{AgentInputs, check_prerequisites, prepare_base_inputs};
use crate::io::approval::{Approval, ApprovalProvider, OutlineArtifact, OutlineChoice};
use crate::io::artifacts::ArtifactStore;
use crate::io::config::ScribeConfig;
use crate::io::executor::Executor;
use crate::io::knowledge::KnowledgeBase;
use crate::io::paths::ProjectPaths;
use crate::io::run_log::RunRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowMode {
    Legacy,
    Architect,
    Complete,
}

impl WorkflowMode {
    pub fn label(&self) -> &'static str {
        match self {
            WorkflowMode::Legacy => "legacy",
            WorkflowMode::Architect => "architect",
            WorkflowMode::Complete => "complete",
        }
    }
}

impl fmt::Display for WorkflowMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Draft written and validated.
    Completed,
    /// Architect mode finished with an approved outline.
    OutlineApproved,
    /// Complete mode stopped after the outline at the human's request.
    PausedAfterOutline,
    Cancelled,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::OutlineApproved => "outline_approved",
            WorkflowStatus::PausedAfterOutline => "paused_after_outline",
            WorkflowStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowOutcome {
    pub chapter_number: u32,
    pub mode: WorkflowMode,
    pub status: WorkflowStatus,
    pub outline_action: Option<OutlineAction>,
    pub outline_path: Option<PathBuf>,
    pub draft_path: Option<PathBuf>,
    pub issues: Vec<ValidationIssue>,
    pub run_ids: Vec<String>,
    pub trace: Vec<WorkflowState>,
}

impl WorkflowOutcome {
    fn new(chapter_number: u32, mode: WorkflowMode) -> Self {
        Self {
            chapter_number,
            mode,
            status: WorkflowStatus::Cancelled,
            outline_action: None,
            outline_path: None,
            draft_path: None,
            issues: Vec::new(),
            run_ids: Vec::new(),
            trace: Vec::new(),
        }
    }

    /// The last crew run of this invocation.
    pub fn run_id(&self) -> Option<&str> {
        self.run_ids.last().map(String::as_str)
    }

    /// Validation report of the saved draft, if one was written.
    pub fn validation_report(&self) -> Option<String> {
        self.draft_path.as_ref().map(|_| format_report(&self.issues))
    }
}

/// Result of the architect phase.
enum OutlineGate {
    Approved {
        action: OutlineAction,
        outline: String,
    },
    Cancelled {
        action: OutlineAction,
    },
}

pub struct Workflow<'a, E: Executor, A: ApprovalProvider> {
    paths: &'a ProjectPaths,
    config: &'a ScribeConfig,
    executor: &'a E,
    approval: &'a A,
}

impl<'a, E: Executor, A: ApprovalProvider> Workflow<'a, E, A> {
    pub fn new(
        paths: &'a ProjectPaths,
        config: &'a ScribeConfig,
        executor: &'a E,
        approval: &'a A,
    ) -> Self {
        Self {
            paths,
            config,
            executor,
            approval,
        }
    }

    fn store(&self) -> ArtifactStore {
        ArtifactStore::new(self.paths, self.config.validation.clone())
    }

    /// Run `mode` for `chapter_number`, or for the next unplanned chapter.
    #[instrument(skip_all, fields(mode = %mode))]
    pub fn run(&self, mode: WorkflowMode, chapter_number: Option<u32>) -> Result<WorkflowOutcome> {
        let store = self.store();
        let chapter_number = match chapter_number {
            Some(n) => n,
            None => store
                .next_chapter_number()
                .with_context(|| format!("{mode} workflow failed: cannot number chapter"))?,
        };
        info!(chapter_number, "workflow starting");

        self.run_chapter(mode, &store, chapter_number)
            .inspect(|outcome| {
                info!(chapter_number, status = outcome.status.as_str(), "workflow finished");
            })
            .map_err(|err| {
                error!(chapter_number, err = format!("{err:#}"), "workflow failed");
                err.context(format!(
                    "{mode} workflow failed for chapter {chapter_number}"
                ))
            })
    }

    fn run_chapter(
        &self,
        mode: WorkflowMode,
        store: &ArtifactStore,
        chapter_number: u32,
    ) -> Result<WorkflowOutcome> {
        let knowledge = KnowledgeBase::new(&self.paths.knowledge_dir, &self.config.knowledge.files);
        let mut trace = StateTrace::default();
        let mut outcome = WorkflowOutcome::new(chapter_number, mode);

        check_prerequisites(&knowledge)?;
        let inputs = prepare_base_inputs(store, &knowledge, chapter_number);
        trace.advance(WorkflowState::ContextLoaded)?;

        let crew = Crew::new(self.paths, self.config, self.executor);
        match mode {
            WorkflowMode::Legacy => {
                self.run_legacy(store, &crew, inputs, &mut trace, &mut outcome)?;
            }
            WorkflowMode::Architect | WorkflowMode::Complete => {
                self.run_gated(mode, store, &crew, inputs, &mut trace, &mut outcome)?;
            }
        }

        outcome.trace = trace.into_states();
        Ok(outcome)
    }

    fn run_legacy(
        &self,
        store: &ArtifactStore,
        crew: &Crew<'_, E>,
        mut inputs: AgentInputs,
        trace: &mut StateTrace,
        outcome: &mut WorkflowOutcome,
    ) -> Result<()> {
        let n = outcome.chapter_number;
        let record = if store.outline_exists(n) {
            let outline = store.load_outline(n)?;
            info!(chapter_number = n, "using existing outline");
            inputs.outline_action = OutlineAction::UseExisting;
            inputs.existing_outline = outline.clone();
            inputs.approved_outline = outline;
            trace.advance(WorkflowState::OutlineResolved)?;
            self.kickoff(crew, outcome, &inputs, &[TaskId::WritingTask, TaskId::EditingTask])?
        } else {
            inputs.outline_action = OutlineAction::CreateNew;
            let record = self.kickoff(crew, outcome, &inputs, &TaskId::ALL)?;
            let outline = record
                .output_of(TaskId::OutlineTask)
                .ok_or_else(|| anyhow!("crew produced no outline"))?;
            store.save_outline(n, outline)?;
            trace.advance(WorkflowState::OutlineResolved)?;
            record
        };
        outcome.outline_action = Some(inputs.outline_action);
        outcome.outline_path = Some(store.outline_path(n));

        self.finish_draft(store, &record, trace, outcome)
    }

    fn run_gated(
        &self,
        mode: WorkflowMode,
        store: &ArtifactStore,
        crew: &Crew<'_, E>,
        inputs: AgentInputs,
        trace: &mut StateTrace,
        outcome: &mut WorkflowOutcome,
    ) -> Result<()> {
        let n = outcome.chapter_number;
        let gate = self.architect_phase(store, crew, &inputs, outcome)?;
        outcome.outline_path = Some(store.outline_path(n));

        let outline = match gate {
            OutlineGate::Cancelled { action } => {
                outcome.outline_action = Some(action);
                trace.advance(WorkflowState::Cancelled)?;
                outcome.status = WorkflowStatus::Cancelled;
                info!(chapter_number = n, "outline rejected, workflow cancelled");
                return Ok(());
            }
            OutlineGate::Approved { action, outline } => {
                outcome.outline_action = Some(action);
                trace.advance(WorkflowState::OutlineResolved)?;
                outline
            }
        };

        if mode == WorkflowMode::Architect {
            outcome.status = WorkflowStatus::OutlineApproved;
            return Ok(());
        }
        if !self.approval.confirm_writing(n)? {
            outcome.status = WorkflowStatus::PausedAfterOutline;
            info!(chapter_number = n, "paused after outline");
            return Ok(());
        }

        let mut inputs = inputs.with_action(OutlineAction::UseApproved);
        inputs.approved_outline = outline;
        outcome.outline_action = Some(OutlineAction::UseApproved);
        let record = self.kickoff(
            crew,
            outcome,
            &inputs,
            &[TaskId::WritingTask, TaskId::EditingTask],
        )?;
        self.finish_draft(store, &record, trace, outcome)
    }

    /// Resolve the outline: reuse, expand or create it, then loop on the gate.
    fn architect_phase(
        &self,
        store: &ArtifactStore,
        crew: &Crew<'_, E>,
        inputs: &AgentInputs,
        outcome: &mut WorkflowOutcome,
    ) -> Result<OutlineGate> {
        let n = outcome.chapter_number;
        let (action, existing) = if store.outline_exists(n) {
            let existing = store.load_outline(n)?;
            match self.approval.choose_existing_outline(n, &existing)? {
                OutlineChoice::UseAsIs => {
                    info!(chapter_number = n, "existing outline used as-is");
                    return Ok(OutlineGate::Approved {
                        action: OutlineAction::UseExisting,
                        outline: existing,
                    });
                }
                OutlineChoice::Expand => (OutlineAction::Expand, existing),
                OutlineChoice::Regenerate => (OutlineAction::CreateNew, String::new()),
            }
        } else {
            (OutlineAction::CreateNew, String::new())
        };

        let mut architect_inputs = inputs.clone().with_action(action);
        architect_inputs.existing_outline = existing;
        let record = self.kickoff(crew, outcome, &architect_inputs, &[TaskId::OutlineTask])?;
        let generated = record
            .output_of(TaskId::OutlineTask)
            .ok_or_else(|| anyhow!("architect produced no outline"))?;
        let path = store.save_outline(n, generated)?;

        loop {
            let current = store.load_outline(n)?;
            let artifact = OutlineArtifact {
                chapter_number: n,
                path: &path,
                text: &current,
            };
            match self.approval.request_approval(&artifact)? {
                Approval::Approve => {
                    // The human may have edited the file before approving.
                    let outline = store.load_outline(n)?;
                    return Ok(OutlineGate::Approved { action, outline });
                }
                Approval::Reject => self.approval.notify_revision(&artifact)?,
                Approval::Cancel => return Ok(OutlineGate::Cancelled { action }),
            }
        }
    }

    fn kickoff(
        &self,
        crew: &Crew<'_, E>,
        outcome: &mut WorkflowOutcome,
        inputs: &AgentInputs,
        tasks: &[TaskId],
    ) -> Result<RunRecord> {
        let record = crew.kickoff(Kickoff {
            label: outcome.mode.label(),
            chapter_number: outcome.chapter_number,
            inputs,
            tasks,
            carried: Vec::new(),
        })?;
        outcome.run_ids.push(record.run_id.clone());
        Ok(record)
    }

    fn finish_draft(
        &self,
        store: &ArtifactStore,
        record: &RunRecord,
        trace: &mut StateTrace,
        outcome: &mut WorkflowOutcome,
    ) -> Result<()> {
        let draft = record
            .output_of(TaskId::EditingTask)
            .map(clean_text)
            .ok_or_else(|| anyhow!("crew produced no edited draft"))?;
        trace.advance(WorkflowState::DraftGenerated)?;

        let path = store.save_draft(outcome.chapter_number, &draft, true)?;
        trace.advance(WorkflowState::Saved)?;

        outcome.issues = validate(&draft, &self.config.validation);
        outcome.draft_path = Some(path);
        outcome.status = WorkflowStatus::Completed;
        trace.advance(WorkflowState::Done)?;
        Ok(())
    }
}
