//! Sequential outline -> writing -> editing pipeline.
//!
//! Each task's output becomes the next task's context. The run record is
//! rewritten after every task, so a failed kickoff still leaves the finished
//! tasks available to `replay`.

use std::time::Instant;

use anyhow::{Context, Result, anyhow};
use tracing::{info, instrument};

use crate::core::style::{analyze_style, style_guide};
use crate::core::types::TaskId;
use crate::inputs::AgentInputs;
use crate::io::artifacts::ArtifactStore;
use crate::io::config::ScribeConfig;
use crate::io::executor::Executor;
use crate::io::paths::ProjectPaths;
use crate::io::prompt::PromptExtras;
use crate::io::run_log::{
    RunPaths, RunRecord, TaskRecord, new_run_id, now_timestamp, write_run_record,
};

use super::Agent;

/// Style guide focus areas handed to the editor.
const EDITOR_FOCUS: [&str; 2] = ["general", "dialogue"];

/// A crew kickoff request.
#[derive(Debug, Clone)]
pub struct Kickoff<'a> {
    /// Recorded as the run's origin and used as the run id prefix.
    pub label: &'a str,
    pub chapter_number: u32,
    pub inputs: &'a AgentInputs,
    /// Tasks to execute, in order.
    pub tasks: &'a [TaskId],
    /// Outputs carried over from an earlier run (replay).
    pub carried: Vec<TaskRecord>,
}

pub struct Crew<'a, E: Executor> {
    paths: &'a ProjectPaths,
    config: &'a ScribeConfig,
    executor: &'a E,
    store: ArtifactStore,
}

impl<'a, E: Executor> Crew<'a, E> {
    pub fn new(paths: &'a ProjectPaths, config: &'a ScribeConfig, executor: &'a E) -> Self {
        Self {
            paths,
            config,
            executor,
            store: ArtifactStore::new(paths, config.validation.clone()),
        }
    }

    /// Run the requested tasks in order and return the run record.
    #[instrument(skip_all, fields(label = request.label, chapter_number = request.chapter_number))]
    pub fn kickoff(&self, request: Kickoff<'_>) -> Result<RunRecord> {
        let mut record = RunRecord {
            run_id: new_run_id(self.paths, request.label),
            workflow: request.label.to_string(),
            chapter_number: request.chapter_number,
            started_at: now_timestamp(),
            inputs: request.inputs.clone(),
            tasks: request.carried,
        };
        let run = RunPaths::new(self.paths, &record.run_id);
        info!(run_id = %record.run_id, tasks = request.tasks.len(), "crew kickoff");

        for &task in request.tasks {
            let started = Instant::now();
            let output = self
                .run_task(task, &record, &run)
                .with_context(|| format!("{task} failed"))?;
            record.tasks.push(TaskRecord {
                task,
                output,
                duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            });
            write_run_record(self.paths, &record)?;
        }
        if request.tasks.is_empty() {
            write_run_record(self.paths, &record)?;
        }
        Ok(record)
    }

    fn run_task(&self, task: TaskId, record: &RunRecord, run: &RunPaths) -> Result<String> {
        let mut inputs = record.inputs.clone();
        let mut extras = PromptExtras::default();
        match task {
            TaskId::OutlineTask => {}
            TaskId::WritingTask => {
                let outline = record
                    .output_of(TaskId::OutlineTask)
                    .map(str::to_string)
                    .unwrap_or_else(|| inputs.approved_outline.clone());
                if outline.trim().is_empty() {
                    return Err(anyhow!("no outline available for the writing task"));
                }
                extras.context = Some(outline);
            }
            TaskId::EditingTask => {
                let draft = record
                    .output_of(TaskId::WritingTask)
                    .ok_or_else(|| anyhow!("no draft available for the editing task"))?;
                if let Some(outline) = record.output_of(TaskId::OutlineTask) {
                    inputs.approved_outline = outline.to_string();
                }
                extras.context = Some(draft.to_string());
                extras.style_report =
                    Some(analyze_style(&self.earlier_prose(record.chapter_number)).render());
                extras.style_guide = Some(
                    EDITOR_FOCUS
                        .iter()
                        .map(|focus| style_guide(focus))
                        .collect::<Vec<_>>()
                        .join("\n\n"),
                );
            }
        }
        Agent::new(task.role(), self.config).run(
            self.executor,
            &self.paths.root,
            run,
            task.as_str(),
            &inputs,
            &extras,
        )
    }

    /// Drafts of every chapter before `chapter_number`, concatenated.
    fn earlier_prose(&self, chapter_number: u32) -> String {
        (1..chapter_number)
            .filter_map(|n| self.store.load_draft(n).ok())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Score one task output with the evaluator role.
    pub fn evaluate(
        &self,
        evaluator: &Agent,
        run: &RunPaths,
        name: &str,
        inputs: &AgentInputs,
        task: TaskId,
        output: &str,
    ) -> Result<String> {
        let extras = PromptExtras {
            context: Some(output.to_string()),
            task: Some(format!("{task} ({} agent)", task.role())),
            ..PromptExtras::default()
        };
        evaluator.run(self.executor, &self.paths.root, run, name, inputs, &extras)
    }
}
