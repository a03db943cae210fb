//! Crew maintenance: `train`, `replay` and `test`.
//!
//! These commands drive the crew directly on base inputs. They record runs
//! under `.scribe/runs/` but never write to `outlines/` or `chapters/`.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result, bail};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::agents::Agent;
use crate::agents::crew::{Crew, Kickoff};
use crate::core::types::{AgentRole, TaskId};
use crate::core::validator::{ValidationSummary, summarize, validate};
use crate::inputs::{AgentInputs, check_prerequisites, prepare_base_inputs};
use crate::io::artifacts::ArtifactStore;
use crate::io::config::ScribeConfig;
use crate::io::executor::Executor;
use crate::io::knowledge::KnowledgeBase;
use crate::io::paths::ProjectPaths;
use crate::io::run_log::{RunPaths, RunRecord, TaskRecord, load_latest_run, now_timestamp, write_json_atomic};

static SCORE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bscore\s*[:=]?\s*(\d{1,2})(?:\s*/\s*10)?\b").expect("score regex")
});
static BARE_SCORE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d{1,2})(?:\s*/\s*10)?\s*$").expect("bare score regex"));

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainingIteration {
    pub iteration: u32,
    pub run_id: String,
    pub tasks: Vec<TaskRecord>,
    /// Validation of the edited draft.
    pub validation: ValidationSummary,
}

/// Contents of the training file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainingRecord {
    pub chapter_number: u32,
    pub created_at: String,
    pub iterations: Vec<TrainingIteration>,
}

/// Evaluator scores of one task across iterations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskScores {
    pub task: TaskId,
    /// One entry per iteration; `None` when no score could be read.
    pub scores: Vec<Option<u8>>,
}

impl TaskScores {
    pub fn average(&self) -> Option<f64> {
        let scored: Vec<f64> = self.scores.iter().flatten().map(|s| f64::from(*s)).collect();
        if scored.is_empty() {
            return None;
        }
        Some(scored.iter().sum::<f64>() / scored.len() as f64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub chapter_number: u32,
    pub eval_model: String,
    pub iterations: u32,
    pub rows: Vec<TaskScores>,
}

impl EvaluationReport {
    /// Score table: one row per task, one column per iteration, then the average.
    pub fn render(&self) -> String {
        let mut out = format!(
            "Task scores for chapter {} (evaluator: {})\n",
            self.chapter_number, self.eval_model
        );
        let _ = write!(out, "{:<14}", "task");
        for i in 1..=self.iterations {
            let _ = write!(out, " {:>6}", format!("run {i}"));
        }
        let _ = writeln!(out, " {:>8}", "average");
        for row in &self.rows {
            let _ = write!(out, "{:<14}", row.task.as_str());
            for score in &row.scores {
                let cell = score.map_or_else(|| "-".to_string(), |s| s.to_string());
                let _ = write!(out, " {cell:>6}");
            }
            let average = row
                .average()
                .map_or_else(|| "-".to_string(), |a| format!("{a:.2}"));
            let _ = writeln!(out, " {average:>8}");
        }
        out
    }
}

/// Read a 1-10 score from evaluator output.
///
/// Accepts `Score: N` anywhere in the text, or a reply that is only a number.
pub fn parse_score(text: &str) -> Option<u8> {
    let captures = SCORE_RE
        .captures(text)
        .or_else(|| BARE_SCORE_RE.captures(text))?;
    let score: u8 = captures[1].parse().ok()?;
    (1..=10).contains(&score).then_some(score)
}

pub struct Trainer<'a, E: Executor> {
    paths: &'a ProjectPaths,
    config: &'a ScribeConfig,
    executor: &'a E,
}

impl<'a, E: Executor> Trainer<'a, E> {
    pub fn new(paths: &'a ProjectPaths, config: &'a ScribeConfig, executor: &'a E) -> Self {
        Self {
            paths,
            config,
            executor,
        }
    }

    fn crew(&self) -> Crew<'a, E> {
        Crew::new(self.paths, self.config, self.executor)
    }

    /// Chapter number and base inputs, as the workflows prepare them.
    fn base_inputs(&self, chapter_number: Option<u32>) -> Result<(u32, AgentInputs)> {
        let store = ArtifactStore::new(self.paths, self.config.validation.clone());
        let chapter_number = match chapter_number {
            Some(n) => n,
            None => store.next_chapter_number()?,
        };
        let knowledge = KnowledgeBase::new(&self.paths.knowledge_dir, &self.config.knowledge.files);
        check_prerequisites(&knowledge)?;
        Ok((chapter_number, prepare_base_inputs(&store, &knowledge, chapter_number)))
    }

    fn full_run(&self, label: &str, chapter_number: u32, inputs: &AgentInputs) -> Result<RunRecord> {
        self.crew().kickoff(Kickoff {
            label,
            chapter_number,
            inputs,
            tasks: &TaskId::ALL,
            carried: Vec::new(),
        })
    }

    /// Run the full crew `iterations` times and write the outputs to `filename`.
    #[instrument(skip_all, fields(iterations = iterations, filename = %filename.display()))]
    pub fn train(&self, iterations: u32, filename: &Path, chapter_number: Option<u32>) -> Result<TrainingRecord> {
        if iterations == 0 {
            bail!("iterations must be at least 1");
        }
        let (chapter_number, inputs) = self.base_inputs(chapter_number)?;
        let mut record = TrainingRecord {
            chapter_number,
            created_at: now_timestamp(),
            iterations: Vec::new(),
        };

        for iteration in 1..=iterations {
            let run = self
                .full_run("train", chapter_number, &inputs)
                .with_context(|| format!("training iteration {iteration} failed"))?;
            let draft = run.output_of(TaskId::EditingTask).unwrap_or_default();
            let validation = summarize(&validate(draft, &self.config.validation));
            info!(iteration, run_id = %run.run_id, errors = validation.errors, "training iteration done");
            record.iterations.push(TrainingIteration {
                iteration,
                run_id: run.run_id,
                tasks: run.tasks,
                validation,
            });
        }

        write_json_atomic(filename, &record)
            .with_context(|| format!("write training file {}", filename.display()))?;
        Ok(record)
    }

    /// Re-run the latest run from `from` onward, keeping earlier outputs.
    #[instrument(skip_all, fields(from = %from))]
    pub fn replay(&self, from: TaskId) -> Result<RunRecord> {
        let latest = load_latest_run(self.paths)?;
        let carried: Vec<TaskRecord> = latest
            .tasks
            .iter()
            .filter(|record| record.task < from)
            .cloned()
            .collect();
        info!(
            source = %latest.run_id,
            carried = carried.len(),
            "replaying run"
        );
        self.crew()
            .kickoff(Kickoff {
                label: "replay",
                chapter_number: latest.chapter_number,
                inputs: &latest.inputs,
                tasks: &from.from_here(),
                carried,
            })
            .with_context(|| format!("replay of {} from {from} failed", latest.run_id))
    }

    /// Run the crew `iterations` times and score every task output.
    #[instrument(skip_all, fields(iterations = iterations, eval_model = eval_model))]
    pub fn test(&self, iterations: u32, eval_model: &str, chapter_number: Option<u32>) -> Result<EvaluationReport> {
        if iterations == 0 {
            bail!("iterations must be at least 1");
        }
        let (chapter_number, inputs) = self.base_inputs(chapter_number)?;
        let crew = self.crew();
        let evaluator = Agent::new(AgentRole::Evaluator, self.config).with_model(eval_model);
        let mut scores: BTreeMap<TaskId, Vec<Option<u8>>> = BTreeMap::new();

        for iteration in 1..=iterations {
            let run = self
                .full_run("test", chapter_number, &inputs)
                .with_context(|| format!("test iteration {iteration} failed"))?;
            let run_paths = RunPaths::new(self.paths, &run.run_id);
            for task in &run.tasks {
                let name = format!("{}.eval", task.task);
                let verdict = crew
                    .evaluate(&evaluator, &run_paths, &name, &inputs, task.task, &task.output)
                    .with_context(|| format!("evaluating {} failed", task.task))?;
                let score = parse_score(&verdict);
                if score.is_none() {
                    warn!(task = %task.task, iteration, "evaluator reply has no score");
                }
                scores.entry(task.task).or_default().push(score);
            }
        }

        Ok(EvaluationReport {
            chapter_number,
            eval_model: evaluator.model().to_string(),
            iterations,
            rows: scores
                .into_iter()
                .map(|(task, scores)| TaskScores { task, scores })
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_score_accepts_labelled_and_bare_numbers() {
        assert_eq!(parse_score("Solid pacing.\nScore: 8/10"), Some(8));
        assert_eq!(parse_score("score=10"), Some(10));
        assert_eq!(parse_score("  7 "), Some(7));
        assert_eq!(parse_score("Score: 0"), None);
        assert_eq!(parse_score("Score: 11"), None);
        assert_eq!(parse_score("Chapter 3 is fine"), None);
    }

    #[test]
    fn average_ignores_missing_scores() {
        let row = TaskScores {
            task: TaskId::WritingTask,
            scores: vec![Some(6), None, Some(9)],
        };
        assert_eq!(row.average(), Some(7.5));
        let empty = TaskScores {
            task: TaskId::EditingTask,
            scores: vec![None],
        };
        assert_eq!(empty.average(), None);
    }

    #[test]
    fn report_renders_one_row_per_task() {
        let report = EvaluationReport {
            chapter_number: 4,
            eval_model: "judge".to_string(),
            iterations: 2,
            rows: vec![
                TaskScores {
                    task: TaskId::OutlineTask,
                    scores: vec![Some(8), Some(7)],
                },
                TaskScores {
                    task: TaskId::EditingTask,
                    scores: vec![None, Some(5)],
                },
            ],
        };
        let table = report.render();
        assert!(table.starts_with("Task scores for chapter 4 (evaluator: judge)\n"));
        assert!(table.contains("run 2"));
        let outline_row = table
            .lines()
            .find(|line| line.starts_with("outline_task"))
            .expect("outline row");
        assert!(outline_row.ends_with("7.50"));
        let editing_row = table
            .lines()
            .find(|line| line.starts_with("editing_task"))
            .expect("editing row");
        assert!(editing_row.contains(" -"));
        assert!(editing_row.ends_with("5.00"));
    }
}
