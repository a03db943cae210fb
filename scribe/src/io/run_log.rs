//! Per-run records under `.scribe/runs/<run-id>/`.
//!
//! Every crew kickoff gets a directory holding the prompt, raw output and
//! executor log of each task plus `record.json`. The id of the latest run is
//! kept in `.scribe/state/run_state.json` so `replay` can find it.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::types::TaskId;
use crate::inputs::AgentInputs;

use super::paths::ProjectPaths;

/// Pointer to the most recent run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunState {
    pub last_run_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskRecord {
    pub task: TaskId,
    pub output: String,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunRecord {
    pub run_id: String,
    /// What started the run (`legacy`, `complete`, `train`, `replay`, ...).
    pub workflow: String,
    pub chapter_number: u32,
    pub started_at: String,
    pub inputs: AgentInputs,
    pub tasks: Vec<TaskRecord>,
}

impl RunRecord {
    pub fn output_of(&self, task: TaskId) -> Option<&str> {
        self.tasks
            .iter()
            .rev()
            .find(|t| t.task == task)
            .map(|t| t.output.as_str())
    }
}

/// Files of one run.
#[derive(Debug, Clone)]
pub struct RunPaths {
    pub dir: PathBuf,
    pub record_path: PathBuf,
}

impl RunPaths {
    pub fn new(paths: &ProjectPaths, run_id: &str) -> Self {
        let dir = paths.runs_dir.join(run_id);
        Self {
            record_path: dir.join("record.json"),
            dir,
        }
    }

    pub fn prompt_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.prompt.md"))
    }

    /// Raw result of the call labelled `name` (a task id or an evaluation).
    pub fn output_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.output.txt"))
    }

    pub fn executor_log_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.executor.log"))
    }
}

/// A fresh, unused run id: `<label>-<timestamp>`, suffixed on collision.
pub fn new_run_id(paths: &ProjectPaths, label: &str) -> String {
    let base = format!("{label}-{}", Local::now().format("%Y%m%dT%H%M%S"));
    if !paths.runs_dir.join(&base).exists() {
        return base;
    }
    (2u32..)
        .map(|n| format!("{base}-{n}"))
        .find(|id| !paths.runs_dir.join(id).exists())
        .unwrap_or(base)
}

pub fn now_timestamp() -> String {
    Local::now().to_rfc3339()
}

/// Write `record.json` and point the run state at it.
pub fn write_run_record(paths: &ProjectPaths, record: &RunRecord) -> Result<RunPaths> {
    let run_paths = RunPaths::new(paths, &record.run_id);
    fs::create_dir_all(&run_paths.dir)
        .with_context(|| format!("create run dir {}", run_paths.dir.display()))?;
    write_json_atomic(&run_paths.record_path, record)?;
    write_json_atomic(
        &paths.run_state_path,
        &RunState {
            last_run_id: Some(record.run_id.clone()),
        },
    )?;
    debug!(run_id = %record.run_id, tasks = record.tasks.len(), "run record written");
    Ok(run_paths)
}

pub fn load_run_record(paths: &ProjectPaths, run_id: &str) -> Result<RunRecord> {
    let path = RunPaths::new(paths, run_id).record_path;
    let contents =
        fs::read_to_string(&path).with_context(|| format!("read run record {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse run record {}", path.display()))
}

/// The most recent run, or an error when nothing has run yet.
pub fn load_latest_run(paths: &ProjectPaths) -> Result<RunRecord> {
    if !paths.run_state_path.exists() {
        return Err(anyhow!("no previous run found (run a workflow first)"));
    }
    let contents = fs::read_to_string(&paths.run_state_path)
        .with_context(|| format!("read run state {}", paths.run_state_path.display()))?;
    let state: RunState = serde_json::from_str(&contents)
        .with_context(|| format!("parse run state {}", paths.run_state_path.display()))?;
    let run_id = state
        .last_run_id
        .ok_or_else(|| anyhow!("no previous run found (run a workflow first)"))?;
    load_run_record(paths, &run_id)
}

pub fn write_text(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("write {}", path.display()))
}

/// Pretty JSON via temp file + rename.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let mut buf = serde_json::to_string_pretty(value)?;
    buf.push('\n');
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, buf).with_context(|| format!("write temp {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::OutlineAction;

    fn record(run_id: &str) -> RunRecord {
        RunRecord {
            run_id: run_id.to_string(),
            workflow: "legacy".to_string(),
            chapter_number: 2,
            started_at: "2026-01-01T00:00:00+00:00".to_string(),
            inputs: AgentInputs {
                chapter_number: "2".to_string(),
                current_year: "2026".to_string(),
                knowledge_context: String::new(),
                previous_chapter_context: String::new(),
                previous_chapter_ending: String::new(),
                existing_draft: String::new(),
                existing_outline: String::new(),
                outline_action: OutlineAction::CreateNew,
                approved_outline: String::new(),
            },
            tasks: vec![
                TaskRecord {
                    task: TaskId::OutlineTask,
                    output: "outline".to_string(),
                    duration_ms: 5,
                },
                TaskRecord {
                    task: TaskId::WritingTask,
                    output: "draft".to_string(),
                    duration_ms: 7,
                },
            ],
        }
    }

    /// The latest pointer follows the most recently written record.
    #[test]
    fn latest_run_follows_last_write() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = ProjectPaths::new(temp.path());
        write_run_record(&paths, &record("run-a")).expect("write a");
        write_run_record(&paths, &record("run-b")).expect("write b");

        let latest = load_latest_run(&paths).expect("latest");
        assert_eq!(latest.run_id, "run-b");
        assert_eq!(latest.output_of(TaskId::WritingTask), Some("draft"));
        assert_eq!(latest.output_of(TaskId::EditingTask), None);
        assert_eq!(load_run_record(&paths, "run-a").expect("a"), record("run-a"));
    }

    #[test]
    fn missing_run_state_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = load_latest_run(&ProjectPaths::new(temp.path())).unwrap_err();
        assert!(err.to_string().contains("no previous run"));
    }

    #[test]
    fn run_ids_do_not_collide() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = ProjectPaths::new(temp.path());
        let first = new_run_id(&paths, "legacy");
        fs::create_dir_all(paths.runs_dir.join(&first)).expect("mkdir");
        let second = new_run_id(&paths, "legacy");
        assert_ne!(first, second);
        assert!(second.starts_with("legacy-"));
    }
}
