//! Shared enums for agent roles, tasks and outline handling.

use std::fmt;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

/// How the architect should treat the outline for this chapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutlineAction {
    CreateNew,
    Expand,
    UseExisting,
    UseApproved,
}

impl OutlineAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutlineAction::CreateNew => "create_new",
            OutlineAction::Expand => "expand",
            OutlineAction::UseExisting => "use_existing",
            OutlineAction::UseApproved => "use_approved",
        }
    }
}

impl fmt::Display for OutlineAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Architect,
    Writer,
    Editor,
    Evaluator,
}

impl AgentRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::Architect => "architect",
            AgentRole::Writer => "writer",
            AgentRole::Editor => "editor",
            AgentRole::Evaluator => "evaluator",
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Steps of the crew pipeline, executed in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskId {
    OutlineTask,
    WritingTask,
    EditingTask,
}

impl TaskId {
    pub const ALL: [TaskId; 3] = [TaskId::OutlineTask, TaskId::WritingTask, TaskId::EditingTask];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskId::OutlineTask => "outline_task",
            TaskId::WritingTask => "writing_task",
            TaskId::EditingTask => "editing_task",
        }
    }

    pub fn role(&self) -> AgentRole {
        match self {
            TaskId::OutlineTask => AgentRole::Architect,
            TaskId::WritingTask => AgentRole::Writer,
            TaskId::EditingTask => AgentRole::Editor,
        }
    }

    /// Accepts `outline_task` as well as the short form `outline`.
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|task| task.as_str() == value || task.as_str().trim_end_matches("_task") == value)
            .ok_or_else(|| {
                anyhow!(
                    "unknown task id '{value}' (expected one of: outline_task, writing_task, editing_task)"
                )
            })
    }

    /// This task and every task after it.
    pub fn from_here(self) -> Vec<TaskId> {
        Self::ALL.into_iter().filter(|task| *task >= self).collect()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outline_action_serializes_snake_case() {
        let json = serde_json::to_string(&OutlineAction::UseApproved).expect("serialize");
        assert_eq!(json, "\"use_approved\"");
        assert_eq!(OutlineAction::CreateNew.to_string(), "create_new");
    }

    #[test]
    fn task_id_parse_accepts_short_and_long_forms() {
        assert_eq!(TaskId::parse("writing").expect("parse"), TaskId::WritingTask);
        assert_eq!(TaskId::parse("Editing_Task").expect("parse"), TaskId::EditingTask);
        let err = TaskId::parse("review").unwrap_err();
        assert!(err.to_string().contains("unknown task id 'review'"));
    }

    #[test]
    fn from_here_keeps_pipeline_order() {
        assert_eq!(
            TaskId::WritingTask.from_here(),
            vec![TaskId::WritingTask, TaskId::EditingTask]
        );
        assert_eq!(TaskId::OutlineTask.from_here().len(), 3);
    }
}
