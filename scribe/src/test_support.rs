//! Test doubles and fixtures, enabled with the `test-support` feature.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use tempfile::TempDir;

use crate::core::types::AgentRole;
use crate::core::validator::ValidationRules;
use crate::io::approval::{Approval, ApprovalProvider, OutlineArtifact, OutlineChoice};
use crate::io::artifacts::ArtifactStore;
use crate::io::config::ScribeConfig;
use crate::io::executor::{ExecRequest, Executor};
use crate::io::paths::ProjectPaths;

/// One scripted agent answer.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Output(String),
    Fail(String),
}

/// Executor that answers from a queue and records every request.
///
/// Once the queue is empty it falls back to a per-role default: the
/// evaluator answers `Score: 7`, every other role `<role> output`.
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    replies: RefCell<VecDeque<ScriptedReply>>,
    requests: RefCell<Vec<ExecRequest>>,
}

impl ScriptedExecutor {
    pub fn new(replies: Vec<ScriptedReply>) -> Self {
        Self {
            replies: RefCell::new(replies.into()),
            requests: RefCell::new(Vec::new()),
        }
    }

    /// Queue plain outputs.
    pub fn with_outputs<S: AsRef<str>>(outputs: &[S]) -> Self {
        Self::new(
            outputs
                .iter()
                .map(|o| ScriptedReply::Output(o.as_ref().to_string()))
                .collect(),
        )
    }

    pub fn requests(&self) -> Vec<ExecRequest> {
        self.requests.borrow().clone()
    }

    pub fn roles(&self) -> Vec<AgentRole> {
        self.requests.borrow().iter().map(|r| r.role).collect()
    }

    fn default_reply(role: AgentRole) -> ScriptedReply {
        match role {
            AgentRole::Evaluator => ScriptedReply::Output("Score: 7".to_string()),
            role => ScriptedReply::Output(format!("{role} output")),
        }
    }
}

impl Executor for ScriptedExecutor {
    fn exec(&self, request: &ExecRequest) -> Result<()> {
        self.requests.borrow_mut().push(request.clone());
        let reply = self
            .replies
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Self::default_reply(request.role));
        match reply {
            ScriptedReply::Output(text) => fs::write(&request.output_path, text)
                .with_context(|| format!("write {}", request.output_path.display())),
            ScriptedReply::Fail(message) => Err(anyhow!(message)),
        }
    }
}

/// Approval provider answering from queues; an unexpected question is an error.
#[derive(Debug, Default)]
pub struct ScriptedApproval {
    choices: RefCell<VecDeque<OutlineChoice>>,
    approvals: RefCell<VecDeque<Approval>>,
    confirmations: RefCell<VecDeque<bool>>,
    revisions: Cell<usize>,
}

impl ScriptedApproval {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn choices(self, choices: &[OutlineChoice]) -> Self {
        self.choices.borrow_mut().extend(choices.iter().copied());
        self
    }

    pub fn approvals(self, approvals: &[Approval]) -> Self {
        self.approvals.borrow_mut().extend(approvals.iter().copied());
        self
    }

    pub fn confirmations(self, confirmations: &[bool]) -> Self {
        self.confirmations
            .borrow_mut()
            .extend(confirmations.iter().copied());
        self
    }

    /// Times the gate reported a rejected outline.
    pub fn revisions(&self) -> usize {
        self.revisions.get()
    }
}

impl ApprovalProvider for ScriptedApproval {
    fn choose_existing_outline(&self, chapter_number: u32, _existing: &str) -> Result<OutlineChoice> {
        match self.choices.borrow_mut().pop_front() {
            Some(choice) => Ok(choice),
            None => bail!("unexpected outline choice for chapter {chapter_number}"),
        }
    }

    fn request_approval(&self, artifact: &OutlineArtifact<'_>) -> Result<Approval> {
        match self.approvals.borrow_mut().pop_front() {
            Some(answer) => Ok(answer),
            None => bail!("unexpected approval request for chapter {}", artifact.chapter_number),
        }
    }

    fn confirm_writing(&self, chapter_number: u32) -> Result<bool> {
        match self.confirmations.borrow_mut().pop_front() {
            Some(answer) => Ok(answer),
            None => bail!("unexpected writing confirmation for chapter {chapter_number}"),
        }
    }

    fn notify_revision(&self, _artifact: &OutlineArtifact<'_>) -> Result<()> {
        self.revisions.set(self.revisions.get() + 1);
        Ok(())
    }
}

/// Temporary project root with a small knowledge base.
pub struct TestProject {
    temp: TempDir,
    pub paths: ProjectPaths,
}

impl TestProject {
    /// Project with `plot.txt`, `core_story_elements.txt` and `chapters.txt`.
    pub fn new() -> Result<Self> {
        let project = Self::empty()?;
        project.write_knowledge("plot.txt", "The exiled heir returns to the river city.")?;
        project.write_knowledge(
            "core_story_elements.txt",
            "Protagonist: Lin Mei, a disgraced archivist.",
        )?;
        project.write_knowledge(
            "chapters.txt",
            "Chapter 1: The Gate\nLin Mei reaches the city gate.\n\nChapter 2: The Archive\nShe finds the sealed ledger.",
        )?;
        Ok(project)
    }

    /// Project with an empty `knowledge/` directory.
    pub fn empty() -> Result<Self> {
        let temp = tempfile::tempdir().context("create tempdir")?;
        let paths = ProjectPaths::new(temp.path());
        fs::create_dir_all(&paths.knowledge_dir)
            .with_context(|| format!("create {}", paths.knowledge_dir.display()))?;
        Ok(Self { temp, paths })
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    pub fn write_knowledge(&self, name: &str, contents: &str) -> Result<()> {
        let path = self.paths.knowledge_dir.join(name);
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))
    }

    pub fn config(&self) -> ScribeConfig {
        ScribeConfig::default()
    }

    pub fn store(&self) -> ArtifactStore {
        ArtifactStore::new(&self.paths, ValidationRules::default())
    }
}

const PROSE_WORDS: [&str; 24] = [
    "the", "lantern", "swayed", "over", "wet", "stones", "while", "Mei", "counted", "her",
    "steps", "toward", "the", "archive", "door", "and", "listened", "for", "boots", "behind",
    "her", "in", "the", "rain",
];

/// Exactly `words` words of prose in twelve-word sentences.
pub fn prose(words: usize) -> String {
    let mut out = String::new();
    for i in 0..words {
        let word = PROSE_WORDS[i % PROSE_WORDS.len()];
        if i > 0 {
            out.push(' ');
        }
        out.push_str(word);
        if i % 12 == 11 || i + 1 == words {
            out.push('.');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::text::word_count;

    #[test]
    fn prose_has_requested_word_count() {
        assert_eq!(word_count(&prose(0)), 0);
        assert_eq!(word_count(&prose(25)), 25);
        assert_eq!(word_count(&prose(2000)), 2000);
        assert!(prose(13).ends_with('.'));
    }
}
