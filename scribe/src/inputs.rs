//! The input dictionary handed to every agent.

use anyhow::{Result, bail};
use chrono::{Datelike, Local};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::core::types::OutlineAction;
use crate::io::artifacts::ArtifactStore;
use crate::io::continuity::{previous_chapter_ending, previous_chapters};
use crate::io::knowledge::KnowledgeBase;

/// Agent inputs. Field names are the dictionary keys templates refer to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentInputs {
    pub chapter_number: String,
    pub current_year: String,
    pub knowledge_context: String,
    pub previous_chapter_context: String,
    pub previous_chapter_ending: String,
    /// Planning notes for this chapter found in the knowledge base.
    pub existing_draft: String,
    pub existing_outline: String,
    pub outline_action: OutlineAction,
    pub approved_outline: String,
}

impl AgentInputs {
    pub fn with_action(mut self, action: OutlineAction) -> Self {
        self.outline_action = action;
        self
    }
}

/// Fail unless at least one knowledge file exists; warn about the rest.
pub fn check_prerequisites(knowledge: &KnowledgeBase) -> Result<()> {
    let summary = knowledge.summary();
    if summary.available_files == 0 {
        bail!(
            "no knowledge files found in {} (expected some of: {})",
            knowledge.dir().display(),
            knowledge.catalog().join(", ")
        );
    }
    if summary.missing_files > 0 {
        warn!(
            missing = %summary.missing_file_names.join(", "),
            "some knowledge files are missing"
        );
    }
    Ok(())
}

/// Base inputs for `chapter_number`: knowledge, continuity and planning notes.
///
/// The outline fields start empty with `create_new`; the workflow fills them.
#[instrument(skip_all, fields(chapter_number = chapter_number))]
pub fn prepare_base_inputs(
    store: &ArtifactStore,
    knowledge: &KnowledgeBase,
    chapter_number: u32,
) -> AgentInputs {
    let existing_draft = knowledge.chapter_notes(chapter_number).unwrap_or_default();
    let inputs = AgentInputs {
        chapter_number: chapter_number.to_string(),
        current_year: Local::now().year().to_string(),
        knowledge_context: knowledge.load_all(),
        previous_chapter_context: previous_chapters(store, chapter_number),
        previous_chapter_ending: previous_chapter_ending(store, chapter_number),
        existing_draft,
        existing_outline: String::new(),
        outline_action: OutlineAction::CreateNew,
        approved_outline: String::new(),
    };
    info!(
        knowledge_bytes = inputs.knowledge_context.len(),
        continuity_bytes = inputs.previous_chapter_context.len(),
        has_notes = !inputs.existing_draft.is_empty(),
        "agent inputs prepared"
    );
    inputs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::validator::ValidationRules;
    use crate::io::knowledge::DEFAULT_CATALOG;
    use crate::io::paths::ProjectPaths;
    use std::fs;

    fn setup(files: &[(&str, &str)]) -> (tempfile::TempDir, ArtifactStore, KnowledgeBase) {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = ProjectPaths::new(temp.path());
        fs::create_dir_all(&paths.knowledge_dir).expect("mkdir");
        for (name, contents) in files {
            fs::write(paths.knowledge_dir.join(name), contents).expect("write");
        }
        let catalog: Vec<String> = DEFAULT_CATALOG.iter().map(|f| f.to_string()).collect();
        let store = ArtifactStore::new(&paths, ValidationRules::default());
        let knowledge = KnowledgeBase::new(&paths.knowledge_dir, &catalog);
        (temp, store, knowledge)
    }

    #[test]
    fn prerequisites_require_one_knowledge_file() {
        let (_temp, _store, knowledge) = setup(&[]);
        let err = check_prerequisites(&knowledge).unwrap_err();
        assert!(err.to_string().contains("no knowledge files found"));

        let (_temp, _store, knowledge) = setup(&[("plot.txt", "plot")]);
        check_prerequisites(&knowledge).expect("one file is enough");
    }

    #[test]
    fn base_inputs_for_first_chapter() {
        let (_temp, store, knowledge) = setup(&[
            ("plot.txt", "The heir returns."),
            ("chapters.txt", "Chapter 1: Arrival\nReach the gate."),
        ]);
        let inputs = prepare_base_inputs(&store, &knowledge, 1);
        assert_eq!(inputs.chapter_number, "1");
        assert_eq!(inputs.current_year.len(), 4);
        assert!(inputs.knowledge_context.contains("=== PLOT ===\nThe heir returns."));
        assert!(inputs.previous_chapter_ending.starts_with("This is Chapter 1"));
        assert_eq!(inputs.existing_draft, "Chapter 1: Arrival\nReach the gate.");
        assert_eq!(inputs.outline_action, OutlineAction::CreateNew);
    }

    /// The dictionary serializes with the keys the templates use.
    #[test]
    fn inputs_serialize_as_flat_dictionary() {
        let (_temp, store, knowledge) = setup(&[("plot.txt", "p")]);
        let inputs = prepare_base_inputs(&store, &knowledge, 2).with_action(OutlineAction::Expand);
        let value = serde_json::to_value(&inputs).expect("json");
        assert_eq!(value["chapter_number"], "2");
        assert_eq!(value["outline_action"], "expand");
        assert!(value.get("approved_outline").is_some());
    }
}
