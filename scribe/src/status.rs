//! Project status report.

use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::Result;
use serde::Serialize;

use crate::io::artifacts::{ArtifactStore, ChapterInfo};
use crate::io::config::ScribeConfig;
use crate::io::knowledge::{KnowledgeBase, KnowledgeSummary};
use crate::io::paths::ProjectPaths;

/// Chapters shown in the report, counted from the end.
const RECENT_CHAPTERS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectStatus {
    pub root: PathBuf,
    pub next_chapter_number: u32,
    pub total_chapters: usize,
    pub recent_chapters: Vec<ChapterInfo>,
    pub knowledge: KnowledgeSummary,
}

pub fn project_status(paths: &ProjectPaths, config: &ScribeConfig) -> Result<ProjectStatus> {
    let store = ArtifactStore::new(paths, config.validation.clone());
    let knowledge = KnowledgeBase::new(&paths.knowledge_dir, &config.knowledge.files);
    let chapters = store.list_chapters()?;
    let skip = chapters.len().saturating_sub(RECENT_CHAPTERS);
    Ok(ProjectStatus {
        root: paths.root.clone(),
        next_chapter_number: store.next_chapter_number()?,
        total_chapters: chapters.len(),
        recent_chapters: chapters.into_iter().skip(skip).collect(),
        knowledge: knowledge.summary(),
    })
}

fn flag(present: bool) -> &'static str {
    if present { "✅" } else { "❌" }
}

impl ProjectStatus {
    pub fn render(&self) -> String {
        let mut out = String::from("Scribe project status\n");
        let _ = writeln!(out, "Project root: {}", self.root.display());
        let _ = writeln!(out, "Next chapter: {}", self.next_chapter_number);
        let _ = writeln!(out, "Total chapters: {}", self.total_chapters);

        if !self.recent_chapters.is_empty() {
            out.push_str("\nChapters:\n");
            for chapter in &self.recent_chapters {
                let words = chapter
                    .word_count
                    .map(|w| format!(" ({w} words)"))
                    .unwrap_or_default();
                let _ = writeln!(
                    out,
                    "  Chapter {}: Outline {} | Draft {}{words}",
                    chapter.number,
                    flag(chapter.outline_exists),
                    flag(chapter.draft_exists),
                );
            }
        }

        let k = &self.knowledge;
        out.push_str("\nKnowledge base:\n");
        let _ = writeln!(out, "  Available files: {}/{}", k.available_files, k.total_files);
        let _ = writeln!(out, "  Completeness: {:.1}%", k.completeness_percentage);
        if k.missing_files > 0 {
            let _ = writeln!(out, "  Missing files: {}", k.missing_file_names.join(", "));
        }
        out
    }
}
