//! Story knowledge base under `knowledge/`.
//!
//! A fixed, ordered catalog of optional reference files. Nothing is cached:
//! every call re-reads disk so edits between commands are picked up.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, error, warn};

use crate::core::text::search_lines;

/// Default catalog, in context order.
pub const DEFAULT_CATALOG: [&str; 10] = [
    "knowledge_system_overview.txt",
    "core_story_elements.txt",
    "plot.txt",
    "chapters.txt",
    "cultivation_system.txt",
    "regions.txt",
    "society.txt",
    "government.txt",
    "economic.txt",
    "military.txt",
];

/// File holding per-chapter planning notes.
pub const CHAPTER_NOTES_FILE: &str = "chapters.txt";

const KNOWLEDGE_HEADER: &str = "=== STORY KNOWLEDGE BASE ===\n\n";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KnowledgeSummary {
    pub total_files: usize,
    pub available_files: usize,
    pub missing_files: usize,
    pub missing_file_names: Vec<String>,
    pub total_size_bytes: u64,
    pub completeness_percentage: f64,
}

/// Lines of one file that matched a search term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KnowledgeMatch {
    pub file: String,
    pub lines: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    dir: PathBuf,
    catalog: Vec<String>,
}

impl KnowledgeBase {
    pub fn new(dir: impl Into<PathBuf>, catalog: &[String]) -> Self {
        Self {
            dir: dir.into(),
            catalog: catalog.to_vec(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn catalog(&self) -> &[String] {
        &self.catalog
    }

    fn path_of(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Trimmed contents of one file; `None` when absent, empty or unreadable.
    pub fn load_file(&self, name: &str) -> Option<String> {
        let path = self.path_of(name);
        if !path.is_file() {
            warn!(file = name, "knowledge file missing");
            return None;
        }
        match fs::read_to_string(&path) {
            Ok(contents) => {
                let trimmed = contents.trim();
                if trimmed.is_empty() {
                    warn!(file = name, "knowledge file is empty");
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
            Err(err) => {
                error!(file = name, err = %err, "failed to read knowledge file");
                None
            }
        }
    }

    /// Every present, non-empty file in catalog order, each under its own header.
    pub fn load_all(&self) -> String {
        let mut out = String::from(KNOWLEDGE_HEADER);
        let mut loaded = 0usize;
        for name in &self.catalog {
            if let Some(contents) = self.load_file(name) {
                out.push_str(&format!("=== {} ===\n{contents}\n\n", section_title(name)));
                loaded += 1;
            }
        }
        debug!(loaded, total = self.catalog.len(), "knowledge loaded");
        out
    }

    /// `(file name, present)` for each catalog entry.
    pub fn status(&self) -> Vec<(String, bool)> {
        self.catalog
            .iter()
            .map(|name| (name.clone(), self.path_of(name).is_file()))
            .collect()
    }

    pub fn available_files(&self) -> Vec<String> {
        self.status()
            .into_iter()
            .filter_map(|(name, present)| present.then_some(name))
            .collect()
    }

    pub fn missing_files(&self) -> Vec<String> {
        self.status()
            .into_iter()
            .filter_map(|(name, present)| (!present).then_some(name))
            .collect()
    }

    pub fn summary(&self) -> KnowledgeSummary {
        let status = self.status();
        let total_files = status.len();
        let available_files = status.iter().filter(|(_, present)| *present).count();
        let missing_file_names: Vec<String> = status
            .iter()
            .filter(|(_, present)| !present)
            .map(|(name, _)| name.clone())
            .collect();
        let total_size_bytes = status
            .iter()
            .filter(|(_, present)| *present)
            .filter_map(|(name, _)| fs::metadata(self.path_of(name)).ok())
            .map(|meta| meta.len())
            .sum();
        let completeness_percentage = if total_files == 0 {
            0.0
        } else {
            (available_files * 100) as f64 / total_files as f64
        };
        KnowledgeSummary {
            total_files,
            available_files,
            missing_files: missing_file_names.len(),
            missing_file_names,
            total_size_bytes,
            completeness_percentage,
        }
    }

    /// Lines containing `term`, labelled `Line <n>: <text>`, per present file.
    pub fn search(&self, term: &str, case_sensitive: bool) -> Vec<KnowledgeMatch> {
        self.catalog
            .iter()
            .filter_map(|name| {
                let contents = self.load_file(name)?;
                let lines: Vec<String> = search_lines(&contents, term, case_sensitive)
                    .into_iter()
                    .map(|(n, line)| format!("Line {n}: {line}"))
                    .collect();
                (!lines.is_empty()).then(|| KnowledgeMatch {
                    file: name.clone(),
                    lines,
                })
            })
            .collect()
    }

    /// Planning notes for one chapter from `chapters.txt`.
    ///
    /// The section starts at the first line containing `Chapter <n>:` and ends
    /// before the next `Chapter` heading for a different chapter.
    pub fn chapter_notes(&self, chapter_number: u32) -> Option<String> {
        let Some(contents) = self.load_file(CHAPTER_NOTES_FILE) else {
            debug!(chapter_number, "no chapter notes file");
            return None;
        };
        let notes = extract_chapter_section(&contents, chapter_number);
        if notes.is_none() {
            debug!(chapter_number, "no notes for chapter");
        }
        notes
    }
}

/// `plot.txt` -> `PLOT`.
fn section_title(file_name: &str) -> String {
    file_name
        .strip_suffix(".txt")
        .unwrap_or(file_name)
        .to_uppercase()
}

fn extract_chapter_section(contents: &str, chapter_number: u32) -> Option<String> {
    let marker = format!("chapter {chapter_number}:");
    let lines: Vec<&str> = contents.lines().collect();
    let start = lines
        .iter()
        .position(|line| line.to_lowercase().contains(&marker))?;
    let end = lines[start + 1..]
        .iter()
        .position(|line| is_other_chapter_heading(line, &marker))
        .map_or(lines.len(), |offset| start + 1 + offset);
    let section = lines[start..end].join("\n").trim().to_string();
    (!section.is_empty()).then_some(section)
}

fn is_other_chapter_heading(line: &str, marker: &str) -> bool {
    let lowered = line.trim_start_matches(['#', ' ']).to_lowercase();
    lowered.starts_with("chapter ") && lowered.contains(':') && !lowered.contains(marker)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Vec<String> {
        DEFAULT_CATALOG.iter().map(|f| f.to_string()).collect()
    }

    fn kb_with(files: &[(&str, &str)]) -> (tempfile::TempDir, KnowledgeBase) {
        let temp = tempfile::tempdir().expect("tempdir");
        let dir = temp.path().join("knowledge");
        fs::create_dir_all(&dir).expect("mkdir");
        for (name, contents) in files {
            fs::write(dir.join(name), contents).expect("write");
        }
        let kb = KnowledgeBase::new(dir, &catalog());
        (temp, kb)
    }

    /// Verifies completeness is exact for a partial catalog.
    ///
    /// Three of ten files present yields 30.0, and the missing names keep
    /// catalog order.
    #[test]
    fn summary_reports_exact_completeness() {
        let (_temp, kb) = kb_with(&[
            ("plot.txt", "The heir returns."),
            ("regions.txt", "North"),
            ("military.txt", "Legions"),
        ]);
        let summary = kb.summary();
        assert_eq!(summary.total_files, 10);
        assert_eq!(summary.available_files, 3);
        assert_eq!(summary.missing_files, 7);
        assert_eq!(summary.completeness_percentage, 30.0);
        assert_eq!(
            summary.missing_file_names,
            vec![
                "knowledge_system_overview.txt",
                "core_story_elements.txt",
                "chapters.txt",
                "cultivation_system.txt",
                "society.txt",
                "government.txt",
                "economic.txt",
            ]
        );
        assert_eq!(summary.total_size_bytes, 17 + 5 + 7);
    }

    #[test]
    fn load_all_uses_catalog_order_and_skips_empty() {
        let (_temp, kb) = kb_with(&[
            ("regions.txt", "  North wastes  \n"),
            ("plot.txt", "The heir returns."),
            ("society.txt", "   \n"),
        ]);
        assert_eq!(
            kb.load_all(),
            "=== STORY KNOWLEDGE BASE ===\n\n=== PLOT ===\nThe heir returns.\n\n=== REGIONS ===\nNorth wastes\n\n"
        );
    }

    #[test]
    fn search_labels_lines_and_omits_misses() {
        let (_temp, kb) = kb_with(&[
            ("plot.txt", "Intro\nThe Azure Sect rises\n"),
            ("regions.txt", "No match here"),
        ]);
        let found = kb.search("azure sect", false);
        assert_eq!(
            found,
            vec![KnowledgeMatch {
                file: "plot.txt".to_string(),
                lines: vec!["Line 2: The Azure Sect rises".to_string()],
            }]
        );
        assert!(kb.search("azure sect", true).is_empty());
    }

    #[test]
    fn chapter_notes_stop_at_next_chapter() {
        let notes = "### Chapter 1: Arrival\nThe boy reaches the gate.\n\n### Chapter 2: Trial\nHe fails the test.\n";
        let (_temp, kb) = kb_with(&[("chapters.txt", notes)]);
        assert_eq!(
            kb.chapter_notes(1).as_deref(),
            Some("### Chapter 1: Arrival\nThe boy reaches the gate.")
        );
        assert_eq!(
            kb.chapter_notes(2).as_deref(),
            Some("### Chapter 2: Trial\nHe fails the test.")
        );
        assert_eq!(kb.chapter_notes(3), None);
    }
}
