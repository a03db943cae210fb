//! Outline and draft files keyed by chapter number.
//!
//! The store owns `outlines/` and `chapters/`. Writes overwrite wholesale;
//! there is no versioning.

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::core::numbering::{chapter_file_name, next_number, parse_chapter_number};
use crate::core::text::word_count;
use crate::core::validator::{Severity, ValidationRules, format_report, validate};

use super::paths::ProjectPaths;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Outline,
    Draft,
}

impl ArtifactKind {
    fn extension(&self) -> &'static str {
        match self {
            ArtifactKind::Outline => "txt",
            ArtifactKind::Draft => "md",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ArtifactKind::Outline => "outline",
            ArtifactKind::Draft => "draft",
        }
    }
}

/// Requested artifact does not exist. Downcast from `anyhow::Error` to branch on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactNotFound {
    pub kind: ArtifactKind,
    pub chapter_number: u32,
    pub path: PathBuf,
}

impl fmt::Display for ArtifactNotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ArtifactKind::Outline => write!(
                f,
                "outline for chapter {} not found at {}",
                self.chapter_number,
                self.path.display()
            ),
            ArtifactKind::Draft => write!(
                f,
                "chapter {} not found at {}",
                self.chapter_number,
                self.path.display()
            ),
        }
    }
}

impl std::error::Error for ArtifactNotFound {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChapterInfo {
    pub number: u32,
    pub outline_exists: bool,
    pub draft_exists: bool,
    pub outline_path: Option<PathBuf>,
    pub draft_path: Option<PathBuf>,
    pub word_count: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    outlines_dir: PathBuf,
    chapters_dir: PathBuf,
    rules: ValidationRules,
}

impl ArtifactStore {
    pub fn new(paths: &ProjectPaths, rules: ValidationRules) -> Self {
        Self {
            outlines_dir: paths.outlines_dir.clone(),
            chapters_dir: paths.chapters_dir.clone(),
            rules,
        }
    }

    fn dir(&self, kind: ArtifactKind) -> &Path {
        match kind {
            ArtifactKind::Outline => &self.outlines_dir,
            ArtifactKind::Draft => &self.chapters_dir,
        }
    }

    pub fn path(&self, kind: ArtifactKind, chapter_number: u32) -> PathBuf {
        self.dir(kind)
            .join(chapter_file_name(chapter_number, kind.extension()))
    }

    pub fn outline_path(&self, chapter_number: u32) -> PathBuf {
        self.path(ArtifactKind::Outline, chapter_number)
    }

    pub fn draft_path(&self, chapter_number: u32) -> PathBuf {
        self.path(ArtifactKind::Draft, chapter_number)
    }

    /// Chapter numbers present for `kind`, ascending.
    pub fn numbers(&self, kind: ArtifactKind) -> Result<Vec<u32>> {
        let dir = self.dir(kind);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut numbers = Vec::new();
        for entry in fs::read_dir(dir).with_context(|| format!("read dir {}", dir.display()))? {
            let entry = entry.with_context(|| format!("read dir entry {}", dir.display()))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some(n) = parse_chapter_number(name, kind.extension())
                .with_context(|| format!("scan {}", dir.display()))?
            {
                numbers.push(n);
            }
        }
        numbers.sort_unstable();
        Ok(numbers)
    }

    /// Next chapter to outline: `max + 1` over `outlines/`, or 1.
    ///
    /// Creates `outlines/` when absent.
    pub fn next_chapter_number(&self) -> Result<u32> {
        self.next_number_for(ArtifactKind::Outline)
    }

    /// The same rule applied to `chapters/`.
    pub fn next_draft_number(&self) -> Result<u32> {
        self.next_number_for(ArtifactKind::Draft)
    }

    fn next_number_for(&self, kind: ArtifactKind) -> Result<u32> {
        let dir = self.dir(kind);
        fs::create_dir_all(dir).with_context(|| format!("create directory {}", dir.display()))?;
        let next = next_number(self.numbers(kind)?)?;
        debug!(kind = kind.label(), next, "next chapter number");
        Ok(next)
    }

    fn save(&self, kind: ArtifactKind, chapter_number: u32, text: &str) -> Result<PathBuf> {
        let dir = self.dir(kind);
        fs::create_dir_all(dir).with_context(|| format!("create directory {}", dir.display()))?;
        let path = self.path(kind, chapter_number);
        fs::write(&path, text).with_context(|| format!("write {}", path.display()))?;
        info!(kind = kind.label(), chapter_number, path = %path.display(), "saved artifact");
        Ok(path)
    }

    fn load(&self, kind: ArtifactKind, chapter_number: u32) -> Result<String> {
        let path = self.path(kind, chapter_number);
        if !path.is_file() {
            return Err(ArtifactNotFound {
                kind,
                chapter_number,
                path,
            }
            .into());
        }
        fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))
    }

    pub fn save_outline(&self, chapter_number: u32, text: &str) -> Result<PathBuf> {
        self.save(ArtifactKind::Outline, chapter_number, text)
    }

    pub fn load_outline(&self, chapter_number: u32) -> Result<String> {
        self.load(ArtifactKind::Outline, chapter_number)
    }

    pub fn outline_exists(&self, chapter_number: u32) -> bool {
        self.outline_path(chapter_number).is_file()
    }

    /// Write the draft; with `validate` set, findings are logged but never block.
    pub fn save_draft(&self, chapter_number: u32, text: &str, validate_draft: bool) -> Result<PathBuf> {
        if validate_draft {
            let issues = validate(text, &self.rules);
            let blocking = issues.iter().filter(|i| i.severity != Severity::Info).count();
            if blocking > 0 {
                warn!(
                    chapter_number,
                    issues = blocking,
                    report = %format_report(&issues),
                    "draft has validation findings"
                );
            } else if !issues.is_empty() {
                debug!(
                    chapter_number,
                    report = %format_report(&issues),
                    "draft validation notes"
                );
            }
        }
        self.save(ArtifactKind::Draft, chapter_number, text)
    }

    pub fn load_draft(&self, chapter_number: u32) -> Result<String> {
        self.load(ArtifactKind::Draft, chapter_number)
    }

    pub fn draft_exists(&self, chapter_number: u32) -> bool {
        self.draft_path(chapter_number).is_file()
    }

    pub fn chapter_info(&self, chapter_number: u32) -> Result<ChapterInfo> {
        let outline_path = self.outline_path(chapter_number);
        let draft_path = self.draft_path(chapter_number);
        let outline_exists = outline_path.is_file();
        let draft_exists = draft_path.is_file();
        let word_count = if draft_exists {
            Some(word_count(&self.load_draft(chapter_number)?))
        } else {
            None
        };
        Ok(ChapterInfo {
            number: chapter_number,
            outline_exists,
            draft_exists,
            outline_path: outline_exists.then_some(outline_path),
            draft_path: draft_exists.then_some(draft_path),
            word_count,
        })
    }

    /// Every chapter with an outline, a draft or both, ascending.
    pub fn list_chapters(&self) -> Result<Vec<ChapterInfo>> {
        let numbers: BTreeSet<u32> = self
            .numbers(ArtifactKind::Outline)?
            .into_iter()
            .chain(self.numbers(ArtifactKind::Draft)?)
            .collect();
        numbers.into_iter().map(|n| self.chapter_info(n)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(root: &Path) -> ArtifactStore {
        ArtifactStore::new(&ProjectPaths::new(root), ValidationRules::default())
    }

    /// Verifies numbering is max + 1 and directory creation is idempotent.
    #[test]
    fn next_chapter_number_scans_outlines() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = store(temp.path());
        assert_eq!(store.next_chapter_number().expect("next"), 1);
        assert!(temp.path().join("outlines").is_dir());
        assert_eq!(store.next_chapter_number().expect("next again"), 1);

        for n in [1, 2, 5] {
            store.save_outline(n, "outline").expect("save");
        }
        fs::write(temp.path().join("outlines/notes.txt"), "x").expect("write stray");
        assert_eq!(store.next_chapter_number().expect("next"), 6);
    }

    /// Verifies an out-of-range chapter file stops numbering instead of being ignored.
    #[test]
    fn oversized_chapter_file_blocks_numbering() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = store(temp.path());
        store.save_outline(3, "outline").expect("save");
        fs::write(temp.path().join("outlines/chapter_5000000000.txt"), "x").expect("write");

        let err = store.next_chapter_number().unwrap_err();
        assert!(format!("{err:#}").contains("chapter_5000000000.txt"));
    }

    #[test]
    fn next_draft_number_uses_chapters_dir() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = store(temp.path());
        store.save_outline(4, "outline").expect("save outline");
        store.save_draft(2, "draft", false).expect("save draft");
        assert_eq!(store.next_draft_number().expect("next"), 3);
    }

    #[test]
    fn outline_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = store(temp.path());
        let text = "1. The gate\n2. The trial\n";
        store.save_outline(3, text).expect("save");
        assert!(store.outline_exists(3));
        assert_eq!(store.load_outline(3).expect("load"), text);
    }

    /// Missing artifacts surface as a typed error callers can downcast.
    #[test]
    fn missing_artifact_is_typed_not_found() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = store(temp.path());
        let err = store.load_outline(7).unwrap_err();
        let not_found = err
            .downcast_ref::<ArtifactNotFound>()
            .expect("ArtifactNotFound");
        assert_eq!(not_found.chapter_number, 7);
        assert_eq!(not_found.kind, ArtifactKind::Outline);
        assert!(err.to_string().contains("outline for chapter 7 not found"));

        let err = store.load_draft(7).unwrap_err();
        assert!(err.downcast_ref::<ArtifactNotFound>().is_some());
    }

    #[test]
    fn save_draft_with_findings_still_writes() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = store(temp.path());
        let path = store.save_draft(1, "In this chapter, too short.", true).expect("save");
        assert_eq!(
            fs::read_to_string(path).expect("read"),
            "In this chapter, too short."
        );
    }

    /// Verifies a draft whose only findings are notes is saved unchanged.
    #[test]
    fn save_draft_with_only_notes_writes() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = store(temp.path());
        let text = crate::test_support::prose(2500);
        let issues = validate(&text, &ValidationRules::default());
        assert!(!issues.is_empty());
        assert!(issues.iter().all(|i| i.severity == Severity::Info));

        let path = store.save_draft(1, &text, true).expect("save");
        assert_eq!(fs::read_to_string(path).expect("read"), text);
    }

    #[test]
    fn list_chapters_unions_outlines_and_drafts() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = store(temp.path());
        store.save_outline(1, "o1").expect("save");
        store.save_outline(3, "o3").expect("save");
        store.save_draft(1, "one two three", false).expect("save");
        store.save_draft(2, "four five", false).expect("save");

        let chapters = store.list_chapters().expect("list");
        let numbers: Vec<u32> = chapters.iter().map(|c| c.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);

        assert!(chapters[0].outline_exists && chapters[0].draft_exists);
        assert_eq!(chapters[0].word_count, Some(3));
        assert!(!chapters[1].outline_exists);
        assert_eq!(chapters[1].outline_path, None);
        assert_eq!(chapters[2].word_count, None);
        assert_eq!(chapters[2].draft_path, None);
    }
}
