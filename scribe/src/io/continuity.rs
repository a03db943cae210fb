//! Context drawn from chapters already written.

use tracing::{debug, warn};

use crate::core::text::{tail_text, word_count};

use super::artifacts::ArtifactStore;

/// Characters of the preceding chapter kept for the writer's hand-off.
pub const ENDING_CHARS: usize = 1000;

/// Every existing draft before `chapter_number`, in order.
pub fn previous_chapters(store: &ArtifactStore, chapter_number: u32) -> String {
    if chapter_number <= 1 {
        return "No previous chapters to read for Chapter 1.".to_string();
    }

    let mut out = format!(
        "=== PREVIOUS CHAPTERS ANALYSIS FOR PLANNING CHAPTER {chapter_number} ===\n\n"
    );
    let mut found = Vec::new();
    for n in 1..chapter_number {
        match store.load_draft(n) {
            Ok(text) => {
                out.push_str(&format!("--- CHAPTER {n} ---\n{}\n\n", text.trim()));
                found.push((n, word_count(&text)));
            }
            Err(err) => debug!(chapter = n, err = %err, "previous chapter unavailable"),
        }
    }

    if found.is_empty() {
        warn!(chapter_number, "no previous chapters found");
        return format!(
            "No previous chapters found before Chapter {chapter_number}. \
             Plan this chapter from the knowledge base alone."
        );
    }

    let listed = found
        .iter()
        .map(|(n, words)| format!("Chapter {n} ({words} words)"))
        .collect::<Vec<_>>()
        .join(", ");
    out.push_str(&format!(
        "=== SUMMARY ===\nRead {} previous chapter(s): {listed}.\n",
        found.len()
    ));
    out
}

/// Closing passage of the chapter before `chapter_number`.
pub fn previous_chapter_ending(store: &ArtifactStore, chapter_number: u32) -> String {
    if chapter_number <= 1 {
        return "This is Chapter 1 - no previous chapters to reference.".to_string();
    }
    let previous = chapter_number - 1;
    match store.load_draft(previous) {
        Ok(text) => format!(
            "=== Previous Chapter ({previous}) Ending ===\n{}",
            tail_text(text.trim(), ENDING_CHARS)
        ),
        Err(err) => {
            warn!(chapter = previous, err = %err, "previous chapter missing");
            format!("Chapter {previous} has not been written yet - no ending to continue from.")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::validator::ValidationRules;
    use crate::io::paths::ProjectPaths;

    fn store(root: &std::path::Path) -> ArtifactStore {
        ArtifactStore::new(&ProjectPaths::new(root), ValidationRules::default())
    }

    #[test]
    fn first_chapter_gets_placeholders() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = store(temp.path());
        assert!(previous_chapters(&store, 1).starts_with("No previous chapters"));
        assert!(previous_chapter_ending(&store, 1).starts_with("This is Chapter 1"));
    }

    #[test]
    fn previous_chapters_skips_gaps_and_summarizes() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = store(temp.path());
        store.save_draft(1, "The gate opened.", false).expect("save");
        store.save_draft(3, "The trial began at dawn.", false).expect("save");

        let context = previous_chapters(&store, 4);
        assert!(context.contains("--- CHAPTER 1 ---\nThe gate opened."));
        assert!(!context.contains("--- CHAPTER 2 ---"));
        assert!(context.contains("Read 2 previous chapter(s): Chapter 1 (3 words), Chapter 3 (5 words)."));
    }

    #[test]
    fn missing_previous_chapters_are_soft() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = store(temp.path());
        assert!(previous_chapters(&store, 3).starts_with("No previous chapters found"));
        assert!(previous_chapter_ending(&store, 3).contains("Chapter 2 has not been written"));
    }

    /// Only the tail of a long chapter is handed to the writer.
    #[test]
    fn ending_keeps_last_thousand_characters() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = store(temp.path());
        let text = format!("{}{}", "a".repeat(500), "b".repeat(ENDING_CHARS));
        store.save_draft(1, &text, false).expect("save");

        let ending = previous_chapter_ending(&store, 2);
        let tail = ending
            .strip_prefix("=== Previous Chapter (1) Ending ===\n...")
            .expect("header and ellipsis");
        assert_eq!(tail, "b".repeat(ENDING_CHARS));
    }
}
