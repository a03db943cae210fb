//! Text metrics shared by validation, style analysis and status reporting.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static SENTENCE_BREAK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]+").expect("sentence regex"));
static SPACE_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" +").expect("space regex"));
static BLANK_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("blank line regex"));
static DOUBLE_QUOTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"]*)""#).expect("double quote regex"));
static SINGLE_QUOTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'([^']{10,}?)'").expect("single quote regex"));

/// Number of whitespace-separated words.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Normalize line endings and whitespace.
///
/// Strips a byte-order mark, converts CRLF/CR to LF, collapses runs of spaces,
/// limits blank lines to one, and trims trailing whitespace on every line.
pub fn clean_text(text: &str) -> String {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let text = SPACE_RUN_RE.replace_all(&text, " ");
    let text = BLANK_RUN_RE.replace_all(&text, "\n\n");
    text.lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Truncate to at most `max_chars` characters, ending with `suffix` when cut.
pub fn truncate_text(text: &str, max_chars: usize, suffix: &str) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(suffix.chars().count());
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(suffix);
    out
}

/// Keep the last `max_chars` characters, prefixed with `...` when cut.
pub fn tail_text(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }
    let tail: String = text.chars().skip(total - max_chars).collect();
    format!("...{tail}")
}

/// Raw fragments between runs of `.`, `!` and `?`, untrimmed and including
/// empty ones.
pub fn sentence_fragments(text: &str) -> Vec<&str> {
    SENTENCE_BREAK_RE.split(text).collect()
}

/// Trimmed, non-empty sentences.
pub fn sentences(text: &str) -> Vec<&str> {
    sentence_fragments(text)
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Trimmed, non-empty blocks separated by a blank line.
pub fn paragraphs(text: &str) -> Vec<&str> {
    text.split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

/// Quoted speech: every non-empty double-quoted span plus single-quoted spans
/// of at least ten characters.
pub fn find_dialogue(text: &str) -> Vec<&str> {
    let double = DOUBLE_QUOTED_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim());
    let single = SINGLE_QUOTED_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim());
    double.chain(single).filter(|s| !s.is_empty()).collect()
}

/// Aggregate statistics for a block of prose.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextStats {
    pub word_count: usize,
    pub character_count: usize,
    pub sentence_count: usize,
    pub paragraph_count: usize,
    pub dialogue_count: usize,
    pub avg_words_per_sentence: f64,
    pub avg_words_per_paragraph: f64,
}

pub fn text_stats(text: &str) -> TextStats {
    let words = word_count(text);
    let sentence_count = sentences(text).len();
    let paragraph_count = paragraphs(text).len();
    TextStats {
        word_count: words,
        character_count: text.chars().count(),
        sentence_count,
        paragraph_count,
        dialogue_count: find_dialogue(text).len(),
        avg_words_per_sentence: ratio(words, sentence_count),
        avg_words_per_paragraph: ratio(words, paragraph_count),
    }
}

/// `numerator / denominator` rounded to two decimals; zero when empty.
pub(crate) fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    let value = numerator as f64 / denominator as f64;
    (value * 100.0).round() / 100.0
}

/// Lines containing `term`, as `(1-based line number, trimmed line)`.
pub fn search_lines(text: &str, term: &str, case_sensitive: bool) -> Vec<(usize, String)> {
    let needle = if case_sensitive {
        term.to_string()
    } else {
        term.to_lowercase()
    };
    text.lines()
        .enumerate()
        .filter(|(_, line)| {
            if case_sensitive {
                line.contains(&needle)
            } else {
                line.to_lowercase().contains(&needle)
            }
        })
        .map(|(idx, line)| (idx + 1, line.trim().to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_count_splits_on_any_whitespace() {
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count("  one\ttwo\n\nthree  "), 3);
    }

    /// Verifies clean_text normalizes the messy output agents tend to produce.
    #[test]
    fn clean_text_normalizes_whitespace() {
        let raw = "\u{feff}Line one   has  gaps.  \r\n\r\n\r\n\r\nLine two.\r\n";
        assert_eq!(clean_text(raw), "Line one has gaps.\n\nLine two.");
    }

    #[test]
    fn truncate_text_respects_suffix_length() {
        assert_eq!(truncate_text("short", 10, "..."), "short");
        assert_eq!(truncate_text("abcdefghij", 6, "..."), "abc...");
    }

    #[test]
    fn tail_text_keeps_the_end() {
        assert_eq!(tail_text("abc", 5), "abc");
        assert_eq!(tail_text("abcdef", 3), "...def");
    }

    /// Fragments keep the empty tail after a final period; sentences drop it.
    #[test]
    fn sentence_fragments_keep_empty_pieces() {
        let text = "One. Two!? Three.";
        assert_eq!(sentence_fragments(text), vec!["One", " Two", " Three", ""]);
        assert_eq!(sentences(text), vec!["One", "Two", "Three"]);
    }

    #[test]
    fn paragraphs_skip_blank_blocks() {
        let text = "First.\n\n\n\nSecond.\n\n  \n\nThird.";
        assert_eq!(paragraphs(text), vec!["First.", "Second.", "Third."]);
    }

    #[test]
    fn find_dialogue_matches_double_and_long_single_quotes() {
        let text = r#""Run," she said. 'Too short' 'this one is long enough'"#;
        let found = find_dialogue(text);
        assert!(found.contains(&"Run,"));
        assert!(found.contains(&"this one is long enough"));
        assert!(!found.contains(&"Too short"));
    }

    #[test]
    fn text_stats_rounds_averages() {
        let stats = text_stats("One two three. Four five.\n\nSix.");
        assert_eq!(stats.word_count, 6);
        assert_eq!(stats.sentence_count, 3);
        assert_eq!(stats.paragraph_count, 2);
        assert_eq!(stats.avg_words_per_sentence, 2.0);
        assert_eq!(stats.avg_words_per_paragraph, 3.0);
    }

    #[test]
    fn search_lines_reports_one_based_numbers() {
        let text = "Alpha\n  the Sect gathers  \nbeta sect";
        assert_eq!(
            search_lines(text, "sect", false),
            vec![
                (2, "the Sect gathers".to_string()),
                (3, "beta sect".to_string())
            ]
        );
        assert_eq!(search_lines(text, "Sect", true).len(), 1);
    }
}
