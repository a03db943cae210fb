//! Heuristic checks for generated chapter prose.
//!
//! Validation is advisory: every check runs unconditionally and findings are
//! reported, never enforced. The validator holds no state, so repeated runs on
//! the same content yield identical issues.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

use super::text::{paragraphs, sentence_fragments, word_count};

/// Phrases that signal model meta-commentary rather than story prose.
pub const DEFAULT_BANNED_PHRASES: [&str; 13] = [
    "The completed Chapter",
    "This chapter",
    "In this chapter",
    "The following chapter",
    "Chapter Summary:",
    "**Chapter",
    "Here is Chapter",
    "Here's Chapter",
    "The story continues",
    "This story",
    "Our protagonist",
    "Our hero",
    "Our main character",
];

const MIN_PARAGRAPHS: usize = 3;
const OPENING_CHARS: usize = 20;
const MAX_OPENING_REPEATS: usize = 2;
const SHORT_SENTENCE_WORDS: usize = 4;
const SHORT_SENTENCE_RATIO: f64 = 0.3;
const LONG_SENTENCE_WORDS: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    WordCount,
    AiPatterns,
    Structure,
    Quality,
}

impl IssueCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueCategory::WordCount => "word_count",
            IssueCategory::AiPatterns => "ai_patterns",
            IssueCategory::Structure => "structure",
            IssueCategory::Quality => "quality",
        }
    }
}

/// One finding. Transient; never persisted alongside the draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub category: IssueCategory,
    pub message: String,
    pub line_number: Option<usize>,
}

impl ValidationIssue {
    fn new(severity: Severity, category: IssueCategory, message: impl Into<String>) -> Self {
        Self {
            severity,
            category,
            message: message.into(),
            line_number: None,
        }
    }

    fn at_line(mut self, line_number: Option<usize>) -> Self {
        self.line_number = line_number;
        self
    }
}

/// Word-count bands and banned phrases (`[validation]` in `scribe.toml`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ValidationRules {
    /// Below this the chapter is too short (error).
    pub hard_min_words: usize,
    /// Below this the chapter is shorter than the target (warning).
    pub soft_min_words: usize,
    /// Above this the chapter is longer than the target (warning).
    pub soft_max_words: usize,
    /// Above this the chapter is too long (error).
    pub hard_max_words: usize,
    /// Case-insensitive substrings flagged as meta-commentary.
    pub banned_phrases: Vec<String>,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            hard_min_words: 1800,
            soft_min_words: 2000,
            soft_max_words: 4000,
            hard_max_words: 4200,
            banned_phrases: DEFAULT_BANNED_PHRASES
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

impl ValidationRules {
    pub fn validate(&self) -> Result<()> {
        let ordered = self.hard_min_words <= self.soft_min_words
            && self.soft_min_words <= self.soft_max_words
            && self.soft_max_words <= self.hard_max_words;
        if !ordered {
            return Err(anyhow!(
                "validation word bands must satisfy hard_min <= soft_min <= soft_max <= hard_max"
            ));
        }
        if self.banned_phrases.iter().any(|p| p.trim().is_empty()) {
            return Err(anyhow!("validation.banned_phrases must not contain empty entries"));
        }
        Ok(())
    }
}

/// Run every check against `content`.
///
/// Order: word count, banned phrases, structure, quality.
pub fn validate(content: &str, rules: &ValidationRules) -> Vec<ValidationIssue> {
    let mut issues = vec![check_word_count(content, rules)];
    issues.extend(check_banned_phrases(content, &rules.banned_phrases));
    issues.extend(check_structure(content));
    issues.extend(check_quality(content));
    issues
}

fn check_word_count(content: &str, rules: &ValidationRules) -> ValidationIssue {
    let words = word_count(content);
    let (severity, message) = if words < rules.hard_min_words {
        (
            Severity::Error,
            format!(
                "Chapter is too short: {words} words (minimum {})",
                rules.hard_min_words
            ),
        )
    } else if words < rules.soft_min_words {
        (
            Severity::Warning,
            format!(
                "Chapter is shorter than target: {words} words (target minimum {})",
                rules.soft_min_words
            ),
        )
    } else if words > rules.hard_max_words {
        (
            Severity::Error,
            format!(
                "Chapter is too long: {words} words (maximum {})",
                rules.hard_max_words
            ),
        )
    } else if words > rules.soft_max_words {
        (
            Severity::Warning,
            format!(
                "Chapter is longer than target: {words} words (target maximum {})",
                rules.soft_max_words
            ),
        )
    } else {
        (
            Severity::Info,
            format!("Chapter word count: {words} words (within target range)"),
        )
    };
    ValidationIssue::new(severity, IssueCategory::WordCount, message)
}

fn check_banned_phrases(content: &str, phrases: &[String]) -> Vec<ValidationIssue> {
    let lowered = content.to_lowercase();
    phrases
        .iter()
        .filter(|phrase| lowered.contains(&phrase.to_lowercase()))
        .map(|phrase| {
            let needle = phrase.to_lowercase();
            let line = content
                .lines()
                .position(|line| line.to_lowercase().contains(&needle))
                .map(|idx| idx + 1);
            ValidationIssue::new(
                Severity::Warning,
                IssueCategory::AiPatterns,
                format!("Found potential AI meta-commentary pattern: '{phrase}'"),
            )
            .at_line(line)
        })
        .collect()
}

fn check_structure(content: &str) -> Vec<ValidationIssue> {
    if content.trim().is_empty() {
        return vec![ValidationIssue::new(
            Severity::Error,
            IssueCategory::Structure,
            "Content is empty",
        )];
    }

    let mut issues = Vec::new();
    let paragraph_count = paragraphs(content).len();
    if paragraph_count < MIN_PARAGRAPHS {
        issues.push(ValidationIssue::new(
            Severity::Warning,
            IssueCategory::Structure,
            format!("Very few paragraphs detected: {paragraph_count} (may need better formatting)"),
        ));
    }
    if !content.contains('"') && !content.contains('\'') {
        issues.push(ValidationIssue::new(
            Severity::Info,
            IssueCategory::Structure,
            "No dialogue detected (may be intentional)",
        ));
    }
    issues
}

fn check_quality(content: &str) -> Vec<ValidationIssue> {
    let fragments = sentence_fragments(content);
    let mut issues = Vec::new();

    let repeated = repeated_openings(&fragments);
    if !repeated.is_empty() {
        let listed = repeated
            .iter()
            .map(|opening| format!("'{opening}'"))
            .collect::<Vec<_>>()
            .join(", ");
        issues.push(ValidationIssue::new(
            Severity::Warning,
            IssueCategory::Quality,
            format!("Repetitive sentence starts detected: [{listed}]"),
        ));
    }

    let short = fragments
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty() && word_count(s) < SHORT_SENTENCE_WORDS)
        .count();
    if short as f64 > fragments.len() as f64 * SHORT_SENTENCE_RATIO {
        issues.push(ValidationIssue::new(
            Severity::Warning,
            IssueCategory::Quality,
            format!(
                "Many very short sentences detected: {short} out of {}",
                fragments.len()
            ),
        ));
    }

    let long = fragments
        .iter()
        .filter(|s| word_count(s) > LONG_SENTENCE_WORDS)
        .count();
    if long > 0 {
        issues.push(ValidationIssue::new(
            Severity::Info,
            IssueCategory::Quality,
            format!("Very long sentences detected: {long} (check for run-on sentences)"),
        ));
    }

    issues
}

/// Lowercased 20-character openings seen more than twice, in first-seen order.
fn repeated_openings(fragments: &[&str]) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut order = Vec::new();
    for fragment in fragments {
        let trimmed = fragment.trim();
        if trimmed.chars().count() <= OPENING_CHARS {
            continue;
        }
        let opening: String = trimmed.chars().take(OPENING_CHARS).collect::<String>().to_lowercase();
        let count = counts.entry(opening.clone()).or_insert(0);
        if *count == 0 {
            order.push(opening);
        }
        *count += 1;
    }
    order
        .into_iter()
        .filter(|opening| counts.get(opening).copied().unwrap_or(0) > MAX_OPENING_REPEATS)
        .collect()
}

/// Issue counts by severity and category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub total_issues: usize,
    pub errors: usize,
    pub warnings: usize,
    pub info: usize,
    pub by_category: BTreeMap<String, usize>,
}

pub fn summarize(issues: &[ValidationIssue]) -> ValidationSummary {
    let mut summary = ValidationSummary {
        total_issues: issues.len(),
        ..ValidationSummary::default()
    };
    for issue in issues {
        match issue.severity {
            Severity::Error => summary.errors += 1,
            Severity::Warning => summary.warnings += 1,
            Severity::Info => summary.info += 1,
        }
        *summary
            .by_category
            .entry(issue.category.as_str().to_string())
            .or_insert(0) += 1;
    }
    summary
}

/// Human-readable report grouped by severity.
pub fn format_report(issues: &[ValidationIssue]) -> String {
    if issues.is_empty() {
        return "Content validation passed: no issues found.".to_string();
    }

    let summary = summarize(issues);
    let mut out = format!(
        "Validation summary: {} errors, {} warnings, {} info\n",
        summary.errors, summary.warnings, summary.info
    );
    for (severity, heading) in [
        (Severity::Error, "ERRORS"),
        (Severity::Warning, "WARNINGS"),
        (Severity::Info, "INFO"),
    ] {
        let group: Vec<_> = issues.iter().filter(|i| i.severity == severity).collect();
        if group.is_empty() {
            continue;
        }
        out.push('\n');
        out.push_str(heading);
        out.push_str(":\n");
        for issue in group {
            out.push_str("  - ");
            out.push_str(&issue.message);
            if let Some(line) = issue.line_number {
                out.push_str(&format!(" (line {line})"));
            }
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        vec!["word"; n].join(" ")
    }

    fn word_count_issue(n: usize) -> ValidationIssue {
        check_word_count(&words(n), &ValidationRules::default())
    }

    /// Verifies the band boundaries are inclusive on the target side.
    ///
    /// Exactly the hard minimum is a warning, exactly the soft bounds are info,
    /// and exactly the hard maximum is still only a warning.
    #[test]
    fn word_count_bands_match_boundaries() {
        let cases = [
            (0, Severity::Error),
            (1799, Severity::Error),
            (1800, Severity::Warning),
            (1999, Severity::Warning),
            (2000, Severity::Info),
            (4000, Severity::Info),
            (4001, Severity::Warning),
            (4200, Severity::Warning),
            (4201, Severity::Error),
        ];
        for (count, expected) in cases {
            let issue = word_count_issue(count);
            assert_eq!(issue.severity, expected, "word count {count}");
            assert_eq!(issue.category, IssueCategory::WordCount);
        }
    }

    #[test]
    fn word_count_messages_name_the_threshold() {
        assert!(word_count_issue(10).message.contains("minimum 1800"));
        assert!(word_count_issue(1900).message.contains("target minimum 2000"));
        assert!(word_count_issue(4100).message.contains("target maximum 4000"));
        assert!(word_count_issue(5000).message.contains("maximum 4200"));
    }

    /// Banned phrases match regardless of case and report the first line.
    #[test]
    fn banned_phrases_are_case_insensitive() {
        let content = "The rain fell.\nIN THIS CHAPTER we learn things.\nin this chapter again";
        let issues = check_banned_phrases(content, &ValidationRules::default().banned_phrases);
        let hit = issues
            .iter()
            .find(|i| i.message.contains("'In this chapter'"))
            .expect("phrase flagged");
        assert_eq!(hit.severity, Severity::Warning);
        assert_eq!(hit.category, IssueCategory::AiPatterns);
        assert_eq!(hit.line_number, Some(2));
        // "This chapter" is a substring of the same line and is flagged too.
        assert!(issues.iter().any(|i| i.message.contains("'This chapter'")));
    }

    #[test]
    fn empty_content_short_circuits_structure() {
        let issues = check_structure("   \n ");
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Error);
        assert_eq!(issues[0].message, "Content is empty");
    }

    #[test]
    fn structure_flags_few_paragraphs_and_missing_dialogue() {
        let issues = check_structure("Only one paragraph here.\n\nAnd a second.");
        assert!(issues.iter().any(|i| i.severity == Severity::Warning
            && i.message.contains("Very few paragraphs detected: 2")));
        assert!(issues.iter().any(|i| i.severity == Severity::Info
            && i.message.starts_with("No dialogue detected")));
    }

    #[test]
    fn structure_accepts_dialogue_in_three_paragraphs() {
        let issues = check_structure("\"Hello,\" he said.\n\nShe nodded.\n\nThey left.");
        assert!(issues.is_empty());
    }

    #[test]
    fn quality_flags_repeated_openings_in_first_seen_order() {
        let content = "The disciple walked into the hall slowly. \
                       The disciple walked into the hall again. \
                       The disciple walked into the hall a third time. \
                       Mountains rose above the sect like old teeth in the mist.";
        let issues = check_quality(content);
        let repeated = issues
            .iter()
            .find(|i| i.message.starts_with("Repetitive sentence starts"))
            .expect("repetition flagged");
        assert_eq!(
            repeated.message,
            "Repetitive sentence starts detected: ['the disciple walked ']"
        );
    }

    #[test]
    fn quality_counts_empty_fragments_in_short_ratio() {
        // Fragments: "Go", " Run", " Now", "" -> 3 short of 4.
        let issues = check_quality("Go. Run. Now.");
        let short = issues
            .iter()
            .find(|i| i.message.starts_with("Many very short sentences"))
            .expect("short sentences flagged");
        assert_eq!(short.message, "Many very short sentences detected: 3 out of 4");
    }

    #[test]
    fn quality_notes_run_on_sentences() {
        let content = format!("{}.", words(41));
        let issues = check_quality(&content);
        assert!(issues.iter().any(|i| i.severity == Severity::Info
            && i.message == "Very long sentences detected: 1 (check for run-on sentences)"));
    }

    #[test]
    fn validate_is_idempotent() {
        let content = "This chapter begins.\n\nShort.\n\nEnd.";
        let rules = ValidationRules::default();
        assert_eq!(validate(content, &rules), validate(content, &rules));
    }

    #[test]
    fn summarize_counts_by_severity_and_category() {
        let issues = validate("", &ValidationRules::default());
        let summary = summarize(&issues);
        assert_eq!(summary.total_issues, issues.len());
        assert_eq!(summary.errors, 2);
        assert_eq!(summary.by_category.get("word_count"), Some(&1));
        assert_eq!(summary.by_category.get("structure"), Some(&1));
    }

    #[test]
    fn report_only_passes_when_no_issues() {
        assert!(format_report(&[]).contains("validation passed"));

        let issues = validate("Too short.", &ValidationRules::default());
        let report = format_report(&issues);
        assert!(!report.contains("validation passed"));
        assert!(report.starts_with("Validation summary: 1 errors"));
        assert!(report.contains("ERRORS:\n  - Chapter is too short"));
    }

    #[test]
    fn rules_reject_unordered_bands() {
        let rules = ValidationRules {
            soft_min_words: 5000,
            ..ValidationRules::default()
        };
        assert!(rules.validate().is_err());
        assert!(ValidationRules::default().validate().is_ok());
    }
}
