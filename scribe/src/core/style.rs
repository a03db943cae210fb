//! Style statistics over previous chapters and static genre guidelines.
//!
//! The report feeds the editor agent so revisions stay consistent with the
//! voice already established in the story.

use std::fmt::Write as _;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::text::{paragraphs, ratio, sentences, word_count};

static METAPHOR_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\blike an? \w+",
        r"(?i)\bas \w+ as\b",
        r"(?i)\bas if\b",
        r"(?i)\bas though\b",
        r"(?i)\b(?:was|were) an? \w+ of\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("metaphor regex"))
    .collect()
});

static DIALOGUE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"]+)""#).expect("dialogue regex"));

const SENSORY_WORDS: [(&str, &[&str]); 5] = [
    ("sight", &["saw", "gleam", "glow", "shadow", "bright", "dark", "color", "shimmer"]),
    ("sound", &["heard", "echo", "whisper", "roar", "silence", "ring", "crack", "hum"]),
    ("touch", &["cold", "warm", "rough", "smooth", "sharp", "pressure", "trembl", "ache"]),
    ("smell", &["scent", "smell", "stench", "fragran", "incense", "smoke"]),
    ("taste", &["taste", "bitter", "sweet", "salt", "sour", "blood"]),
];

const ACTION_WORDS: [&str; 12] = [
    "struck", "ran", "leapt", "dodged", "slashed", "charged", "grabbed", "threw", "burst",
    "lunged", "spun", "blocked",
];

const CONTEMPLATIVE_WORDS: [&str; 10] = [
    "thought", "wondered", "considered", "remembered", "realized", "felt", "pondered",
    "reflected", "recalled", "understood",
];

/// Counts of items in three length bands.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LengthBands {
    pub short: usize,
    pub medium: usize,
    pub long: usize,
    pub average_words: f64,
}

impl LengthBands {
    fn from_lengths(lengths: &[usize], short_max: usize, medium_max: usize) -> Self {
        let mut bands = Self {
            average_words: ratio(lengths.iter().sum(), lengths.len()),
            ..Self::default()
        };
        for &len in lengths {
            if len <= short_max {
                bands.short += 1;
            } else if len <= medium_max {
                bands.medium += 1;
            } else {
                bands.long += 1;
            }
        }
        bands
    }

    fn total(&self) -> usize {
        self.short + self.medium + self.long
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StyleReport {
    pub total_words: usize,
    pub sentences: LengthBands,
    pub dialogue: LengthBands,
    pub paragraphs: LengthBands,
    pub figurative_per_thousand: f64,
    pub sensory: Vec<(String, usize)>,
    pub action_words: usize,
    pub contemplative_words: usize,
}

/// Analyse previously written prose.
pub fn analyze_style(text: &str) -> StyleReport {
    let total_words = word_count(text);
    let lowered = text.to_lowercase();

    let sentence_lengths: Vec<usize> = sentences(text)
        .into_iter()
        .filter(|s| s.chars().count() > 10)
        .map(word_count)
        .collect();
    let dialogue_lengths: Vec<usize> = DIALOGUE_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| word_count(m.as_str()))
        .collect();
    let paragraph_lengths: Vec<usize> = paragraphs(text).into_iter().map(word_count).collect();

    let figurative: usize = METAPHOR_RES.iter().map(|re| re.find_iter(text).count()).sum();
    let figurative_per_thousand = if total_words == 0 {
        0.0
    } else {
        ratio(figurative * 1000, total_words)
    };

    let tokens: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();
    let sensory = SENSORY_WORDS
        .iter()
        .map(|(sense, stems)| {
            let hits = tokens
                .iter()
                .filter(|t| stems.iter().any(|stem| t.starts_with(stem)))
                .count();
            (sense.to_string(), hits)
        })
        .collect();
    let action_words = tokens.iter().filter(|t| ACTION_WORDS.contains(*t)).count();
    let contemplative_words = tokens
        .iter()
        .filter(|t| CONTEMPLATIVE_WORDS.contains(*t))
        .count();

    StyleReport {
        total_words,
        sentences: LengthBands::from_lengths(&sentence_lengths, 8, 20),
        dialogue: LengthBands::from_lengths(&dialogue_lengths, 5, 15),
        paragraphs: LengthBands::from_lengths(&paragraph_lengths, 30, 100),
        figurative_per_thousand,
        sensory,
        action_words,
        contemplative_words,
    }
}

impl StyleReport {
    /// Plain-text rendering for prompts and the console.
    pub fn render(&self) -> String {
        if self.total_words == 0 {
            return "No previous prose available for style analysis.".to_string();
        }
        let mut out = String::new();
        let _ = writeln!(out, "Total words analysed: {}", self.total_words);
        write_bands(&mut out, "Sentences", "<=8", "9-20", ">20", &self.sentences);
        write_bands(&mut out, "Dialogue lines", "<=5", "6-15", ">15", &self.dialogue);
        write_bands(&mut out, "Paragraphs", "<=30", "31-100", ">100", &self.paragraphs);
        let _ = writeln!(
            out,
            "Figurative language: {:.2} per 1000 words",
            self.figurative_per_thousand
        );
        let senses = self
            .sensory
            .iter()
            .map(|(sense, hits)| format!("{sense} {hits}"))
            .collect::<Vec<_>>()
            .join(", ");
        let _ = writeln!(out, "Sensory detail: {senses}");
        let pacing = if self.contemplative_words == 0 {
            self.action_words as f64
        } else {
            ratio(self.action_words, self.contemplative_words)
        };
        let _ = writeln!(
            out,
            "Pacing: {} action / {} contemplative words (ratio {pacing:.2})",
            self.action_words, self.contemplative_words
        );
        out
    }
}

fn write_bands(out: &mut String, label: &str, s: &str, m: &str, l: &str, bands: &LengthBands) {
    let total = bands.total();
    if total == 0 {
        let _ = writeln!(out, "{label}: none");
        return;
    }
    let pct = |n: usize| n * 100 / total;
    let _ = writeln!(
        out,
        "{label}: {total} (avg {:.2} words) short {s} {}%, medium {m} {}%, long {l} {}%",
        bands.average_words,
        pct(bands.short),
        pct(bands.medium),
        pct(bands.long)
    );
}

/// Focus areas of the genre style guide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleFocus {
    General,
    Dialogue,
    Action,
    Description,
    Emotion,
    Worldbuilding,
}

impl StyleFocus {
    pub const ALL: [StyleFocus; 6] = [
        StyleFocus::General,
        StyleFocus::Dialogue,
        StyleFocus::Action,
        StyleFocus::Description,
        StyleFocus::Emotion,
        StyleFocus::Worldbuilding,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StyleFocus::General => "general",
            StyleFocus::Dialogue => "dialogue",
            StyleFocus::Action => "action",
            StyleFocus::Description => "description",
            StyleFocus::Emotion => "emotion",
            StyleFocus::Worldbuilding => "worldbuilding",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().to_lowercase();
        Self::ALL.into_iter().find(|f| f.as_str() == value)
    }

    pub fn guidelines(&self) -> &'static str {
        match self {
            StyleFocus::General => {
                "- Third-person limited, past tense, anchored in the protagonist's perception.\n\
                 - Vary sentence length; let short sentences land the beats.\n\
                 - Show cultivation progress through sensation and consequence, not exposition.\n\
                 - Never address the reader or comment on the chapter itself."
            }
            StyleFocus::Dialogue => {
                "- Keep speech terse and hierarchical: juniors defer, elders imply.\n\
                 - Prefer action beats over adverbs on dialogue tags.\n\
                 - Let subtext carry threats and alliances."
            }
            StyleFocus::Action => {
                "- Short clauses and concrete verbs during exchanges of blows.\n\
                 - Track positions and qi expenditure so fights stay legible.\n\
                 - End each clash with a change in stakes."
            }
            StyleFocus::Description => {
                "- One or two precise sensory details per location beat.\n\
                 - Tie scenery to the world's spiritual geography.\n\
                 - Avoid stacked adjectives."
            }
            StyleFocus::Emotion => {
                "- Render feeling through the body and through choices.\n\
                 - Restraint over melodrama; let silence do work.\n\
                 - Keep motivation consistent with earlier chapters."
            }
            StyleFocus::Worldbuilding => {
                "- Reveal systems through use, rivalry and cost.\n\
                 - Keep ranks, regions and factions consistent with the knowledge base.\n\
                 - Introduce at most one new term per scene."
            }
        }
    }
}

/// Guidelines for a named focus area; unknown names fall back to general
/// and list the available areas.
pub fn style_guide(focus: &str) -> String {
    match StyleFocus::parse(focus) {
        Some(area) => format!("Style guide ({}):\n{}", area.as_str(), area.guidelines()),
        None => {
            let available = StyleFocus::ALL
                .iter()
                .map(StyleFocus::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            format!(
                "Unknown focus area '{focus}'. Available: {available}.\nStyle guide (general):\n{}",
                StyleFocus::General.guidelines()
            )
        }
    }
}
