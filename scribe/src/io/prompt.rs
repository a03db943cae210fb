//! Role prompts rendered from the agent input dictionary.
//!
//! Templates mark their sections with `<!-- section:KEY required|droppable -->`.
//! When the rendered prompt exceeds the byte budget, droppable sections are
//! removed in a fixed order and the last remaining section is truncated.

use std::sync::LazyLock;

use anyhow::{Context, Result};
use minijinja::Environment;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::core::types::AgentRole;
use crate::inputs::AgentInputs;

const ARCHITECT_TEMPLATE: &str = include_str!("prompts/architect.md");
const WRITER_TEMPLATE: &str = include_str!("prompts/writer.md");
const EDITOR_TEMPLATE: &str = include_str!("prompts/editor.md");
const EVALUATOR_TEMPLATE: &str = include_str!("prompts/evaluator.md");

/// Least important first.
const DROP_ORDER: [&str; 7] = [
    "notes",
    "guide",
    "style",
    "continuity",
    "ending",
    "outline",
    "knowledge",
];

const TRUNCATION_NOTE: &str = "\n[truncated]";
const SECTION_SEPARATOR: &str = "\n\n";

static SECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<!--\s*section:(\w+)\s+(required|droppable)\s*-->").expect("section marker regex")
});

/// Everything a role template can refer to besides the input dictionary.
#[derive(Debug, Clone, Default)]
pub struct PromptExtras {
    /// Output of the preceding task (outline for the writer, draft for the editor).
    pub context: Option<String>,
    /// Rendered style statistics of earlier chapters.
    pub style_report: Option<String>,
    /// Genre guidelines for the editor.
    pub style_guide: Option<String>,
    /// Task being scored, for the evaluator.
    pub task: Option<String>,
}

#[derive(Serialize)]
struct TemplateContext<'a> {
    #[serde(flatten)]
    inputs: &'a AgentInputs,
    context: Option<&'a str>,
    style_report: Option<&'a str>,
    style_guide: Option<&'a str>,
    task: Option<&'a str>,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    fn new() -> Result<Self> {
        let mut env = Environment::new();
        for role in [
            AgentRole::Architect,
            AgentRole::Writer,
            AgentRole::Editor,
            AgentRole::Evaluator,
        ] {
            env.add_template(role.as_str(), template_source(role))
                .with_context(|| format!("load {role} template"))?;
        }
        Ok(Self { env })
    }

    fn render(&self, role: AgentRole, inputs: &AgentInputs, extras: &PromptExtras) -> Result<String> {
        let template = self.env.get_template(role.as_str())?;
        let rendered = template
            .render(TemplateContext {
                inputs,
                context: non_blank(&extras.context),
                style_report: non_blank(&extras.style_report),
                style_guide: non_blank(&extras.style_guide),
                task: non_blank(&extras.task),
            })
            .with_context(|| format!("render {role} prompt"))?;
        Ok(rendered)
    }
}

fn template_source(role: AgentRole) -> &'static str {
    match role {
        AgentRole::Architect => ARCHITECT_TEMPLATE,
        AgentRole::Writer => WRITER_TEMPLATE,
        AgentRole::Editor => EDITOR_TEMPLATE,
        AgentRole::Evaluator => EVALUATOR_TEMPLATE,
    }
}

#[derive(Debug, Clone)]
struct Section {
    key: String,
    required: bool,
    content: String,
}

/// Split rendered output on section markers. Empty droppable sections vanish.
fn parse_sections(rendered: &str) -> Vec<Section> {
    let markers: Vec<_> = SECTION_RE.captures_iter(rendered).collect();
    let mut sections = Vec::new();
    for (i, caps) in markers.iter().enumerate() {
        let (Some(whole), Some(key), Some(kind)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        let end = markers
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map_or(rendered.len(), |m| m.start());
        let content = rendered[whole.end()..end].trim().to_string();
        let required = kind.as_str() == "required";
        if !content.is_empty() || required {
            sections.push(Section {
                key: key.as_str().to_string(),
                required,
                content,
            });
        }
    }
    sections
}

/// Length of the rendered prompt, separators included.
fn total_len(sections: &[Section]) -> usize {
    let content: usize = sections.iter().map(|s| s.content.len()).sum();
    content + SECTION_SEPARATOR.len() * sections.len().saturating_sub(1)
}

fn apply_budget(sections: &mut Vec<Section>, budget: usize) {
    for key in DROP_ORDER {
        if total_len(sections) <= budget {
            return;
        }
        if let Some(idx) = sections.iter().position(|s| s.key == key && !s.required) {
            debug!(
                section = key,
                bytes_dropped = sections[idx].content.len(),
                "dropped section for budget"
            );
            sections.remove(idx);
        }
    }

    if total_len(sections) <= budget {
        return;
    }
    let Some((last, rest)) = sections.split_last_mut() else {
        return;
    };
    let separator = if rest.is_empty() { 0 } else { SECTION_SEPARATOR.len() };
    let allowed = budget.saturating_sub(total_len(rest) + separator);
    let before_len = last.content.len();
    let mut cut = allowed.saturating_sub(TRUNCATION_NOTE.len());
    while !last.content.is_char_boundary(cut) {
        cut -= 1;
    }
    last.content.truncate(cut);
    if allowed > TRUNCATION_NOTE.len() {
        last.content.push_str(TRUNCATION_NOTE);
    }
    debug!(
        section = %last.key,
        before_len,
        after_len = last.content.len(),
        "truncated section for budget"
    );
}

/// A rendered prompt ready to hand to an executor.
#[derive(Debug, Clone)]
pub struct PromptPack {
    sections: Vec<Section>,
}

impl PromptPack {
    pub fn render(&self) -> String {
        self.sections
            .iter()
            .map(|s| s.content.as_str())
            .collect::<Vec<_>>()
            .join(SECTION_SEPARATOR)
    }

    pub fn section_keys(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.key.as_str()).collect()
    }
}

/// Builds role prompts within a byte budget.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    budget_bytes: usize,
}

impl PromptBuilder {
    pub fn new(budget_bytes: usize) -> Self {
        Self { budget_bytes }
    }

    pub fn build(
        &self,
        role: AgentRole,
        inputs: &AgentInputs,
        extras: &PromptExtras,
    ) -> Result<PromptPack> {
        let rendered = PromptEngine::new()?.render(role, inputs, extras)?;
        let mut sections = parse_sections(&rendered);
        apply_budget(&mut sections, self.budget_bytes);
        Ok(PromptPack { sections })
    }
}
