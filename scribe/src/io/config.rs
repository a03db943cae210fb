//! Project configuration stored in `scribe.toml` at the project root.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::types::AgentRole;
use crate::core::validator::ValidationRules;

use super::knowledge::DEFAULT_CATALOG;

/// Scribe configuration (TOML).
///
/// Edited by humans; every field has a default so a missing file or a
/// partial file both work.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScribeConfig {
    pub agent: AgentCommandConfig,
    /// Model profile per role, keyed by role name.
    pub agents: BTreeMap<String, AgentProfile>,
    pub validation: ValidationRules,
    pub knowledge: KnowledgeConfig,
}

/// How the agent backend is launched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AgentCommandConfig {
    /// Command and arguments; `{model}` is replaced with the role's model.
    pub command: Vec<String>,
    /// Wall-clock limit per agent call.
    pub timeout_secs: u64,
    /// Bytes of agent stdout/stderr kept in memory and in logs.
    pub output_limit_bytes: usize,
    /// Upper bound on rendered prompt size.
    pub prompt_budget_bytes: usize,
}

impl Default for AgentCommandConfig {
    fn default() -> Self {
        Self {
            command: vec!["llm".to_string(), "-m".to_string(), "{model}".to_string()],
            timeout_secs: 30 * 60,
            output_limit_bytes: 400_000,
            prompt_budget_bytes: 400_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentProfile {
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl AgentProfile {
    fn new(model: &str, temperature: Option<f32>) -> Self {
        Self {
            model: model.to_string(),
            temperature,
        }
    }

    fn default_for(role: AgentRole) -> Self {
        match role {
            AgentRole::Architect | AgentRole::Editor => Self::new("gpt-4.1", None),
            AgentRole::Writer => Self::new("gpt-4o", Some(0.8)),
            AgentRole::Evaluator => Self::new("gpt-4o-mini", None),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct KnowledgeConfig {
    /// Ordered catalog of files under `knowledge/`.
    pub files: Vec<String>,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            files: DEFAULT_CATALOG.iter().map(|f| f.to_string()).collect(),
        }
    }
}

impl Default for ScribeConfig {
    fn default() -> Self {
        let agents = [
            AgentRole::Architect,
            AgentRole::Writer,
            AgentRole::Editor,
            AgentRole::Evaluator,
        ]
        .into_iter()
        .map(|role| (role.as_str().to_string(), AgentProfile::default_for(role)))
        .collect();
        Self {
            agent: AgentCommandConfig::default(),
            agents,
            validation: ValidationRules::default(),
            knowledge: KnowledgeConfig::default(),
        }
    }
}

impl ScribeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.agent.command.is_empty() || self.agent.command[0].trim().is_empty() {
            return Err(anyhow!("agent.command must be a non-empty array"));
        }
        if self.agent.timeout_secs == 0 {
            return Err(anyhow!("agent.timeout_secs must be > 0"));
        }
        if self.agent.output_limit_bytes == 0 {
            return Err(anyhow!("agent.output_limit_bytes must be > 0"));
        }
        if self.agent.prompt_budget_bytes == 0 {
            return Err(anyhow!("agent.prompt_budget_bytes must be > 0"));
        }
        for (role, profile) in &self.agents {
            if profile.model.trim().is_empty() {
                return Err(anyhow!("agents.{role}.model must not be empty"));
            }
            if let Some(t) = profile.temperature
                && !(0.0..=2.0).contains(&t)
            {
                return Err(anyhow!("agents.{role}.temperature must be within 0.0..=2.0"));
            }
        }
        if self.knowledge.files.is_empty() {
            return Err(anyhow!("knowledge.files must list at least one file"));
        }
        self.validation.validate()
    }

    /// Profile for `role`; roles missing from the file use built-in defaults.
    pub fn profile(&self, role: AgentRole) -> AgentProfile {
        self.agents
            .get(role.as_str())
            .cloned()
            .unwrap_or_else(|| AgentProfile::default_for(role))
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `ScribeConfig::default()`.
pub fn load_config(path: &Path) -> Result<ScribeConfig> {
    if !path.exists() {
        let cfg = ScribeConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: ScribeConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &ScribeConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, buf)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
