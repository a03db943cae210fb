//! Agent roles and the sequential crew pipeline.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, instrument};

use crate::core::types::AgentRole;
use crate::inputs::AgentInputs;
use crate::io::config::{AgentProfile, ScribeConfig};
use crate::io::executor::{ExecRequest, Executor, execute_and_load};
use crate::io::prompt::{PromptBuilder, PromptExtras};
use crate::io::run_log::{RunPaths, write_text};

pub mod crew;

/// Limits shared by every agent call.
#[derive(Debug, Clone)]
pub struct AgentLimits {
    pub prompt_budget_bytes: usize,
    pub output_limit_bytes: usize,
    pub timeout: Duration,
}

impl AgentLimits {
    pub fn from_config(config: &ScribeConfig) -> Self {
        Self {
            prompt_budget_bytes: config.agent.prompt_budget_bytes,
            output_limit_bytes: config.agent.output_limit_bytes,
            timeout: Duration::from_secs(config.agent.timeout_secs),
        }
    }
}

/// One role bound to its model profile.
#[derive(Debug, Clone)]
pub struct Agent {
    role: AgentRole,
    profile: AgentProfile,
    limits: AgentLimits,
}

impl Agent {
    pub fn new(role: AgentRole, config: &ScribeConfig) -> Self {
        Self {
            role,
            profile: config.profile(role),
            limits: AgentLimits::from_config(config),
        }
    }

    /// Replace the configured model (e.g. `--eval-llm`).
    pub fn with_model(mut self, model: &str) -> Self {
        self.profile.model = model.to_string();
        self
    }

    pub fn role(&self) -> AgentRole {
        self.role
    }

    pub fn model(&self) -> &str {
        &self.profile.model
    }

    /// Render the role prompt, run it and return the normalized result.
    ///
    /// `name` labels the files written into the run directory.
    #[instrument(skip_all, fields(role = %self.role, name = name))]
    pub fn run<E: Executor>(
        &self,
        executor: &E,
        root: &Path,
        run: &RunPaths,
        name: &str,
        inputs: &AgentInputs,
        extras: &PromptExtras,
    ) -> Result<String> {
        let prompt = PromptBuilder::new(self.limits.prompt_budget_bytes)
            .build(self.role, inputs, extras)?
            .render();
        let prompt_path = run.prompt_path(name);
        write_text(&prompt_path, &prompt)?;
        debug!(prompt_bytes = prompt.len(), "prompt written");

        let request = ExecRequest {
            workdir: root.to_path_buf(),
            role: self.role,
            model: self.profile.model.clone(),
            temperature: self.profile.temperature,
            prompt,
            output_path: run.output_path(name),
            executor_log_path: run.executor_log_path(name),
            timeout: self.limits.timeout,
            output_limit_bytes: self.limits.output_limit_bytes,
        };
        execute_and_load(executor, &request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::OutlineAction;
    use crate::io::paths::ProjectPaths;
    use std::cell::RefCell;
    use std::fs;

    struct CapturingExecutor {
        output: String,
        last_request: RefCell<Option<ExecRequest>>,
    }

    impl Executor for CapturingExecutor {
        fn exec(&self, request: &ExecRequest) -> Result<()> {
            *self.last_request.borrow_mut() = Some(request.clone());
            fs::write(&request.output_path, &self.output)?;
            Ok(())
        }
    }

    fn inputs() -> AgentInputs {
        AgentInputs {
            chapter_number: "1".to_string(),
            current_year: "2026".to_string(),
            knowledge_context: "=== PLOT ===\nplot".to_string(),
            previous_chapter_context: String::new(),
            previous_chapter_ending: String::new(),
            existing_draft: String::new(),
            existing_outline: String::new(),
            outline_action: OutlineAction::CreateNew,
            approved_outline: String::new(),
        }
    }

    /// Verifies the request carries the role profile and run-directory paths.
    #[test]
    fn run_builds_request_from_profile() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = ProjectPaths::new(temp.path());
        let run = RunPaths::new(&paths, "run-1");
        let executor = CapturingExecutor {
            output: "  1. Beat\n".to_string(),
            last_request: RefCell::new(None),
        };
        let agent = Agent::new(AgentRole::Writer, &ScribeConfig::default());

        let result = agent
            .run(&executor, temp.path(), &run, "writing_task", &inputs(), &PromptExtras::default())
            .expect("run");
        assert_eq!(result, "1. Beat");

        let request = executor.last_request.borrow().clone().expect("request");
        assert_eq!(request.model, "gpt-4o");
        assert_eq!(request.temperature, Some(0.8));
        assert_eq!(request.output_path, run.output_path("writing_task"));
        assert!(run.dir.join("writing_task.prompt.md").exists());
    }

    #[test]
    fn with_model_overrides_profile() {
        let agent = Agent::new(AgentRole::Evaluator, &ScribeConfig::default()).with_model("judge");
        assert_eq!(agent.model(), "judge");
        assert_eq!(agent.role(), AgentRole::Evaluator);
    }
}
