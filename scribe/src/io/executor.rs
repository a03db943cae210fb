//! Executor abstraction for agent invocation.
//!
//! The [`Executor`] trait decouples orchestration from the agent backend. The
//! production backend, [`CommandExecutor`], pipes the rendered prompt into a
//! configured command. Tests use scripted executors that write predetermined
//! outputs without spawning processes.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::core::types::AgentRole;

use super::process::{ProcessOutput, run_with_timeout};

/// Keys checked, in order, when an agent answers with a JSON object.
const RESULT_KEYS: [&str; 4] = ["raw", "output", "content", "text"];

/// Placeholder in `agent.command` replaced with the role's model.
pub const MODEL_PLACEHOLDER: &str = "{model}";

/// Parameters for an executor invocation.
#[derive(Debug, Clone)]
pub struct ExecRequest {
    /// Working directory for the agent process (the project root).
    pub workdir: PathBuf,
    pub role: AgentRole,
    pub model: String,
    pub temperature: Option<f32>,
    /// Prompt text fed to the agent on stdin.
    pub prompt: String,
    /// Where the agent result ends up.
    pub output_path: PathBuf,
    /// Where stdout/stderr of the agent are logged.
    pub executor_log_path: PathBuf,
    pub timeout: Duration,
    /// Truncate captured output and logs beyond this many bytes.
    pub output_limit_bytes: usize,
}

/// Abstraction over agent execution backends.
pub trait Executor {
    /// Run the agent with the given request. Must leave its result at
    /// `request.output_path`.
    fn exec(&self, request: &ExecRequest) -> Result<()>;
}

/// Executor that runs a configured command per agent call.
///
/// The agent receives the prompt on stdin and `SCRIBE_AGENT_ROLE`,
/// `SCRIBE_MODEL`, `SCRIBE_TEMPERATURE` and `SCRIBE_OUTPUT_PATH` in its
/// environment. It may write the result to `SCRIBE_OUTPUT_PATH`; otherwise
/// its stdout is taken as the result.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    command: Vec<String>,
}

impl CommandExecutor {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }

    fn build_command(&self, request: &ExecRequest) -> Result<Command> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| anyhow!("agent command is empty"))?;
        let mut cmd = Command::new(program);
        for arg in args {
            cmd.arg(arg.replace(MODEL_PLACEHOLDER, &request.model));
        }
        cmd.current_dir(&request.workdir)
            .env("SCRIBE_AGENT_ROLE", request.role.as_str())
            .env("SCRIBE_MODEL", &request.model)
            .env("SCRIBE_OUTPUT_PATH", &request.output_path);
        if let Some(temperature) = request.temperature {
            cmd.env("SCRIBE_TEMPERATURE", temperature.to_string());
        }
        Ok(cmd)
    }
}

impl Executor for CommandExecutor {
    #[instrument(skip_all, fields(role = %request.role, model = %request.model, timeout_secs = request.timeout.as_secs()))]
    fn exec(&self, request: &ExecRequest) -> Result<()> {
        info!(workdir = %request.workdir.display(), "starting agent");
        if let Some(parent) = request.output_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create output dir {}", parent.display()))?;
        }
        if request.output_path.exists() {
            fs::remove_file(&request.output_path).with_context(|| {
                format!("remove stale output {}", request.output_path.display())
            })?;
        }

        let cmd = self.build_command(request)?;
        let output = run_with_timeout(
            cmd,
            request.prompt.as_bytes(),
            request.timeout,
            request.output_limit_bytes,
        )
        .with_context(|| format!("run {} agent", request.role))?;

        write_executor_log(
            &request.executor_log_path,
            &output,
            request.output_limit_bytes,
        )?;

        if output.timed_out {
            bail!(
                "{} agent timed out after {}s",
                request.role,
                request.timeout.as_secs()
            );
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "agent exited with failure");
            bail!(
                "{} agent exited with {} (see {})",
                request.role,
                output.status,
                request.executor_log_path.display()
            );
        }

        if !request.output_path.exists() {
            debug!("agent wrote no output file, using stdout");
            fs::write(&request.output_path, &output.stdout.bytes).with_context(|| {
                format!("write agent output {}", request.output_path.display())
            })?;
        }
        info!("agent finished");
        Ok(())
    }
}

/// Execute the agent and load its normalized result.
///
/// Empty results are errors.
#[instrument(skip_all, fields(role = %request.role, output_path = %request.output_path.display()))]
pub fn execute_and_load<E: Executor>(executor: &E, request: &ExecRequest) -> Result<String> {
    executor.exec(request)?;
    if !request.output_path.exists() {
        bail!("missing agent output {}", request.output_path.display());
    }
    let raw = fs::read_to_string(&request.output_path)
        .with_context(|| format!("read agent output {}", request.output_path.display()))?;
    let result = normalize_agent_output(&raw);
    if result.is_empty() {
        bail!("{} agent returned an empty result", request.role);
    }
    debug!(bytes = result.len(), "agent result loaded");
    Ok(result)
}

/// Reduce whatever the backend produced to the result text.
///
/// A JSON object yields its first string field among `raw`, `output`,
/// `content`, `text`. Anything else is taken verbatim. Surrounding whitespace
/// is trimmed either way.
pub fn normalize_agent_output(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('{')
        && let Ok(Value::Object(map)) = serde_json::from_str::<Value>(trimmed)
    {
        if let Some(text) = RESULT_KEYS
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
        {
            return text.trim().to_string();
        }
        debug!("json agent output without a known result key");
    }
    trimmed.to_string()
}

fn write_executor_log(path: &Path, output: &ProcessOutput, output_limit: usize) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create executor log dir {}", parent.display()))?;
    }
    let mut buf = output.transcript();
    if buf.len() > output_limit {
        let dropped = buf.len() - output_limit;
        let mut cut = output_limit;
        while !buf.is_char_boundary(cut) {
            cut -= 1;
        }
        buf.truncate(cut);
        buf.push_str(&format!("\n[truncated {dropped} bytes]\n"));
    }
    fs::write(path, buf).with_context(|| format!("write executor log {}", path.display()))
}
