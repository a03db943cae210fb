//! Scribe CLI.
//!
//! Drives chapter workflows against a project directory holding
//! `knowledge/`, `outlines/`, `chapters/` and an optional `scribe.toml`.

use std::path::{Path, PathBuf};
use std::thread;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::warn;

use scribe::core::types::TaskId;
use scribe::core::validator::{format_report, validate};
use scribe::exit_codes;
use scribe::io::approval::{ApprovalProvider, AutoApproval, ConsoleApproval};
use scribe::io::artifacts::{ArtifactKind, ArtifactStore};
use scribe::io::config::{ScribeConfig, load_config};
use scribe::io::executor::CommandExecutor;
use scribe::io::knowledge::KnowledgeBase;
use scribe::io::paths::{InitOptions, ProjectPaths, init_project};
use scribe::logging;
use scribe::status::project_status;
use scribe::training::Trainer;
use scribe::workflow::{Workflow, WorkflowMode, WorkflowOutcome, WorkflowStatus};

#[derive(Parser, Debug)]
#[command(
    name = "scribe",
    version,
    about = "Plan, write and edit story chapters with an agent crew"
)]
struct Cli {
    /// Project root.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,
    /// Debug logging for scribe (overridden by `RUST_LOG`).
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Outline, write and edit a chapter with no approval gate.
    Run {
        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        chapter: Option<u32>,
    },
    /// Outline with approval, then write and edit.
    Workflow {
        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        chapter: Option<u32>,
        /// Approve every gate automatically.
        #[arg(short, long)]
        yes: bool,
    },
    /// Outline with approval only.
    Architect {
        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        chapter: Option<u32>,
        /// Approve every gate automatically.
        #[arg(short, long)]
        yes: bool,
    },
    /// Show chapters and knowledge base completeness.
    Status,
    /// Validate a saved draft (defaults to the latest).
    Validate {
        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        chapter: Option<u32>,
    },
    /// Summarize or search the knowledge base.
    Knowledge {
        #[arg(long)]
        search: Option<String>,
        #[arg(long, requires = "search")]
        case_sensitive: bool,
    },
    /// Create the project directories and a default `scribe.toml`.
    Init {
        /// Overwrite an existing `scribe.toml`.
        #[arg(short, long)]
        force: bool,
    },
    /// Run the full crew repeatedly and save the outputs.
    Train {
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        iterations: u32,
        #[arg(long)]
        filename: PathBuf,
        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        chapter: Option<u32>,
    },
    /// Re-run the latest run from a task onward.
    Replay {
        #[arg(long)]
        task_id: String,
    },
    /// Run the crew repeatedly and score each task with an evaluator model.
    Test {
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        iterations: u32,
        #[arg(long = "eval-llm")]
        eval_llm: String,
        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        chapter: Option<u32>,
    },
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() {
                exit_codes::FAILURE
            } else {
                exit_codes::OK
            };
            let _ = err.print();
            std::process::exit(code);
        }
    };
    logging::init(cli.verbose);
    if let Err(err) = watch_interrupts() {
        warn!(err = %err, "interrupt handler not installed");
    }
    if let Err(err) = run(cli) {
        eprintln!("{:#}", err);
        std::process::exit(exit_codes::FAILURE);
    }
}

/// Ctrl-C prints a notice and exits with the failure code.
///
/// The agent child shares the terminal's process group, so it receives the
/// same signal and is not left behind.
fn watch_interrupts() -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_io()
        .build()
        .context("build signal runtime")?;
    thread::Builder::new()
        .name("interrupt".to_string())
        .spawn(move || {
            if runtime.block_on(tokio::signal::ctrl_c()).is_ok() {
                eprintln!("\nInterrupted, exiting.");
                std::process::exit(exit_codes::FAILURE);
            }
        })
        .context("spawn interrupt watcher")?;
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    if let Command::Init { force } = cli.command {
        let paths = init_project(&cli.root, &InitOptions { force })?;
        println!("Initialized scribe project at {}", paths.root.display());
        return Ok(());
    }

    let paths = ProjectPaths::new(&cli.root);
    let config = load_config(&paths.config_path)?;
    let executor = CommandExecutor::new(config.agent.command.clone());

    match cli.command {
        Command::Init { .. } => Ok(()),
        Command::Run { chapter } => {
            let workflow = Workflow::new(&paths, &config, &executor, &AutoApproval);
            report(&workflow.run(WorkflowMode::Legacy, chapter)?)
        }
        Command::Workflow { chapter, yes } => {
            cmd_gated(&paths, &config, &executor, WorkflowMode::Complete, chapter, yes)
        }
        Command::Architect { chapter, yes } => {
            cmd_gated(&paths, &config, &executor, WorkflowMode::Architect, chapter, yes)
        }
        Command::Status => {
            print!("{}", project_status(&paths, &config)?.render());
            Ok(())
        }
        Command::Validate { chapter } => cmd_validate(&paths, &config, chapter),
        Command::Knowledge {
            search,
            case_sensitive,
        } => cmd_knowledge(&paths, &config, search.as_deref(), case_sensitive),
        Command::Train {
            iterations,
            filename,
            chapter,
        } => {
            let record = Trainer::new(&paths, &config, &executor).train(iterations, &filename, chapter)?;
            println!(
                "Training finished: {} iteration(s) for chapter {}, saved to {}",
                record.iterations.len(),
                record.chapter_number,
                filename.display()
            );
            Ok(())
        }
        Command::Replay { task_id } => {
            let task = TaskId::parse(&task_id)?;
            let record = Trainer::new(&paths, &config, &executor).replay(task)?;
            println!(
                "Replayed chapter {} from {task}: run {}",
                record.chapter_number, record.run_id
            );
            Ok(())
        }
        Command::Test {
            iterations,
            eval_llm,
            chapter,
        } => {
            let report = Trainer::new(&paths, &config, &executor).test(iterations, &eval_llm, chapter)?;
            print!("{}", report.render());
            Ok(())
        }
    }
}

fn cmd_gated(
    paths: &ProjectPaths,
    config: &ScribeConfig,
    executor: &CommandExecutor,
    mode: WorkflowMode,
    chapter: Option<u32>,
    yes: bool,
) -> Result<()> {
    if yes {
        run_gated(paths, config, executor, &AutoApproval, mode, chapter)
    } else {
        run_gated(paths, config, executor, &ConsoleApproval::stdio(), mode, chapter)
    }
}

fn run_gated<A: ApprovalProvider>(
    paths: &ProjectPaths,
    config: &ScribeConfig,
    executor: &CommandExecutor,
    approval: &A,
    mode: WorkflowMode,
    chapter: Option<u32>,
) -> Result<()> {
    let outcome = Workflow::new(paths, config, executor, approval).run(mode, chapter)?;
    report(&outcome)
}

/// Print the outcome; cancellation is reported as an error.
fn report(outcome: &WorkflowOutcome) -> Result<()> {
    println!(
        "Chapter {} ({} workflow): {}",
        outcome.chapter_number,
        outcome.mode,
        outcome.status.as_str()
    );
    if let Some(path) = &outcome.outline_path {
        println!("Outline: {}", path.display());
    }
    if let Some(path) = &outcome.draft_path {
        println!("Draft: {}", path.display());
    }
    if let Some(run_id) = outcome.run_id() {
        println!("Run: {run_id}");
    }
    if let Some(report) = outcome.validation_report() {
        println!("\n{report}");
    }
    if outcome.status == WorkflowStatus::Cancelled {
        bail!("chapter {} cancelled at the outline gate", outcome.chapter_number);
    }
    Ok(())
}

fn cmd_validate(paths: &ProjectPaths, config: &ScribeConfig, chapter: Option<u32>) -> Result<()> {
    let store = ArtifactStore::new(paths, config.validation.clone());
    let chapter = match chapter {
        Some(n) => n,
        None => match store.numbers(ArtifactKind::Draft)?.last() {
            Some(&n) => n,
            None => bail!("no drafts found in {}", paths.chapters_dir.display()),
        },
    };
    let draft = store.load_draft(chapter)?;
    println!("Chapter {chapter}:");
    println!("{}", format_report(&validate(&draft, &config.validation)));
    Ok(())
}

fn cmd_knowledge(
    paths: &ProjectPaths,
    config: &ScribeConfig,
    search: Option<&str>,
    case_sensitive: bool,
) -> Result<()> {
    let knowledge = KnowledgeBase::new(&paths.knowledge_dir, &config.knowledge.files);
    let Some(term) = search else {
        print_knowledge_summary(&knowledge, &paths.knowledge_dir);
        return Ok(());
    };
    let matches = knowledge.search(term, case_sensitive);
    if matches.is_empty() {
        println!("No matches for '{term}'");
        return Ok(());
    }
    for found in matches {
        println!("{}:", found.file);
        for line in found.lines {
            println!("  {line}");
        }
    }
    Ok(())
}

fn print_knowledge_summary(knowledge: &KnowledgeBase, dir: &Path) {
    let summary = knowledge.summary();
    println!("Knowledge base: {}", dir.display());
    for (name, present) in knowledge.status() {
        println!("  {} {name}", if present { "✅" } else { "❌" });
    }
    println!(
        "Available: {}/{} ({:.1}% complete, {} bytes)",
        summary.available_files,
        summary.total_files,
        summary.completeness_percentage,
        summary.total_size_bytes
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chapter_number_must_be_positive() {
        let err = Cli::try_parse_from(["scribe", "run", "0"]).unwrap_err();
        assert!(err.use_stderr());
        let cli = Cli::try_parse_from(["scribe", "run", "3"]).expect("parse");
        assert!(matches!(cli.command, Command::Run { chapter: Some(3) }));
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let cli = Cli::try_parse_from(["scribe", "workflow", "--yes", "--root", "/story", "-v"])
            .expect("parse");
        assert_eq!(cli.root, PathBuf::from("/story"));
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Command::Workflow {
                chapter: None,
                yes: true
            }
        ));
    }

    #[test]
    fn test_command_takes_eval_llm() {
        let cli = Cli::try_parse_from(["scribe", "test", "--iterations", "2", "--eval-llm", "judge", "5"])
            .expect("parse");
        match cli.command {
            Command::Test {
                iterations,
                eval_llm,
                chapter,
            } => {
                assert_eq!(iterations, 2);
                assert_eq!(eval_llm, "judge");
                assert_eq!(chapter, Some(5));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn train_requires_iterations_and_filename() {
        assert!(Cli::try_parse_from(["scribe", "train", "--filename", "t.json"]).is_err());
        assert!(Cli::try_parse_from(["scribe", "train", "--iterations", "1"]).is_err());
    }

    #[test]
    fn case_sensitive_requires_search() {
        assert!(Cli::try_parse_from(["scribe", "knowledge", "--case-sensitive"]).is_err());
        let cli = Cli::try_parse_from(["scribe", "knowledge", "--search", "Jade", "--case-sensitive"])
            .expect("parse");
        assert!(matches!(
            cli.command,
            Command::Knowledge {
                case_sensitive: true,
                ..
            }
        ));
    }
}
