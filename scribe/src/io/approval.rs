//! Human approval gates.
//!
//! The workflow never talks to the console directly; it asks an
//! [`ApprovalProvider`]. The console implementation re-prompts on invalid
//! input. End of input counts as cancellation.

use std::cell::RefCell;
use std::io::{BufRead, Stdin, Stdout, Write};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

/// What to do with an outline that already exists on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutlineChoice {
    Expand,
    Regenerate,
    UseAsIs,
}

/// Answer at the outline gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Approval {
    Approve,
    /// Not yet: the human edits the file and is asked again.
    Reject,
    Cancel,
}

/// The artifact a human is asked to approve.
#[derive(Debug, Clone, Copy)]
pub struct OutlineArtifact<'a> {
    pub chapter_number: u32,
    pub path: &'a Path,
    pub text: &'a str,
}

pub trait ApprovalProvider {
    fn choose_existing_outline(&self, chapter_number: u32, existing: &str) -> Result<OutlineChoice>;

    fn request_approval(&self, artifact: &OutlineArtifact<'_>) -> Result<Approval>;

    /// Yes/no before the writer and editor run.
    fn confirm_writing(&self, chapter_number: u32) -> Result<bool>;

    /// Told after a rejection, before the gate asks again.
    fn notify_revision(&self, artifact: &OutlineArtifact<'_>) -> Result<()> {
        debug!(path = %artifact.path.display(), "awaiting outline revision");
        Ok(())
    }
}

/// Approves everything without asking (`--yes`).
///
/// Existing outlines are used as they are.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApproval;

impl ApprovalProvider for AutoApproval {
    fn choose_existing_outline(&self, _chapter_number: u32, _existing: &str) -> Result<OutlineChoice> {
        Ok(OutlineChoice::UseAsIs)
    }

    fn request_approval(&self, _artifact: &OutlineArtifact<'_>) -> Result<Approval> {
        Ok(Approval::Approve)
    }

    fn confirm_writing(&self, _chapter_number: u32) -> Result<bool> {
        Ok(true)
    }
}

const PREVIEW_LINES: usize = 40;

/// Interactive gate over any line reader and writer.
pub struct ConsoleApproval<R, W> {
    input: RefCell<R>,
    output: RefCell<W>,
}

impl ConsoleApproval<std::io::StdinLock<'static>, Stdout> {
    pub fn stdio() -> Self {
        let stdin: Stdin = std::io::stdin();
        Self::new(stdin.lock(), std::io::stdout())
    }
}

impl<R: BufRead, W: Write> ConsoleApproval<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input: RefCell::new(input),
            output: RefCell::new(output),
        }
    }

    pub fn into_output(self) -> W {
        self.output.into_inner()
    }

    fn say(&self, text: &str) -> Result<()> {
        let mut out = self.output.borrow_mut();
        writeln!(out, "{text}").context("write prompt")?;
        out.flush().context("flush prompt")
    }

    /// Print `question` and read one trimmed, lowercased line; `None` at EOF.
    fn ask(&self, question: &str) -> Result<Option<String>> {
        {
            let mut out = self.output.borrow_mut();
            write!(out, "{question} ").context("write prompt")?;
            out.flush().context("flush prompt")?;
        }
        let mut line = String::new();
        let read = self
            .input
            .borrow_mut()
            .read_line(&mut line)
            .context("read answer")?;
        if read == 0 {
            debug!("approval input closed");
            return Ok(None);
        }
        Ok(Some(line.trim().to_lowercase()))
    }
}

impl<R: BufRead, W: Write> ApprovalProvider for ConsoleApproval<R, W> {
    fn choose_existing_outline(&self, chapter_number: u32, existing: &str) -> Result<OutlineChoice> {
        self.say(&format!(
            "\nAn outline for Chapter {chapter_number} already exists ({} words).",
            crate::core::text::word_count(existing)
        ))?;
        self.say("  1. Expand the existing outline")?;
        self.say("  2. Create a new outline")?;
        self.say("  3. Use the existing outline as-is")?;
        loop {
            match self.ask("Choose 1-3 [1]:")?.as_deref() {
                None => return Ok(OutlineChoice::UseAsIs),
                Some("" | "1") => return Ok(OutlineChoice::Expand),
                Some("2") => return Ok(OutlineChoice::Regenerate),
                Some("3") => return Ok(OutlineChoice::UseAsIs),
                Some(other) => self.say(&format!("Invalid choice '{other}'. Enter 1, 2 or 3."))?,
            }
        }
    }

    fn request_approval(&self, artifact: &OutlineArtifact<'_>) -> Result<Approval> {
        self.say(&format!(
            "\n=== Outline for Chapter {} ({}) ===",
            artifact.chapter_number,
            artifact.path.display()
        ))?;
        let lines: Vec<&str> = artifact.text.lines().collect();
        for line in lines.iter().take(PREVIEW_LINES) {
            self.say(line)?;
        }
        if lines.len() > PREVIEW_LINES {
            self.say(&format!("... ({} more lines)", lines.len() - PREVIEW_LINES))?;
        }
        loop {
            match self.ask("Approve this outline? [y]es / [n]ot yet / [q]uit:")?.as_deref() {
                None => return Ok(Approval::Cancel),
                Some("y" | "yes") => return Ok(Approval::Approve),
                Some("n" | "no") => return Ok(Approval::Reject),
                Some("q" | "quit") => return Ok(Approval::Cancel),
                Some(other) => self.say(&format!("Invalid answer '{other}'. Enter y, n or q."))?,
            }
        }
    }

    fn confirm_writing(&self, chapter_number: u32) -> Result<bool> {
        loop {
            match self
                .ask(&format!(
                    "Proceed to writing and editing Chapter {chapter_number}? [Y/n]:"
                ))?
                .as_deref()
            {
                None => return Ok(false),
                Some("" | "y" | "yes") => return Ok(true),
                Some("n" | "no") => return Ok(false),
                Some(other) => self.say(&format!("Invalid answer '{other}'. Enter y or n."))?,
            }
        }
    }

    fn notify_revision(&self, artifact: &OutlineArtifact<'_>) -> Result<()> {
        self.say(&format!(
            "Edit {} and answer again when ready.",
            artifact.path.display()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn console(input: &str) -> ConsoleApproval<Cursor<Vec<u8>>, Vec<u8>> {
        ConsoleApproval::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    fn artifact(text: &str) -> OutlineArtifact<'_> {
        OutlineArtifact {
            chapter_number: 1,
            path: Path::new("outlines/chapter_1.txt"),
            text,
        }
    }

    /// Invalid answers re-prompt instead of failing.
    #[test]
    fn approval_reprompts_on_invalid_input() {
        let gate = console("maybe\nY\n");
        let answer = gate.request_approval(&artifact("1. Beat")).expect("answer");
        assert_eq!(answer, Approval::Approve);
        let printed = String::from_utf8(gate.into_output()).expect("utf8");
        assert!(printed.contains("Invalid answer 'maybe'"));
        assert!(printed.contains("1. Beat"));
    }

    #[test]
    fn approval_maps_not_yet_and_quit() {
        assert_eq!(
            console("n\n").request_approval(&artifact("x")).expect("answer"),
            Approval::Reject
        );
        assert_eq!(
            console("q\n").request_approval(&artifact("x")).expect("answer"),
            Approval::Cancel
        );
    }

    #[test]
    fn end_of_input_cancels() {
        assert_eq!(
            console("").request_approval(&artifact("x")).expect("answer"),
            Approval::Cancel
        );
        assert!(!console("").confirm_writing(1).expect("answer"));
    }

    #[test]
    fn existing_outline_choice_defaults_to_expand() {
        assert_eq!(
            console("\n").choose_existing_outline(2, "a b").expect("choice"),
            OutlineChoice::Expand
        );
        assert_eq!(
            console("7\n2\n").choose_existing_outline(2, "a b").expect("choice"),
            OutlineChoice::Regenerate
        );
        assert_eq!(
            console("3\n").choose_existing_outline(2, "a b").expect("choice"),
            OutlineChoice::UseAsIs
        );
    }

    #[test]
    fn confirm_writing_defaults_to_yes() {
        assert!(console("\n").confirm_writing(1).expect("answer"));
        assert!(!console("no\n").confirm_writing(1).expect("answer"));
    }

    #[test]
    fn long_outlines_are_previewed() {
        let text = (1..=50).map(|n| format!("{n}. beat")).collect::<Vec<_>>().join("\n");
        let gate = console("y\n");
        gate.request_approval(&artifact(&text)).expect("answer");
        let printed = String::from_utf8(gate.into_output()).expect("utf8");
        assert!(printed.contains("40. beat"));
        assert!(!printed.contains("41. beat"));
        assert!(printed.contains("(10 more lines)"));
    }
}
