//! Agent subprocesses with a wall-clock limit and bounded output capture.

use std::io::{Read, Write};
use std::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// Bytes kept from one stream plus how many were discarded past the limit.
#[derive(Debug, Default)]
pub struct CapturedStream {
    pub bytes: Vec<u8>,
    pub dropped: usize,
}

impl CapturedStream {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: CapturedStream,
    pub stderr: CapturedStream,
    pub timed_out: bool,
}

impl ProcessOutput {
    pub fn succeeded(&self) -> bool {
        !self.timed_out && self.status.success()
    }

    /// Log text with stdout, stderr and truncation/timeout notes.
    pub fn transcript(&self) -> String {
        let mut buf = String::from("=== stdout ===\n");
        buf.push_str(&self.stdout.text());
        if self.stdout.dropped > 0 {
            buf.push_str(&format!("\n[stdout truncated {} bytes]\n", self.stdout.dropped));
        }
        buf.push_str("\n=== stderr ===\n");
        buf.push_str(&self.stderr.text());
        if self.stderr.dropped > 0 {
            buf.push_str(&format!("\n[stderr truncated {} bytes]\n", self.stderr.dropped));
        }
        if self.timed_out {
            buf.push_str("\n[agent timed out]\n");
        }
        buf
    }
}

/// Spawn `cmd`, feed `input` on stdin, and wait at most `timeout`.
///
/// Stdin is fed and both output pipes are drained on helper threads while the
/// child runs, so neither a chatty agent nor one that never reads its prompt
/// can hold off the timeout. At most `limit` bytes per stream are kept. A
/// child that outlives `timeout` is killed.
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs(), limit = limit))]
pub fn run_with_timeout(
    mut cmd: Command,
    input: &[u8],
    timeout: Duration,
    limit: usize,
) -> Result<ProcessOutput> {
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!("spawning agent process");
    let mut child = cmd.spawn().map_err(|err| {
        error!(err = %err, "failed to spawn agent command");
        anyhow!(err).context("spawn agent command")
    })?;

    let (stdout, stderr) = take_pipes(&mut child)?;
    let stdout_reader = thread::spawn(move || drain(stdout, limit));
    let stderr_reader = thread::spawn(move || drain(stderr, limit));

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| anyhow!("stdin was not piped"))?;
    let input = input.to_vec();
    let stdin_writer = thread::spawn(move || feed(stdin, &input));

    let mut timed_out = false;
    let status = match child.wait_timeout(timeout).context("wait for agent")? {
        Some(status) => status,
        None => {
            warn!(timeout_secs = timeout.as_secs(), "agent timed out, killing");
            timed_out = true;
            child.kill().context("kill agent")?;
            child.wait().context("wait agent after kill")?
        }
    };

    // The kill above closes the read end, so a blocked write returns here.
    if stdin_writer.join().is_err() {
        warn!("stdin writer thread panicked");
    }
    let stdout = join_reader(stdout_reader).context("collect stdout")?;
    let stderr = join_reader(stderr_reader).context("collect stderr")?;
    if stdout.dropped > 0 || stderr.dropped > 0 {
        warn!(
            stdout_dropped = stdout.dropped,
            stderr_dropped = stderr.dropped,
            "agent output truncated"
        );
    }

    debug!(exit_code = ?status.code(), timed_out, "agent process finished");
    Ok(ProcessOutput {
        status,
        stdout,
        stderr,
        timed_out,
    })
}

fn take_pipes(child: &mut Child) -> Result<(ChildStdout, ChildStderr)> {
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;
    Ok((stdout, stderr))
}

/// Dropping stdin after the write signals EOF to the agent.
fn feed(mut stdin: ChildStdin, input: &[u8]) {
    if let Err(err) = stdin.write_all(input) {
        warn!(err = %err, "agent closed stdin early");
    }
}

fn join_reader(handle: JoinHandle<Result<CapturedStream>>) -> Result<CapturedStream> {
    handle
        .join()
        .map_err(|_| anyhow!("output reader thread panicked"))?
}

fn drain<R: Read>(mut reader: R, limit: usize) -> Result<CapturedStream> {
    let mut captured = CapturedStream::default();
    let mut chunk = [0u8; 8192];
    loop {
        let n = reader.read(&mut chunk).context("read agent output")?;
        if n == 0 {
            break;
        }
        let keep = n.min(limit.saturating_sub(captured.bytes.len()));
        captured.bytes.extend_from_slice(&chunk[..keep]);
        captured.dropped += n - keep;
    }
    Ok(captured)
}
