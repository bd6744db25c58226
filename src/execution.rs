// Command execution - the only place a wipe command is handed to the OS
//
// `CommandRunner` is the process seam (real shell or a test double).
// `CommandExecutor` layers the dry-run preview and the echo markers on top.

use crate::WipeResult;
use serde::{Deserialize, Serialize};
use std::io::{self, Read, Write};
use std::process::{Command, Stdio};

/// Marker printed before a command that is actually invoked
pub const EXEC_MARKER: &str = "[EXEC]";

/// Marker printed for a command that is only previewed
pub const DRY_RUN_MARKER: &str = "[DRY-RUN]";

/// Bytes of stderr kept for failure reports
const STDERR_TAIL_BYTES: usize = 4096;

/// EOPNOTSUPP on Linux, used by a few tools as their exit status
const EXIT_NOT_SUPPORTED: i32 = 95;

/// Result of running one command through a runner
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutput {
    /// `None` when the process was killed by a signal
    pub exit_code: Option<i32>,
    pub stderr_tail: String,
}

impl CommandOutput {
    pub fn success() -> Self {
        Self {
            exit_code: Some(0),
            stderr_tail: String::new(),
        }
    }

    pub fn failure(exit_code: i32, stderr: &str) -> Self {
        Self {
            exit_code: Some(exit_code),
            stderr_tail: stderr.to_string(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Whether the failure looks like "operation not supported" rather than a real error
    pub fn looks_unsupported(&self) -> bool {
        self.exit_code == Some(EXIT_NOT_SUPPORTED)
            || self.stderr_tail.to_lowercase().contains("not supported")
    }
}

/// Runs one shell command line to completion
pub trait CommandRunner {
    fn run(&mut self, command: &str) -> io::Result<CommandOutput>;
}

/// Runs commands through `bash -c`.
///
/// Stdout is inherited so tool progress stays visible. Stderr is streamed
/// through to ours while its tail is kept for the failure report.
pub struct SystemRunner {
    shell: String,
}

impl SystemRunner {
    pub fn new() -> Self {
        Self {
            shell: "bash".to_string(),
        }
    }
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner for SystemRunner {
    fn run(&mut self, command: &str) -> io::Result<CommandOutput> {
        let mut child = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .spawn()?;

        let mut tail: Vec<u8> = Vec::with_capacity(STDERR_TAIL_BYTES);
        let captured = match child.stderr.take() {
            Some(mut stderr) => tee_stderr_tail(&mut stderr, &mut io::stderr(), &mut tail),
            None => Ok(()),
        };

        // Reap the child even when its stderr could not be read
        let status = child.wait()?;
        Ok(finish_output(status.code(), &tail, captured))
    }
}

/// Copy `reader` to `sink`, keeping the last `STDERR_TAIL_BYTES` in `tail`
fn tee_stderr_tail(reader: &mut dyn Read, sink: &mut dyn Write, tail: &mut Vec<u8>) -> io::Result<()> {
    let mut chunk = [0u8; 1024];
    loop {
        let n = match reader.read(&mut chunk) {
            Ok(0) => return Ok(()),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        // Progress output must not be lost because the terminal went away
        let _ = sink.write_all(&chunk[..n]);
        tail.extend_from_slice(&chunk[..n]);
        if tail.len() > STDERR_TAIL_BYTES {
            let excess = tail.len() - STDERR_TAIL_BYTES;
            tail.drain(..excess);
        }
    }
}

/// The exit status stays authoritative; a broken stderr pipe only shows up in the detail
fn finish_output(exit_code: Option<i32>, tail: &[u8], captured: io::Result<()>) -> CommandOutput {
    let mut stderr_tail = String::from_utf8_lossy(tail).trim().to_string();
    if let Err(e) = captured {
        tracing::warn!("Could not read command stderr: {}", e);
        if !stderr_tail.is_empty() {
            stderr_tail.push('\n');
        }
        stderr_tail.push_str(&format!("stderr unreadable: {}", e));
    }
    CommandOutput {
        exit_code,
        stderr_tail,
    }
}

/// Outcome of one executed (or previewed) command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CommandStatus {
    Succeeded,
    Previewed,
    /// A best-effort command the device does not support
    Unsupported { detail: String },
    Failed {
        exit_code: Option<i32>,
        detail: String,
    },
}

impl CommandStatus {
    /// Whether this outcome keeps the run successful
    pub fn is_ok(&self) -> bool {
        !matches!(self, CommandStatus::Failed { .. })
    }

    /// Whether the command actually completed its work (or would have, in a preview)
    pub fn completed(&self) -> bool {
        matches!(self, CommandStatus::Succeeded | CommandStatus::Previewed)
    }
}

/// Runs or previews commands and echoes each one to the progress stream
pub struct CommandExecutor {
    dry_run: bool,
    runner: Box<dyn CommandRunner>,
}

impl CommandExecutor {
    pub fn new(dry_run: bool, runner: Box<dyn CommandRunner>) -> Self {
        Self { dry_run, runner }
    }

    /// Executor backed by the real shell
    pub fn system(dry_run: bool) -> Self {
        Self::new(dry_run, Box::new(SystemRunner::new()))
    }

    /// Run one command. `best_effort` lets an "unsupported" failure pass as a warning.
    ///
    /// Only a failure to write to `out` is returned as an error; command
    /// failures (including failure to spawn) come back as `CommandStatus::Failed`.
    pub fn execute(
        &mut self,
        out: &mut dyn Write,
        command: &str,
        best_effort: bool,
    ) -> WipeResult<CommandStatus> {
        if self.dry_run {
            writeln!(out, "    {} {}", DRY_RUN_MARKER, command)?;
            return Ok(CommandStatus::Previewed);
        }

        writeln!(out, "    {} {}", EXEC_MARKER, command)?;
        out.flush()?;

        let status = match self.runner.run(command) {
            Ok(output) if output.succeeded() => CommandStatus::Succeeded,
            Ok(output) if best_effort && output.looks_unsupported() => CommandStatus::Unsupported {
                detail: output.stderr_tail,
            },
            Ok(output) => CommandStatus::Failed {
                exit_code: output.exit_code,
                detail: output.stderr_tail,
            },
            Err(e) => CommandStatus::Failed {
                exit_code: None,
                detail: format!("failed to start: {}", e),
            },
        };

        tracing::debug!(command = %command, status = ?status, "Command finished");
        Ok(status)
    }
}
