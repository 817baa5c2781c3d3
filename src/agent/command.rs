//! Subprocess-backed agent.
//!
//! Runs the configured command template in the request's working directory,
//! feeds the prompt on stdin and turns each stdout line into an
//! [`AgentEvent`]. The command's lifetime is bounded by the request timeout.

use crate::agent::invoker::{AgentEvent, AgentEventStream, AgentInvoker, AgentRequest};
use crate::agent::template::{TemplateError, render_with};
use crate::config::AgentProfile;
use crate::error::{BakeoffError, Result};
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const COMMAND_VARIABLES: &[&str] = &[
    "prompt_file",
    "workdir",
    "label",
    "can_write",
    "can_execute_shell",
    "can_fetch_network",
];

const STDERR_TAIL_CHARS: usize = 2000;
const STDERR_BUFFER_CHARS: usize = 2 * STDERR_TAIL_CHARS;

/// Agent that shells out to a CLI described by an [`AgentProfile`].
#[derive(Debug, Clone)]
pub struct CommandAgent {
    profile: AgentProfile,
}

impl CommandAgent {
    pub fn new(profile: AgentProfile) -> Self {
        Self { profile }
    }

    /// Render the command template for `request` and split it into argv.
    pub fn build_command(&self, request: &AgentRequest, prompt_file: &Path) -> Result<Vec<String>> {
        let template = &self.profile.command;
        let lookup = |name: &str| -> Option<String> {
            let value = match name {
                "prompt_file" => prompt_file.to_string_lossy().to_string(),
                "workdir" => request.working_directory.to_string_lossy().to_string(),
                "label" => request.label.clone(),
                "can_write" => request.permissions.can_write.to_string(),
                "can_execute_shell" => request.permissions.can_execute_shell.to_string(),
                "can_fetch_network" => request.permissions.can_fetch_network.to_string(),
                _ => return None,
            };
            Some(shell_words::quote(&value).into_owned())
        };

        let rendered = render_with(template, lookup).map_err(|e| match e {
            TemplateError::UndefinedVariable { name, .. } => BakeoffError::AgentError(format!(
                "agent command template references undefined variable '{}'\n\
                 Command: {}\n\
                 Available variables: {}",
                name,
                template,
                COMMAND_VARIABLES.join(", ")
            )),
            other => BakeoffError::AgentError(format!("agent command template: {}", other)),
        })?;

        let args = shell_words::split(&rendered).map_err(|e| {
            BakeoffError::AgentError(format!(
                "failed to parse agent command '{}': {}\n\
                 Fix: check for unmatched quotes or invalid escape sequences.",
                rendered, e
            ))
        })?;

        if args.is_empty() {
            return Err(BakeoffError::AgentError(format!(
                "agent command is empty after parsing: '{}'",
                rendered
            )));
        }

        Ok(args)
    }
}

impl AgentInvoker for CommandAgent {
    fn invoke(&self, request: &AgentRequest) -> Result<AgentEventStream> {
        let prompt_file = write_prompt_file(request)?;
        let args = self.build_command(request, &prompt_file)?;

        let mut command = Command::new(&args[0]);
        command
            .args(&args[1..])
            .current_dir(&request.working_directory)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .envs(&self.profile.environment)
            .env("BAKEOFF_CAN_WRITE", request.permissions.can_write.to_string())
            .env(
                "BAKEOFF_CAN_EXECUTE_SHELL",
                request.permissions.can_execute_shell.to_string(),
            )
            .env(
                "BAKEOFF_CAN_FETCH_NETWORK",
                request.permissions.can_fetch_network.to_string(),
            );

        let mut child = command.spawn().map_err(|e| {
            BakeoffError::AgentError(format!(
                "failed to execute agent command '{}': {}\n\
                 Fix: ensure the command is installed and in PATH.",
                args[0], e
            ))
        })?;
        debug!(agent = %request.label, program = %args[0], pid = child.id(), "agent started");

        if let Some(mut stdin) = child.stdin.take() {
            let prompt = request.prompt.clone();
            // Agents that never read stdin close it early; that is not an error.
            thread::spawn(move || {
                let _ = stdin.write_all(prompt.as_bytes());
            });
        }

        let (tx, rx) = mpsc::channel();
        if let Some(stdout) = child.stdout.take() {
            thread::spawn(move || {
                for line in BufReader::new(stdout).lines() {
                    let Ok(line) = line else { break };
                    if line.trim().is_empty() {
                        continue;
                    }
                    if tx.send(AgentEvent::from_line(&line)).is_err() {
                        break;
                    }
                }
            });
        }

        let stderr_buf = Arc::new(Mutex::new(String::new()));
        let mut stderr_reader = None;
        if let Some(mut stderr) = child.stderr.take() {
            let buf = Arc::clone(&stderr_buf);
            stderr_reader = Some(thread::spawn(move || {
                let mut chunk = [0u8; 4096];
                while let Ok(n) = stderr.read(&mut chunk) {
                    if n == 0 {
                        break;
                    }
                    if let Ok(mut b) = buf.lock() {
                        b.push_str(&String::from_utf8_lossy(&chunk[..n]));
                        // Slack so trailing whitespace trimmed later cannot eat the tail.
                        keep_tail(&mut b, STDERR_BUFFER_CHARS);
                    }
                }
            }));
        }

        Ok(Box::new(CommandEventStream {
            child,
            events: rx,
            deadline: Instant::now() + request.timeout,
            timeout: request.timeout,
            stderr: stderr_buf,
            stderr_reader,
            transcript: String::new(),
            label: request.label.clone(),
            done: false,
        }))
    }
}

/// Drop everything but the last `max_chars` characters of `buf`.
fn keep_tail(buf: &mut String, max_chars: usize) {
    let excess = buf.chars().count().saturating_sub(max_chars);
    if excess > 0 {
        let cut = buf
            .char_indices()
            .nth(excess)
            .map(|(i, _)| i)
            .unwrap_or(buf.len());
        buf.drain(..cut);
    }
}

/// Write the prompt where the command template's `{prompt_file}` points.
fn write_prompt_file(request: &AgentRequest) -> Result<PathBuf> {
    let dir = request.artifacts_dir.join("prompts");
    std::fs::create_dir_all(&dir).map_err(|e| {
        BakeoffError::AgentError(format!(
            "failed to create prompts directory '{}': {}",
            dir.display(),
            e
        ))
    })?;

    let path = dir.join(format!("{}.md", request.label));
    std::fs::write(&path, &request.prompt).map_err(|e| {
        BakeoffError::AgentError(format!(
            "failed to write prompt file '{}': {}",
            path.display(),
            e
        ))
    })?;
    Ok(path)
}

struct CommandEventStream {
    child: Child,
    events: Receiver<AgentEvent>,
    deadline: Instant,
    timeout: Duration,
    stderr: Arc<Mutex<String>>,
    stderr_reader: Option<JoinHandle<()>>,
    /// Plain-text stdout, used as the result of an agent that exits cleanly
    /// without emitting a terminal event.
    transcript: String,
    label: String,
    done: bool,
}

impl CommandEventStream {
    fn timed_out(&mut self) -> AgentEvent {
        self.kill();
        warn!(agent = %self.label, timeout_secs = self.timeout.as_secs(), "agent timed out");
        AgentEvent::Error {
            detail: format!("agent timed out after {}s", self.timeout.as_secs()),
        }
    }

    fn kill(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }

    /// Poll for exit until the deadline, then kill.
    fn wait_until_deadline(&mut self) -> Option<ExitStatus> {
        let poll_interval = Duration::from_millis(50);
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => return Some(status),
                Ok(None) if Instant::now() < self.deadline => thread::sleep(poll_interval),
                _ => {
                    self.kill();
                    return None;
                }
            }
        }
    }

    fn stderr_tail(&mut self) -> String {
        // The process has exited; give the reader a moment to drain the pipe.
        if let Some(reader) = self.stderr_reader.take() {
            let grace = Instant::now() + Duration::from_millis(500);
            while !reader.is_finished() && Instant::now() < grace {
                thread::sleep(Duration::from_millis(10));
            }
        }
        let stderr = self.stderr.lock().map(|s| s.clone()).unwrap_or_default();
        let mut tail = stderr.trim().to_string();
        keep_tail(&mut tail, STDERR_TAIL_CHARS);
        tail
    }

    fn ended_without_terminal(&mut self) -> AgentEvent {
        let status = self.wait_until_deadline();
        match status {
            Some(status) if status.success() => {
                debug!(agent = %self.label, "agent exited cleanly without a terminal event");
                AgentEvent::Success {
                    result: std::mem::take(&mut self.transcript).trim_end().to_string(),
                }
            }
            Some(status) => {
                let tail = self.stderr_tail();
                let mut detail = format!("agent exited with {}", status);
                if !tail.is_empty() {
                    detail.push_str(": ");
                    detail.push_str(&tail);
                }
                AgentEvent::Error { detail }
            }
            None => AgentEvent::Error {
                detail: format!("agent timed out after {}s", self.timeout.as_secs()),
            },
        }
    }
}

impl Iterator for CommandEventStream {
    type Item = AgentEvent;

    fn next(&mut self) -> Option<AgentEvent> {
        if self.done {
            return None;
        }

        let remaining = self.deadline.saturating_duration_since(Instant::now());
        let event = match self.events.recv_timeout(remaining) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) => {
                self.done = true;
                return Some(self.timed_out());
            }
            Err(RecvTimeoutError::Disconnected) => {
                self.done = true;
                return Some(self.ended_without_terminal());
            }
        };

        if let AgentEvent::Progress(serde_json::Value::String(text)) = &event {
            self.transcript.push_str(text);
            self.transcript.push('\n');
        }

        if event.is_terminal() {
            self.done = true;
            // Let the agent finish flushing its edits before the caller
            // snapshots the workspace.
            self.wait_until_deadline();
        }
        Some(event)
    }
}

impl Drop for CommandEventStream {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            self.kill();
        }
    }
}
