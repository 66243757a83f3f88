//! Subprocess execution with deadlines and cancellation
//!
//! Both the build toolchain and the `gh` CLI run through [`run`]. The child's
//! pipes are drained on helper threads while the caller polls for exit, so a
//! chatty process cannot fill a pipe and stall the wait loop. Collecting the
//! drained output is bounded by the same deadline as the wait.

use crate::core::error::Interrupt;
use command_group::{CommandGroup, GroupChild};
use std::io::{self, Read};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Cooperative cancellation flag shared between the caller and a running pipeline
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
  flag: Arc<AtomicBool>,
}

impl CancelToken {
  pub fn new() -> Self {
    Self::default()
  }

  /// Request cancellation; in-flight subprocesses are killed at the next poll
  pub fn cancel(&self) {
    self.flag.store(true, Ordering::SeqCst);
  }

  pub fn is_cancelled(&self) -> bool {
    self.flag.load(Ordering::SeqCst)
  }
}

/// Captured result of a finished subprocess
#[derive(Debug, Clone)]
pub struct ProcessOutput {
  /// None when the process was terminated by a signal
  pub exit_code: Option<i32>,
  pub stdout: String,
  pub stderr: String,
}

impl ProcessOutput {
  pub fn success(&self) -> bool {
    self.exit_code == Some(0)
  }
}

/// Why a subprocess produced no [`ProcessOutput`]
#[derive(Debug)]
pub enum ProcessError {
  /// The program could not be started
  Spawn(io::Error),
  /// Waiting on the child failed
  Wait(io::Error),
  /// Killed because of a deadline or cancellation
  Interrupted(Interrupt),
}

impl std::fmt::Display for ProcessError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      ProcessError::Spawn(e) => write!(f, "failed to start: {}", e),
      ProcessError::Wait(e) => write!(f, "failed to wait for process: {}", e),
      ProcessError::Interrupted(i) => write!(f, "{}", i),
    }
  }
}

/// Run `cmd` to completion, capturing stdout and stderr
///
/// The child is spawned into its own process group, and an interrupt kills the
/// whole group, so helpers the toolchain forks die with it. Returns
/// `Interrupted` if `timeout` elapses or `cancel` fires first, including while
/// a leftover group member still holds the output pipes after the child exits.
/// A cancelled token is honoured before spawning.
pub fn run(mut cmd: Command, timeout: Option<Duration>, cancel: &CancelToken) -> Result<ProcessOutput, ProcessError> {
  if cancel.is_cancelled() {
    return Err(ProcessError::Interrupted(Interrupt::Cancelled));
  }

  let mut child = cmd
    .stdin(Stdio::null())
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .group_spawn()
    .map_err(ProcessError::Spawn)?;

  let stdout = drain(child.inner().stdout.take());
  let stderr = drain(child.inner().stderr.take());

  let watch = Watch {
    cancel,
    timeout,
    deadline: timeout.map(|limit| Instant::now() + limit),
  };

  let status = loop {
    if let Some(status) = child.try_wait().map_err(ProcessError::Wait)? {
      break status;
    }
    if let Some(interrupt) = watch.interrupt() {
      terminate(&mut child);
      return Err(ProcessError::Interrupted(interrupt));
    }
    thread::sleep(POLL_INTERVAL);
  };

  let collected = watch
    .collect(&stdout)
    .and_then(|out| watch.collect(&stderr).map(|err| (out, err)));

  match collected {
    Ok((stdout, stderr)) => Ok(ProcessOutput {
      exit_code: status.code(),
      stdout,
      stderr,
    }),
    Err(interrupt) => {
      // The leader is already reaped; only stragglers in its group remain.
      if let Err(e) = child.kill() {
        tracing::debug!(error = %e, "kill on finished process group");
      }
      Err(ProcessError::Interrupted(interrupt))
    }
  }
}

struct Watch<'a> {
  cancel: &'a CancelToken,
  timeout: Option<Duration>,
  deadline: Option<Instant>,
}

impl Watch<'_> {
  fn interrupt(&self) -> Option<Interrupt> {
    if self.cancel.is_cancelled() {
      return Some(Interrupt::Cancelled);
    }
    match (self.timeout, self.deadline) {
      (Some(limit), Some(deadline)) if Instant::now() >= deadline => Some(Interrupt::TimedOut(limit)),
      _ => None,
    }
  }

  /// Wait for a drained pipe, giving up at the deadline or on cancel
  fn collect(&self, pipe: &Receiver<String>) -> Result<String, Interrupt> {
    loop {
      match pipe.recv_timeout(POLL_INTERVAL) {
        Ok(text) => return Ok(text),
        Err(RecvTimeoutError::Disconnected) => return Ok(String::new()),
        Err(RecvTimeoutError::Timeout) => {
          if let Some(interrupt) = self.interrupt() {
            return Err(interrupt);
          }
        }
      }
    }
  }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Receiver<String> {
  let (tx, rx) = mpsc::channel();
  thread::spawn(move || {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
      let _ = pipe.read_to_end(&mut buf);
    }
    let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
  });
  rx
}

fn terminate(child: &mut GroupChild) {
  if let Err(e) = child.kill() {
    tracing::debug!(error = %e, "kill on exited process group");
  }
  let _ = child.wait();
}

/// Render a command line for logs and dry-run output
pub fn display_command(program: &str, args: &[String]) -> String {
  let mut out = program.to_string();
  for arg in args {
    out.push(' ');
    if arg.is_empty() || arg.contains(char::is_whitespace) {
      out.push_str(&format!("'{}'", arg));
    } else {
      out.push_str(arg);
    }
  }
  out
}
