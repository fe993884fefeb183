//! Station watch tools: the process/interface watchdog and the
//! display-wait launcher.
//!
//! External programs are reached through [`CommandRunner`] so the polling
//! loops can run against scripted output.

pub mod launch;
pub mod status;

use crate::error::{CommandError, Result};
use std::collections::BTreeMap;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

pub use launch::{LaunchSettings, launch_when_ready, wait_for_display};
pub use status::{InterfaceState, ProcessState, StatusReport, StatusSettings, check_once, run_status_loop};

/// A program invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program name or path.
    pub program: String,
    /// Arguments.
    pub args: Vec<String>,
    /// Extra environment variables.
    pub env: BTreeMap<String, String>,
}

impl CommandSpec {
    /// Creates a spec for `program` with `args`.
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            env: BTreeMap::new(),
        }
    }

    /// Adds an environment variable.
    #[must_use]
    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env.insert(key.to_string(), value.to_string());
        self
    }

    /// Program and arguments joined for display.
    #[must_use]
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when killed by a signal.
    pub code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// True for exit code 0.
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.code, Some(0))
    }
}

/// Runs external programs.
pub trait CommandRunner {
    /// Runs a command to completion, capturing its output.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::SpawnFailed`] if the program cannot start.
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;

    /// Starts a command in the background and returns its pid without
    /// waiting.
    fn spawn_detached(&self, spec: &CommandSpec) -> Result<u32>;
}

/// [`CommandRunner`] backed by `std::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        tracing::debug!(command = %spec.display(), "running");
        let output = Command::new(&spec.program)
            .args(&spec.args)
            .envs(&spec.env)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| spawn_failed(spec, &e))?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn spawn_detached(&self, spec: &CommandSpec) -> Result<u32> {
        let child = Command::new(&spec.program)
            .args(&spec.args)
            .envs(&spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| spawn_failed(spec, &e))?;
        let pid = child.id();
        tracing::info!(command = %spec.display(), pid, "spawned background process");
        // The child is intentionally not waited on.
        drop(child);
        Ok(pid)
    }
}

fn spawn_failed(spec: &CommandSpec, err: &std::io::Error) -> CommandError {
    CommandError::SpawnFailed {
        program: spec.program.clone(),
        reason: err.to_string(),
    }
}

/// Cooperative stop flag set by SIGINT/SIGTERM.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    flag: Arc<AtomicBool>,
}

/// Granularity of interruptible sleeps.
const SLEEP_SLICE: Duration = Duration::from_millis(250);

impl Shutdown {
    /// A flag that only [`Shutdown::trigger`] sets.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A flag set by SIGINT or SIGTERM.
    ///
    /// # Errors
    ///
    /// Returns an error if the handlers cannot be registered.
    pub fn install() -> Result<Self> {
        let shutdown = Self::new();
        for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
            signal_hook::flag::register(signal, Arc::clone(&shutdown.flag)).map_err(|e| {
                CommandError::ExecutionFailed(format!("failed to register signal handler: {e}"))
            })?;
        }
        Ok(shutdown)
    }

    /// Requests a stop.
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// True once a stop was requested.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Sleeps for `duration` unless a stop is requested first.
    ///
    /// Returns `false` if the sleep was cut short.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_triggered() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::{CommandOutput, CommandRunner, CommandSpec};
    use crate::error::{CommandError, Result};
    use std::cell::RefCell;
    use std::collections::VecDeque;

    /// Replays canned outputs per program, recording every call.
    #[derive(Default)]
    pub struct ScriptedRunner {
        pub outputs: RefCell<Vec<(String, VecDeque<Result<CommandOutput>>)>>,
        pub calls: RefCell<Vec<CommandSpec>>,
        pub spawned: RefCell<Vec<CommandSpec>>,
    }

    impl ScriptedRunner {
        pub fn push(&self, program: &str, code: i32, stdout: &str) {
            self.push_result(
                program,
                Ok(CommandOutput {
                    code: Some(code),
                    stdout: stdout.to_string(),
                    stderr: String::new(),
                }),
            );
        }

        pub fn push_result(&self, program: &str, result: Result<CommandOutput>) {
            let mut outputs = self.outputs.borrow_mut();
            if let Some((_, queue)) = outputs.iter_mut().find(|(p, _)| p.as_str() == program) {
                queue.push_back(result);
            } else {
                outputs.push((program.to_string(), VecDeque::from([result])));
            }
        }

        pub fn calls_to(&self, program: &str) -> usize {
            self.calls.borrow().iter().filter(|c| c.program == program).count()
        }
    }

    impl CommandRunner for ScriptedRunner {
        fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
            self.calls.borrow_mut().push(spec.clone());
            let mut outputs = self.outputs.borrow_mut();
            outputs
                .iter_mut()
                .find(|(p, _)| *p == spec.program)
                .and_then(|(_, q)| q.pop_front())
                .unwrap_or_else(|| {
                    Err(CommandError::SpawnFailed {
                        program: spec.program.clone(),
                        reason: "no scripted output".to_string(),
                    }
                    .into())
                })
        }

        fn spawn_detached(&self, spec: &CommandSpec) -> Result<u32> {
            self.spawned.borrow_mut().push(spec.clone());
            Ok(4242)
        }
    }
}
