//! Waits for the X display, then starts the GUI in the background.

use super::{CommandRunner, CommandSpec, Shutdown};
use crate::error::{CommandError, IoError, Result};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Launcher parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSettings {
    /// Display to poll, e.g. `:0`.
    pub display: String,
    /// Pause between failed polls.
    pub interval: Duration,
    /// Maximum number of polls.
    pub attempts: u32,
    /// Append-only log file.
    pub log_path: PathBuf,
    /// Program and arguments to start.
    pub command: Vec<String>,
}

/// Timestamped append-only launcher log.
pub struct LaunchLog {
    file: File,
    path: PathBuf,
}

impl LaunchLog {
    /// Opens `path` for appending, creating it and its parent directory.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| IoError::DirectoryFailed {
                path: parent.display().to_string(),
                reason: e.to_string(),
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| IoError::WriteFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Appends `<YYYY-MM-DD HH:MM:SS> - <message>`.
    pub fn line(&mut self, message: &str) -> Result<()> {
        let ts = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        writeln!(self.file, "{ts} - {message}").map_err(|e| IoError::WriteFailed {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(())
    }
}

/// Polls `xset q` until the display answers.
///
/// Returns the attempt number that succeeded. No sleep follows the final
/// attempt.
pub fn wait_for_display(
    runner: &dyn CommandRunner,
    settings: &LaunchSettings,
    shutdown: &Shutdown,
    log: &mut LaunchLog,
) -> Result<u32> {
    let probe = CommandSpec::new("xset", ["q"]).env("DISPLAY", &settings.display);

    for attempt in 1..=settings.attempts {
        let ready = match runner.run(&probe) {
            Ok(out) => out.success(),
            Err(e) => {
                tracing::debug!(error = %e, "xset failed");
                false
            }
        };
        if ready {
            log.line(&format!("display {} is available", settings.display))?;
            tracing::info!(display = %settings.display, attempt, "display available");
            return Ok(attempt);
        }

        log.line(&format!(
            "waiting for display {} (attempt {attempt}/{})",
            settings.display, settings.attempts
        ))?;
        tracing::debug!(display = %settings.display, attempt, "display not ready");

        if attempt < settings.attempts && !shutdown.sleep(settings.interval) {
            log.line("interrupted while waiting for display")?;
            return Err(CommandError::Interrupted.into());
        }
    }

    log.line(&format!(
        "ERROR: display {} not available after {} attempts",
        settings.display, settings.attempts
    ))?;
    tracing::error!(display = %settings.display, attempts = settings.attempts, "display never became available");
    Err(CommandError::DisplayTimeout {
        display: settings.display.clone(),
        attempts: settings.attempts,
    }
    .into())
}

/// Waits for the display and starts the configured command detached.
///
/// Returns the child's pid.
pub fn launch_when_ready(
    runner: &dyn CommandRunner,
    settings: &LaunchSettings,
    shutdown: &Shutdown,
) -> Result<u32> {
    let (program, args) = settings
        .command
        .split_first()
        .ok_or_else(|| CommandError::InvalidArgument("launch command is empty".to_string()))?;
    if settings.attempts == 0 {
        return Err(CommandError::InvalidArgument("display attempts must be at least 1".to_string()).into());
    }

    let mut log = LaunchLog::open(&settings.log_path)?;
    log.line("launcher started")?;
    wait_for_display(runner, settings, shutdown, &mut log)?;

    let spec = CommandSpec::new(program, args.iter().cloned()).env("DISPLAY", &settings.display);
    let pid = match runner.spawn_detached(&spec) {
        Ok(pid) => pid,
        Err(e) => {
            log.line(&format!("ERROR: failed to launch {}: {e}", spec.display()))?;
            return Err(e);
        }
    };
    log.line(&format!("launched {} (pid {pid})", spec.display()))?;
    Ok(pid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::watch::fake::ScriptedRunner;
    use tempfile::TempDir;

    fn settings(dir: &Path, attempts: u32) -> LaunchSettings {
        LaunchSettings {
            display: ":0".to_string(),
            interval: Duration::ZERO,
            attempts,
            log_path: dir.join("logs/gui_startup.log"),
            command: vec!["./start_gui.sh".to_string(), "--fullscreen".to_string()],
        }
    }

    #[test]
    fn test_launch_after_display_ready() {
        let temp = TempDir::new().expect("temp dir");
        let runner = ScriptedRunner::default();
        runner.push("xset", 1, "");
        runner.push("xset", 0, "Keyboard Control:");

        let s = settings(temp.path(), 20);
        let pid = launch_when_ready(&runner, &s, &Shutdown::new()).expect("launch");
        assert_eq!(pid, 4242);
        assert_eq!(runner.calls_to("xset"), 2);

        let spawned = runner.spawned.borrow();
        assert_eq!(spawned[0].program, "./start_gui.sh");
        assert_eq!(spawned[0].args, vec!["--fullscreen".to_string()]);
        assert_eq!(spawned[0].env.get("DISPLAY").map(String::as_str), Some(":0"));
        drop(spawned);

        let log = std::fs::read_to_string(&s.log_path).expect("log");
        assert!(log.contains("attempt 1/20"));
        assert!(log.contains("display :0 is available"));
        assert!(log.contains("launched ./start_gui.sh --fullscreen (pid 4242)"));
        let first = log.lines().next().expect("line");
        assert_eq!(&first[19..22], " - ");
    }

    #[test]
    fn test_timeout_after_attempts() {
        let temp = TempDir::new().expect("temp dir");
        let runner = ScriptedRunner::default();
        for _ in 0..3 {
            runner.push("xset", 1, "");
        }

        let s = settings(temp.path(), 3);
        let result = launch_when_ready(&runner, &s, &Shutdown::new());
        assert!(matches!(
            result,
            Err(Error::Command(CommandError::DisplayTimeout { attempts: 3, .. }))
        ));
        assert_eq!(runner.calls_to("xset"), 3);
        assert!(runner.spawned.borrow().is_empty());

        let log = std::fs::read_to_string(&s.log_path).expect("log");
        assert!(log.contains("ERROR: display :0 not available after 3 attempts"));
    }

    #[test]
    fn test_interrupted_wait() {
        let temp = TempDir::new().expect("temp dir");
        let runner = ScriptedRunner::default();
        runner.push("xset", 1, "");
        let shutdown = Shutdown::new();
        shutdown.trigger();

        let s = settings(temp.path(), 5);
        let result = launch_when_ready(&runner, &s, &shutdown);
        assert!(matches!(result, Err(Error::Command(CommandError::Interrupted))));
        assert_eq!(runner.calls_to("xset"), 1);
    }

    #[test]
    fn test_empty_command_rejected() {
        let temp = TempDir::new().expect("temp dir");
        let mut s = settings(temp.path(), 1);
        s.command.clear();
        let result = launch_when_ready(&ScriptedRunner::default(), &s, &Shutdown::new());
        assert!(matches!(result, Err(Error::Command(CommandError::InvalidArgument(_)))));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let temp = TempDir::new().expect("temp dir");
        let runner = ScriptedRunner::default();
        runner.push("xset", 0, "Keyboard Control:");

        let s = settings(temp.path(), 0);
        let result = launch_when_ready(&runner, &s, &Shutdown::new());
        assert!(matches!(result, Err(Error::Command(CommandError::InvalidArgument(_)))));
        assert_eq!(runner.calls_to("xset"), 0);
        assert!(runner.spawned.borrow().is_empty());
    }

    #[test]
    fn test_log_appends() {
        let temp = TempDir::new().expect("temp dir");
        let path = temp.path().join("launch.log");
        LaunchLog::open(&path).expect("open").line("one").expect("write");
        LaunchLog::open(&path).expect("open").line("two").expect("write");
        let log = std::fs::read_to_string(&path).expect("read");
        assert_eq!(log.lines().count(), 2);
    }
}
