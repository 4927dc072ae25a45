//! External command execution.
//!
//! Every subprocess the pipeline starts is described by a [`Cmd`] and run
//! through a [`Runner`]. The host runner streams combined stdout/stderr into
//! the run's build log; tests substitute a recording runner.

use anyhow::{Context, Result};
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info};

use crate::error::Failure;

/// A blocking external command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cmd {
    program: String,
    args: Vec<OsString>,
    dir: Option<PathBuf>,
    envs: Vec<(String, String)>,
    label: Option<String>,
    error_msg: Option<String>,
}

impl Cmd {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            dir: None,
            envs: Vec::new(),
            label: None,
            error_msg: None,
        }
    }

    /// Run `line` through `shell -c`. The line itself is what gets reported.
    pub fn shell(shell: &str, line: &str) -> Self {
        let mut cmd = Self::new(shell).arg("-c").arg(line);
        cmd.label = Some(line.to_string());
        cmd
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn arg_path(self, path: &Path) -> Self {
        self.arg(path.as_os_str())
    }

    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.dir = Some(dir.to_path_buf());
        self
    }

    /// Environment override scoped to this invocation only.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Message reported instead of the raw command line on failure.
    pub fn error_msg(mut self, msg: impl Into<String>) -> Self {
        self.error_msg = Some(msg.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments as lossy strings, for logging and assertions.
    pub fn arg_strings(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub fn envs(&self) -> &[(String, String)] {
        &self.envs
    }

    fn failure(&self, status: impl Into<String>) -> anyhow::Error {
        let err = anyhow::Error::new(Failure::Execution {
            command: self.to_string(),
            status: status.into(),
        });
        match &self.error_msg {
            Some(msg) => err.context(msg.clone()),
            None => err,
        }
    }

    fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(dir) = &self.dir {
            command.current_dir(dir);
        }
        for (key, value) in &self.envs {
            command.env(key, value);
        }
        command
    }
}

impl fmt::Display for Cmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(label) = &self.label {
            return f.write_str(label);
        }
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Capability to run external commands.
///
/// Non-zero exits surface as [`Failure::Execution`]; nothing is retried.
pub trait Runner {
    /// Run to completion, sending combined output to the log sink.
    fn run(&mut self, cmd: &Cmd) -> Result<()>;

    /// Run to completion and return stdout. Stderr goes to the log sink.
    fn capture(&mut self, cmd: &Cmd) -> Result<String>;

    /// Whether `name` resolves to an executable on PATH.
    fn command_exists(&self, name: &str) -> bool;
}

/// Runs commands on the build host, appending their output to one log file.
///
/// The file is opened once per run and closed on drop.
pub struct HostRunner {
    log: File,
    log_path: PathBuf,
}

impl HostRunner {
    pub fn create(log_path: &Path) -> Result<Self> {
        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)
            .with_context(|| format!("creating build log '{}'", log_path.display()))?;
        Ok(Self {
            log,
            log_path: log_path.to_path_buf(),
        })
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    fn sink(&self) -> Result<Stdio> {
        let handle = self
            .log
            .try_clone()
            .with_context(|| format!("duplicating build log '{}'", self.log_path.display()))?;
        Ok(Stdio::from(handle))
    }

    fn header(&mut self, cmd: &Cmd) -> Result<()> {
        writeln!(self.log, "$ {cmd}")
            .with_context(|| format!("writing build log '{}'", self.log_path.display()))
    }
}

impl Runner for HostRunner {
    fn run(&mut self, cmd: &Cmd) -> Result<()> {
        info!(command = %cmd, "running");
        self.header(cmd)?;

        let status = cmd
            .to_command()
            .stdin(Stdio::null())
            .stdout(self.sink()?)
            .stderr(self.sink()?)
            .status()
            .map_err(|err| cmd.failure(format!("failed to start: {err}")))?;

        if !status.success() {
            return Err(cmd.failure(status.to_string()));
        }
        Ok(())
    }

    fn capture(&mut self, cmd: &Cmd) -> Result<String> {
        debug!(command = %cmd, "capturing output");
        self.header(cmd)?;

        let output = cmd
            .to_command()
            .stdin(Stdio::null())
            .stderr(self.sink()?)
            .output()
            .map_err(|err| cmd.failure(format!("failed to start: {err}")))?;

        if !output.status.success() {
            return Err(cmd.failure(output.status.to_string()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn command_exists(&self, name: &str) -> bool {
        which::which(name).is_ok()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::classify;
    use std::fs;
    use tempfile::TempDir;

    fn host_runner() -> (TempDir, HostRunner) {
        let temp = TempDir::new().unwrap();
        let runner = HostRunner::create(&temp.path().join("build-test.log")).unwrap();
        (temp, runner)
    }

    #[test]
    fn test_cmd_display_joins_args() {
        let cmd = Cmd::new("apt-get").args(["install", "-y"]).arg("git-core");
        assert_eq!(cmd.to_string(), "apt-get install -y git-core");
    }

    #[test]
    fn test_shell_cmd_displays_line() {
        let cmd = Cmd::shell("/bin/sh", "bundle install --deployment");
        assert_eq!(cmd.to_string(), "bundle install --deployment");
        assert_eq!(cmd.program(), "/bin/sh");
        assert_eq!(cmd.arg_strings(), vec!["-c", "bundle install --deployment"]);
    }

    #[test]
    fn test_host_runner_logs_combined_output() {
        let (_temp, mut runner) = host_runner();

        runner
            .run(&Cmd::shell("/bin/sh", "echo to-stdout; echo to-stderr >&2"))
            .unwrap();

        let log = fs::read_to_string(runner.log_path()).unwrap();
        assert!(log.contains("$ echo to-stdout"));
        assert!(log.contains("to-stdout\n"));
        assert!(log.contains("to-stderr\n"));
    }

    #[test]
    fn test_host_runner_respects_working_directory() {
        let (temp, mut runner) = host_runner();
        let work = temp.path().join("work");
        fs::create_dir_all(&work).unwrap();

        runner
            .run(&Cmd::shell("/bin/sh", "touch marker").current_dir(&work))
            .unwrap();

        assert!(work.join("marker").is_file());
    }

    #[test]
    fn test_host_runner_scoped_env() {
        let (_temp, mut runner) = host_runner();

        let probe =
            Cmd::shell("/bin/sh", "printf %s \"$MINECART_PROBE\"").env("MINECART_PROBE", "set");
        let out = runner.capture(&probe).unwrap();

        assert_eq!(out, "set");
        assert!(std::env::var("MINECART_PROBE").is_err());
    }

    #[test]
    fn test_host_runner_nonzero_exit_is_execution_failure() {
        let (_temp, mut runner) = host_runner();

        let err = runner
            .run(&Cmd::shell("/bin/sh", "exit 3").error_msg("running probe"))
            .unwrap_err();

        assert!(err.to_string().contains("running probe"));
        match classify(&err) {
            Some(Failure::Execution { command, .. }) => assert_eq!(command, "exit 3"),
            other => panic!("unexpected failure: {other:?}"),
        }
    }

    #[test]
    fn test_host_runner_missing_program() {
        let (_temp, mut runner) = host_runner();

        let err = runner
            .run(&Cmd::new("definitely_not_a_real_command_12345"))
            .unwrap_err();

        assert!(matches!(classify(&err), Some(Failure::Execution { .. })));
    }

    #[test]
    fn test_command_exists() {
        let (_temp, runner) = host_runner();
        assert!(runner.command_exists("sh"));
        assert!(!runner.command_exists("definitely_not_a_real_command_12345"));
    }
}
