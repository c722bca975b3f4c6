use std::ffi::{OsStr, OsString};
use std::fmt;
use std::env;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use anyhow::Context as _;

use crate::shell::Shell;

/// Exit code a POSIX shell reports when a command cannot be found.
pub const NOT_FOUND_CODE: i32 = 127;
/// Exit code a POSIX shell reports when a command is found but cannot run.
pub const NOT_EXECUTABLE_CODE: i32 = 126;

/// How the tool is started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecMode {
    /// Spawn the tool with an argument vector; nothing is re-parsed.
    #[default]
    Direct,
    /// Hand the rendered command line to the system shell.
    Shell,
}

/// What became of the child process.
#[derive(Debug)]
pub enum Outcome {
    Exited(i32),
    /// Terminated by a signal (Unix only).
    Signaled(i32),
    NotLaunched { code: i32, error: io::Error },
}

impl Outcome {
    /// The code the wrapper should exit with. Signals map to `128 + n`.
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Exited(code) => *code,
            Outcome::Signaled(signal) => 128 + signal,
            Outcome::NotLaunched { code, .. } => *code,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Exited(code) => write!(f, "exit code {code}"),
            Outcome::Signaled(signal) => write!(f, "signal {signal}"),
            Outcome::NotLaunched { error, .. } => write!(f, "launch failure ({error})"),
        }
    }
}

/// A single run of the wrapped tool with its pass-through arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    tool: OsString,
    args: Vec<OsString>,
}

impl Invocation {
    pub fn new<I, S>(tool: impl Into<OsString>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            tool: tool.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn tool(&self) -> &OsStr {
        &self.tool
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    /// The tool and its arguments, each quoted for a POSIX shell and joined
    /// with single spaces. Re-splitting the result yields the original words.
    ///
    /// Words that are not valid UTF-8 are rendered lossily; see
    /// [`Invocation::shell_line`] for the strict form.
    pub fn command_line(&self) -> anyhow::Result<String> {
        let words = self.words().map(OsStr::to_string_lossy).collect::<Vec<_>>();
        join(words.iter().map(|x| &**x))
    }

    /// Like [`Invocation::command_line`], but refuses words that would not
    /// survive the trip through a shell unchanged.
    pub fn shell_line(&self) -> anyhow::Result<String> {
        let words = self
            .words()
            .map(|x| {
                x.to_str()
                    .with_context(|| format!("{x:?} is not valid UTF-8 and cannot be passed through a shell"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        join(words)
    }

    /// Builds the process to spawn. Standard streams are inherited.
    pub fn command(&self, mode: ExecMode) -> anyhow::Result<Command> {
        Ok(match mode {
            ExecMode::Direct => {
                let mut cmd = Command::new(&self.tool);
                cmd.args(&self.args);
                cmd
            }
            ExecMode::Shell => system_shell(self.shell_line()?),
        })
    }

    /// Prints the command line to stdout, runs the tool and waits for it.
    pub fn run(&self, shell: &mut Shell, mode: ExecMode) -> anyhow::Result<Outcome> {
        let line = match mode {
            ExecMode::Direct => self.command_line()?,
            ExecMode::Shell => self.shell_line()?,
        };
        let mut cmd = self.command(mode)?;

        shell.out_status("Running", &line)?;
        shell.verbose(|shell| shell.status("Mode", format!("{mode:?}")))?;

        let spawned = match cmd.spawn() {
            Err(error) if mode == ExecMode::Direct && is_exec_format_error(&error) => {
                shell.verbose(|shell| {
                    shell.status("Retrying", "through `sh`: not a binary and no `#!` line")
                })?;
                script_command(&self.tool, &self.args).spawn()
            }
            other => other,
        };

        let mut child = match spawned {
            Ok(child) => child,
            Err(error) => {
                return Ok(Outcome::NotLaunched {
                    code: launch_failure_code(&error),
                    error,
                });
            }
        };

        let status = child
            .wait()
            .with_context(|| format!("failed to wait for {:?} to complete", self.tool))?;

        Ok(outcome(status))
    }

    fn words(&self) -> impl Iterator<Item = &OsStr> {
        std::iter::once(self.tool.as_os_str()).chain(self.args.iter().map(OsString::as_os_str))
    }
}

fn join<'a>(words: impl IntoIterator<Item = &'a str>) -> anyhow::Result<String> {
    shlex::try_join(words).context("command line contains a nul byte")
}

#[cfg(unix)]
fn system_shell(line: String) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(line);
    cmd
}

#[cfg(windows)]
fn system_shell(line: String) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(line);
    cmd
}

/// An executable file the kernel does not know how to run. Shells (and
/// `execvp`) hand such a file to `sh` as a script.
fn is_exec_format_error(error: &io::Error) -> bool {
    #[cfg(unix)]
    {
        error.raw_os_error() == Some(libc::ENOEXEC)
    }
    #[cfg(not(unix))]
    {
        let _ = error;
        false
    }
}

/// `sh <tool> <args...>`, with a bare tool name resolved through `PATH` the
/// way the failed spawn resolved it.
fn script_command(tool: &OsStr, args: &[OsString]) -> Command {
    let script = if Path::new(tool).components().count() > 1 {
        PathBuf::from(tool)
    } else {
        let path = env::var_os("PATH").unwrap_or_default();
        env::split_paths(&path)
            .map(|dir| dir.join(tool))
            .find(|path| path.is_file())
            .unwrap_or_else(|| PathBuf::from(tool))
    };

    let mut cmd = Command::new("sh");
    cmd.arg(script).args(args);
    cmd
}

/// Maps a failed spawn onto the code a shell would have reported.
pub fn launch_failure_code(error: &io::Error) -> i32 {
    if is_exec_format_error(error) {
        return NOT_EXECUTABLE_CODE;
    }

    match error.kind() {
        io::ErrorKind::NotFound => NOT_FOUND_CODE,
        io::ErrorKind::PermissionDenied => NOT_EXECUTABLE_CODE,
        _ => 1,
    }
}

fn outcome(status: ExitStatus) -> Outcome {
    if let Some(code) = status.code() {
        return Outcome::Exited(code);
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt as _;

        if let Some(signal) = status.signal() {
            return Outcome::Signaled(signal);
        }
    }

    Outcome::Exited(1)
}
