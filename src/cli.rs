use std::ffi::OsString;

use anyhow::Context as _;
use clap::Parser;

use crate::{
    config::{COLOR_VAR, Config, TOOL_VAR},
    invoker::{ExecMode, Invocation, Outcome},
    shell::Shell,
};

/// The wrapper owns no options: help, version and every flag-looking token
/// belong to the wrapped tool.
#[derive(Debug, Parser)]
#[command(
    name = "cmake-wrapper",
    disable_help_flag = true,
    disable_version_flag = true,
    disable_help_subcommand = true
)]
struct WrapperArgs {
    /// Arguments to be passed to the build tool
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    tool_args: Vec<OsString>,
}

/// Collects `args` (program name already stripped) as pass-through tokens.
///
/// An explicit `--` is inserted ahead of the user's tokens so that clap never
/// consumes one of them, including a leading `--` meant for the tool.
pub fn parse_args<I, S>(args: I) -> Result<Vec<OsString>, clap::Error>
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
{
    let argv = [OsString::from("cmake-wrapper"), OsString::from("--")]
        .into_iter()
        .chain(args.into_iter().map(Into::into));

    WrapperArgs::try_parse_from(argv).map(|x| x.tool_args)
}

pub fn run(args: Vec<OsString>) -> anyhow::Result<()> {
    let mut shell = Shell::new();

    // Settings are fail-open: nothing in the environment may keep the tool
    // from running.
    let (config, mut warnings) = Config::from_env();

    if let Err(e) = shell
        .set_color_choice(config.color.as_deref())
        .with_context(|| format!("ignoring {COLOR_VAR}"))
    {
        warnings.push(e);
    }
    shell.set_verbosity(config.verbosity);

    for warning in warnings {
        shell.warning(format!("{warning:#}"))?;
    }

    let tool_args = match parse_args(args) {
        Ok(args) => args,
        Err(e) => {
            shell.error(e)?;
            std::process::exit(2);
        }
    };

    let mode = if config.via_shell {
        ExecMode::Shell
    } else {
        ExecMode::Direct
    };

    shell.verbose(|shell| shell.status("Tool", config.tool.to_string_lossy()))?;

    let invocation = Invocation::new(config.tool.clone(), tool_args);
    let outcome = match invocation.run(&mut shell, mode) {
        Ok(outcome) => outcome,
        Err(e) => {
            shell.error(format!("{e:#}"))?;
            std::process::exit(1);
        }
    };

    if let Outcome::NotLaunched { error, .. } = &outcome {
        shell.error(format!(
            "could not launch `{}`: {error}",
            invocation.tool().to_string_lossy()
        ))?;
        shell.note(format!(
            "set {} to the build tool to run, or make sure it is on PATH",
            TOOL_VAR
        ))?;
    }

    shell.verbose(|shell| {
        shell.status(
            "Finished",
            format!("{} with {outcome}", invocation.tool().to_string_lossy()),
        )
    })?;

    exit_with(&outcome)
}

/// Leaves the process the way the child left: same exit code, or on Unix the
/// same terminating signal.
fn exit_with(outcome: &Outcome) -> ! {
    #[cfg(unix)]
    {
        if let Outcome::Signaled(signal) = outcome {
            // SAFETY: resets this process's own disposition for `signal` and
            // raises it; no other state is touched.
            unsafe {
                libc::signal(*signal, libc::SIG_DFL);
                libc::raise(*signal);
            }
        }
    }

    std::process::exit(outcome.exit_code())
}
