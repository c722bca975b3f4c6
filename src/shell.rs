use std::fmt::Display;
use std::io::{self, Write};

use anyhow::bail;
use is_terminal::IsTerminal;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// How much the wrapper itself says on stderr. The command line on stdout
/// is printed at every level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    Verbose,
    #[default]
    Normal,
    /// Errors only.
    Quiet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorMode {
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn parse(value: &str) -> anyhow::Result<Self> {
        Ok(match value {
            "auto" => Self::Auto,
            "always" => Self::Always,
            "never" => Self::Never,
            other => bail!("color must be auto, always, or never, but found `{other}`"),
        })
    }

    fn choice(self, is_terminal: bool) -> ColorChoice {
        match self {
            Self::Always => ColorChoice::Always,
            Self::Never => ColorChoice::Never,
            Self::Auto if is_terminal => ColorChoice::Auto,
            Self::Auto => ColorChoice::Never,
        }
    }
}

/// Cargo-flavoured terminal output: right-aligned status headers on the
/// left, prefixed `error:`/`warning:`/`note:` diagnostics on stderr.
pub struct Shell {
    out: StandardStream,
    err: StandardStream,
    verbosity: Verbosity,
    color: ColorMode,
}

impl Default for Shell {
    fn default() -> Self {
        Self::new()
    }
}

impl Shell {
    pub fn new() -> Self {
        let color = ColorMode::default();
        Self {
            out: stdout_stream(color),
            err: stderr_stream(color),
            verbosity: Verbosity::default(),
            color,
        }
    }

    pub fn set_verbosity(&mut self, verbosity: Verbosity) {
        self.verbosity = verbosity;
    }

    #[cfg(test)]
    fn color_mode(&self) -> ColorMode {
        self.color
    }

    /// Accepts `auto`, `always` or `never`; `None` leaves the current mode.
    pub fn set_color_choice(&mut self, color: Option<&str>) -> anyhow::Result<()> {
        let Some(color) = color else {
            return Ok(());
        };

        self.color = ColorMode::parse(color)?;
        self.out = stdout_stream(self.color);
        self.err = stderr_stream(self.color);
        Ok(())
    }

    /// Runs `callback` only when verbose output was requested.
    pub fn verbose<F>(&mut self, mut callback: F) -> anyhow::Result<()>
    where
        F: FnMut(&mut Shell) -> anyhow::Result<()>,
    {
        match self.verbosity {
            Verbosity::Verbose => callback(self),
            Verbosity::Normal | Verbosity::Quiet => Ok(()),
        }
    }

    fn shows_diagnostics(&self) -> bool {
        self.verbosity != Verbosity::Quiet
    }

    /// Status line on stderr, e.g. `    Finished cmake with exit code 0`.
    pub fn status(&mut self, header: impl Display, message: impl Display) -> anyhow::Result<()> {
        self.status_with_color(header, message, Color::Green)
    }

    fn status_with_color(
        &mut self,
        header: impl Display,
        message: impl Display,
        color: Color,
    ) -> anyhow::Result<()> {
        print_status(&mut self.err, &header, &message, color)
    }

    /// Status line on stdout. Flushed before returning so that it lands
    /// ahead of anything a child process writes to the shared stream.
    pub fn out_status(&mut self, header: impl Display, message: impl Display) -> anyhow::Result<()> {
        print_status(&mut self.out, &header, &message, Color::Green)
    }

    pub fn error(&mut self, message: impl Display) -> anyhow::Result<()> {
        print_prefixed(&mut self.err, "error", &message, Color::Red)
    }

    pub fn warning(&mut self, message: impl Display) -> anyhow::Result<()> {
        if !self.shows_diagnostics() {
            return Ok(());
        }
        print_prefixed(&mut self.err, "warning", &message, Color::Yellow)
    }

    pub fn note(&mut self, message: impl Display) -> anyhow::Result<()> {
        if !self.shows_diagnostics() {
            return Ok(());
        }
        print_prefixed(&mut self.err, "note", &message, Color::Cyan)
    }
}

fn stdout_stream(color: ColorMode) -> StandardStream {
    StandardStream::stdout(color.choice(io::stdout().is_terminal()))
}

fn stderr_stream(color: ColorMode) -> StandardStream {
    StandardStream::stderr(color.choice(io::stderr().is_terminal()))
}

fn print_status(
    stream: &mut StandardStream,
    header: &dyn Display,
    message: &dyn Display,
    color: Color,
) -> anyhow::Result<()> {
    stream.set_color(ColorSpec::new().set_bold(true).set_fg(Some(color)))?;
    write!(stream, "{header:>12}")?;
    stream.reset()?;
    writeln!(stream, " {message}")?;
    stream.flush()?;
    Ok(())
}

fn print_prefixed(
    stream: &mut StandardStream,
    prefix: &str,
    message: &dyn Display,
    color: Color,
) -> anyhow::Result<()> {
    stream.set_color(ColorSpec::new().set_bold(true).set_fg(Some(color)))?;
    write!(stream, "{prefix}")?;
    stream.reset()?;
    stream.set_color(ColorSpec::new().set_bold(true))?;
    write!(stream, ":")?;
    stream.reset()?;
    writeln!(stream, " {message}")?;
    stream.flush()?;
    Ok(())
}
