use std::env;
use std::ffi::OsString;

use anyhow::{Context as _, bail};

use crate::shell::Verbosity;

/// Tool invoked when `CMAKE_WRAPPER_TOOL` is not set. Baked in by `build.rs`.
pub const DEFAULT_TOOL: &str = env!("CMAKE_WRAPPER_DEFAULT_TOOL");

pub const TOOL_VAR: &str = "CMAKE_WRAPPER_TOOL";
pub const VIA_SHELL_VAR: &str = "CMAKE_WRAPPER_VIA_SHELL";
pub const VERBOSE_VAR: &str = "CMAKE_WRAPPER_VERBOSE";
pub const QUIET_VAR: &str = "CMAKE_WRAPPER_QUIET";
pub const COLOR_VAR: &str = "CMAKE_WRAPPER_COLOR";

/// Everything the wrapper takes from its environment. The command line
/// itself is never consulted: every token there belongs to the tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub tool: OsString,
    pub via_shell: bool,
    pub verbosity: Verbosity,
    pub color: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tool: DEFAULT_TOOL.into(),
            via_shell: false,
            verbosity: Verbosity::Normal,
            color: None,
        }
    }
}

impl Config {
    /// Reads the environment. Never fails: a setting that cannot be
    /// understood keeps its default and is reported in the returned list.
    pub fn from_env() -> (Self, Vec<anyhow::Error>) {
        Self::from_lookup(|key| env::var_os(key))
    }

    pub fn from_lookup<F>(lookup: F) -> (Self, Vec<anyhow::Error>)
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let mut config = Config::default();
        let mut warnings = Vec::new();

        if let Some(tool) = lookup(TOOL_VAR) {
            if tool.to_string_lossy().trim().is_empty() {
                warnings.push(anyhow::anyhow!(
                    "{TOOL_VAR} is set but empty, using `{DEFAULT_TOOL}`"
                ));
            } else {
                config.tool = tool;
            }
        }

        let mut flag_or_warn = |key: &str| match flag(key, lookup(key)) {
            Ok(value) => value,
            Err(e) => {
                warnings.push(e.context(format!("ignoring {key}")));
                false
            }
        };

        config.via_shell = flag_or_warn(VIA_SHELL_VAR);
        let verbose = flag_or_warn(VERBOSE_VAR);
        let quiet = flag_or_warn(QUIET_VAR);

        config.verbosity = match (verbose, quiet) {
            (true, true) => {
                warnings.push(anyhow::anyhow!(
                    "both {VERBOSE_VAR} and {QUIET_VAR} are set, ignoring both"
                ));
                Verbosity::Normal
            }
            (true, false) => Verbosity::Verbose,
            (false, true) => Verbosity::Quiet,
            (false, false) => Verbosity::Normal,
        };

        match lookup(COLOR_VAR).map(OsString::into_string) {
            Some(Ok(color)) if !color.trim().is_empty() => config.color = Some(color),
            Some(Ok(_)) | None => {}
            Some(Err(color)) => warnings.push(anyhow::anyhow!(
                "ignoring {COLOR_VAR}: {color:?} is not valid UTF-8"
            )),
        }

        (config, warnings)
    }
}

fn flag(key: &str, value: Option<OsString>) -> anyhow::Result<bool> {
    let Some(value) = value else {
        return Ok(false);
    };

    let value = value
        .into_string()
        .map_err(|x| anyhow::anyhow!("{x:?} is not valid UTF-8"))
        .with_context(|| format!("invalid value for {key}"))?;

    Ok(match value.trim().to_ascii_lowercase().as_str() {
        "" | "0" | "false" | "no" | "off" => false,
        "1" | "true" | "yes" | "on" => true,
        other => bail!("invalid value `{other}` for {key} (expected 1, 0, true, false, yes, no, on or off)"),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rstest::rstest;

    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> (Config, Vec<anyhow::Error>) {
        let vars = vars
            .iter()
            .map(|(k, v)| (k.to_string(), OsString::from(v)))
            .collect::<HashMap<_, _>>();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    fn messages(warnings: &[anyhow::Error]) -> String {
        warnings
            .iter()
            .map(|x| format!("{x:#}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let (config, warnings) = config_from(&[]);
        assert!(warnings.is_empty());
        assert_eq!(config, Config::default());
        assert_eq!(config.tool, OsString::from(DEFAULT_TOOL));
    }

    #[test]
    fn tool_override_is_taken_verbatim() {
        let (config, warnings) = config_from(&[(TOOL_VAR, "/opt/cmake 3.30/bin/cmake")]);
        assert!(warnings.is_empty());
        assert_eq!(config.tool, OsString::from("/opt/cmake 3.30/bin/cmake"));
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    fn blank_tool_override_falls_back_to_default(#[case] value: &str) {
        let (config, warnings) = config_from(&[(TOOL_VAR, value)]);
        assert_eq!(config.tool, OsString::from(DEFAULT_TOOL));
        assert_eq!(warnings.len(), 1);
        assert!(messages(&warnings).contains(TOOL_VAR));
    }

    #[rstest]
    #[case("1", true)]
    #[case("true", true)]
    #[case("YES", true)]
    #[case(" on ", true)]
    #[case("0", false)]
    #[case("false", false)]
    #[case("no", false)]
    #[case("", false)]
    fn via_shell_flag_values(#[case] value: &str, #[case] expected: bool) {
        let (config, warnings) = config_from(&[(VIA_SHELL_VAR, value)]);
        assert!(warnings.is_empty());
        assert_eq!(config.via_shell, expected);
    }

    #[test]
    fn unknown_flag_value_keeps_default_and_warns() {
        let (config, warnings) = config_from(&[(VERBOSE_VAR, "loud"), (VIA_SHELL_VAR, "perhaps")]);
        assert_eq!(config.verbosity, Verbosity::Normal);
        assert!(!config.via_shell);

        let message = messages(&warnings);
        assert_eq!(warnings.len(), 2, "{message}");
        assert!(message.contains(VERBOSE_VAR), "{message}");
        assert!(message.contains("loud"), "{message}");
        assert!(message.contains(VIA_SHELL_VAR), "{message}");
    }

    #[rstest]
    #[case(&[(VERBOSE_VAR, "1")], Verbosity::Verbose)]
    #[case(&[(QUIET_VAR, "1")], Verbosity::Quiet)]
    #[case(&[(VERBOSE_VAR, "0"), (QUIET_VAR, "0")], Verbosity::Normal)]
    fn verbosity_from_flags(#[case] vars: &[(&str, &str)], #[case] expected: Verbosity) {
        let (config, warnings) = config_from(vars);
        assert!(warnings.is_empty());
        assert_eq!(config.verbosity, expected);
    }

    #[test]
    fn verbose_and_quiet_together_cancel_out() {
        let (config, warnings) = config_from(&[(VERBOSE_VAR, "1"), (QUIET_VAR, "1")]);
        assert_eq!(config.verbosity, Verbosity::Normal);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn color_is_passed_through_unparsed() {
        let (config, _) = config_from(&[(COLOR_VAR, "never")]);
        assert_eq!(config.color.as_deref(), Some("never"));
    }

    #[test]
    fn empty_color_is_unset() {
        let (config, warnings) = config_from(&[(COLOR_VAR, "")]);
        assert!(warnings.is_empty());
        assert_eq!(config.color, None);
    }
}
