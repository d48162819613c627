use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "hookwatch",
    version,
    about = "Hookwatch - Watch directories and report file changes to a webhook",
    long_about = "Hookwatch watches one or more directory trees and sends a JSON POST to a \
                  configured webhook for every file that is created, modified, deleted or \
                  moved."
)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// Load the configuration, print a summary and exit
    #[arg(long)]
    pub check: bool,
}

impl Cli {
    /// Parse the process arguments, accepting the single-dash `-config` spelling
    pub fn parse_normalized() -> Self {
        Self::parse_from(normalize_legacy_args(std::env::args_os()))
    }

    /// Default log filter for the requested verbosity
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

/// Rewrite `-config <path>` and `-config=<path>` to their long-flag form
///
/// Without this, clap would read `-config` as `-c onfig`.
pub fn normalize_legacy_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|arg| match arg.to_str() {
            Some("-config") => OsString::from("--config"),
            Some(s) if s.starts_with("-config=") => OsString::from(format!("-{s}")),
            _ => arg,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::parse_from(normalize_legacy_args(args.iter().map(OsString::from)))
    }

    fn config_path(args: &[&str]) -> PathBuf {
        parse(args).config
    }

    #[test]
    fn test_default_config_path() {
        let cli = parse(&["hookwatch"]);
        assert_eq!(cli.config, PathBuf::from("config.json"));
        assert!(!cli.check);
        assert_eq!(cli.log_level(), "info");
    }

    #[test]
    fn test_long_and_short_flags() {
        let long = config_path(&["hookwatch", "--config", "a.json"]);
        let short = config_path(&["hookwatch", "-c", "b.json"]);
        assert_eq!(long, PathBuf::from("a.json"));
        assert_eq!(short, PathBuf::from("b.json"));
    }

    #[test]
    fn test_legacy_single_dash_flag() {
        let spaced = config_path(&["hookwatch", "-config", "legacy.json"]);
        let joined = config_path(&["hookwatch", "-config=eq.json"]);
        assert_eq!(spaced, PathBuf::from("legacy.json"));
        assert_eq!(joined, PathBuf::from("eq.json"));
    }

    #[test]
    fn test_normalization_leaves_other_args_alone() {
        let original = ["hookwatch", "-vv", "--check", "-c", "x.json"].map(OsString::from);
        assert_eq!(normalize_legacy_args(original.clone()), original.to_vec());
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(parse(&["hookwatch", "-v"]).log_level(), "debug");
        assert_eq!(parse(&["hookwatch", "-vvv", "--check"]).log_level(), "trace");
    }
}
