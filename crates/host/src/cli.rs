//! Command-line interface handling for the extension host.
//!
//! Uses the `clap` builder API; every option overrides the matching
//! configuration file setting.

use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;

/// Command line arguments parsed from user input.
#[derive(Debug, Clone)]
pub struct CliArgs {
    /// Path to the configuration file
    pub config_path: PathBuf,
    /// Optional override for the project root
    pub root: Option<PathBuf>,
    /// Optional override for the plugins directory name
    pub plugins_dir: Option<String>,
    /// Optional override for log level
    pub log_level: Option<String>,
    /// Whether to force JSON log output
    pub json_logs: bool,
    /// Skip plugin discovery on startup
    pub no_auto_load: bool,
    /// Whether to allow native plugins built against a different ABI version (DANGEROUS)
    pub danger_allow_abi_mismatch: bool,
    /// Whether to require exact ABI version matching including patch digits
    pub strict_versioning: bool,
}

impl CliArgs {
    /// Parses the process arguments. Exits with a usage message on invalid input.
    pub fn parse() -> Self {
        Self::from_matches(&command().get_matches())
    }

    fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            config_path: matches
                .get_one::<String>("config")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("host.toml")),
            root: matches.get_one::<String>("root").map(PathBuf::from),
            plugins_dir: matches.get_one::<String>("plugins-dir").cloned(),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
            no_auto_load: matches.get_flag("no-auto-load"),
            danger_allow_abi_mismatch: matches.get_flag("danger-allow-abi-mismatch"),
            strict_versioning: matches.get_flag("strict-versioning"),
        }
    }
}

fn command() -> Command {
    Command::new("Extension Host")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Discovers, validates and hosts project plugins")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("host.toml"),
        )
        .arg(
            Arg::new("root")
                .short('r')
                .long("root")
                .value_name("DIR")
                .help("Project root containing the plugins directory"),
        )
        .arg(
            Arg::new("plugins-dir")
                .short('p')
                .long("plugins-dir")
                .value_name("NAME")
                .help("Plugins directory name below the project root"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (trace, debug, info, warn, error)"),
        )
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .help("Output logs in JSON format")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-auto-load")
                .long("no-auto-load")
                .help("Do not discover plugins on startup")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("danger-allow-abi-mismatch")
                .long("danger-allow-abi-mismatch")
                .help("Allow native plugins built against a different ABI version (MAY CAUSE CRASHES OR UNDEFINED BEHAVIOR)")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("strict-versioning")
                .long("strict-versioning")
                .help("Require exact ABI version matching including patch digits (default: only major.minor must match)")
                .action(ArgAction::SetTrue),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        let matches = command().try_get_matches_from(args).unwrap();
        CliArgs::from_matches(&matches)
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["extension-host"]);
        assert_eq!(args.config_path, PathBuf::from("host.toml"));
        assert_eq!(args.root, None);
        assert_eq!(args.plugins_dir, None);
        assert!(!args.json_logs);
        assert!(!args.no_auto_load);
    }

    #[test]
    fn test_overrides() {
        let args = parse(&[
            "extension-host",
            "--config",
            "custom.toml",
            "--root",
            "/srv/project",
            "-p",
            "addons",
            "--log-level",
            "debug",
            "--json-logs",
            "--no-auto-load",
            "--strict-versioning",
        ]);
        assert_eq!(args.config_path, PathBuf::from("custom.toml"));
        assert_eq!(args.root, Some(PathBuf::from("/srv/project")));
        assert_eq!(args.plugins_dir.as_deref(), Some("addons"));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert!(args.json_logs);
        assert!(args.no_auto_load);
        assert!(args.strict_versioning);
        assert!(!args.danger_allow_abi_mismatch);
    }

    #[test]
    fn test_unknown_flag_rejected() {
        assert!(command().try_get_matches_from(["extension-host", "--bind", "0.0.0.0:80"]).is_err());
    }
}
