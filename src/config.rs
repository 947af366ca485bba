use crate::hotkey::Hotkey;
use crate::process::LaunchSpec;
use anyhow::{Context, Result};
use clap::builder::{OsStringValueParser, TypedValueParser};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[cfg(windows)]
const DEFAULT_EXEC: &str = "cmd.exe";
#[cfg(not(windows))]
const DEFAULT_EXEC: &str = "foot";

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Register the hotkey and run the controller (default if no command specified)
    Daemon,
    /// Same as pressing the hotkey: launch the program or toggle its windows
    Toggle,
    /// Query daemon status
    Status,
    /// Shutdown the daemon
    Shutdown,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "hotkey-toggle")]
#[command(about = "Launch a program or show/hide its windows with Ctrl+Alt+<hotkey>", long_about = None)]
pub struct Config {
    /// Command line of the program to run
    #[arg(long = "exec", default_value = DEFAULT_EXEC)]
    pub exec: String,

    /// Working directory of the program (defaults to the user's home directory)
    #[arg(long = "work", value_parser = OsStringValueParser::new().map(PathBuf::from))]
    pub work: Option<PathBuf>,

    /// Hotkey letter (A-Z). The program is toggled with Ctrl+Alt+<hotkey>
    #[arg(long)]
    pub hotkey: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Config {
    pub fn parse() -> Self {
        <Config as Parser>::parse()
    }

    /// Get the command, defaulting to Daemon if none specified
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Daemon)
    }

    /// Validated hotkey; the daemon refuses to start without one.
    pub fn hotkey(&self) -> Result<Hotkey> {
        Ok(self.hotkey.as_deref().unwrap_or_default().parse()?)
    }

    /// The launch spec handed to the controller, fixed for the lifetime of the daemon.
    pub fn launch_spec(&self) -> Result<LaunchSpec> {
        // An empty --work counts as unset
        let work = self.work.as_ref().filter(|dir| !dir.as_os_str().is_empty());
        let working_directory = match work {
            Some(dir) => dir.clone(),
            None => dirs::home_dir().context("Could not determine the user's home directory")?,
        };

        Ok(LaunchSpec::new(self.exec.clone(), working_directory))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["hotkey-toggle"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]);
        assert_eq!(config.exec, DEFAULT_EXEC);
        assert!(config.work.is_none());
        assert!(config.hotkey.is_none());
        assert!(!config.verbose);
        assert!(matches!(config.command(), Command::Daemon));
    }

    #[test]
    fn test_hotkey_is_required_for_daemon() {
        let config = parse(&[]);
        let err = config.hotkey().unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_hotkey_is_validated() {
        assert_eq!(parse(&["--hotkey", "t"]).hotkey().unwrap().letter(), 'T');
        assert!(parse(&["--hotkey", "7"]).hotkey().is_err());
    }

    #[test]
    fn test_launch_spec_uses_explicit_work_dir() {
        let config = parse(&["--exec", "alacritty -e htop", "--work", "/tmp"]);
        let spec = config.launch_spec().unwrap();
        assert_eq!(spec.command_line(), "alacritty -e htop");
        assert_eq!(spec.working_directory(), std::path::Path::new("/tmp"));
    }

    #[test]
    fn test_launch_spec_defaults_to_home() {
        let config = parse(&["--hotkey", "t"]);
        if let Some(home) = dirs::home_dir() {
            assert_eq!(config.launch_spec().unwrap().working_directory(), home);
        }
    }

    #[test]
    fn test_empty_work_dir_falls_back_to_home() {
        let config = parse(&["--hotkey", "t", "--work", ""]);
        if let Some(home) = dirs::home_dir() {
            assert_eq!(config.launch_spec().unwrap().working_directory(), home);
        }
    }

    #[test]
    fn test_subcommands() {
        assert!(matches!(parse(&["toggle"]).command(), Command::Toggle));
        assert!(matches!(parse(&["status"]).command(), Command::Status));
        assert!(matches!(parse(&["shutdown"]).command(), Command::Shutdown));
        assert!(matches!(
            parse(&["--hotkey", "q", "daemon"]).command(),
            Command::Daemon
        ));
    }
}
