//! Command line parsing for the `teamwatch` binary.

use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;

/// Which screen to mount.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum View {
    #[default]
    Overview,
    Tasks,
    Messages,
    Team(String),
    Flow(String),
}

impl FromStr for View {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (kind, team) = match value.split_once(':') {
            Some((kind, team)) => (kind, Some(team.trim())),
            None => (value, None),
        };
        match (kind.trim().to_ascii_lowercase().as_str(), team) {
            ("overview", None) => Ok(View::Overview),
            ("tasks", None) => Ok(View::Tasks),
            ("messages", None) => Ok(View::Messages),
            ("team", Some(team)) if !team.is_empty() => Ok(View::Team(team.to_string())),
            ("flow", Some(team)) if !team.is_empty() => Ok(View::Flow(team.to_string())),
            _ => Err(format!(
                "unknown view '{}' (expected overview, tasks, messages, team:<name> or flow:<name>)",
                value
            )),
        }
    }
}

/// Live monitoring client for multi-agent teams.
#[derive(Debug, Clone, Default, PartialEq, Eq, Parser)]
#[command(name = "teamwatch")]
#[command(version)]
pub struct CliOptions {
    /// Path to the TOML config file.
    /// Environment variable: TEAMWATCH_CONFIG
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Screen to mount: overview, tasks, messages, team:<name>, flow:<name>
    #[arg(long, default_value = "overview")]
    pub view: View,

    /// Trigger a server-side sync once the screen is mounted, then refresh it.
    #[arg(long)]
    pub sync: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = CliOptions::try_parse_from(["teamwatch"]).unwrap();
        assert_eq!(options, CliOptions::default());
        assert_eq!(options.view, View::Overview);
    }

    #[test]
    fn test_all_flags() {
        let options = CliOptions::try_parse_from([
            "teamwatch",
            "--config",
            "tw.toml",
            "--view",
            "team:alpha",
            "--sync",
        ])
        .unwrap();
        assert_eq!(options.config, Some(PathBuf::from("tw.toml")));
        assert_eq!(options.view, View::Team("alpha".to_string()));
        assert!(options.sync);
    }

    #[test]
    fn test_views() {
        assert_eq!("Tasks".parse::<View>().unwrap(), View::Tasks);
        assert_eq!("flow:beta".parse::<View>().unwrap(), View::Flow("beta".to_string()));
        assert!("team:".parse::<View>().is_err());
        assert!("overview:alpha".parse::<View>().is_err());
        assert!("graphs".parse::<View>().is_err());
    }

    #[test]
    fn test_errors() {
        assert!(CliOptions::try_parse_from(["teamwatch", "--config"]).is_err());
        assert!(CliOptions::try_parse_from(["teamwatch", "--verbose"]).is_err());
        assert!(CliOptions::try_parse_from(["teamwatch", "--view", "graphs"]).is_err());
    }
}
