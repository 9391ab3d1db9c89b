use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::LevelFilter;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Verbosity of the command output.
    #[arg(long)]
    pub verbose: Option<LevelFilter>,

    /// Continue with the remaining volumes after a failed one.
    #[arg(long)]
    pub keep_going: bool,

    /// Composition document declaring repositories and projects.
    #[arg(env = "EASYBACKUP_CONFIG")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub action: Option<Action>,
}

#[derive(Subcommand, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Clean up, back up and synchronize every volume. (Default)
    #[default]
    Run,
    /// List the backups of every volume.
    List {
        /// Print the backups as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Validate the composition without touching any backup.
    Check,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_is_the_default() {
        let cli = Cli::try_parse_from(["easybackup", "backup.toml"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("backup.toml"));
        assert!(!cli.keep_going);
        assert_eq!(cli.action.unwrap_or_default(), Action::Run);
    }

    #[test]
    fn actions() {
        let cli =
            Cli::try_parse_from(["easybackup", "--verbose", "debug", "b.toml", "list", "--json"])
                .unwrap();
        assert_eq!(cli.verbose, Some(LevelFilter::Debug));
        assert_eq!(cli.action, Some(Action::List { json: true }));

        let cli = Cli::try_parse_from(["easybackup", "--keep-going", "b.toml", "run"]).unwrap();
        assert!(cli.keep_going);
        assert_eq!(cli.action, Some(Action::Run));
    }
}
