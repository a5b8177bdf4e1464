//! CLI argument structures
//!
//! Unit-specific tag flags are not known until the unit is looked up, so
//! `run` collects everything after the unit name and hands it to
//! [`parse_job`](super::parse_job).

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Build files from files with small composable transforms
#[derive(Parser)]
#[command(name = "hearth")]
#[command(about = "hearth - compose tag-contracted transforms into validated pipelines", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace, -vvv for all)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Context configuration file (TOML); defaults to HEARTH_* environment variables
    #[arg(short = 'c', long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List available transforms and pipelines
    List,

    /// Print the structure of a unit as JSON
    Structure {
        /// Unit name
        name: String,
    },

    /// Run a unit, binding each tag with --<tag> <path>
    ///
    /// `--help` after the unit name lists that unit's tags.
    #[command(disable_help_flag = true)]
    Run {
        /// Unit name
        name: String,

        /// Tag bindings and --overwrite
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "ARGS")]
        args: Vec<String>,
    },

    /// Execute one task from stdin as a process-pool worker
    #[command(hide = true)]
    Worker,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_collects_trailing_flags() {
        let cli = Cli::try_parse_from([
            "hearth", "-v", "run", "copy", "--source", "a.txt", "--target", "b.txt", "--overwrite",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Run { name, args } => {
                assert_eq!(name, "copy");
                assert_eq!(args, vec!["--source", "a.txt", "--target", "b.txt", "--overwrite"]);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_run_leaves_help_to_the_unit() {
        let cli = Cli::try_parse_from(["hearth", "run", "copy", "--help"]).unwrap();
        match cli.command {
            Commands::Run { name, args } => {
                assert_eq!(name, "copy");
                assert_eq!(args, vec!["--help"]);
            }
            _ => panic!("expected run"),
        }
    }
}
