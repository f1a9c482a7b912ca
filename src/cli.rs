//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Detect magnet links, deduplicate them against history, and relay new
/// ones to a transfer queue.
#[derive(Parser, Debug)]
#[command(name = "magnet-relay")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Database file path (defaults to .magnet-relay/relay.db)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan text for magnet links and submit new ones
    Submit {
        /// Magnet links, URLs, or free text (reads stdin when omitted)
        inputs: Vec<String>,

        /// Page host the links came from, recorded with the submission
        #[arg(long)]
        origin: Option<String>,
    },

    /// Watch stdin for page text and auto-submit from allow-listed origins
    Watch {
        /// Page host applied to all detected batches
        #[arg(long)]
        origin: Option<String>,
    },

    /// Manage the domain allow-list
    Domains {
        #[command(subcommand)]
        command: DomainsCommand,
    },

    /// Inspect or clear the persistent log buffer
    Logs {
        #[command(subcommand)]
        command: LogsCommand,
    },

    /// Inspect or prune the submission history
    History {
        #[command(subcommand)]
        command: HistoryCommand,
    },

    /// Manage credentials and retention settings
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum DomainsCommand {
    /// Print the current allow-list
    List,
    /// Replace the allow-list (accepts comma/space/newline separated input)
    Set {
        #[arg(required = true)]
        domains: Vec<String>,
    },
    /// Add one domain to the allow-list
    Add { domain: String },
    /// Restore the built-in seed list
    Reset,
}

#[derive(Subcommand, Debug)]
pub enum LogsCommand {
    /// Print recent log records, newest first
    Show {
        /// Filter by level (error, warn, info, debug)
        #[arg(long)]
        level: Option<String>,

        /// Filter by component name
        #[arg(long)]
        component: Option<String>,

        /// Maximum records to print
        #[arg(long, default_value_t = 50, value_parser = clap::value_parser!(u32).range(1..=500))]
        limit: u32,
    },
    /// Delete all log records
    Clear,
}

#[derive(Subcommand, Debug)]
pub enum HistoryCommand {
    /// Print recent submissions, newest first
    List {
        #[arg(long, default_value_t = 50, value_parser = clap::value_parser!(u32).range(1..=1000))]
        limit: u32,
    },
    /// Delete the entire submission history
    Clear,
    /// Delete records older than the retention window
    Sweep,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Store the API token
    SetToken { token: String },
    /// Set the history retention window in days (1-30)
    SetRetention {
        #[arg(value_parser = clap::value_parser!(u32).range(1..=30))]
        days: u32,
    },
    /// Print the effective configuration
    Show,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_submit_with_inputs() {
        let args = Args::try_parse_from(["magnet-relay", "submit", "magnet:?xt=x"]).unwrap();
        match args.command {
            Command::Submit { inputs, origin } => {
                assert_eq!(inputs, ["magnet:?xt=x"]);
                assert!(origin.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_submit_with_origin() {
        let args =
            Args::try_parse_from(["magnet-relay", "submit", "--origin", "nyaa.si", "text"])
                .unwrap();
        match args.command {
            Command::Submit { origin, .. } => assert_eq!(origin.as_deref(), Some("nyaa.si")),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["magnet-relay", "-vv", "watch"]).unwrap();
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_cli_quiet_flag_sets_quiet() {
        let args = Args::try_parse_from(["magnet-relay", "-q", "logs", "clear"]).unwrap();
        assert!(args.quiet);
    }

    #[test]
    fn test_cli_db_flag_is_global() {
        let args =
            Args::try_parse_from(["magnet-relay", "domains", "list", "--db", "/tmp/x.db"])
                .unwrap();
        assert_eq!(args.db.unwrap().to_str().unwrap(), "/tmp/x.db");
    }

    #[test]
    fn test_cli_domains_set_requires_values() {
        let result = Args::try_parse_from(["magnet-relay", "domains", "set"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_logs_show_limit_range() {
        let args =
            Args::try_parse_from(["magnet-relay", "logs", "show", "--limit", "500"]).unwrap();
        match args.command {
            Command::Logs {
                command: LogsCommand::Show { limit, .. },
            } => assert_eq!(limit, 500),
            other => panic!("unexpected command: {other:?}"),
        }

        let result = Args::try_parse_from(["magnet-relay", "logs", "show", "--limit", "501"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_config_set_retention_range() {
        let args =
            Args::try_parse_from(["magnet-relay", "config", "set-retention", "30"]).unwrap();
        match args.command {
            Command::Config {
                command: ConfigCommand::SetRetention { days },
            } => assert_eq!(days, 30),
            other => panic!("unexpected command: {other:?}"),
        }

        let result = Args::try_parse_from(["magnet-relay", "config", "set-retention", "31"]);
        assert!(result.is_err());
        let result = Args::try_parse_from(["magnet-relay", "config", "set-retention", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_missing_subcommand_rejected() {
        let result = Args::try_parse_from(["magnet-relay"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let result = Args::try_parse_from(["magnet-relay", "--help"]);
        assert_eq!(
            result.unwrap_err().kind(),
            clap::error::ErrorKind::DisplayHelp
        );
    }
}
