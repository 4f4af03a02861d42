//! Command-Line Interface

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Radar Dashboard - live telemetry ingestion for radar sensing dashboards
#[derive(Parser, Debug)]
#[command(name = "radar-dash")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Connect to the backend and follow the live stream
    Watch {
        /// WebSocket endpoint (overrides config)
        #[arg(short, long)]
        endpoint: Option<String>,

        /// Use case id (overrides config)
        #[arg(short, long)]
        use_case: Option<String>,

        /// Stop after this many seconds (0 = until stopped)
        #[arg(short, long, default_value = "0")]
        duration: u64,

        /// Do not send the use-case handshake
        #[arg(long)]
        no_handshake: bool,

        /// Print every publication as a JSON line
        #[arg(long)]
        json: bool,
    },

    /// Feed a recorded JSON-lines file through the pipeline
    Replay {
        /// Recording with one frame per line
        #[arg(short, long)]
        input: PathBuf,

        /// Use case id (overrides config)
        #[arg(short, long)]
        use_case: Option<String>,

        /// Print every publication as a JSON line
        #[arg(long)]
        json: bool,
    },

    /// List available use cases
    UseCases {
        /// Show detailed information
        #[arg(short, long)]
        detailed: bool,
    },

    /// Initialize configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },

    /// View or modify configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "transport.endpoint", "smoothing.alpha")
        key: String,

        /// Value to set
        value: String,
    },

    /// Get a specific configuration value
    Get {
        /// Configuration key
        key: String,
    },

    /// Reset configuration to defaults
    Reset {
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parse_watch_command_with_defaults() {
        let cli = Cli::try_parse_from(["radar-dash", "watch"]).unwrap();

        match cli.command {
            Commands::Watch {
                endpoint,
                use_case,
                duration,
                no_handshake,
                json,
            } => {
                assert!(endpoint.is_none());
                assert!(use_case.is_none());
                assert_eq!(duration, 0);
                assert!(!no_handshake);
                assert!(!json);
            }
            _ => panic!("Expected Watch command"),
        }
    }

    #[test]
    fn test_cli_parse_watch_command_with_all_options() {
        let args = vec![
            "radar-dash",
            "watch",
            "--endpoint", "ws://radar.local:8000/ws",
            "--use-case", "fall_detection",
            "--duration", "30",
            "--no-handshake",
            "--json",
        ];
        let cli = Cli::try_parse_from(args).unwrap();

        match cli.command {
            Commands::Watch {
                endpoint,
                use_case,
                duration,
                no_handshake,
                json,
            } => {
                assert_eq!(endpoint.as_deref(), Some("ws://radar.local:8000/ws"));
                assert_eq!(use_case.as_deref(), Some("fall_detection"));
                assert_eq!(duration, 30);
                assert!(no_handshake);
                assert!(json);
            }
            _ => panic!("Expected Watch command"),
        }
    }

    #[test]
    fn test_cli_parse_replay_command() {
        let args = vec![
            "radar-dash",
            "replay",
            "--input", "/path/to/session.jsonl",
            "-u", "occupancy",
        ];
        let cli = Cli::try_parse_from(args).unwrap();

        match cli.command {
            Commands::Replay { input, use_case, json } => {
                assert_eq!(input, PathBuf::from("/path/to/session.jsonl"));
                assert_eq!(use_case.as_deref(), Some("occupancy"));
                assert!(!json);
            }
            _ => panic!("Expected Replay command"),
        }
    }

    #[test]
    fn test_cli_replay_requires_input() {
        assert!(Cli::try_parse_from(["radar-dash", "replay"]).is_err());
    }

    #[test]
    fn test_cli_parse_use_cases_command() {
        let cli = Cli::try_parse_from(["radar-dash", "use-cases", "--detailed"]).unwrap();

        match cli.command {
            Commands::UseCases { detailed } => assert!(detailed),
            _ => panic!("Expected UseCases command"),
        }
    }

    #[test]
    fn test_cli_parse_init_command() {
        let cli = Cli::try_parse_from(["radar-dash", "init", "--force"]).unwrap();

        match cli.command {
            Commands::Init { force } => assert!(force),
            _ => panic!("Expected Init command"),
        }
    }

    #[test]
    fn test_cli_parse_config_set() {
        let args = vec!["radar-dash", "config", "set", "smoothing.alpha", "0.1"];
        let cli = Cli::try_parse_from(args).unwrap();

        match cli.command {
            Commands::Config {
                action: ConfigAction::Set { key, value },
            } => {
                assert_eq!(key, "smoothing.alpha");
                assert_eq!(value, "0.1");
            }
            _ => panic!("Expected Config Set command"),
        }
    }

    #[test]
    fn test_cli_parse_config_get_and_reset() {
        let cli = Cli::try_parse_from(["radar-dash", "config", "get", "transport.endpoint"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config {
                action: ConfigAction::Get { .. }
            }
        ));

        let cli = Cli::try_parse_from(["radar-dash", "config", "reset", "-f"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config {
                action: ConfigAction::Reset { force: true }
            }
        ));
    }

    #[test]
    fn test_cli_global_flags() {
        let args = vec!["radar-dash", "watch", "-v", "-c", "/tmp/radar.toml"];
        let cli = Cli::try_parse_from(args).unwrap();

        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/radar.toml")));
    }

    #[test]
    fn test_cli_unknown_command_fails() {
        assert!(Cli::try_parse_from(["radar-dash", "record"]).is_err());
    }

    #[test]
    fn test_cli_verify_structure() {
        Cli::command().debug_assert();
    }
}
