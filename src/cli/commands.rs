use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// `reportgate` - report delivery with trial and access-window admission control.
#[derive(Parser, Debug)]
#[command(name = "reportgate")]
#[command(version)]
#[command(about = "Serve pushed client reports behind a time-boxed, view-limited trial.", long_about = None)]
pub struct Cli {
    /// Config file to use instead of ~/.reportgate/config.toml
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP gateway
    Serve {
        /// Port to listen on (use 0 for random available port)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
    },

    /// Inspect client trial state
    Client {
        #[command(subcommand)]
        client_command: ClientCommands,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        config_command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum ClientCommands {
    /// Print the stored record, trial and window state
    Show { client_id: String },
    /// Check whether the data API would currently admit the client (never renews)
    Check { client_id: String },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the config file location
    Path,
    /// Print the effective configuration with secrets masked
    Show,
}
