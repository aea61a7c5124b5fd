//! Command line arguments.

use std::path::PathBuf;

use clap::{Args, Parser};

/// torchat - instant messaging over Tor hidden services
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub(crate) struct Cli {
    /// Logging configuration.
    #[command(flatten)]
    pub(crate) logs: LogArgs,

    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "torchat.toml")]
    pub(crate) config: PathBuf,

    /// Override the listener host from the configuration.
    #[arg(long = "listen.host", value_name = "HOST")]
    pub(crate) listen_host: Option<String>,

    /// Override the listener port from the configuration.
    #[arg(long = "listen.port", value_name = "PORT")]
    pub(crate) listen_port: Option<u16>,

    /// Peer to connect to on startup. May be repeated.
    #[arg(long = "peer", value_name = "ADDRESS")]
    pub(crate) peers: Vec<String>,
}

/// Logging configuration.
#[derive(Debug, Default, Args)]
#[command(next_help_heading = "Logging")]
pub(crate) struct LogArgs {
    /// Silence all output.
    #[arg(short, long)]
    pub(crate) quiet: bool,

    /// Verbose mode (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub(crate) verbosity: u8,

    /// Log filter directive (e.g., "torchat_session=trace,torchat_node=debug").
    #[arg(long = "log.filter", value_name = "DIRECTIVE")]
    pub(crate) filter: Option<String>,
}
