//! CLI argument definitions for tailgrok-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// tailgrok log tailing daemon.
///
/// Follows one log file, extracts fields with a grok record mapping and
/// delivers the resulting events as JSON lines.
#[derive(Parser, Debug)]
#[command(name = "tailgrok-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to tailgrok.toml configuration file.
    #[arg(short, long, default_value = "/etc/tailgrok/tailgrok.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration file, compile the record mapping and exit.
    #[arg(long)]
    pub validate: bool,
}
