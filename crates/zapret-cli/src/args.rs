//! Command-line argument parsing

use crate::commands::Command;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Zapret Manager - presets, hosts and process control for winws
///
/// Manages the preset files fed to `winws.exe`, proxies services through
/// the hosts file, and supervises the bypass process.
#[derive(Parser, Debug)]
#[command(name = "zapret")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,

    /// Settings file (default: per-user config directory)
    #[arg(short = 's', long, value_name = "FILE", env = "ZAPRET_SETTINGS", global = true)]
    pub settings: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output format for console logs
    #[arg(long, value_enum, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Do not write log files
    #[arg(long, global = true)]
    pub no_log_file: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Do not print the banner
    #[arg(long, global = true)]
    pub no_banner: bool,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable text
    Text,
    /// JSON format
    Json,
    /// Compact format
    Compact,
}
