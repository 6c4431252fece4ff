use clap::Parser;
use std::path::PathBuf;

use super::commands::Commands;

#[derive(Parser)]
#[command(name = "autoheal", author, version, about = "Self-healing element locator", long_about = None)]
#[command(propagate_version = true)]
pub struct CliArgs {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,

    /// Enable debug mode
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = crate::cli::output::OutputFormat::Human, global = true)]
    pub output: crate::cli::output::OutputFormat,

    /// Metrics server port (0 disables)
    #[arg(long, default_value_t = 0, global = true)]
    pub metrics_port: u16,

    #[command(subcommand)]
    pub command: Commands,
}
