//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for Obscura using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// Obscura - record anonymization driven by legal reasons
#[derive(Parser, Debug)]
#[command(name = "obscura")]
#[command(version, about, long_about = None)]
#[command(author = "Obscura Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "obscura.toml", env = "OBSCURA_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "OBSCURA_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Anonymize the configured dataset with the registered anonymizers
    Anonymize(commands::anonymize::AnonymizeArgs),

    /// Validate configuration file and anonymizer definitions
    ValidateConfig(commands::validate::ValidateArgs),
}
