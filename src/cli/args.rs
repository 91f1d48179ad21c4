use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser, Clone, PartialEq, Eq)]
#[command(name = "physchat")]
#[command(
    about = "Terminal physics tutor that renders LaTeX math as Unicode",
    long_about = "Terminal physics tutor that renders LaTeX math as Unicode\n\nConfig file loading:\n  - --config <path> (explicit file, overrides default path discovery)\n  - Default probe path when --config is not provided:\n    1. $XDG_CONFIG_HOME/physchat/config.toml\n    2. ~/.config/physchat/config.toml"
)]
pub struct CliArgs {
    /// Load config from this file path instead of the default discovery path.
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Print redacted HTTP requests and responses to stderr.
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Show model output exactly as received, without Unicode rewriting.
    #[arg(long, global = true)]
    pub raw: bool,

    /// Disable colors and the progress placeholder.
    #[arg(long)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Debug, Subcommand, Clone, PartialEq, Eq)]
pub enum CliCommand {
    /// Start an interactive session (default).
    Chat,
    /// Rewrite LaTeX math in FILE (or stdin) and print the result.
    Normalize {
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },
}
