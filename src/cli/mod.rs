//! CLI definitions for script2ext.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// script2ext CLI
#[derive(Parser, Debug)]
#[command(name = "script2ext", version, about = "Convert UserScripts into Chrome MV3 extensions")]
pub struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file (default: platform config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Convert a UserScript file or GreasyFork URL into a zip package
    Convert(ConvertArgs),
    /// Print the parsed metadata header as JSON
    Inspect(InspectArgs),
}

/// Conversion strategy.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Remote model writes and checks the files
    #[default]
    Agent,
    /// Static GM_* shims, no model
    Shim,
}

/// Arguments for `script2ext convert`.
#[derive(Parser, Debug)]
pub struct ConvertArgs {
    /// Path to a .user.js file, or a GreasyFork script URL
    pub input: String,

    #[arg(short, long, value_enum, default_value_t = Mode::Agent)]
    pub mode: Mode,

    /// Output zip (default: <script name>.zip)
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Show live previews of the first model turn
    #[arg(long)]
    pub stream: bool,

    /// Model id, overriding config and environment
    #[arg(long)]
    pub model: Option<String>,

    /// Maximum model turns
    #[arg(long)]
    pub max_turns: Option<usize>,
}

/// Arguments for `script2ext inspect`.
#[derive(Parser, Debug)]
pub struct InspectArgs {
    /// Path to a .user.js file, or a GreasyFork script URL
    pub input: String,
}

/// File name for a package, derived from the script name.
pub fn default_output_name(script_name: &str) -> String {
    let stem: String = script_name
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect();
    let stem = stem.trim_matches('-');
    if stem.is_empty() {
        "extension.zip".to_string()
    } else {
        format!("{stem}.zip")
    }
}
