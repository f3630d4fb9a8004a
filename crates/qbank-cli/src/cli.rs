use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "qbank",
    about = "Question bank study-state storage",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Store configuration file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show a namespace or one of its entries
    Get(GetArgs),
    /// Set one entry of a namespace
    Set(SetArgs),
    /// Replace a whole namespace
    Replace(ReplaceArgs),
    /// Remove a namespace or one of its entries
    Clear(ClearArgs),
    /// Show, set or clear the color theme
    Color(ColorArgs),
    /// List the known namespaces
    Namespaces,
    /// Start the storage server
    Serve(ServeArgs),
}

#[derive(Args)]
pub struct GetArgs {
    pub namespace: String,
    pub key: Option<String>,
}

#[derive(Args)]
pub struct SetArgs {
    pub namespace: String,
    pub key: String,
    /// JSON value
    pub value: String,
}

#[derive(Args)]
pub struct ReplaceArgs {
    pub namespace: String,
    /// JSON object
    pub value: String,
}

#[derive(Args)]
pub struct ClearArgs {
    pub namespace: String,
    pub key: Option<String>,
}

#[derive(Args)]
pub struct ColorArgs {
    pub value: Option<String>,
    #[arg(long, conflicts_with = "value")]
    pub clear: bool,
}

#[derive(Args)]
pub struct ServeArgs {
    #[arg(long)]
    pub bind: Option<String>,
    /// Settings file; in memory when omitted
    #[arg(long)]
    pub data: Option<PathBuf>,
}
