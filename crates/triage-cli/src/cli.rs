use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "triage",
    about = "Replay and audit exported triage ledger histories",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Session config (TOML); defaults apply when omitted
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show derived status for one or every entity
    Status(StatusArgs),
    /// Show an entity's audit trail
    Audit(AuditArgs),
    /// Check every stream's integrity
    Validate(ValidateArgs),
    /// Replay an entity, optionally only up to a sequence
    Replay(ReplayArgs),
    /// Run a scripted session and print its export
    Demo,
}

#[derive(Args)]
pub struct StatusArgs {
    /// Exported records (JSON array)
    pub file: PathBuf,
    #[arg(long)]
    pub entity: Option<String>,
}

#[derive(Args)]
pub struct AuditArgs {
    pub file: PathBuf,
    #[arg(long)]
    pub entity: String,
}

#[derive(Args)]
pub struct ValidateArgs {
    pub file: PathBuf,
}

#[derive(Args)]
pub struct ReplayArgs {
    pub file: PathBuf,
    #[arg(long)]
    pub entity: String,
    /// Last sequence to apply
    #[arg(long)]
    pub through: Option<u64>,
}
