use crate::utils::error::Result;
use crate::utils::validation::{validate_file_extension, validate_path, Validate};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

const ROSTER_EXTENSIONS: [&str; 3] = ["xlsx", "csv", "tsv"];
const RESOLUTION_EXTENSIONS: [&str; 2] = ["json", "toml"];

#[derive(Debug, Clone, Parser)]
#[command(name = "roster-import")]
#[command(about = "Batch-import departments and volunteers from a roster file")]
pub struct CliConfig {
    #[arg(long, global = true, default_value = "roster-import.toml")]
    pub config: PathBuf,

    #[arg(long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit logs as JSON lines")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Parse the roster and list validation errors and conflicts
    Preview {
        #[arg(long)]
        file: PathBuf,
    },
    /// Preview, apply the resolutions file, and create everything
    Run {
        #[arg(long)]
        file: PathBuf,

        /// JSON or TOML list of conflict resolutions
        #[arg(long)]
        resolutions: Option<PathBuf>,

        /// Run against an in-memory directory instead of the API
        #[arg(long)]
        dry_run: bool,
    },
}

impl Command {
    pub fn roster_file(&self) -> &PathBuf {
        match self {
            Command::Preview { file } | Command::Run { file, .. } => file,
        }
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        let roster = self.command.roster_file().to_string_lossy();
        validate_path("file", &roster)?;
        validate_file_extension("file", &roster, &ROSTER_EXTENSIONS)?;

        if let Command::Run {
            resolutions: Some(path),
            ..
        } = &self.command
        {
            validate_file_extension("resolutions", &path.to_string_lossy(), &RESOLUTION_EXTENSIONS)?;
        }
        Ok(())
    }
}
