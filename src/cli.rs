use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Verbosity levels for log output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum VerbosityLevel {
    /// Only show errors
    Quiet,
    /// Show standard information
    #[default]
    Normal,
    /// Show detailed information
    Verbose,
    /// Show all available debugging information
    Debug,
}

/// KML validation service
#[derive(Parser, Debug, Clone)]
#[command(name = "kml-validator")]
#[command(about = "Validate KML documents against the OGC KML 2.2 schemas")]
#[command(version)]
pub struct Cli {
    /// Configuration file (TOML or JSON)
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Increase log output (-vv for debug)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(
        short = 'q',
        long = "quiet",
        global = true,
        conflicts_with = "verbose"
    )]
    pub quiet: bool,

    /// Schema location (URL or path); repeat to build the set in order
    #[arg(long = "schema", action = clap::ArgAction::Append, global = true)]
    pub schemas: Vec<String>,

    /// Directory used while compiling the schema set
    #[arg(long = "staging-dir", global = true)]
    pub staging_dir: Option<PathBuf>,

    /// HTTP timeout in seconds for schema downloads
    #[arg(long = "timeout", global = true)]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the HTTP validation service
    Serve {
        /// Listen address, e.g. 127.0.0.1:8080
        #[arg(short = 'b', long = "bind")]
        bind: Option<String>,
    },
    /// Validate one document and print the JSON result
    Check {
        /// Document to validate, `-` for standard input
        file: PathBuf,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn verbosity(&self) -> VerbosityLevel {
        if self.quiet {
            VerbosityLevel::Quiet
        } else {
            match self.verbose {
                0 => VerbosityLevel::Normal,
                1 => VerbosityLevel::Verbose,
                _ => VerbosityLevel::Debug,
            }
        }
    }

    /// Listen address given on the command line, if any
    pub fn bind(&self) -> Option<&str> {
        match &self.command {
            Command::Serve { bind } => bind.as_deref(),
            Command::Check { .. } => None,
        }
    }
}
