//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::analysis::TimeRange;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Labsight - dashboard analytics and lab report grouping for LIS snapshots
///
/// Reads an exported snapshot of patients, orders, reports and the test
/// catalog, and renders dashboard statistics or category-grouped lab
/// reports as Markdown or JSON.
///
/// Examples:
///   labsight --data ./export dashboard
///   labsight --data ./export dashboard --range month --format json
///   labsight --data ./export report R-1042 -o report.md
///   labsight init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Snapshot directory holding the exported JSON collections
    ///
    /// Falls back to the config file's store.data_dir, then ./data.
    #[arg(short, long, value_name = "DIR", env = "LABSIGHT_DATA", global = true)]
    pub data: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .labsight.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Write output to this file instead of stdout
    #[arg(short, long, value_name = "FILE", global = true)]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, value_name = "FORMAT", global = true)]
    pub format: Option<OutputFormat>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Compute dashboard statistics from the snapshot
    Dashboard {
        /// Revenue window (week = last 7 days, month = last 30 days)
        #[arg(short, long, value_name = "RANGE")]
        range: Option<RangeArg>,

        /// UTC offset used for calendar days, e.g. +03:00
        ///
        /// Defaults to the config file setting, then the system time zone.
        #[arg(long, value_name = "OFFSET", allow_hyphen_values = true)]
        utc_offset: Option<String>,
    },

    /// Render one lab report grouped by test category
    Report {
        /// Report id as stored in reports.json
        id: String,
    },

    /// Generate a default .labsight.toml configuration file
    InitConfig,
}

/// Output format for rendered results.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

/// Revenue window selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RangeArg {
    Week,
    Month,
}

impl From<RangeArg> for TimeRange {
    fn from(range: RangeArg) -> Self {
        match range {
            RangeArg::Week => TimeRange::Week,
            RangeArg::Month => TimeRange::Month,
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Command::Report { ref id } = self.command {
            if id.trim().is_empty() {
                return Err("Report id must not be empty".to_string());
            }
        }

        if let Some(ref data) = self.data {
            if !data.is_dir() {
                return Err(format!(
                    "Snapshot directory does not exist: {}",
                    data.display()
                ));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `verbose_by_default` comes from the config file; `--quiet` still wins.
    pub fn log_level(&self, verbose_by_default: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || verbose_by_default {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
