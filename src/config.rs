//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.labsight.toml` files.

use crate::analysis::TimeRange;
use crate::cli::{Args, Command, OutputFormat};
use anyhow::{anyhow, Context, Result};
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the config file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".labsight.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Snapshot store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Dashboard settings.
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Default output format.
    #[serde(default)]
    pub format: OutputFormat,
}

/// Where the record snapshot lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding the exported collections.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

/// Dashboard settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Default revenue window.
    #[serde(default)]
    pub range: TimeRange,

    /// Fixed UTC offset for calendar days, e.g. "+03:00".
    /// The system's local zone is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utc_offset: Option<String>,
}

impl DashboardConfig {
    /// The configured offset, if one is set.
    pub fn offset(&self) -> Result<Option<FixedOffset>> {
        self.utc_offset.as_deref().map(parse_utc_offset).transpose()
    }
}

/// Parse an offset such as `+05:30`, `-0400` or `Z`.
pub fn parse_utc_offset(text: &str) -> Result<FixedOffset> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("z") || text.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0).ok_or_else(|| anyhow!("invalid UTC offset"));
    }

    let (sign, rest) = match text.chars().next() {
        Some('+') => (1, &text[1..]),
        Some('-') => (-1, &text[1..]),
        _ => return Err(anyhow!("UTC offset must start with '+' or '-': {}", text)),
    };

    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(anyhow!("UTC offset must look like +HH:MM: {}", text));
    }

    let hours: i32 = digits[..2].parse()?;
    let minutes: i32 = digits[2..].parse()?;
    if minutes >= 60 {
        return Err(anyhow!("UTC offset minutes must be below 60: {}", text));
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
        .ok_or_else(|| anyhow!("UTC offset out of range: {}", text))
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config
            .dashboard
            .offset()
            .with_context(|| format!("Invalid utc_offset in {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings when given.
    pub fn merge_with_args(&mut self, args: &Args) {
        if let Some(ref data) = args.data {
            self.store.data_dir = data.clone();
        }

        if let Some(format) = args.format {
            self.general.format = format;
        }

        if args.verbose {
            self.general.verbose = true;
        }

        if let Command::Dashboard {
            range, utc_offset, ..
        } = &args.command
        {
            if let Some(range) = range {
                self.dashboard.range = (*range).into();
            }
            if let Some(offset) = utc_offset {
                self.dashboard.utc_offset = Some(offset.clone());
            }
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.store.data_dir, PathBuf::from("data"));
        assert_eq!(config.dashboard.range, TimeRange::Week);
        assert_eq!(config.general.format, OutputFormat::Markdown);
        assert!(config.dashboard.offset().unwrap().is_none());
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
verbose = true
format = "json"

[store]
data_dir = "/srv/lis/export"

[dashboard]
range = "month"
utc_offset = "+03:00"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert!(config.general.verbose);
        assert_eq!(config.general.format, OutputFormat::Json);
        assert_eq!(config.store.data_dir, PathBuf::from("/srv/lis/export"));
        assert_eq!(config.dashboard.range, TimeRange::Month);
        assert_eq!(
            config.dashboard.offset().unwrap(),
            FixedOffset::east_opt(3 * 3600)
        );
    }

    #[test]
    fn test_parse_utc_offset() {
        assert_eq!(
            parse_utc_offset("+05:30").unwrap(),
            FixedOffset::east_opt(5 * 3600 + 30 * 60).unwrap()
        );
        assert_eq!(
            parse_utc_offset("-0400").unwrap(),
            FixedOffset::west_opt(4 * 3600).unwrap()
        );
        assert_eq!(parse_utc_offset("Z").unwrap(), FixedOffset::east_opt(0).unwrap());
        assert!(parse_utc_offset("05:30").is_err());
        assert!(parse_utc_offset("+5:3").is_err());
        assert!(parse_utc_offset("+99:00").is_err());
        assert!(parse_utc_offset("+00:99").is_err());
        assert!(parse_utc_offset("-0560").is_err());
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[store]"));
        assert!(toml_str.contains("[dashboard]"));
    }
}
