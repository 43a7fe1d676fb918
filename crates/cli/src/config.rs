// CLI configuration
// Loads tasktide.toml (or --config FILE) and parses user-supplied times

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use tasktide_core::{SchedulerConfig, Time};

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "tasktide.toml";

const LOCAL_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Where task records live
    pub data_dir: PathBuf,

    /// Scheduler weights and policy
    pub scheduler: SchedulerConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".tasktide"),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl AppConfig {
    /// Parse a TOML document.
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Invalid configuration file")
    }

    /// Load `explicit` if given, else `tasktide.toml` if present, else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !fallback.exists() {
                    return Ok(Self::default());
                }
                fallback
            }
        };

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let config = Self::from_toml(&contents)?;

        // Surface bad weights at startup rather than on the first command.
        config
            .scheduler
            .weights()
            .with_context(|| format!("Invalid [scheduler] section in {}", path.display()))?;
        Ok(config)
    }
}

/// Parse RFC 3339 or `YYYY-MM-DD HH:MM:SS` (taken as UTC).
pub fn parse_time(s: &str) -> Result<Time> {
    let s = s.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Ok(t.with_timezone(&Utc));
    }
    if let Ok(t) = NaiveDateTime::parse_from_str(s, LOCAL_TIME_FORMAT) {
        return Ok(t.and_utc());
    }
    bail!("Could not parse time '{}': expected RFC 3339 or '{}'", s, LOCAL_TIME_FORMAT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tasktide_core::PolicyKind;

    #[test]
    fn test_parse_time_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 11, 18, 10, 0, 0).unwrap();
        assert_eq!(parse_time("2024-11-18 10:00:00").unwrap(), expected);
        assert_eq!(parse_time("2024-11-18T10:00:00Z").unwrap(), expected);
        assert_eq!(parse_time("2024-11-18T12:00:00+02:00").unwrap(), expected);
        assert!(parse_time("next tuesday").is_err());
    }

    #[test]
    fn test_config_from_toml() {
        let config = AppConfig::from_toml(
            r#"
            data_dir = "/tmp/schedule"

            [scheduler]
            priority_weight = 0.6
            urgency_weight = 0.3
            duration_weight = 0.1
            policy = "nearest_deadline"
            "#,
        )
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/schedule"));
        assert_eq!(config.scheduler.policy, PolicyKind::NearestDeadline);
        assert!(config.scheduler.weights().is_ok());
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        assert_eq!(AppConfig::from_toml("").unwrap(), AppConfig::default());
    }

    #[test]
    fn test_load_rejects_bad_weights() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[scheduler]\npriority_weight = 0.9\n").unwrap();

        assert!(AppConfig::load(Some(&path)).is_err());
    }
}
