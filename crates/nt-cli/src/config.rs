//! Configuration loading and management.

use std::path::{Path, PathBuf};

use anyhow::bail;
use chrono::format::{Item, StrftimeItems};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use nt_core::fence::DEFAULT_LANGUAGE;
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root directory of the markdown vault.
    pub vault_path: PathBuf,

    /// Language tag of tracker code fences.
    pub fence_language: String,

    /// strftime pattern for timestamps in tables.
    pub timestamp_format: String,

    /// Field separator for CSV output.
    pub csv_delimiter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vault_path: PathBuf::from("."),
            fence_language: DEFAULT_LANGUAGE.to_string(),
            timestamp_format: "%y-%m-%d %H:%M:%S".to_string(),
            csv_delimiter: ",".to_string(),
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (NT_*)
        figment = figment.merge(Env::prefixed("NT_"));

        figment.extract()
    }

    /// Rejects settings that would only fail later, mid-command.
    pub fn validate(&self) -> anyhow::Result<()> {
        if StrftimeItems::new(&self.timestamp_format).any(|item| matches!(item, Item::Error)) {
            bail!("invalid timestamp_format {:?}", self.timestamp_format);
        }
        if self.fence_language.trim().is_empty() {
            bail!("fence_language must not be empty");
        }
        Ok(())
    }
}

/// Returns the platform-specific config directory for nt.
///
/// On Linux: `~/.config/nt`
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("nt"))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_default_config_matches_plugin_defaults() {
        let config = Config::default();
        assert_eq!(config.fence_language, "time-tracker");
        assert_eq!(config.csv_delimiter, ",");
        assert_eq!(config.vault_path, PathBuf::from("."));
    }

    #[test]
    fn test_dirs_config_path_ends_with_nt() {
        if let Some(path) = dirs_config_path() {
            assert_eq!(path.file_name().unwrap(), "nt");
        }
    }

    #[test]
    fn test_config_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"vault_path = "/notes""#).unwrap();
        writeln!(file, r#"csv_delimiter = ";""#).unwrap();
        file.flush().unwrap();

        let config = Config::load_from(Some(file.path())).unwrap();

        assert_eq!(config.vault_path, PathBuf::from("/notes"));
        assert_eq!(config.csv_delimiter, ";");
        assert_eq!(config.fence_language, "time-tracker");
    }

    #[test]
    fn test_validate_rejects_bad_timestamp_format() {
        assert!(Config::default().validate().is_ok());

        let config = Config {
            timestamp_format: "%Q %H".to_string(),
            ..Config::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("%Q %H"));

        let config = Config {
            fence_language: " ".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
