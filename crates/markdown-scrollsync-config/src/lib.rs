use markdown_scrollsync_engine::{FocusBand, SyncPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {config_path}: {source}")]
    ConfigReadError {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {config_path}: {source}")]
    ConfigParseError {
        config_path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid [visibility] settings in config file at {config_path}: {reason}")]
    InvalidVisibility { config_path: PathBuf, reason: String },
}

/// Rate limiting, in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub min_sync_interval_ms: u64,
    pub scroll_debounce_ms: u64,
    pub settle_delay_ms: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        let policy = SyncPolicy::default();
        Self {
            min_sync_interval_ms: policy.min_sync_interval.as_millis() as u64,
            scroll_debounce_ms: policy.scroll_debounce.as_millis() as u64,
            settle_delay_ms: policy.settle_delay.as_millis() as u64,
        }
    }
}

/// Focus band tuning; band edges are fractions of the viewport height.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisibilitySettings {
    pub threshold: f32,
    pub band_start: f32,
    pub band_end: f32,
    pub fallback_band_end: f32,
}

impl VisibilitySettings {
    /// Every value is a fraction of the viewport and the band must not be inverted.
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("threshold", self.threshold),
            ("band_start", self.band_start),
            ("band_end", self.band_end),
            ("fallback_band_end", self.fallback_band_end),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("{name} = {value} is outside 0.0..=1.0"));
            }
        }
        if self.band_start > self.band_end {
            return Err(format!(
                "band_start = {} is past band_end = {}",
                self.band_start, self.band_end
            ));
        }
        Ok(())
    }
}

impl Default for VisibilitySettings {
    fn default() -> Self {
        let band = FocusBand::default();
        Self {
            threshold: band.threshold,
            band_start: band.band_start,
            band_end: band.band_end,
            fallback_band_end: band.fallback_band_end,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Opened by the CLI when no file is given on the command line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_path: Option<PathBuf>,
    /// Log file; logging is off when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_path: Option<PathBuf>,
    pub sync: SyncSettings,
    pub visibility: VisibilitySettings,
}

impl Config {
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Option<Self>, ConfigError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path).map_err(|source| {
            ConfigError::ConfigReadError {
                config_path: config_path.to_path_buf(),
                source,
            }
        })?;

        let mut config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::ConfigParseError {
                config_path: config_path.to_path_buf(),
                source,
            })?;

        config
            .visibility
            .validate()
            .map_err(|reason| ConfigError::InvalidVisibility {
                config_path: config_path.to_path_buf(),
                reason,
            })?;

        // Expand shell variables and tilde in configured paths
        for path in [&mut config.document_path, &mut config.log_path]
            .into_iter()
            .flatten()
        {
            if let Some(expanded) = Self::expand_path(path) {
                *path = expanded;
            }
        }

        Ok(Some(config))
    }

    pub fn load() -> Result<Option<Self>, ConfigError> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, config_path: P) -> anyhow::Result<()> {
        let config_path = config_path.as_ref();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        self.save_to_path(&config_path)
    }

    pub fn config_path() -> PathBuf {
        let config_dir = shellexpand::tilde("~/.config/markdown-scrollsync");
        PathBuf::from(config_dir.as_ref()).join("config.toml")
    }

    pub fn policy(&self) -> SyncPolicy {
        SyncPolicy {
            min_sync_interval: Duration::from_millis(self.sync.min_sync_interval_ms),
            scroll_debounce: Duration::from_millis(self.sync.scroll_debounce_ms),
            settle_delay: Duration::from_millis(self.sync.settle_delay_ms),
        }
    }

    pub fn focus_band(&self) -> FocusBand {
        FocusBand {
            threshold: self.visibility.threshold,
            band_start: self.visibility.band_start,
            band_end: self.visibility.band_end,
            fallback_band_end: self.visibility.fallback_band_end,
        }
    }

    fn expand_path(path: &Path) -> Option<PathBuf> {
        let path_str = path.to_string_lossy();
        match shellexpand::full(&path_str) {
            Ok(expanded) => Some(PathBuf::from(expanded.as_ref())),
            Err(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::env;
    use tempfile::TempDir;

    #[test]
    fn test_config_path() {
        let config_path = Config::config_path();
        let path_str = config_path.to_string_lossy();

        assert!(!path_str.starts_with('~'));
        assert!(path_str.ends_with(".config/markdown-scrollsync/config.toml"));
    }

    #[test]
    fn test_empty_file_gives_engine_defaults() {
        let config: Config = toml::from_str("").unwrap();

        assert_eq!(config.document_path, None);
        assert_eq!(config.policy(), SyncPolicy::default());
        assert_eq!(config.focus_band(), FocusBand::default());
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config: Config = toml::from_str(
            r#"
[sync]
settle_delay_ms = 500

[visibility]
band_end = 0.4
"#,
        )
        .unwrap();

        let policy = config.policy();
        assert_eq!(policy.settle_delay, Duration::from_millis(500));
        assert_eq!(policy.min_sync_interval, Duration::from_millis(100));
        assert_eq!(policy.scroll_debounce, Duration::from_millis(40));

        let band = config.focus_band();
        assert_eq!(band.band_end, 0.4);
        assert_eq!(band.threshold, 0.5);
    }

    #[test]
    fn test_default_visibility_is_valid() {
        assert_eq!(VisibilitySettings::default().validate(), Ok(()));
    }

    #[test]
    fn test_load_rejects_inverted_focus_band() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("config.toml");
        std::fs::write(&config_file, "[visibility]\nband_start = 0.6\nband_end = 0.4\n").unwrap();

        let err = Config::load_from_path(&config_file).unwrap_err();

        assert!(matches!(err, ConfigError::InvalidVisibility { .. }));
        assert!(err.to_string().contains("band_start"));
    }

    #[test]
    fn test_load_rejects_out_of_range_threshold() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("config.toml");
        std::fs::write(&config_file, "[visibility]\nthreshold = 1.5\n").unwrap();

        let err = Config::load_from_path(&config_file).unwrap_err();

        assert!(matches!(
            err,
            ConfigError::InvalidVisibility { ref reason, .. } if reason.starts_with("threshold")
        ));
    }

    #[test]
    fn test_expand_path_with_tilde() {
        let path = PathBuf::from("~/test/path");
        let expanded = Config::expand_path(&path).unwrap();

        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.to_string_lossy().contains("test/path"));
    }

    #[test]
    fn test_expand_path_with_absolute_path() {
        let path = PathBuf::from("/absolute/path");
        let expanded = Config::expand_path(&path).unwrap();

        assert_eq!(expanded, path);
    }

    #[test]
    fn test_load_config_file_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let non_existent_config = temp_dir.path().join("nonexistent.toml");

        let result = Config::load_from_path(&non_existent_config).unwrap();

        assert!(result.is_none());
    }

    #[test]
    fn test_load_reports_parse_errors_with_path() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("config.toml");
        std::fs::write(&config_file, "[sync]\nsettle_delay_ms = \"soon\"\n").unwrap();

        let err = Config::load_from_path(&config_file).unwrap_err();

        assert!(matches!(err, ConfigError::ConfigParseError { .. }));
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn test_save_and_load_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("nested/config.toml");
        let test_config = Config {
            document_path: Some(PathBuf::from("/tmp/readme.md")),
            sync: SyncSettings {
                min_sync_interval_ms: 50,
                ..SyncSettings::default()
            },
            ..Config::default()
        };

        test_config.save_to_path(&config_file).unwrap();
        let loaded = Config::load_from_path(&config_file).unwrap().unwrap();

        assert_eq!(loaded.document_path, test_config.document_path);
        assert_eq!(loaded.log_path, None);
        assert_eq!(loaded.sync, test_config.sync);
        assert_eq!(loaded.visibility, VisibilitySettings::default());
    }

    #[test]
    fn test_config_with_env_var_in_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("config.toml");
        unsafe {
            env::set_var("SCROLLSYNC_DOCS", "/custom/docs");
        }
        std::fs::write(
            &config_file,
            "document_path = \"$SCROLLSYNC_DOCS/readme.md\"\nlog_path = \"~/scrollsync.log\"\n",
        )
        .unwrap();

        let config = Config::load_from_path(&config_file).unwrap().unwrap();

        assert_eq!(
            config.document_path,
            Some(PathBuf::from("/custom/docs/readme.md"))
        );
        let log_path = config.log_path.unwrap();
        assert!(!log_path.to_string_lossy().starts_with('~'));

        unsafe {
            env::remove_var("SCROLLSYNC_DOCS");
        }
    }
}
