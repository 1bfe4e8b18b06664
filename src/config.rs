use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
pub struct Config {
    /// Whether agent signals drive playback at all. Host commands on stdin
    /// work regardless.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Playback volume as an integer percent (0-100).
    #[serde(default = "default_volume")]
    pub volume: u32,

    /// Audio track to loop while the agent is working.
    #[serde(default = "default_track")]
    pub track_path: String,

    /// Override for the audio helper binary. Defaults to `muzak-helper`
    /// next to the daemon executable.
    #[serde(default)]
    pub helper_path: Option<PathBuf>,

    /// Quiescence window for signal file writes, in milliseconds.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Override for the watched signal file. Defaults to `muzak-signal`
    /// in the system temp directory.
    #[serde(default)]
    pub signal_path: Option<PathBuf>,
}

fn default_enabled() -> bool {
    true
}

fn default_volume() -> u32 {
    50
}

fn default_track() -> String {
    "track.mp3".to_string()
}

fn default_debounce_ms() -> u64 {
    80
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            volume: default_volume(),
            track_path: default_track(),
            helper_path: None,
            debounce_ms: default_debounce_ms(),
            signal_path: None,
        }
    }
}

impl Config {
    /// Load configuration from the default location
    /// (~/.config/muzak/config.json). A missing file yields the defaults;
    /// the daemon never writes the file itself.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            tracing::info!(
                "Config file not found at {:?}, using defaults",
                config_path
            );
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;

        tracing::info!("Loaded config from {:?}", config_path);
        Ok(config)
    }

    /// Get the path to the configuration file
    fn config_path() -> Result<PathBuf> {
        let config_dir = if let Ok(dir) = std::env::var("XDG_CONFIG_HOME") {
            PathBuf::from(dir)
        } else {
            let home = std::env::var("HOME").context("HOME environment variable not set")?;
            PathBuf::from(home).join(".config")
        };

        Ok(config_dir.join("muzak").join("config.json"))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.volume > 100 {
            return Err(anyhow::anyhow!("volume must be between 0 and 100"));
        }

        if self.debounce_ms == 0 {
            return Err(anyhow::anyhow!("debounce_ms must be greater than zero"));
        }

        if self.track_path.is_empty() {
            return Err(anyhow::anyhow!("track_path cannot be empty"));
        }

        Ok(())
    }

    /// Volume percent translated to the 0.0-1.0 range the helper expects.
    pub fn volume_level(&self) -> f32 {
        (self.volume as f32 / 100.0).clamp(0.0, 1.0)
    }

    /// Locate the audio track: as given, then under `assets/`, then under
    /// the system install prefix.
    pub fn resolve_track(&self) -> Option<PathBuf> {
        [
            PathBuf::from(&self.track_path),
            Path::new("assets").join(&self.track_path),
            Path::new("/usr/share/muzak/assets").join(&self.track_path),
        ]
        .into_iter()
        .find(|candidate| candidate.exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = Config::default();
        assert!(config.enabled);
        assert_eq!(config.volume, 50);
        assert_eq!(config.debounce_ms, 80);
        assert!(config.signal_path.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn volume_percent_translates_to_unit_range() {
        let config = Config {
            volume: 50,
            ..Config::default()
        };
        assert_eq!(config.volume_level(), 0.5);

        let muted = Config {
            volume: 0,
            ..Config::default()
        };
        assert_eq!(muted.volume_level(), 0.0);

        let full = Config {
            volume: 100,
            ..Config::default()
        };
        assert_eq!(full.volume_level(), 1.0);
    }

    #[test]
    fn validate_rejects_out_of_range_volume() {
        let config = Config {
            volume: 150,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_debounce() {
        let config = Config {
            debounce_ms: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert!(config.enabled);
        assert_eq!(config.volume, 50);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"volume": 25, "enabled": false}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert!(!config.enabled);
        assert_eq!(config.volume, 25);
        assert_eq!(config.debounce_ms, 80);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(Config::load_from(&path).is_err());
    }
}
