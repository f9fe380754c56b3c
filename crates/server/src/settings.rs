use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("could not read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Server configuration. Every field is optional in the JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub models_dir: PathBuf,
    pub media_root: PathBuf,
    pub bind: String,
    pub camera: u32,
    pub detection_interval_ms: u64,
    pub overlay_font: Option<PathBuf>,
    pub download_models: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from("models"),
            media_root: PathBuf::from("media"),
            bind: "127.0.0.1:8000".to_string(),
            camera: 0,
            detection_interval_ms: 500,
            overlay_font: None,
            download_models: false,
        }
    }
}

/// Values given explicitly on the command line.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub models_dir: Option<PathBuf>,
    pub media_root: Option<PathBuf>,
    pub bind: Option<String>,
    pub camera: Option<u32>,
    pub detection_interval_ms: Option<u64>,
    pub overlay_font: Option<PathBuf>,
    pub download_models: bool,
}

impl Settings {
    /// `~/.config/Moodscan/settings.json` or the platform equivalent.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("Moodscan").join("settings.json"))
    }

    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let json = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&json).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// An explicit path must exist; the default location is optional.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, SettingsError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match Self::default_path().filter(|p| p.is_file()) {
            Some(path) => {
                log::info!("Using settings from {}", path.display());
                Self::load(&path)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        if let Some(v) = overrides.models_dir {
            self.models_dir = v;
        }
        if let Some(v) = overrides.media_root {
            self.media_root = v;
        }
        if let Some(v) = overrides.bind {
            self.bind = v;
        }
        if let Some(v) = overrides.camera {
            self.camera = v;
        }
        if let Some(v) = overrides.detection_interval_ms {
            self.detection_interval_ms = v;
        }
        if let Some(v) = overrides.overlay_font {
            self.overlay_font = Some(v);
        }
        self.download_models |= overrides.download_models;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"camera": 2, "bind": "0.0.0.0:9000"}"#).unwrap();

        let settings = Settings::load(&path).unwrap();

        assert_eq!(settings.camera, 2);
        assert_eq!(settings.bind, "0.0.0.0:9000");
        assert_eq!(settings.detection_interval_ms, 500);
        assert_eq!(settings.models_dir, PathBuf::from("models"));
    }

    #[test]
    fn test_overrides_win_over_file() {
        let settings = Settings {
            camera: 2,
            detection_interval_ms: 250,
            ..Settings::default()
        }
        .with_overrides(Overrides {
            camera: Some(1),
            download_models: true,
            ..Overrides::default()
        });

        assert_eq!(settings.camera, 1);
        assert_eq!(settings.detection_interval_ms, 250);
        assert!(settings.download_models);
    }

    #[test]
    fn test_invalid_json_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{camera: ").unwrap();
        assert!(matches!(Settings::load(&path), Err(SettingsError::Parse { .. })));
    }

    #[test]
    fn test_explicit_missing_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = Settings::discover(Some(&dir.path().join("nope.json")));
        assert!(matches!(result, Err(SettingsError::Read { .. })));
    }
}
