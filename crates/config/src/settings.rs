// Application settings
// Loaded from ~/.config/sheetfill/settings.toml

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit settings file.
pub const CONFIG_ENV: &str = "SHEETFILL_CONFIG";

#[derive(Debug)]
pub enum SettingsError {
    /// An explicitly requested settings file does not exist.
    NotFound(PathBuf),
    /// File exists but could not be read.
    Read { path: PathBuf, message: String },
    /// TOML syntax or schema error.
    Parse { path: PathBuf, message: String },
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(path) => write!(f, "settings file not found: {}", path.display()),
            Self::Read { path, message } => {
                write!(f, "cannot read settings {}: {message}", path.display())
            }
            Self::Parse { path, message } => {
                write!(f, "invalid settings {}: {message}", path.display())
            }
        }
    }
}

impl std::error::Error for SettingsError {}

/// Fuzzy matching defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchSettings {
    /// Minimum score (0-100) for a reference key to count as a match
    pub threshold: f64,

    /// Scorer name, see `sheetfill lookup --help`
    pub scorer: String,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            threshold: 80.0,
            scorer: "weighted".to_string(),
        }
    }
}

/// Write behaviour defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FillSettings {
    /// Refill target cells that already hold a value
    pub overwrite: bool,

    /// Force the filled sheet visible when saving
    pub unhide: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Default tracing filter when neither SHEETFILL_LOG nor -v/-q is given
    pub level: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    #[serde(rename = "match")]
    pub matching: MatchSettings,

    pub fill: FillSettings,

    pub log: LogSettings,
}

impl Settings {
    /// Get the default settings file path
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sheetfill");
        config_dir.join("settings.toml")
    }

    /// Parse settings from TOML text
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Load settings from an explicit path. A missing file is an error.
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            return Err(SettingsError::NotFound(path.to_path_buf()));
        }
        let contents = fs::read_to_string(path).map_err(|e| SettingsError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_toml(&contents).map_err(|e| SettingsError::Parse {
            path: path.to_path_buf(),
            message: e.message().to_string(),
        })
    }

    /// Load settings from the default location, falling back to defaults
    /// when no file exists there.
    pub fn load() -> Result<Self, SettingsError> {
        let path = Self::config_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Resolve settings: `explicit` path, then `SHEETFILL_CONFIG`, then the
    /// default location.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, SettingsError> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }
        match std::env::var_os(CONFIG_ENV) {
            Some(path) if !path.is_empty() => Self::load_from(Path::new(&path)),
            _ => Self::load(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let s = Settings::default();
        assert_eq!(s.matching.threshold, 80.0);
        assert_eq!(s.matching.scorer, "weighted");
        assert!(!s.fill.overwrite);
        assert!(!s.fill.unhide);
        assert_eq!(s.log.level, "warn");
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let s = Settings::from_toml("[match]\nthreshold = 90\n").unwrap();
        assert_eq!(s.matching.threshold, 90.0);
        assert_eq!(s.matching.scorer, "weighted");
        assert_eq!(s.log.level, "warn");
    }

    #[test]
    fn full_file() {
        let text = r#"
[match]
threshold = 72.5
scorer = "token-set"

[fill]
overwrite = true
unhide = true

[log]
level = "debug"
"#;
        let s = Settings::from_toml(text).unwrap();
        assert_eq!(s.matching.threshold, 72.5);
        assert_eq!(s.matching.scorer, "token-set");
        assert!(s.fill.overwrite);
        assert!(s.fill.unhide);
        assert_eq!(s.log.level, "debug");
    }

    #[test]
    fn wrong_type_is_rejected() {
        assert!(Settings::from_toml("[match]\nthreshold = \"high\"\n").is_err());
    }

    #[test]
    fn explicit_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Settings::load_from(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, SettingsError::NotFound(_)));
    }

    #[test]
    fn load_from_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "[match\nthreshold = 1").unwrap();
        let err = Settings::load_from(&path).unwrap_err();
        assert!(matches!(err, SettingsError::Parse { .. }));
    }

    #[test]
    fn load_from_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "[fill]\noverwrite = true\n").unwrap();
        let s = Settings::load_from(&path).unwrap();
        assert!(s.fill.overwrite);
    }
}
