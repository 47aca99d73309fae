use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::provider::DEFAULT_MODEL;

pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8080";
pub const DEFAULT_LOG_FILTER: &str = "nlsql=info";
pub const API_URL_ENV: &str = "NLSQL_API_URL";
pub const CONFIG_DIR_ENV: &str = "NLSQL_CONFIG_DIR";

const SETTINGS_FILE: &str = "settings.toml";
const LOG_FILE: &str = "nlsql.log";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("config directory is unavailable for this platform")]
    ConfigDirUnavailable,
    #[error("failed to read settings file at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse settings file at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    pub api_base_url: String,
    pub default_model: String,
    pub log_filter: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl ClientSettings {
    pub fn load_default() -> Result<Self, SettingsError> {
        Self::load_from_path(default_settings_path()?)
    }

    /// A missing or blank file yields the defaults.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }

        toml::from_str(&raw).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Applies `NLSQL_API_URL` when set, then the explicit override.
    #[must_use]
    pub fn with_api_url_override(mut self, explicit: Option<&str>) -> Self {
        if let Some(from_env) = env::var(API_URL_ENV).ok().filter(|url| !url.trim().is_empty()) {
            self.api_base_url = from_env;
        }
        if let Some(explicit) = explicit.filter(|url| !url.trim().is_empty()) {
            self.api_base_url = explicit.to_string();
        }
        self
    }
}

pub fn config_dir() -> Result<PathBuf, SettingsError> {
    if let Some(custom) = env::var_os(CONFIG_DIR_ENV) {
        return Ok(PathBuf::from(custom));
    }

    let base_dir = if cfg!(target_os = "windows") {
        env::var_os("APPDATA")
            .map(PathBuf::from)
            .ok_or(SettingsError::ConfigDirUnavailable)?
    } else if let Some(xdg_config_home) = env::var_os("XDG_CONFIG_HOME") {
        PathBuf::from(xdg_config_home)
    } else {
        let home = env::var_os("HOME").ok_or(SettingsError::ConfigDirUnavailable)?;
        PathBuf::from(home).join(".config")
    };

    Ok(base_dir.join("nlsql"))
}

pub fn default_settings_path() -> Result<PathBuf, SettingsError> {
    Ok(config_dir()?.join(SETTINGS_FILE))
}

pub fn default_log_path() -> Result<PathBuf, SettingsError> {
    Ok(config_dir()?.join(LOG_FILE))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::{ClientSettings, SettingsError, DEFAULT_API_BASE_URL};

    #[test]
    fn missing_file_loads_defaults() {
        let temp_dir = TempDir::new().expect("temp dir");
        let settings = ClientSettings::load_from_path(temp_dir.path().join("settings.toml"))
            .expect("missing file should load");
        assert_eq!(settings, ClientSettings::default());
        assert_eq!(settings.api_base_url, DEFAULT_API_BASE_URL);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let temp_dir = TempDir::new().expect("temp dir");
        let path = temp_dir.path().join("settings.toml");
        fs::write(
            &path,
            "api_base_url = \"http://nlsql.internal:9000\"\ndefault_model = \"gemini-pro\"\n",
        )
        .expect("write settings");

        let settings = ClientSettings::load_from_path(&path).expect("settings should parse");
        assert_eq!(settings.api_base_url, "http://nlsql.internal:9000");
        assert_eq!(settings.default_model, "gemini-pro");
        assert_eq!(settings.log_filter, ClientSettings::default().log_filter);
    }

    #[test]
    fn blank_file_loads_defaults_and_garbage_fails() {
        let temp_dir = TempDir::new().expect("temp dir");
        let path = temp_dir.path().join("settings.toml");
        fs::write(&path, "  \n").expect("write settings");
        assert_eq!(
            ClientSettings::load_from_path(&path).expect("blank file should load"),
            ClientSettings::default()
        );

        fs::write(&path, "api_base_url = [").expect("write settings");
        let err = ClientSettings::load_from_path(&path).expect_err("garbage should fail");
        assert!(matches!(err, SettingsError::Parse { .. }));
    }

    #[test]
    fn explicit_override_wins() {
        let settings =
            ClientSettings::default().with_api_url_override(Some("http://10.0.0.5:8080"));
        assert_eq!(settings.api_base_url, "http://10.0.0.5:8080");
    }
}
