use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::input::{KeyBindings, KeyChord, KeyChordParseError};
use crate::viewport::{
    ViewportConfig, DEFAULT_COLUMN_WIDTH, DEFAULT_HEADER_HEIGHT, DEFAULT_RENDER_AHEAD,
    DEFAULT_ROW_HEIGHT,
};

pub const SETTINGS_FILE_NAME: &str = "settings.toml";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct KeyBindingSettings {
    pub copy: Vec<String>,
    pub paste: Vec<String>,
}

impl Default for KeyBindingSettings {
    fn default() -> Self {
        let defaults = KeyBindings::default();
        Self {
            copy: defaults.copy.iter().map(ToString::to_string).collect(),
            paste: defaults.paste.iter().map(ToString::to_string).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GridSettings {
    pub render_ahead: usize,
    pub row_height: u32,
    pub header_height: u32,
    pub default_column_width: u32,
    pub key_bindings: KeyBindingSettings,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            render_ahead: DEFAULT_RENDER_AHEAD,
            row_height: DEFAULT_ROW_HEIGHT,
            header_height: DEFAULT_HEADER_HEIGHT,
            default_column_width: DEFAULT_COLUMN_WIDTH,
            key_bindings: KeyBindingSettings::default(),
        }
    }
}

impl GridSettings {
    #[must_use]
    pub fn viewport_config(&self) -> ViewportConfig {
        ViewportConfig {
            render_ahead: self.render_ahead,
            row_height: self.row_height,
            header_height: self.header_height,
            default_column_width: self.default_column_width,
        }
    }

    pub fn key_bindings(&self) -> Result<KeyBindings, SettingsError> {
        Ok(KeyBindings {
            copy: parse_chords(&self.key_bindings.copy)?,
            paste: parse_chords(&self.key_bindings.paste)?,
        })
    }
}

fn parse_chords(raw: &[String]) -> Result<Vec<KeyChord>, SettingsError> {
    raw.iter()
        .map(|binding| {
            binding
                .parse()
                .map_err(|source| SettingsError::InvalidKeyBinding {
                    binding: binding.clone(),
                    source,
                })
        })
        .collect()
}

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
    #[error("failed to create config directory at {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize settings: {source}")]
    Serialize {
        #[source]
        source: toml::ser::Error,
    },
    #[error("failed to write settings file at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid key binding `{binding}`: {source}")]
    InvalidKeyBinding {
        binding: String,
        #[source]
        source: KeyChordParseError,
    },
}

#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    path: PathBuf,
    settings: GridSettings,
}

impl FileSettingsStore {
    pub fn load_default() -> Result<Self, SettingsError> {
        let path = default_settings_path()?;
        Self::load_from_path(path)
    }

    /// Loads settings from `path`; a missing or blank file yields defaults.
    pub fn load_from_path(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let path = path.into();
        if !path.exists() {
            return Ok(Self {
                path,
                settings: GridSettings::default(),
            });
        }

        let raw = fs::read_to_string(&path).map_err(|source| SettingsError::Read {
            path: path.clone(),
            source,
        })?;

        if raw.trim().is_empty() {
            return Ok(Self {
                path,
                settings: GridSettings::default(),
            });
        }

        let settings = toml::from_str(&raw).map_err(|source| SettingsError::Parse {
            path: path.clone(),
            source,
        })?;

        Ok(Self { path, settings })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn settings(&self) -> &GridSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut GridSettings {
        &mut self.settings
    }

    pub fn persist(&self) -> Result<(), SettingsError> {
        if let Some(parent_dir) = self.path.parent() {
            fs::create_dir_all(parent_dir).map_err(|source| SettingsError::CreateDir {
                path: parent_dir.to_path_buf(),
                source,
            })?;
        }

        let rendered = toml::to_string_pretty(&self.settings)
            .map_err(|source| SettingsError::Serialize { source })?;

        fs::write(&self.path, rendered).map_err(|source| SettingsError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

pub fn default_config_dir() -> Result<PathBuf, SettingsError> {
    if let Some(custom) = env::var_os("DBSTUDIO_CONFIG_DIR") {
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

    Ok(base_dir.join("dbstudio"))
}

pub fn default_settings_path() -> Result<PathBuf, SettingsError> {
    Ok(default_config_dir()?.join(SETTINGS_FILE_NAME))
}
