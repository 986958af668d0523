//! Layered settings: project file, then `$TASKTRACK_HOME/config.toml`, then built-ins.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Data file used when no config names one.
pub const DEFAULT_DATA_FILE: &str = "data.json";

/// Project config file names, in lookup order.
pub const PROJECT_CONFIG_FILES: [&str; 2] = [".tasktrack.toml", ".tasktrackrc"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to write config {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TaskTrackConfig {
    /// true = activating a task deactivates every other active task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub only_one_active: Option<bool>,
    /// Session data file, relative to the project root unless absolute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_file: Option<String>,
}

/// Which layer a resolved setting came from.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Project,
    Global,
    Default,
}

impl ConfigSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ConfigSource::Project => "project",
            ConfigSource::Global => "global",
            ConfigSource::Default => "default",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Setting<T> {
    pub value: T,
    pub source: ConfigSource,
}

/// Effective settings for one project root.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub root: PathBuf,
    pub only_one_active: Setting<bool>,
    pub data_file: Setting<PathBuf>,
}

pub fn tasktrack_home_dir() -> Option<PathBuf> {
    let non_empty = |key: &str| {
        std::env::var(key)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
    };
    non_empty("TASKTRACK_HOME").or_else(|| {
        non_empty("HOME")
            .or_else(|| non_empty("USERPROFILE"))
            .map(|home| home.join(".tasktrack"))
    })
}

pub fn global_config_path() -> Option<PathBuf> {
    tasktrack_home_dir().map(|home| home.join("config.toml"))
}

/// The existing project config file under `root`, if any.
pub fn project_config_file(root: &Path) -> Option<PathBuf> {
    PROJECT_CONFIG_FILES
        .iter()
        .map(|name| root.join(name))
        .find(|path| path.is_file())
}

/// Nearest ancestor of `start` (inclusive) that holds a project config file.
pub fn find_config_root(start: &Path) -> Option<PathBuf> {
    let start = start.canonicalize().unwrap_or_else(|_| start.to_path_buf());
    start
        .ancestors()
        .find(|dir| project_config_file(dir).is_some())
        .map(Path::to_path_buf)
}

pub fn read_config_file(path: &Path) -> Result<TaskTrackConfig, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_project_config(root: &Path) -> Result<Option<TaskTrackConfig>, ConfigError> {
    project_config_file(root)
        .map(|path| read_config_file(&path))
        .transpose()
}

pub fn load_global_config() -> Result<Option<TaskTrackConfig>, ConfigError> {
    global_config_path()
        .filter(|path| path.is_file())
        .map(|path| read_config_file(&path))
        .transpose()
}

fn pick<T>(
    project: Option<T>,
    global: Option<T>,
    default: impl FnOnce() -> T,
) -> Setting<T> {
    match (project, global) {
        (Some(value), _) => Setting {
            value,
            source: ConfigSource::Project,
        },
        (None, Some(value)) => Setting {
            value,
            source: ConfigSource::Global,
        },
        (None, None) => Setting {
            value: default(),
            source: ConfigSource::Default,
        },
    }
}

fn data_file_of(config: &Option<TaskTrackConfig>) -> Option<String> {
    config
        .as_ref()
        .and_then(|c| c.data_file.as_deref())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Resolves every setting for `root`. A config file that exists but does not parse is an
/// error, never a silent fallback to the next layer.
pub fn resolve_config(root: &Path) -> Result<ResolvedConfig, ConfigError> {
    let project = load_project_config(root)?;
    let global = load_global_config()?;

    let only_one_active = pick(
        project.as_ref().and_then(|c| c.only_one_active),
        global.as_ref().and_then(|c| c.only_one_active),
        || true,
    );
    let data_file = pick(data_file_of(&project), data_file_of(&global), || {
        DEFAULT_DATA_FILE.to_string()
    });
    let resolved = ResolvedConfig {
        root: root.to_path_buf(),
        only_one_active,
        data_file: Setting {
            value: root.join(data_file.value),
            source: data_file.source,
        },
    };
    debug!(
        root = %root.display(),
        only_one_active = resolved.only_one_active.value,
        source = resolved.only_one_active.source.as_str(),
        "resolved config"
    );
    Ok(resolved)
}

/// Merges the given values into the project config under `root` and writes it back to the
/// file it was read from (`.tasktrack.toml` when there is none yet).
pub fn update_project_config(
    root: &Path,
    only_one_active: Option<bool>,
    data_file: Option<String>,
) -> Result<PathBuf, ConfigError> {
    let path = project_config_file(root).unwrap_or_else(|| root.join(PROJECT_CONFIG_FILES[0]));
    let mut config = if path.is_file() {
        read_config_file(&path)?
    } else {
        TaskTrackConfig::default()
    };
    if only_one_active.is_some() {
        config.only_one_active = only_one_active;
    }
    if data_file.is_some() {
        config.data_file = data_file;
    }
    let body = toml::to_string_pretty(&config)?;
    fs::write(&path, body).map_err(|source| ConfigError::Write {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}
