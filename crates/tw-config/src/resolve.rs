//! Configuration resolution and path discovery.
//!
//! Resolution order: CLI argument → environment variables → XDG paths → system → defaults.

use std::path::{Path, PathBuf};

/// Discovered pipeline configuration file.
#[derive(Debug, Clone, Default)]
pub struct ConfigPaths {
    /// Path to the pipeline config (or None if not found).
    pub pipeline: Option<PathBuf>,

    /// Where the pipeline config came from (for diagnostics).
    pub source: ConfigSource,
}

/// Where a configuration file was found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConfigSource {
    /// Explicitly provided via CLI argument.
    CliArgument,

    /// Set via environment variable.
    Environment,

    /// Found in XDG config directory.
    XdgConfig,

    /// Found in /etc/temporal-windows/.
    SystemConfig,

    /// Using built-in defaults.
    #[default]
    BuiltinDefault,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::CliArgument => write!(f, "CLI argument"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::XdgConfig => write!(f, "XDG config"),
            ConfigSource::SystemConfig => write!(f, "system config"),
            ConfigSource::BuiltinDefault => write!(f, "builtin default"),
        }
    }
}

/// Environment variable names.
pub const ENV_CONFIG_PATH: &str = "TEMPORAL_WINDOWS_CONFIG";
pub const ENV_CONFIG_DIR: &str = "TW_CONFIG_DIR";

/// Candidate file names inside a config directory, in preference order.
const CONFIG_FILENAMES: [&str; 4] = [
    "pipeline.toml",
    "pipeline.yaml",
    "pipeline.yml",
    "pipeline.json",
];

/// Application name for XDG directories.
const APP_NAME: &str = "temporal-windows";

/// Resolve the pipeline configuration path.
///
/// Resolution order:
/// 1. Explicit CLI path (returned even if missing, so the load reports it)
/// 2. TEMPORAL_WINDOWS_CONFIG
/// 3. TW_CONFIG_DIR + pipeline.{toml,yaml,yml,json}
/// 4. XDG config directory (~/.config/temporal-windows/)
/// 5. System config (/etc/temporal-windows/)
/// 6. Built-in defaults (None)
pub fn resolve_config(cli_path: Option<&Path>) -> ConfigPaths {
    if let Some(path) = cli_path {
        return ConfigPaths {
            pipeline: Some(path.to_path_buf()),
            source: ConfigSource::CliArgument,
        };
    }

    if let Ok(env_path) = std::env::var(ENV_CONFIG_PATH) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return ConfigPaths {
                pipeline: Some(path),
                source: ConfigSource::Environment,
            };
        }
    }

    if let Ok(config_dir) = std::env::var(ENV_CONFIG_DIR) {
        if let Some(path) = find_in_dir(Path::new(&config_dir)) {
            return ConfigPaths {
                pipeline: Some(path),
                source: ConfigSource::Environment,
            };
        }
    }

    if let Some(dir) = xdg_config_dir() {
        if let Some(path) = find_in_dir(&dir) {
            return ConfigPaths {
                pipeline: Some(path),
                source: ConfigSource::XdgConfig,
            };
        }
    }

    if let Some(path) = find_in_dir(&system_config_dir()) {
        return ConfigPaths {
            pipeline: Some(path),
            source: ConfigSource::SystemConfig,
        };
    }

    ConfigPaths::default()
}

fn find_in_dir(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.is_file())
}

/// Get the XDG config directory for temporal-windows.
pub fn xdg_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Get the system config directory.
pub fn system_config_dir() -> PathBuf {
    PathBuf::from("/etc").join(APP_NAME)
}
