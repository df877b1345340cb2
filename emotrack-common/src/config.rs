//! Configuration loading and root folder resolution

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "EMOTRACK_ROOT_FOLDER";

/// Config file name looked up inside the root folder
pub const CONFIG_FILE_NAME: &str = "emotrack.toml";

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "emotrack.db";

/// Top-level keys shared by every service config file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SharedConfig {
    pub root_folder: Option<PathBuf>,
    pub log_level: Option<String>,
}

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. `root_folder` in the TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    config_file: Option<&Path>,
) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(config_path) = config_file {
        if let Ok(content) = std::fs::read_to_string(config_path) {
            if let Ok(shared) = toml::from_str::<SharedConfig>(&content) {
                if let Some(root_folder) = shared.root_folder {
                    return root_folder;
                }
            }
        }
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Get OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/emotrack (or /var/lib/emotrack for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("emotrack"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/emotrack"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("emotrack"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/emotrack"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("emotrack"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\emotrack"))
    } else {
        PathBuf::from("./emotrack_data")
    }
}

/// Paths derived from a resolved root folder
#[derive(Debug, Clone)]
pub struct RootFolder {
    root: PathBuf,
}

impl RootFolder {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn database_path(&self) -> PathBuf {
        self.root.join(DATABASE_FILE_NAME)
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.root.join("reports")
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE_NAME)
    }

    /// Create the root and reports folders if missing
    pub fn ensure_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::create_dir_all(self.reports_dir())?;
        Ok(())
    }
}

/// Load a TOML config file with graceful degradation
///
/// A missing file logs a warning and yields `T::default()`. An unreadable or
/// malformed file is a configuration error.
pub fn load_toml_config<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        warn!("Config file not found at {}, using defaults", path.display());
        return Ok(T::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str::<T>(&content)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_folder_paths() {
        let root = RootFolder::new(PathBuf::from("/srv/emotrack"));
        assert_eq!(root.database_path(), PathBuf::from("/srv/emotrack/emotrack.db"));
        assert_eq!(root.reports_dir(), PathBuf::from("/srv/emotrack/reports"));
        assert_eq!(root.config_path(), PathBuf::from("/srv/emotrack/emotrack.toml"));
    }

    #[test]
    fn test_cli_argument_wins() {
        let resolved = resolve_root_folder(
            Some(Path::new("/from/cli")),
            "EMOTRACK_TEST_UNUSED_VAR",
            None,
        );
        assert_eq!(resolved, PathBuf::from("/from/cli"));
    }
}
