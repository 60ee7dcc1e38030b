//! Configuration loading and root folder resolution
//!
//! Root folder priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable `CREDGRAPH_ROOT_FOLDER`
//! 3. TOML config file (`root_folder`)
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing or unreadable TOML file is never fatal: it is logged and the
//! defaults are used.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

pub const ENV_ROOT_FOLDER: &str = "CREDGRAPH_ROOT_FOLDER";
pub const ENV_GITHUB_TOKEN: &str = "CREDGRAPH_GITHUB_TOKEN";
pub const ENV_INITIATIVES_DIRECTORY: &str = "CREDGRAPH_INITIATIVES_DIRECTORY";

/// Logging section of the TOML file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default tracing filter level (`RUST_LOG` still wins)
    pub level: String,
    pub log_file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_file: None,
        }
    }
}

/// Contents of `config.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub logging: LoggingConfig,
    /// Access token for the code-hosting source
    pub github_token: Option<String>,
    /// Local checkout of the initiatives directory
    pub initiatives_directory: Option<PathBuf>,
}

impl TomlConfig {
    /// Parse a TOML document
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load `path`, or the platform config file when `path` is `None`.
    ///
    /// Falls back to defaults (with a warning) when the file is absent or
    /// invalid.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let (config, warning) = Self::load_with_warning(path);
        if let Some(warning) = warning {
            warn!("{}", warning);
        }
        config
    }

    /// Like [`TomlConfig::load_or_default`], but hands the fallback warning
    /// back instead of logging it. Used before a subscriber is installed.
    pub fn load_with_warning(path: Option<&Path>) -> (Self, Option<String>) {
        let path = match path.map(Path::to_path_buf).or_else(default_config_path) {
            Some(path) => path,
            None => return (Self::default(), None),
        };

        match std::fs::read_to_string(&path) {
            Ok(content) => match Self::parse(&content) {
                Ok(config) => (config, None),
                Err(e) => (
                    Self::default(),
                    Some(format!("Ignoring invalid config {}: {}", path.display(), e)),
                ),
            },
            Err(e) => (
                Self::default(),
                Some(format!("Could not read config {}: {}", path.display(), e)),
            ),
        }
    }
}

/// Resolve the root data folder
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml: &TomlConfig) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(ENV_ROOT_FOLDER) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = &toml.root_folder {
        return path.clone();
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Code-hosting token: environment first, then TOML
pub fn resolve_github_token(toml: &TomlConfig) -> Option<String> {
    let env_token = std::env::var(ENV_GITHUB_TOKEN).ok().filter(|t| is_valid_key(t));
    let toml_token = toml.github_token.clone().filter(|t| is_valid_key(t));

    if env_token.is_some() && toml_token.is_some() {
        warn!("GitHub token found in environment and TOML config. Using environment.");
    }
    env_token.or(toml_token)
}

/// Initiatives directory: environment first, then TOML
pub fn resolve_initiatives_directory(toml: &TomlConfig) -> Option<PathBuf> {
    std::env::var(ENV_INITIATIVES_DIRECTORY)
        .ok()
        .filter(|d| !d.trim().is_empty())
        .map(PathBuf::from)
        .or_else(|| toml.initiatives_directory.clone())
}

/// Validate a credential (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// `<root>/cache`
pub fn cache_directory(root: &Path) -> PathBuf {
    root.join("cache")
}

/// `<root>/projects`
pub fn projects_directory(root: &Path) -> PathBuf {
    root.join("projects")
}

/// Create the root folder and its fixed subdirectories
pub fn ensure_root_folder(root: &Path) -> Result<()> {
    for dir in [root.to_path_buf(), cache_directory(root), projects_directory(root)] {
        std::fs::create_dir_all(&dir).map_err(|e| {
            Error::Config(format!("Cannot create directory {}: {}", dir.display(), e))
        })?;
    }
    Ok(())
}

/// Get default configuration file path for the platform
fn default_config_path() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("credgraph").join("config.toml"));
    if let Some(path) = user_config.filter(|p| p.exists()) {
        return Some(path);
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/credgraph/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }
    None
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/credgraph
        dirs::data_local_dir()
            .map(|d| d.join("credgraph"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/credgraph"))
    } else if cfg!(target_os = "macos") {
        // ~/Library/Application Support/credgraph
        dirs::data_dir()
            .map(|d| d.join("credgraph"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/credgraph"))
    } else if cfg!(target_os = "windows") {
        // %LOCALAPPDATA%\credgraph
        dirs::data_local_dir()
            .map(|d| d.join("credgraph"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\credgraph"))
    } else {
        PathBuf::from("./credgraph_data")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config = TomlConfig::parse(
            r#"
            root_folder = "/data/cred"
            github_token = "abc"
            initiatives_directory = "/data/initiatives"

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.root_folder, Some(PathBuf::from("/data/cred")));
        assert_eq!(config.github_token.as_deref(), Some("abc"));
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.log_file.is_none());
    }

    #[test]
    fn test_parse_empty_config_uses_defaults() {
        let config = TomlConfig::parse("").unwrap();
        assert_eq!(config, TomlConfig::default());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_cli_arg_wins() {
        let toml = TomlConfig {
            root_folder: Some(PathBuf::from("/from/toml")),
            ..Default::default()
        };
        let root = resolve_root_folder(Some(Path::new("/from/cli")), &toml);
        assert_eq!(root, PathBuf::from("/from/cli"));
    }

    #[test]
    fn test_is_valid_key() {
        assert!(is_valid_key("token"));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("   "));
    }
}
