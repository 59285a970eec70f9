//! Build configuration loaded from `cobble.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The configuration file name.
pub const CONFIG_FILE: &str = "cobble.toml";

/// Where copied assets go when no `out-dir` is set, under the root component.
pub const DEFAULT_OUT_DIR: &str = "build";

/// Errors that can occur when loading a build configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Options for one build, as written in `cobble.toml`.
///
/// ```toml
/// development = true
/// paths = ["../shared"]
/// ignore = ["component/jquery"]
/// out-dir = "build"
/// url-prefix = "/assets"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct BuildConfig {
    /// Include the root's development dependencies.
    pub development: bool,
    /// Annotate scripts with `sourceURL` comments.
    pub source_urls: bool,
    /// Extra global search paths, relative to the root component.
    pub paths: Vec<PathBuf>,
    /// Dependencies to leave out entirely.
    pub ignore: Vec<String>,
    /// Where copied assets go, relative to the root component.
    pub out_dir: Option<PathBuf>,
    /// Link binary assets instead of copying them.
    pub symlink: bool,
    /// Prefix for rewritten stylesheet urls.
    pub url_prefix: String,
}

impl BuildConfig {
    /// Load a configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or has unknown keys.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load `cobble.toml` from `dir` if present, otherwise the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn discover(dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = dir.as_ref().join(CONFIG_FILE);
        if path.is_file() {
            Self::from_path(path)
        } else {
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn parse_full_config() {
        let config = BuildConfig::parse(
            r#"
development = true
source-urls = true
paths = ["../shared", "vendor"]
ignore = ["component/jquery"]
out-dir = "build"
symlink = true
url-prefix = "/assets"
"#,
        )
        .unwrap();

        assert!(config.development);
        assert!(config.source_urls);
        assert_eq!(config.paths, [PathBuf::from("../shared"), PathBuf::from("vendor")]);
        assert_eq!(config.ignore, ["component/jquery"]);
        assert_eq!(config.out_dir.as_deref(), Some(Path::new("build")));
        assert!(config.symlink);
        assert_eq!(config.url_prefix, "/assets");
    }

    #[test]
    fn empty_config_uses_defaults() {
        assert_eq!(BuildConfig::parse("").unwrap(), BuildConfig::default());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = BuildConfig::parse("developement = true").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn discover_falls_back_to_defaults() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(BuildConfig::discover(tmp.path()).unwrap(), BuildConfig::default());

        std::fs::write(tmp.path().join(CONFIG_FILE), "symlink = true").unwrap();
        assert!(BuildConfig::discover(tmp.path()).unwrap().symlink);
    }
}
