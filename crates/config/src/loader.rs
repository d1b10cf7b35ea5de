use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{
    env_subst::substitute_env,
    error::{Error, Result},
    schema::SecureBagConfig,
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "secure-bag.toml",
    "secure-bag.yaml",
    "secure-bag.yml",
    "secure-bag.json",
];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<SecureBagConfig> {
    let raw = std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./secure-bag.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/secure-bag/secure-bag.{toml,yaml,yml,json}` (user-global)
///
/// Returns `SecureBagConfig::default()` if no config file is found.
pub fn discover_and_load() -> SecureBagConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    SecureBagConfig::default()
}

/// Find the first config file in standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    // Project-local
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    // User-global: ~/.config/secure-bag/
    let config_dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| config_dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/secure-bag/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "secure-bag").map(|d| d.config_dir().to_path_buf())
}

/// Parse raw config text, picking the format from the file extension.
pub fn parse_config(raw: &str, path: &Path) -> Result<SecureBagConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");
    let parse_err = |message: String| Error::Parse {
        path: path.to_path_buf(),
        message,
    };

    match ext {
        "toml" => toml::from_str(raw).map_err(|e| parse_err(e.to_string())),
        "yaml" | "yml" => serde_yaml::from_str(raw).map_err(|e| parse_err(e.to_string())),
        "json" => serde_json::from_str(raw).map_err(|e| parse_err(e.to_string())),
        _ => Err(Error::UnsupportedFormat(ext.to_string())),
    }
}
