pub mod error;
pub mod model;

pub use error::*;
pub use model::*;

use std::path::{Path, PathBuf};

/// Direct path to a config file
pub const CONFIG_PATH_ENV: &str = "MODCHECK_CONFIG_PATH";
pub const REGION_ENV: &str = "MODCHECK_REGION";
pub const MODULE_DIR_ENV: &str = "MODCHECK_MODULE_DIR";
pub const AWS_PROFILE_ENV: &str = "MODCHECK_AWS_PROFILE";

const CANDIDATES: [&str; 3] = ["modcheck.local.yaml", "modcheck.yaml", ".modcheck.yaml"];

/// `~/.config/modcheck`
pub fn get_config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("modcheck"))
}

/// Find the config file for the current directory
///
/// Search order:
/// 1. `MODCHECK_CONFIG_PATH` (direct path)
/// 2. Current directory: modcheck.local.yaml, modcheck.yaml, .modcheck.yaml
/// 3. `~/.config/modcheck/modcheck.yaml` (global config)
pub fn find_config_file() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
    }

    let current_dir = std::env::current_dir()?;
    for filename in &CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(path);
        }
    }

    if let Ok(config_dir) = get_config_dir() {
        let global_config = config_dir.join("modcheck.yaml");
        if global_config.exists() {
            return Ok(global_config);
        }
    }

    Err(ConfigError::ConfigFileNotFound)
}

/// Parse YAML without env overrides or validation
pub fn parse_config(yaml: &str, origin: &Path) -> Result<RunConfig> {
    // An empty document deserializes to unit, not to an empty map
    if yaml.trim().is_empty() {
        return Ok(RunConfig::default());
    }
    serde_yaml::from_str(yaml).map_err(|source| ConfigError::Parse {
        path: origin.to_path_buf(),
        source,
    })
}

/// Load a specific file, apply env overrides and validate
pub fn load_config_from(path: &Path) -> Result<RunConfig> {
    if !path.exists() {
        return Err(ConfigError::MissingFile(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)?;
    let mut config = parse_config(&content, path)?;
    apply_env_overrides(&mut config);
    config.validate()?;
    Ok(config)
}

/// Load the config used for a run
///
/// An explicit path must exist. Without one, the discovered file is used,
/// or the defaults when there is none. Env overrides apply either way.
pub fn load_config(explicit: Option<&Path>) -> Result<(RunConfig, Option<PathBuf>)> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => match find_config_file() {
            Ok(path) => Some(path),
            Err(ConfigError::ConfigFileNotFound) => None,
            Err(e) => return Err(e),
        },
    };

    match path {
        Some(path) => Ok((load_config_from(&path)?, Some(path))),
        None => {
            let mut config = RunConfig::default();
            apply_env_overrides(&mut config);
            config.validate()?;
            Ok((config, None))
        }
    }
}

/// `MODCHECK_REGION`, `MODCHECK_MODULE_DIR` and `MODCHECK_AWS_PROFILE`
/// take precedence over the file
pub fn apply_env_overrides(config: &mut RunConfig) {
    if let Some(region) = non_empty_var(REGION_ENV) {
        config.region = region;
    }
    if let Some(module_dir) = non_empty_var(MODULE_DIR_ENV) {
        config.module_dir = PathBuf::from(module_dir);
    }
    if let Some(profile) = non_empty_var(AWS_PROFILE_ENV) {
        config.aws.profile = Some(profile);
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
