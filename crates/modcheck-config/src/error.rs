use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config directory not found")]
    ConfigDirNotFound,

    #[error(
        "No config file found. Looked for:\n\
        - current directory: modcheck.local.yaml, modcheck.yaml, .modcheck.yaml\n\
        - ~/.config/modcheck/modcheck.yaml\n\
        Set MODCHECK_CONFIG_PATH to point at a file directly"
    )]
    ConfigFileNotFound,

    #[error("Config file does not exist: {0}")]
    MissingFile(PathBuf),

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
