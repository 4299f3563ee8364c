use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to open config file: {0}")]
    OpenFileError(String),

    #[error("Failed to parse config file: {0}")]
    ParseError(String),

    #[error("Failed to create log directory {path}: {reason}")]
    LogDirectoryError { path: String, reason: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidOverride { key: &'static str, value: String },
}
