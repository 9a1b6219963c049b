use std::num::ParseIntError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not find a config directory")]
    NoConfigDir,

    #[error("failed to read config {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("activation time must be greater than zero")]
    InvalidActivationTime,
}

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("failed to read sensor script {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: unknown command `{command}`")]
    UnknownCommand { line: usize, command: String },

    #[error("line {line}: `{command}` expects {expected}")]
    MissingArgument {
        line: usize,
        command: String,
        expected: &'static str,
    },

    #[error("line {line}: unexpected argument `{value}`")]
    UnexpectedArgument { line: usize, value: String },

    #[error("line {line}: invalid hotspot id `{value}`")]
    InvalidId {
        line: usize,
        value: String,
        #[source]
        source: ParseIntError,
    },

    #[error("line {line}: invalid duration `{value}`")]
    InvalidDuration {
        line: usize,
        value: String,
        #[source]
        source: ParseIntError,
    },
}
