use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Where in credential provisioning a failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionStage {
    Prompt,
    Decryption,
    Parsing,
}

impl fmt::Display for ProvisionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProvisionStage::Prompt => write!(f, "passphrase prompt"),
            ProvisionStage::Decryption => write!(f, "credential decryption"),
            ProvisionStage::Parsing => write!(f, "config parsing"),
        }
    }
}

/// Failures while recovering API credentials from the protected archive.
///
/// None of these carry plaintext from the archive or the passphrase.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("passphrase prompt abandoned")]
    PromptAbandoned,

    #[error("failed to read passphrase: {0}")]
    Prompt(#[source] std::io::Error),

    #[error("archive not found at {}", .0.display())]
    ArchiveNotFound(PathBuf),

    #[error("could not read archive: {0}")]
    ArchiveIo(#[source] std::io::Error),

    #[error("wrong passphrase or corrupt archive")]
    Authentication,

    #[error("archive has no entry named {0:?}")]
    MissingEntry(String),

    #[error("configuration payload is malformed: {0}")]
    ConfigFormat(String),

    #[error("configuration is missing [{section}] {key}")]
    MissingCredential {
        section: &'static str,
        key: &'static str,
    },
}

impl ProvisionError {
    pub fn stage(&self) -> ProvisionStage {
        match self {
            ProvisionError::PromptAbandoned | ProvisionError::Prompt(_) => ProvisionStage::Prompt,
            ProvisionError::ArchiveNotFound(_)
            | ProvisionError::ArchiveIo(_)
            | ProvisionError::Authentication
            | ProvisionError::MissingEntry(_) => ProvisionStage::Decryption,
            ProvisionError::ConfigFormat(_) | ProvisionError::MissingCredential { .. } => {
                ProvisionStage::Parsing
            }
        }
    }
}

/// Crate-wide error. Every variant is fatal for the run.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("invalid settings: {0}")]
    Settings(String),

    #[error("{stage} failed: {0}", stage = .0.stage())]
    Provisioning(#[from] ProvisionError),

    #[error("unknown mode {0:?}, expected backtest or live")]
    InvalidMode(String),

    #[error("data fetch failed: {0}")]
    DataFetch(String),

    #[error("execution failed: {0}")]
    Execution(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for BotError {
    fn from(err: config::ConfigError) -> Self {
        BotError::Settings(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BotError>;
